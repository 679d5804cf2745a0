//! The `Responder` trait: converts a handler's return value into an HTTP
//! response. Implemented for the primitive types handlers actually return
//! in this crate (`&str`/`String` for plain text, `()` for empty bodies,
//! `(StatusCode, R)` pairs, `TakoBody`, and `anyhow::Error`/`Infallible` for
//! the error paths `Handler::call` has to type-check against).

use std::{convert::Infallible, fmt::Display};

use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::body::TakoBody;

pub trait Responder {
    fn into_response(self) -> Response<TakoBody>;
}

impl Responder for Response<TakoBody> {
    fn into_response(self) -> Response<TakoBody> {
        self
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<TakoBody> {
        Response::new(TakoBody::new(Full::from(Bytes::from_static(self.as_bytes()))))
    }
}

impl Responder for String {
    fn into_response(self) -> Response<TakoBody> {
        Response::new(TakoBody::new(Full::from(Bytes::from(self))))
    }
}

/// Empty 200 response, for endpoints that only need to signal success.
impl Responder for () {
    fn into_response(self) -> Response<TakoBody> {
        Response::new(TakoBody::empty())
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response<TakoBody> {
        match self {}
    }
}

impl<R> Responder for (StatusCode, R)
where
    R: Display,
{
    fn into_response(self) -> Response<TakoBody> {
        let (status, body) = self;
        let mut res = Response::new(TakoBody::new(Full::from(Bytes::from(body.to_string()))));
        *res.status_mut() = status;
        res
    }
}

impl Responder for TakoBody {
    fn into_response(self) -> Response<TakoBody> {
        Response::new(self)
    }
}

/// Surfaced as `400 Bad Request` since the only producers in this crate are
/// extractor/validation failures, never a server-side fault.
impl Responder for anyhow::Error {
    fn into_response(self) -> Response<TakoBody> {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_pair_sets_status_and_body() {
        let res = (StatusCode::NOT_FOUND, "missing").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unit_responds_empty_200() {
        assert_eq!(().into_response().status(), StatusCode::OK);
    }
}
