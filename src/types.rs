//! Core type aliases shared across the router: `Request`/`Response` and the
//! boxed body/error/middleware types that hide the framework's generic
//! parameters from callers.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Incoming;

use crate::{body::TakoBody, middleware::Next};

pub type Request = hyper::Request<Incoming>;
pub type Response = hyper::Response<TakoBody>;

pub(crate) type BoxBody = UnsyncBoxBody<Bytes, BoxError>;
pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type BoxMiddleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;
