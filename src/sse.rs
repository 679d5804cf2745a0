//! Server-Sent Events fan-out hub.
//!
//! Each connection owns a bounded outbound queue (depth 64) fed by a
//! subscription on the event bus plus a 15s heartbeat ticker. Backpressure is
//! drop-oldest: a full queue discards its front entry to make room for the
//! newest one rather than blocking the publisher. If the queue stays full
//! across two consecutive heartbeats (30s) the consumer clearly isn't
//! draining — the stream ends and the client is expected to reconnect.
//!
//! Frame format is fixed, not the generic `data: ...` wrapping a plain byte
//! stream would get: `event: {type}\nid: {id}\ndata: {json}\n\n`, with the
//! bare `event: heartbeat\ndata: {}\n\n` for heartbeats (no `id` line — a
//! heartbeat isn't a message a client needs to resume from).

use std::collections::VecDeque;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::{StatusCode, header};
use http_body_util::StreamBody;
use tokio::sync::Notify;
use tokio_stream::Stream;

use crate::body::TakoBody;
use crate::domain::event::FacilityEvent;
use crate::events::{EventBus, RegionSelector};
use crate::metrics::Metrics;
use crate::responder::Responder;
use crate::types::Response;

/// Outbound queue depth. Large enough to absorb a burst of mutations between
/// two client reads without losing the connection over a brief stall.
const QUEUE_DEPTH: usize = 64;

/// How long a queue may stay continuously full before the connection is
/// considered stalled and closed.
const STALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Heartbeat cadence. Chosen so two missed heartbeats line up with
/// [`STALL_TIMEOUT`].
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

fn format_event_frame(event: &FacilityEvent) -> Bytes {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("event: {}\nid: {}\ndata: {}\n\n", event.event_type(), event.id, data))
}

fn format_heartbeat_frame() -> Bytes {
    Bytes::from_static(b"event: heartbeat\ndata: {}\n\n")
}

/// Sent once, immediately on accept, before any bus-derived events.
fn format_connected_frame(subscription: &SseSubscription) -> Bytes {
    let info = match subscription {
        SseSubscription::Global => serde_json::json!({ "subscription": "global" }),
        SseSubscription::Facility(id) => serde_json::json!({ "subscription": "facility", "facility_id": id }),
        SseSubscription::Region(selector) => serde_json::json!({
            "subscription": "region",
            "lat": selector.center.lat,
            "lon": selector.center.lon,
            "radius_km": selector.radius_km,
        }),
    };
    Bytes::from(format!("event: connected\ndata: {info}\n\n"))
}

/// What a connection is subscribed to.
#[derive(Debug, Clone)]
pub enum SseSubscription {
    /// Every facility's events.
    Global,
    /// Only one facility's events.
    Facility(String),
    /// Events from facilities within a geographic radius, evaluated against
    /// the global channel (see the region-selector resolution notes).
    Region(RegionSelector),
}

/// Bounded, drop-oldest outbound buffer shared between the forwarder task
/// (producer) and the response body stream (consumer).
struct OutboundQueue {
    items: Mutex<VecDeque<Bytes>>,
    notify: Notify,
    full_since: Mutex<Option<Instant>>,
    stalled: AtomicBool,
}

impl OutboundQueue {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::with_capacity(QUEUE_DEPTH)),
            notify: Notify::new(),
            full_since: Mutex::new(None),
            stalled: AtomicBool::new(false),
        }
    }

    /// Pushes a frame, dropping the oldest queued frame first if already at
    /// capacity. Marks the connection stalled if the queue has been
    /// continuously full for [`STALL_TIMEOUT`].
    fn push(&self, frame: Bytes) {
        let mut items = self.items.lock().unwrap();
        let was_full = items.len() >= QUEUE_DEPTH;
        if was_full {
            items.pop_front();
        }
        items.push_back(frame);
        drop(items);

        let mut full_since = self.full_since.lock().unwrap();
        if was_full {
            let since = *full_since.get_or_insert(Instant::now());
            if since.elapsed() >= STALL_TIMEOUT {
                self.stalled.store(true, Ordering::Relaxed);
            }
        } else {
            *full_since = None;
        }
        drop(full_since);

        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Bytes> {
        let item = self.items.lock().unwrap().pop_front();
        if item.is_some() {
            *self.full_since.lock().unwrap() = None;
        }
        item
    }

    fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Relaxed)
    }
}

/// A live SSE connection's response body stream. Implements `Stream` by
/// waiting on the queue's notifier; ends the stream once the queue reports
/// the connection stalled or the forwarder task has shut down.
struct ConnectionStream {
    queue: Arc<OutboundQueue>,
    forwarder: tokio::task::JoinHandle<()>,
    metrics: Metrics,
    notified: Option<Pin<Box<dyn std::future::Future<Output = ()> + Send>>>,
}

impl Stream for ConnectionStream {
    type Item = Result<hyper::body::Frame<Bytes>, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(frame) = this.queue.pop() {
                return Poll::Ready(Some(Ok(hyper::body::Frame::data(frame))));
            }
            if this.queue.is_stalled() || this.forwarder.is_finished() {
                return Poll::Ready(None);
            }

            if this.notified.is_none() {
                let queue = this.queue.clone();
                this.notified = Some(Box::pin(async move { queue.notify.notified().await }));
            }
            match this.notified.as_mut().unwrap().as_mut().poll(cx) {
                Poll::Ready(()) => this.notified = None,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ConnectionStream {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.metrics.dec_sse_connections();
    }
}

/// A single client's SSE response, produced by [`SseHub::connect`].
pub struct SseConnection {
    stream: ConnectionStream,
}

impl Responder for SseConnection {
    fn into_response(self) -> Response {
        let body = StreamBody::new(self.stream);
        hyper::Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(TakoBody::new(body))
            .expect("well-formed sse response")
    }
}

/// Fan-out point for turning event-bus subscriptions into SSE connections.
#[derive(Clone)]
pub struct SseHub {
    bus: EventBus,
    metrics: Metrics,
}

impl SseHub {
    pub fn new(bus: EventBus, metrics: Metrics) -> Self {
        Self { bus, metrics }
    }

    /// Opens a new connection for `subscription`. Spawns the forwarder task
    /// that bridges the event bus to the connection's outbound queue, plus
    /// its heartbeat ticker.
    pub fn connect(&self, subscription: SseSubscription) -> SseConnection {
        self.metrics.inc_sse_connections();
        let queue = Arc::new(OutboundQueue::new());
        queue.push(format_connected_frame(&subscription));

        let forwarder = tokio::spawn(Self::forward(self.bus.clone(), subscription, queue.clone()));

        SseConnection {
            stream: ConnectionStream {
                queue,
                forwarder,
                metrics: self.metrics.clone(),
                notified: None,
            },
        }
    }

    async fn forward(bus: EventBus, subscription: SseSubscription, queue: Arc<OutboundQueue>) {
        let mut events = match &subscription {
            SseSubscription::Global | SseSubscription::Region(_) => bus.subscribe_global(),
            SseSubscription::Facility(id) => bus.subscribe_facility(id),
        };
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await; // first tick fires immediately; consume it.

        loop {
            tokio::select! {
                received = events.recv() => {
                    match received {
                        Ok(event) => {
                            let matches = match &subscription {
                                SseSubscription::Global | SseSubscription::Facility(_) => true,
                                SseSubscription::Region(selector) => selector.matches(event.location),
                            };
                            if matches {
                                queue.push(format_event_frame(&event));
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                    }
                }
                _ = heartbeat.tick() => {
                    queue.push(format_heartbeat_frame());
                    if queue.is_stalled() {
                        return;
                    }
                }
            }
        }
    }
}

/// The client reconnection contract this hub expects consumers to follow:
/// exponential backoff from 1s, doubling each attempt, capped at 30s, giving
/// up after 10 attempts. Purely descriptive — nothing in this crate enforces
/// it on a client — but `next_delay` is exposed so a bundled reference client
/// or test harness can implement it without duplicating the constants.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// The delay before reconnect attempt number `attempt` (1-indexed), or
    /// `None` once `max_attempts` has been exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let scale = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let backoff = self.initial_backoff.saturating_mul(scale);
        Some(backoff.min(self.max_backoff))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ChangedFields;
    use crate::domain::facility::{CapacityStatus, Location};

    fn sample_event(facility_id: &str) -> FacilityEvent {
        FacilityEvent::new(
            facility_id,
            Location { lat: 6.5, lon: 3.4 },
            ChangedFields::CapacityUpdate {
                status: CapacityStatus::Busy,
                avg_wait_minutes: Some(45),
                urgent_care_available: false,
            },
        )
    }

    #[test]
    fn event_frame_contains_event_type_id_and_data_lines() {
        let event = sample_event("f1");
        let frame = format_event_frame(&event);
        let text = String::from_utf8(frame.to_vec()).unwrap();
        assert!(text.starts_with("event: capacity_update\n"));
        assert!(text.contains(&format!("id: {}\n", event.id)));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn queue_drops_oldest_when_full() {
        let queue = OutboundQueue::new();
        for i in 0..QUEUE_DEPTH + 1 {
            queue.push(Bytes::from(i.to_string()));
        }
        assert_eq!(queue.pop().unwrap(), Bytes::from("1".to_string()));
    }

    #[tokio::test]
    async fn facility_subscription_receives_only_its_own_events() {
        let hub = SseHub::new(EventBus::new(), Metrics::new());
        let connection = hub.connect(SseSubscription::Facility("f1".into()));

        hub.bus.publish(sample_event("f2"));
        hub.bus.publish(sample_event("f1"));

        tokio::time::sleep(Duration::from_millis(20)).await;
        let connected = connection.stream.queue.pop().unwrap();
        assert!(String::from_utf8(connected.to_vec()).unwrap().starts_with("event: connected\n"));

        let frame = connection.stream.queue.pop().unwrap();
        assert!(String::from_utf8(frame.to_vec()).unwrap().contains("\"facility_id\":\"f1\""));
        assert!(connection.stream.queue.pop().is_none());
    }

    #[test]
    fn reconnect_policy_doubles_until_the_cap() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.next_delay(1), Some(Duration::from_secs(1)));
        assert_eq!(policy.next_delay(2), Some(Duration::from_secs(2)));
        assert_eq!(policy.next_delay(6), Some(Duration::from_secs(30)));
        assert_eq!(policy.next_delay(11), None);
    }
}
