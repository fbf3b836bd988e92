//! Worker ↔ reviewer confirmation bridge
//!
//! The worker side ([`ConfirmationChannel`]) queues a request and waits on a
//! per-id response slot. The wait wakes at least once per poll interval to
//! observe the cancellation flag. The reviewer side ([`ReviewEndpoint`])
//! drains requests, asks a [`ReviewSurface`] and fills the slot.
//!
//! Every failure on the reviewer side turns into a `skip` for that one
//! request: a broken surface, a closed endpoint, a response with the wrong
//! id. Only cancellation is reported to the caller as an error.

use crate::cancel::CancelToken;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use wikicat_core::errors::{ExError, Result, WikicatError};
use wikicat_core::review::{ConfirmationRequest, ConfirmationResponse, ReviewSurface};
use wikicat_core_types::RequestId;

/// Default wake-up interval of the confirmation wait
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct ResponseSlots {
    pending: Mutex<HashMap<RequestId, Option<ConfirmationResponse>>>,
    ready: Condvar,
    endpoint_closed: AtomicBool,
}

/// Worker-side half
pub struct ConfirmationChannel {
    requests: Sender<ConfirmationRequest>,
    slots: Arc<ResponseSlots>,
    poll_interval: Duration,
}

/// Reviewer-side half
pub struct ReviewEndpoint {
    requests: Receiver<ConfirmationRequest>,
    slots: Arc<ResponseSlots>,
}

/// Create a connected channel/endpoint pair
pub fn confirmation_pair(poll_interval: Duration) -> (ConfirmationChannel, ReviewEndpoint) {
    let (tx, rx) = channel::unbounded();
    let slots = Arc::new(ResponseSlots::default());
    (
        ConfirmationChannel {
            requests: tx,
            slots: slots.clone(),
            poll_interval,
        },
        ReviewEndpoint {
            requests: rx,
            slots,
        },
    )
}

impl ConfirmationChannel {
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Hand `request` to the reviewer and wait for the matching response
    ///
    /// # Errors
    ///
    /// Returns `ERR_CANCELLED` when `cancel` is raised before a response
    /// arrives. Reviewer-side failures are not errors; they yield `skip`.
    pub fn request(
        &self,
        request: ConfirmationRequest,
        cancel: &CancelToken,
    ) -> Result<ConfirmationResponse> {
        let id = request.id.clone();
        self.slots.pending.lock().insert(id.clone(), None);

        debug!(request_id = %id, page = %request.page, template = %request.template, "Confirmation requested");
        if self.requests.send(request).is_err() {
            self.slots.pending.lock().remove(&id);
            error!(request_id = %id, "Review endpoint is gone, skipping");
            return Ok(ConfirmationResponse::skip(id));
        }

        let mut pending = self.slots.pending.lock();
        loop {
            if cancel.is_cancelled() {
                pending.remove(&id);
                return Err(ExError::from(WikicatError::Cancelled)
                    .with_op("await_confirmation")
                    .with_request_id(id));
            }
            if let Some(Some(_)) = pending.get(&id) {
                let response = pending.remove(&id).flatten();
                return Ok(match response {
                    Some(response) => response,
                    None => ConfirmationResponse::skip(id),
                });
            }
            if self.slots.endpoint_closed.load(Ordering::SeqCst) {
                pending.remove(&id);
                error!(request_id = %id, "Review endpoint closed while waiting, skipping");
                return Ok(ConfirmationResponse::skip(id));
            }
            self.slots.ready.wait_for(&mut pending, self.poll_interval);
        }
    }
}

impl ReviewEndpoint {
    /// Next queued request, waiting at most `timeout`
    ///
    /// `None` on timeout and once the worker side is gone.
    pub fn next_request(&self, timeout: Duration) -> Option<ConfirmationRequest> {
        match self.requests.recv_timeout(timeout) {
            Ok(request) => Some(request),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Deliver a response to the waiting worker
    ///
    /// # Errors
    ///
    /// `ERR_MALFORMED_RESPONSE` when no request with that id is waiting.
    pub fn respond(&self, response: ConfirmationResponse) -> Result<()> {
        let mut pending = self.slots.pending.lock();
        match pending.get_mut(&response.id) {
            Some(slot) => {
                debug!(request_id = %response.id, action = ?response.action, "Confirmation answered");
                *slot = Some(response);
                self.slots.ready.notify_all();
                Ok(())
            }
            None => Err(ExError::from(WikicatError::MalformedResponse {
                request_id: response.id.to_string(),
                reason: "no request with this id is waiting".to_string(),
            })
            .with_op("respond")),
        }
    }

    /// Ask `surface` about one request and deliver the answer
    ///
    /// Surface failures and mismatched ids are logged and answered with `skip`.
    pub fn handle(&self, request: &ConfirmationRequest, surface: &mut dyn ReviewSurface) {
        let response = match surface.review(request) {
            Ok(response) if response.id == request.id => response,
            Ok(response) => {
                error!(
                    request_id = %request.id,
                    response_id = %response.id,
                    "Review response id mismatch, skipping"
                );
                ConfirmationResponse::skip(request.id.clone())
            }
            Err(e) => {
                error!(request_id = %request.id, error = %e, "Review surface failed, skipping");
                ConfirmationResponse::skip(request.id.clone())
            }
        };
        if let Err(e) = self.respond(response) {
            debug!(request_id = %request.id, error = %e, "Worker stopped waiting before the answer");
        }
    }

    /// Serve requests until the worker side is dropped
    pub fn serve(&self, surface: &mut dyn ReviewSurface) {
        for request in self.requests.iter() {
            self.handle(&request, surface);
        }
    }
}

impl Drop for ReviewEndpoint {
    fn drop(&mut self) {
        self.slots.endpoint_closed.store(true, Ordering::SeqCst);
        let _guard = self.slots.pending.lock();
        self.slots.ready.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;
    use wikicat_core::review::{NoopReviewSurface, ReviewAction};

    fn request() -> ConfirmationRequest {
        ConfirmationRequest {
            id: RequestId::new(),
            page: "Page".to_string(),
            template: "InfoBox".to_string(),
            fragment: "{{InfoBox|location=Old Topic}}".to_string(),
            proposed: "{{InfoBox|location=New Topic}}".to_string(),
            old_value: "Old Topic".to_string(),
            new_value: "New Topic".to_string(),
            duplicates: Vec::new(),
            partial: false,
        }
    }

    #[test]
    fn test_response_reaches_waiting_worker() {
        let (channel, endpoint) = confirmation_pair(Duration::from_millis(10));
        let reviewer = thread::spawn(move || {
            let req = endpoint.next_request(Duration::from_secs(5)).unwrap();
            endpoint
                .respond(ConfirmationResponse::apply(req.id.clone()).confirm_all())
                .unwrap();
            endpoint
        });

        let response = channel.request(request(), &CancelToken::new()).unwrap();
        assert_eq!(response.action, ReviewAction::Apply);
        assert!(response.auto_confirm_all);
        drop(reviewer.join().unwrap());
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let (channel, _endpoint) = confirmation_pair(Duration::from_millis(5));
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            trigger.cancel();
        });

        let started = Instant::now();
        let err = channel.request(request(), &cancel).unwrap_err();
        assert_eq!(err.kind(), wikicat_core::ExErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
        canceller.join().unwrap();
    }

    #[test]
    fn test_closed_endpoint_degrades_to_skip() {
        let (channel, endpoint) = confirmation_pair(Duration::from_millis(5));
        drop(endpoint);
        let response = channel.request(request(), &CancelToken::new()).unwrap();
        assert_eq!(response.action, ReviewAction::Skip);
    }

    #[test]
    fn test_failing_surface_degrades_to_skip() {
        let (channel, endpoint) = confirmation_pair(Duration::from_millis(5));
        let reviewer = thread::spawn(move || {
            let mut surface = NoopReviewSurface;
            endpoint.serve(&mut surface);
        });

        let response = channel.request(request(), &CancelToken::new()).unwrap();
        assert_eq!(response.action, ReviewAction::Skip);
        drop(channel);
        reviewer.join().unwrap();
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let (_channel, endpoint) = confirmation_pair(POLL_INTERVAL);
        let err = endpoint
            .respond(ConfirmationResponse::apply(RequestId::new()))
            .unwrap_err();
        assert_eq!(err.kind(), wikicat_core::ExErrorKind::MalformedResponse);
    }
}
