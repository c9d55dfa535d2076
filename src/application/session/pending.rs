//! Correlation of outbound calls with their CallResult / CallError.

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::support::errors::CommandError;

pub type CallOutcome = Result<Value, CommandError>;

struct PendingCall {
    action: String,
    responder: oneshot::Sender<CallOutcome>,
}

/// Waiters for calls this side has sent, keyed by unique id.
///
/// Owned by exactly one session. Every entry is removed exactly once:
/// by its response, by the caller on timeout, or by [`fail_all`](Self::fail_all).
#[derive(Default)]
pub struct PendingCalls {
    calls: DashMap<String, PendingCall>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, unique_id: &str, action: &str) -> oneshot::Receiver<CallOutcome> {
        let (responder, rx) = oneshot::channel();
        self.calls.insert(
            unique_id.to_string(),
            PendingCall {
                action: action.to_string(),
                responder,
            },
        );
        rx
    }

    /// Deliver a CallResult. Returns `false` if nobody was waiting for it.
    pub fn resolve(&self, unique_id: &str, payload: Value) -> bool {
        self.complete(unique_id, Ok(payload))
    }

    /// Deliver a CallError. Returns `false` if nobody was waiting for it.
    pub fn reject(&self, unique_id: &str, code: &str, description: &str) -> bool {
        self.complete(
            unique_id,
            Err(CommandError::CallError {
                code: code.to_string(),
                description: description.to_string(),
            }),
        )
    }

    /// Forget a call without completing it (timeout path).
    pub fn remove(&self, unique_id: &str) -> bool {
        self.calls.remove(unique_id).is_some()
    }

    /// Complete every outstanding call with `err`; returns how many there were.
    pub fn fail_all(&self, err: CommandError) -> usize {
        let ids: Vec<String> = self.calls.iter().map(|e| e.key().clone()).collect();
        ids.iter()
            .filter(|id| self.complete(id, Err(err.clone())))
            .count()
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    fn complete(&self, unique_id: &str, outcome: CallOutcome) -> bool {
        match self.calls.remove(unique_id) {
            Some((_, pending)) => {
                debug!(
                    message_id = unique_id,
                    action = pending.action.as_str(),
                    ok = outcome.is_ok(),
                    "Completing pending call"
                );
                // The caller may have given up already; that is fine.
                let _ = pending.responder.send(outcome);
                true
            }
            None => {
                warn!(message_id = unique_id, "Response for unknown or expired call, discarded");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_wakes_the_waiter() {
        let pending = PendingCalls::new();
        let rx = pending.register("m1", "RemoteStartTransaction");

        assert!(pending.resolve("m1", json!({"status": "Accepted"})));
        assert_eq!(rx.await.unwrap().unwrap(), json!({"status": "Accepted"}));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn reject_carries_the_error_code() {
        let pending = PendingCalls::new();
        let rx = pending.register("m1", "RemoteStartTransaction");

        assert!(pending.reject("m1", "NotSupported", "nope"));
        assert_eq!(
            rx.await.unwrap(),
            Err(CommandError::CallError {
                code: "NotSupported".into(),
                description: "nope".into(),
            })
        );
    }

    #[test]
    fn unmatched_and_late_responses_are_discarded() {
        let pending = PendingCalls::new();
        assert!(!pending.resolve("ghost", json!({})));

        let _rx = pending.register("m2", "Reset");
        assert!(pending.remove("m2"));
        assert!(!pending.resolve("m2", json!({})));
    }

    #[tokio::test]
    async fn fail_all_drains_everything() {
        let pending = PendingCalls::new();
        let a = pending.register("a", "Reset");
        let b = pending.register("b", "Reset");

        assert_eq!(pending.fail_all(CommandError::ConnectionClosed), 2);
        assert_eq!(a.await.unwrap(), Err(CommandError::ConnectionClosed));
        assert_eq!(b.await.unwrap(), Err(CommandError::ConnectionClosed));
        assert!(pending.is_empty());
    }
}
