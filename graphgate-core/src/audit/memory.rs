use async_trait::async_trait;
use parking_lot::Mutex;

use super::{AuditError, AuditEvent, AuditSink, PairingIndex};

#[derive(Debug, Default)]
struct State {
    events: Vec<AuditEvent>,
    index: PairingIndex,
}

/// In-memory audit sink.
///
/// Events are lost when the process exits. Used by tests and dry runs.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use graphgate_core::{AuditEvent, AuditOutcome, AuditSink, MemoryAuditSink};
///
/// # tokio_test::block_on(async {
/// let sink = MemoryAuditSink::new();
/// let decision = AuditEvent::decision(
///     "c-1", "alice", "api get", "acme", "prod", AuditOutcome::Allowed, Utc::now(),
/// );
/// sink.record(decision.clone()).await.unwrap();
///
/// // The correlation ID is now claimed
/// assert!(sink.record(decision).await.is_err());
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    state: Mutex<State>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut state = self.state.lock();
        if let Err(violation) = state.index.check(&event) {
            log::warn!("audit event rejected: {violation}");
            return Err(violation.into());
        }
        state.index.apply(&event);
        state.events.push(event);
        Ok(())
    }

    async fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        Ok(self.state.lock().events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditOutcome, AuditViolation};
    use chrono::Utc;
    use std::sync::Arc;

    fn decision(cid: &str) -> AuditEvent {
        AuditEvent::decision(
            cid,
            "alice",
            "api get",
            "acme",
            "prod",
            AuditOutcome::Allowed,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_memory_sink_basic() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());

        let d = decision("c1");
        sink.record(d.clone()).await.unwrap();
        sink.record(d.execution_of(AuditOutcome::Succeeded, Utc::now()))
            .await
            .unwrap();
        sink.record(decision("c2")).await.unwrap();

        assert_eq!(sink.len(), 3);
        let c1 = sink.events_for("c1").await.unwrap();
        assert_eq!(c1.len(), 2);
        assert_eq!(c1[0].kind, crate::audit::AuditKind::Decision);
        assert_eq!(c1[1].kind, crate::audit::AuditKind::Execution);
    }

    #[tokio::test]
    async fn test_memory_sink_rejects_without_recording() {
        let sink = MemoryAuditSink::new();
        sink.record(decision("c1")).await.unwrap();

        let err = sink.record(decision("c1")).await.unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvariantViolation(AuditViolation::DuplicateDecision(_))
        ));
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_decisions_claim_once() {
        let sink = Arc::new(MemoryAuditSink::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let sink = Arc::clone(&sink);
            handles.push(tokio::spawn(async move {
                sink.record(decision("shared")).await.is_ok()
            }));
        }

        let mut claimed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                claimed += 1;
            }
        }
        assert_eq!(claimed, 1);
        assert_eq!(sink.len(), 1);
    }
}
