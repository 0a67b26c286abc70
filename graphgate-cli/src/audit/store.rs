use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use graphgate_core::{AuditError, AuditEvent, AuditKind, AuditOutcome, AuditSink, AuditViolation};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_EVENTS: &str = "SELECT kind, correlation_id, principal, command, org, workspace, \
     outcome, timestamp, reason, secret_actions FROM audit_events";

/// SQLite-based audit storage
///
/// Every record runs in an `IMMEDIATE` transaction that checks the pairing
/// rules and inserts the event, so concurrent processes sharing one database
/// still claim each correlation ID at most once. A `UNIQUE(correlation_id,
/// kind)` constraint backs the check.
///
/// # Example
/// ```no_run
/// use graphgate_cli::SqliteAuditSink;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = SqliteAuditSink::new(".graphgate/audit.db")?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteAuditSink {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAuditSink {
    /// Open (or create) the audit database at `path`.
    ///
    /// Creates the parent directory and tables if they don't exist.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AuditError::Storage(format!("failed to create directory: {e}"))
                })?;
            }
        }

        let conn = Connection::open(&path)
            .map_err(|e| AuditError::Storage(format!("failed to open database: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(AuditError::storage)?;
        conn.execute_batch(include_str!("schema.sql"))
            .map_err(|e| AuditError::Storage(format!("failed to initialize schema: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Storage("audit connection lock poisoned".into()))
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AuditEvent>, AuditError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(AuditError::storage)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(EventRow {
                    kind: row.get(0)?,
                    correlation_id: row.get(1)?,
                    principal: row.get(2)?,
                    command: row.get(3)?,
                    org: row.get(4)?,
                    workspace: row.get(5)?,
                    outcome: row.get(6)?,
                    timestamp: row.get(7)?,
                    reason: row.get(8)?,
                    secret_actions: row.get(9)?,
                })
            })
            .map_err(AuditError::storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(AuditError::storage)?;

        rows.into_iter().map(EventRow::into_event).collect()
    }
}

/// Raw column values of one `audit_events` row.
struct EventRow {
    kind: String,
    correlation_id: String,
    principal: String,
    command: String,
    org: String,
    workspace: String,
    outcome: String,
    timestamp: String,
    reason: Option<String>,
    secret_actions: String,
}

impl EventRow {
    fn into_event(self) -> Result<AuditEvent, AuditError> {
        let kind: AuditKind = self.kind.parse().map_err(AuditError::Storage)?;
        let outcome: AuditOutcome = self.outcome.parse().map_err(AuditError::Storage)?;
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| AuditError::Storage(format!("timestamp {:?}: {e}", self.timestamp)))?
            .with_timezone(&Utc);
        let secret_actions: Vec<String> =
            serde_json::from_str(&self.secret_actions).map_err(AuditError::storage)?;

        Ok(AuditEvent {
            kind,
            correlation_id: self.correlation_id,
            principal: self.principal,
            command: self.command,
            org: self.org,
            workspace: self.workspace,
            outcome,
            timestamp,
            reason: self.reason,
            secret_actions,
        })
    }
}

/// Check `event` against what is already stored for its correlation ID.
fn check_pairing(
    tx: &rusqlite::Transaction<'_>,
    event: &AuditEvent,
) -> Result<(), AuditError> {
    if !event.outcome.applies_to(event.kind) {
        return Err(AuditViolation::InvalidOutcome {
            kind: event.kind,
            outcome: event.outcome,
        }
        .into());
    }

    let cid = &event.correlation_id;
    let decision: Option<String> = tx
        .query_row(
            "SELECT outcome FROM audit_events WHERE correlation_id = ? AND kind = 'decision'",
            params![cid],
            |row| row.get(0),
        )
        .optional()
        .map_err(AuditError::storage)?;

    let violation = match (event.kind, decision.as_deref()) {
        (AuditKind::Decision, Some(_)) => Some(AuditViolation::DuplicateDecision(cid.clone())),
        (AuditKind::Decision, None) => None,
        (AuditKind::Execution, None) => Some(AuditViolation::OrphanExecution(cid.clone())),
        (AuditKind::Execution, Some(outcome)) if outcome != AuditOutcome::Allowed.as_str() => {
            Some(AuditViolation::DeniedDecision(cid.clone()))
        }
        (AuditKind::Execution, Some(_)) => {
            let executed: Option<i64> = tx
                .query_row(
                    "SELECT seq FROM audit_events WHERE correlation_id = ? AND kind = 'execution'",
                    params![cid],
                    |row| row.get(0),
                )
                .optional()
                .map_err(AuditError::storage)?;
            executed.map(|_| AuditViolation::DuplicateExecution(cid.clone()))
        }
    };

    match violation {
        Some(violation) => Err(violation.into()),
        None => Ok(()),
    }
}

fn duplicate_of(event: &AuditEvent) -> AuditViolation {
    match event.kind {
        AuditKind::Decision => AuditViolation::DuplicateDecision(event.correlation_id.clone()),
        AuditKind::Execution => AuditViolation::DuplicateExecution(event.correlation_id.clone()),
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let secret_actions = serde_json::to_string(&event.secret_actions).map_err(AuditError::storage)?;

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| AuditError::Storage(format!("failed to begin transaction: {e}")))?;

        if let Err(err) = check_pairing(&tx, &event) {
            log::warn!("audit event rejected: {err}");
            return Err(err);
        }

        let inserted = tx.execute(
            "INSERT INTO audit_events (kind, correlation_id, principal, command, org, workspace,
                                       outcome, timestamp, reason, secret_actions)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                event.kind.as_str(),
                event.correlation_id,
                event.principal,
                event.command,
                event.org,
                event.workspace,
                event.outcome.as_str(),
                event.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
                event.reason,
                secret_actions,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                let violation = duplicate_of(&event);
                log::warn!("audit event rejected: {violation}");
                return Err(violation.into());
            }
            Err(e) => return Err(AuditError::Storage(format!("failed to insert event: {e}"))),
        }

        // Commit transaction - if this fails, the claim is rolled back
        tx.commit()
            .map_err(|e| AuditError::Storage(format!("failed to commit transaction: {e}")))
    }

    async fn events(&self) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(&format!("{SELECT_EVENTS} ORDER BY seq"), params![])
    }

    async fn events_for(&self, correlation_id: &str) -> Result<Vec<AuditEvent>, AuditError> {
        self.query(
            &format!("{SELECT_EVENTS} WHERE correlation_id = ? ORDER BY seq"),
            params![correlation_id],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use tempfile::TempDir;

    fn decision(cid: &str, outcome: AuditOutcome) -> AuditEvent {
        AuditEvent::decision(
            cid,
            "alice",
            "auth rotate",
            "acme",
            "prod",
            outcome,
            Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
        )
    }

    fn open(dir: &TempDir) -> SqliteAuditSink {
        SqliteAuditSink::new(dir.path().join("audit.db")).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_read_pair() {
        let dir = TempDir::new().unwrap();
        let sink = open(&dir);

        let d = decision("c-1", AuditOutcome::Allowed)
            .with_secret_actions(vec!["token.rotate".into()]);
        sink.record(d.clone()).await.unwrap();
        let e = d
            .execution_of(AuditOutcome::Failed, d.timestamp + chrono::Duration::milliseconds(1500))
            .with_reason("exit 2");
        sink.record(e.clone()).await.unwrap();

        let events = sink.events_for("c-1").await.unwrap();
        assert_eq!(events, vec![d, e]);
    }

    #[tokio::test]
    async fn test_timestamp_keeps_nanoseconds() {
        let dir = TempDir::new().unwrap();
        let sink = open(&dir);

        let mut d = decision("c-ns", AuditOutcome::Allowed);
        d.timestamp = Utc
            .with_ymd_and_hms(2025, 6, 1, 9, 0, 16)
            .unwrap()
            .with_nanosecond(295_194_140)
            .unwrap();
        sink.record(d.clone()).await.unwrap();

        let events = sink.events().await.unwrap();
        assert_eq!(events, vec![d]);
        assert_eq!(events[0].timestamp.timestamp_subsec_nanos(), 295_194_140);
    }

    #[tokio::test]
    async fn test_duplicate_decision_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sink = open(&dir);

        sink.record(decision("c-1", AuditOutcome::Allowed)).await.unwrap();
        let err = sink
            .record(decision("c-1", AuditOutcome::Denied))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvariantViolation(AuditViolation::DuplicateDecision(_))
        ));
        assert_eq!(sink.events().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execution_rules() {
        let dir = TempDir::new().unwrap();
        let sink = open(&dir);

        let orphan = decision("c-orphan", AuditOutcome::Allowed)
            .execution_of(AuditOutcome::Succeeded, Utc::now());
        assert!(matches!(
            sink.record(orphan).await.unwrap_err(),
            AuditError::InvariantViolation(AuditViolation::OrphanExecution(_))
        ));

        let denied = decision("c-denied", AuditOutcome::Denied);
        sink.record(denied.clone()).await.unwrap();
        assert!(matches!(
            sink.record(denied.execution_of(AuditOutcome::Succeeded, Utc::now()))
                .await
                .unwrap_err(),
            AuditError::InvariantViolation(AuditViolation::DeniedDecision(_))
        ));

        let allowed = decision("c-ok", AuditOutcome::Allowed);
        sink.record(allowed.clone()).await.unwrap();
        sink.record(allowed.execution_of(AuditOutcome::Succeeded, Utc::now()))
            .await
            .unwrap();
        assert!(matches!(
            sink.record(allowed.execution_of(AuditOutcome::Succeeded, Utc::now()))
                .await
                .unwrap_err(),
            AuditError::InvariantViolation(AuditViolation::DuplicateExecution(_))
        ));
    }

    #[tokio::test]
    async fn test_outcome_must_match_kind() {
        let dir = TempDir::new().unwrap();
        let sink = open(&dir);

        let err = sink
            .record(decision("c-1", AuditOutcome::Succeeded))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::InvariantViolation(AuditViolation::InvalidOutcome { .. })
        ));
    }

    #[tokio::test]
    async fn test_claims_survive_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let sink = open(&dir);
            sink.record(decision("c-1", AuditOutcome::Allowed)).await.unwrap();
        }

        let sink = open(&dir);
        assert_eq!(sink.events().await.unwrap().len(), 1);
        assert!(sink
            .record(decision("c-1", AuditOutcome::Allowed))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_two_connections_claim_once() {
        let dir = TempDir::new().unwrap();
        let a = open(&dir);
        let b = open(&dir);

        a.record(decision("c-shared", AuditOutcome::Allowed)).await.unwrap();
        let err = b
            .record(decision("c-shared", AuditOutcome::Allowed))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("audit.db");
        let sink = SqliteAuditSink::new(&path).unwrap();
        assert!(path.exists());
        assert_eq!(sink.path(), path.as_path());
    }
}
