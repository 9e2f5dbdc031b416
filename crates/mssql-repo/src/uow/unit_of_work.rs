//! The unit of work: one tracked entity collection bound to one table, with
//! a transactional commit protocol.
//!
//! Commit drains the pending queue in FIFO order inside a SERIALIZABLE
//! transaction. Any failure rolls the transaction back and surfaces as
//! `CommitFailed` with the original error as its source; if the rollback
//! itself fails the outcome of the transaction is unknown and the fatal
//! `RollbackFailed` aggregate is returned instead, never downgraded.

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::identifier::{qualify, quote_ident, validate_identifier};
use crate::core::traits::{Connection, Entity};
use crate::core::value::SqlValue;
use crate::error::{RepoError, Result};
use crate::uow::state::RecordState;
use crate::uow::tracker::{ChangeTracker, TrackerOptions};

/// Hooks run around the commit's database writes. Both default to no-ops;
/// implementations can serialize commits across units of work.
pub trait CommitLock: Send {
    fn lock(&mut self) {}
    fn unlock(&mut self) {}
}

/// The default lock: does nothing.
pub struct NoLock;

impl CommitLock for NoLock {}

/// A change-tracked view over one table.
pub struct UnitOfWork<E: Entity, C: Connection> {
    connection: C,
    schema: String,
    table: String,
    tracker: ChangeTracker<E>,
    lock: Box<dyn CommitLock>,
}

impl<E: Entity, C: Connection> UnitOfWork<E, C> {
    /// Bind a unit of work to `[schema].[table]` over an open connection.
    /// Call [`refresh`](Self::refresh) before registering changes.
    pub fn new(connection: C, schema: &str, table: &str) -> Result<Self> {
        validate_identifier(schema)?;
        validate_identifier(table)?;
        Ok(Self {
            connection,
            schema: schema.to_string(),
            table: table.to_string(),
            tracker: ChangeTracker::default(),
            lock: Box::new(NoLock),
        })
    }

    pub fn with_tracker_options(mut self, options: TrackerOptions) -> Self {
        self.tracker = ChangeTracker::new(options);
        self
    }

    pub fn with_lock(mut self, lock: Box<dyn CommitLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Re-read the whole table and reset the tracker: every entity
    /// Unchanged, the pending queue discarded.
    pub async fn refresh(&mut self) -> Result<()> {
        let sql = self.select_sql();
        debug!(%sql, "refreshing recordset");
        let rows = self.connection.query(&sql, &[]).await?;
        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            entities.push(E::from_values(row)?);
        }
        self.tracker.reset(entities);
        Ok(())
    }

    pub fn register_new(&mut self, entity: E) -> Result<()> {
        self.tracker.register_new(entity)
    }

    pub fn register_modified(&mut self, entity: E) -> Result<()> {
        self.tracker.register_modified(entity)
    }

    pub fn register_new_or_modified(&mut self, entity: E) -> Result<()> {
        self.tracker.register_new_or_modified(entity)
    }

    pub fn register_deleted(&mut self, id: Uuid) -> Result<()> {
        self.tracker.register_deleted(id)
    }

    pub fn entity_state(&self, id: Uuid) -> RecordState {
        self.tracker.entity_state(id)
    }

    pub fn records(&self) -> &[E] {
        self.tracker.records()
    }

    pub fn record(&self, id: Uuid) -> Option<&E> {
        self.tracker.record(id)
    }

    /// Tracked records matching a caller predicate, in recordset order.
    pub fn records_where<P>(&self, predicate: P) -> Vec<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.tracker.records_where(predicate)
    }

    /// The first tracked record matching a caller predicate.
    pub fn find_record<P>(&self, predicate: P) -> Option<&E>
    where
        P: Fn(&E) -> bool,
    {
        self.tracker.find_record(predicate)
    }

    pub fn pending_len(&self) -> usize {
        self.tracker.pending_len()
    }

    /// Write all pending changes in one SERIALIZABLE transaction.
    ///
    /// With `refresh_after` the recordset is re-read on success. Without it
    /// only the queue is cleared: entity states keep their pre-commit values
    /// (an Added entity still reads as Added), so callers skipping the
    /// refresh must not rely on states afterwards.
    pub async fn commit(&mut self, refresh_after: bool) -> Result<()> {
        self.lock.lock();
        let outcome = self.write_pending().await;
        self.lock.unlock();
        outcome?;

        if refresh_after {
            self.refresh().await
        } else {
            self.tracker.clear_pending();
            Ok(())
        }
    }

    /// Discard pending changes without touching the database. With
    /// `refresh_after` the recordset is re-read; otherwise only the queue
    /// is cleared.
    pub async fn roll_back(&mut self, refresh_after: bool) -> Result<()> {
        if refresh_after {
            self.refresh().await
        } else {
            self.tracker.clear_pending();
            Ok(())
        }
    }

    async fn write_pending(&mut self) -> Result<()> {
        self.connection.begin_serializable().await?;
        match self.apply_pending().await {
            Ok(written) => {
                info!(
                    table = %qualify(&self.schema, &self.table),
                    written,
                    "unit of work committed"
                );
                Ok(())
            }
            Err(commit_err) => match self.connection.rollback_tx().await {
                Ok(()) => Err(RepoError::CommitFailed(Box::new(commit_err))),
                Err(rollback_err) => Err(RepoError::RollbackFailed {
                    commit: Box::new(commit_err),
                    rollback: Box::new(rollback_err),
                }),
            },
        }
    }

    /// Drain the queue in FIFO order, then commit the transaction.
    async fn apply_pending(&mut self) -> Result<usize> {
        let pending = self.tracker.take_pending();
        let mut written = 0;
        for change in pending {
            match change.state {
                RecordState::Added | RecordState::AddedThenModified => {
                    if let Some(entity) = change.entity {
                        self.insert(&entity).await?;
                        written += 1;
                    }
                }
                RecordState::Modified => {
                    if let Some(entity) = change.entity {
                        self.update(&entity).await?;
                        written += 1;
                    }
                }
                RecordState::Deleted => {
                    self.delete(change.id).await?;
                    written += 1;
                }
                RecordState::Unchanged | RecordState::Unknown => {}
            }
        }
        self.connection.commit_tx().await?;
        Ok(written)
    }

    async fn insert(&mut self, entity: &E) -> Result<()> {
        let sql = self.insert_sql();
        debug!(%sql, "insert");
        let mut params = vec![SqlValue::Uuid(entity.entity_id())];
        params.extend(entity.values());
        self.connection.execute(&sql, &params).await?;
        Ok(())
    }

    async fn update(&mut self, entity: &E) -> Result<()> {
        let sql = self.update_sql();
        debug!(%sql, "update");
        let mut params = entity.values();
        params.push(SqlValue::Uuid(entity.entity_id()));
        self.connection.execute(&sql, &params).await?;
        Ok(())
    }

    async fn delete(&mut self, id: Uuid) -> Result<()> {
        let sql = self.delete_sql();
        debug!(%sql, "delete");
        self.connection
            .execute(&sql, &[SqlValue::Uuid(id)])
            .await?;
        Ok(())
    }

    fn select_sql(&self) -> String {
        let mut columns = vec![quote_ident("Id")];
        columns.extend(E::columns().iter().map(|c| quote_ident(c)));
        format!(
            "SELECT {} FROM {};",
            columns.join(", "),
            qualify(&self.schema, &self.table)
        )
    }

    fn insert_sql(&self) -> String {
        let mut columns = vec![quote_ident("Id")];
        columns.extend(E::columns().iter().map(|c| quote_ident(c)));
        let placeholders: Vec<String> =
            (1..=columns.len()).map(|i| format!("@P{}", i)).collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            qualify(&self.schema, &self.table),
            columns.join(", "),
            placeholders.join(", ")
        )
    }

    fn update_sql(&self) -> String {
        let assignments: Vec<String> = E::columns()
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = @P{}", quote_ident(c), i + 1))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {} = @P{};",
            qualify(&self.schema, &self.table),
            assignments.join(", "),
            quote_ident("Id"),
            E::columns().len() + 1
        )
    }

    fn delete_sql(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = @P1;",
            qualify(&self.schema, &self.table),
            quote_ident("Id")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Uuid,
        text: String,
    }

    impl Note {
        fn new(text: &str) -> Self {
            Self {
                id: Uuid::new_v4(),
                text: text.to_string(),
            }
        }
    }

    impl Entity for Note {
        fn entity_id(&self) -> Uuid {
            self.id
        }

        fn columns() -> &'static [&'static str] {
            &["Text"]
        }

        fn values(&self) -> Vec<SqlValue> {
            vec![SqlValue::String(self.text.clone())]
        }

        fn from_values(row: &[SqlValue]) -> Result<Self> {
            match row {
                [SqlValue::Uuid(id), SqlValue::String(text)] => Ok(Self {
                    id: *id,
                    text: text.clone(),
                }),
                _ => Err(RepoError::Schema("unexpected row shape".to_string())),
            }
        }
    }

    /// Scripted connection: records every statement, optionally failing the
    /// n-th execute and/or the rollback.
    #[derive(Default)]
    struct MockConnection {
        log: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
        executes: usize,
        fail_execute_at: Option<usize>,
        fail_rollback: bool,
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn execute(&mut self, sql: &str, _params: &[SqlValue]) -> Result<u64> {
            self.executes += 1;
            if self.fail_execute_at == Some(self.executes) {
                return Err(RepoError::Connection("socket closed".to_string()));
            }
            self.log.push(sql.to_string());
            Ok(1)
        }

        async fn query(&mut self, sql: &str, _params: &[SqlValue]) -> Result<Vec<Vec<SqlValue>>> {
            self.log.push(sql.to_string());
            Ok(self.rows.clone())
        }

        async fn batch(&mut self, sql: &str) -> Result<()> {
            self.log.push(sql.to_string());
            Ok(())
        }

        async fn begin_serializable(&mut self) -> Result<()> {
            self.log.push("BEGIN".to_string());
            Ok(())
        }

        async fn commit_tx(&mut self) -> Result<()> {
            self.log.push("COMMIT".to_string());
            Ok(())
        }

        async fn rollback_tx(&mut self) -> Result<()> {
            if self.fail_rollback {
                return Err(RepoError::Connection("rollback lost".to_string()));
            }
            self.log.push("ROLLBACK".to_string());
            Ok(())
        }
    }

    fn uow(connection: MockConnection) -> UnitOfWork<Note, MockConnection> {
        UnitOfWork::new(connection, "dbo", "Note").unwrap()
    }

    #[test]
    fn test_rejects_bad_identifiers() {
        assert!(UnitOfWork::<Note, MockConnection>::new(
            MockConnection::default(),
            "dbo",
            "bad name"
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_refresh_decodes_rows() {
        let note = Note::new("hello");
        let mut conn = MockConnection::default();
        conn.rows = vec![vec![
            SqlValue::Uuid(note.id),
            SqlValue::String("hello".to_string()),
        ]];

        let mut uow = uow(conn);
        uow.refresh().await.unwrap();
        assert_eq!(uow.records(), &[note.clone()]);
        assert_eq!(uow.entity_state(note.id), RecordState::Unchanged);
    }

    #[tokio::test]
    async fn test_predicate_lookups_over_refreshed_recordset() {
        let a = Note::new("alpha");
        let b = Note::new("beta");
        let mut conn = MockConnection::default();
        conn.rows = vec![
            vec![SqlValue::Uuid(a.id), SqlValue::String("alpha".to_string())],
            vec![SqlValue::Uuid(b.id), SqlValue::String("beta".to_string())],
        ];

        let mut uow = uow(conn);
        uow.refresh().await.unwrap();

        assert_eq!(uow.find_record(|n| n.text == "beta"), Some(&b));
        assert_eq!(uow.find_record(|n| n.text == "gamma"), None);
        let starts_with_a = uow.records_where(|n| n.text.starts_with('a'));
        assert_eq!(starts_with_a, vec![&a]);
    }

    #[tokio::test]
    async fn test_commit_drains_fifo_and_commits() {
        let existing = Note::new("old");
        let mut conn = MockConnection::default();
        conn.rows = vec![vec![
            SqlValue::Uuid(existing.id),
            SqlValue::String("old".to_string()),
        ]];

        let mut uow = uow(conn);
        uow.refresh().await.unwrap();

        let fresh = Note::new("new");
        uow.register_new(fresh.clone()).unwrap();
        uow.register_modified(Note {
            id: existing.id,
            text: "edited".to_string(),
        })
        .unwrap();
        uow.register_deleted(existing.id).unwrap();

        uow.commit(false).await.unwrap();

        let log = &uow.connection.log;
        // select, begin, insert, update, delete, commit
        assert_eq!(log.len(), 6);
        assert_eq!(log[1], "BEGIN");
        assert!(log[2].starts_with("INSERT INTO [dbo].[Note] ([Id], [Text]) VALUES"));
        assert_eq!(
            log[3],
            "UPDATE [dbo].[Note] SET [Text] = @P1 WHERE [Id] = @P2;"
        );
        assert_eq!(log[4], "DELETE FROM [dbo].[Note] WHERE [Id] = @P1;");
        assert_eq!(log[5], "COMMIT");

        assert_eq!(uow.pending_len(), 0);
        // Without a refresh the pre-commit states remain visible.
        assert_eq!(uow.entity_state(fresh.id), RecordState::Added);
    }

    #[tokio::test]
    async fn test_added_then_modified_replays_insert_then_update() {
        let mut uow = uow(MockConnection::default());
        let note = Note::new("a");
        uow.register_new(note.clone()).unwrap();
        uow.register_modified(Note {
            id: note.id,
            text: "b".to_string(),
        })
        .unwrap();
        assert_eq!(uow.entity_state(note.id), RecordState::AddedThenModified);

        uow.commit(false).await.unwrap();
        // Each queue entry carries its registration-time state, so the
        // never-committed row is inserted first and then updated in place.
        let writes: Vec<&String> = uow
            .connection
            .log
            .iter()
            .filter(|s| s.starts_with("INSERT") || s.starts_with("UPDATE"))
            .collect();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].starts_with("INSERT"));
        assert!(writes[1].starts_with("UPDATE"));
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back() {
        let mut conn = MockConnection::default();
        conn.fail_execute_at = Some(3);

        let mut uow = uow(conn);
        for i in 0..5 {
            uow.register_new(Note::new(&format!("n{}", i))).unwrap();
        }

        let err = uow.commit(false).await.unwrap_err();
        match &err {
            RepoError::CommitFailed(cause) => {
                assert!(cause.to_string().contains("socket closed"));
            }
            other => panic!("expected CommitFailed, got {:?}", other),
        }
        assert_eq!(uow.connection.log.last().unwrap(), "ROLLBACK");
        assert!(!uow.connection.log.contains(&"COMMIT".to_string()));
    }

    #[tokio::test]
    async fn test_failed_rollback_is_fatal_aggregate() {
        let mut conn = MockConnection::default();
        conn.fail_execute_at = Some(1);
        conn.fail_rollback = true;

        let mut uow = uow(conn);
        uow.register_new(Note::new("a")).unwrap();

        let err = uow.commit(false).await.unwrap_err();
        match err {
            RepoError::RollbackFailed { commit, rollback } => {
                assert!(commit.to_string().contains("socket closed"));
                assert!(rollback.to_string().contains("rollback lost"));
            }
            other => panic!("expected RollbackFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_roll_back_never_touches_database() {
        let mut uow = uow(MockConnection::default());
        uow.register_new(Note::new("a")).unwrap();
        uow.roll_back(false).await.unwrap();
        assert_eq!(uow.pending_len(), 0);
        assert!(uow.connection.log.is_empty());
    }

    #[tokio::test]
    async fn test_commit_with_refresh_resets_states() {
        let mut conn = MockConnection::default();
        let note = Note::new("a");
        conn.rows = vec![vec![
            SqlValue::Uuid(note.id),
            SqlValue::String("a".to_string()),
        ]];

        let mut uow = uow(conn);
        uow.register_new(note.clone()).unwrap();
        uow.commit(true).await.unwrap();
        assert_eq!(uow.entity_state(note.id), RecordState::Unchanged);
        assert_eq!(uow.pending_len(), 0);
    }
}
