//! SQLite action registry and execution log (feature-gated).
//!
//! Timestamps are stored as RFC 3339 text and parameter maps as JSON text.

use std::{str::FromStr, time::Duration};

use actiongate_core::{
    ActionDefinition, ActionId, ActionKind, ActionStore, ActionUpdate, ExecutionFilter,
    ExecutionId, ExecutionLog, ExecutionRecord, ExecutionStatus, ExecutionSummary, Finalization,
    NewAction, NewExecution, Parameters, StorageError, generate_public_key,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    FromRow, QueryBuilder, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS actions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        public_key TEXT NOT NULL UNIQUE,
        endpoint_path TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        parameters TEXT NOT NULL DEFAULT '{}',
        is_active INTEGER NOT NULL DEFAULT 1,
        logging_enabled INTEGER NOT NULL DEFAULT 1,
        execution_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS executions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action_id INTEGER NOT NULL,
        public_key TEXT NOT NULL,
        parameters TEXT NOT NULL DEFAULT '{}',
        result TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        started_at TEXT NOT NULL,
        duration_ms INTEGER,
        error_message TEXT NOT NULL DEFAULT '',
        request_ip TEXT NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS idx_executions_action ON executions(action_id)",
    "CREATE INDEX IF NOT EXISTS idx_executions_key ON executions(public_key)",
];

const ACTION_COLUMNS: &str = "id, name, description, public_key, endpoint_path, kind, content, \
     parameters, is_active, logging_enabled, execution_count, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, action_id, public_key, parameters, result, status, \
     started_at, duration_ms, error_message, request_ip";

const KEY_ATTEMPTS: usize = 3;

/// SQLite storage implementation.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `database_url` and apply the schema.
    ///
    /// # Errors
    /// Returns error if the URL is invalid, the connection fails or the schema
    /// cannot be created.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(db_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(3));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    /// A private in-memory database, mostly for tests.
    ///
    /// # Errors
    /// Returns error if the schema cannot be created.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
        // Every connection to :memory: is its own database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    /// Use an existing pool, applying the schema.
    ///
    /// # Errors
    /// Returns error if the schema cannot be created.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&pool)
                .await
                .map_err(db_err)?;
        }
        tracing::debug!("SQLite storage ready");
        Ok(Self { pool })
    }

    async fn require_action(&self, id: ActionId) -> Result<ActionDefinition, StorageError> {
        self.get(id).await?.ok_or(StorageError::ActionNotFound(id))
    }
}

fn db_err(e: sqlx::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Internal(format!("invalid timestamp {text:?}: {e}")))
}

fn encode_parameters(parameters: &Parameters) -> Result<String, StorageError> {
    serde_json::to_string(parameters).map_err(|e| StorageError::Internal(e.to_string()))
}

fn decode_parameters(text: &str) -> Result<Parameters, StorageError> {
    serde_json::from_str(text)
        .map_err(|e| StorageError::Internal(format!("invalid stored parameters: {e}")))
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[derive(FromRow)]
struct ActionRow {
    id: i64,
    name: String,
    description: String,
    public_key: String,
    endpoint_path: String,
    kind: String,
    content: String,
    parameters: String,
    is_active: bool,
    logging_enabled: bool,
    execution_count: i64,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ActionRow> for ActionDefinition {
    type Error = StorageError;

    fn try_from(row: ActionRow) -> Result<Self, Self::Error> {
        let kind = ActionKind::from_str(&row.kind)
            .map_err(|e| StorageError::Internal(e.to_string()))?;
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            public_key: row.public_key,
            endpoint_path: row.endpoint_path,
            kind,
            content: row.content,
            parameters: decode_parameters(&row.parameters)?,
            is_active: row.is_active,
            logging_enabled: row.logging_enabled,
            execution_count: to_u64(row.execution_count),
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct ExecutionRow {
    id: i64,
    action_id: i64,
    public_key: String,
    parameters: String,
    result: String,
    status: String,
    started_at: String,
    duration_ms: Option<i64>,
    error_message: String,
    request_ip: String,
}

impl TryFrom<ExecutionRow> for ExecutionRecord {
    type Error = StorageError;

    fn try_from(row: ExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            action_id: row.action_id,
            public_key: row.public_key,
            parameters: decode_parameters(&row.parameters)?,
            result: row.result,
            status: row.status.parse()?,
            started_at: parse_timestamp(&row.started_at)?,
            duration_ms: row.duration_ms.map(to_u64),
            error_message: row.error_message,
            request_ip: row.request_ip,
        })
    }
}

#[async_trait]
impl ActionStore for SqliteStorage {
    async fn create(&self, action: NewAction) -> Result<ActionDefinition, StorageError> {
        let now = timestamp(Utc::now());
        let parameters = encode_parameters(&action.parameters)?;

        for _ in 0..KEY_ATTEMPTS {
            let public_key = generate_public_key();
            let inserted = sqlx::query(
                r"
                INSERT INTO actions (
                    name, description, public_key, endpoint_path, kind, content,
                    parameters, is_active, logging_enabled, execution_count,
                    created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, 0, ?9, ?9)
                ",
            )
            .bind(&action.name)
            .bind(&action.description)
            .bind(&public_key)
            .bind(&action.endpoint_path)
            .bind(action.kind.as_str())
            .bind(&action.content)
            .bind(&parameters)
            .bind(action.logging_enabled)
            .bind(&now)
            .execute(&self.pool)
            .await;

            match inserted {
                Ok(done) => return self.require_action(done.last_insert_rowid()).await,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    tracing::warn!("Public key collision, regenerating");
                }
                Err(e) => return Err(db_err(e)),
            }
        }
        Err(StorageError::DuplicateKey(
            "could not generate a unique public key".into(),
        ))
    }

    async fn get(&self, id: ActionId) -> Result<Option<ActionDefinition>, StorageError> {
        sqlx::query_as::<_, ActionRow>(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(ActionDefinition::try_from)
        .transpose()
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ActionDefinition>, StorageError> {
        sqlx::query_as::<_, ActionRow>(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions WHERE public_key = ?1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .map(ActionDefinition::try_from)
        .transpose()
    }

    async fn list(&self) -> Result<Vec<ActionDefinition>, StorageError> {
        sqlx::query_as::<_, ActionRow>(&format!(
            "SELECT {ACTION_COLUMNS} FROM actions ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .into_iter()
        .map(ActionDefinition::try_from)
        .collect()
    }

    async fn update(
        &self,
        id: ActionId,
        update: ActionUpdate,
    ) -> Result<ActionDefinition, StorageError> {
        let done = sqlx::query(
            r"
            UPDATE actions
            SET name = ?1,
                description = ?2,
                endpoint_path = ?3,
                kind = ?4,
                content = ?5,
                parameters = ?6,
                logging_enabled = ?7,
                updated_at = ?8
            WHERE id = ?9
            ",
        )
        .bind(&update.name)
        .bind(&update.description)
        .bind(&update.endpoint_path)
        .bind(update.kind.as_str())
        .bind(&update.content)
        .bind(encode_parameters(&update.parameters)?)
        .bind(update.logging_enabled)
        .bind(timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if done.rows_affected() == 0 {
            return Err(StorageError::ActionNotFound(id));
        }
        self.require_action(id).await
    }

    async fn delete(&self, id: ActionId) -> Result<(), StorageError> {
        let done = sqlx::query("DELETE FROM actions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(StorageError::ActionNotFound(id));
        }
        Ok(())
    }

    async fn toggle_active(&self, id: ActionId) -> Result<bool, StorageError> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE actions SET is_active = NOT is_active, updated_at = ?1 \
             WHERE id = ?2 RETURNING is_active",
        )
        .bind(timestamp(Utc::now()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::ActionNotFound(id))
    }

    async fn toggle_logging(&self, id: ActionId) -> Result<bool, StorageError> {
        sqlx::query_scalar::<_, bool>(
            "UPDATE actions SET logging_enabled = NOT logging_enabled, updated_at = ?1 \
             WHERE id = ?2 RETURNING logging_enabled",
        )
        .bind(timestamp(Utc::now()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::ActionNotFound(id))
    }

    async fn increment_execution_count(&self, id: ActionId) -> Result<(), StorageError> {
        let done =
            sqlx::query("UPDATE actions SET execution_count = execution_count + 1 WHERE id = ?1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(StorageError::ActionNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl ExecutionLog for SqliteStorage {
    async fn append(&self, execution: NewExecution) -> Result<ExecutionId, StorageError> {
        let done = sqlx::query(
            r"
            INSERT INTO executions (action_id, public_key, parameters, status, started_at, request_ip)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(execution.action_id)
        .bind(&execution.public_key)
        .bind(encode_parameters(&execution.parameters)?)
        .bind(ExecutionStatus::Running.as_str())
        .bind(timestamp(Utc::now()))
        .bind(&execution.request_ip)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(done.last_insert_rowid())
    }

    async fn finalize(
        &self,
        id: ExecutionId,
        finalization: Finalization,
    ) -> Result<(), StorageError> {
        let done = sqlx::query(
            r"
            UPDATE executions
            SET status = ?1, result = ?2, error_message = ?3, duration_ms = ?4
            WHERE id = ?5 AND status = ?6
            ",
        )
        .bind(finalization.status.as_str())
        .bind(&finalization.result)
        .bind(&finalization.error_message)
        .bind(to_i64(finalization.duration_ms))
        .bind(id)
        .bind(ExecutionStatus::Running.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if done.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM executions WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        if exists > 0 {
            Err(StorageError::AlreadyFinalized(id))
        } else {
            Err(StorageError::ExecutionNotFound(id))
        }
    }

    async fn list_executions(
        &self,
        filter: ExecutionFilter,
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {EXECUTION_COLUMNS} FROM executions WHERE 1 = 1"));
        if let Some(action_id) = filter.action_id {
            query.push(" AND action_id = ").push_bind(action_id);
        }
        if let Some(public_key) = filter.public_key {
            query.push(" AND public_key = ").push_bind(public_key);
        }
        query.push(" ORDER BY id DESC");
        if let Some(limit) = filter.limit {
            query
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        query
            .build_query_as::<ExecutionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(ExecutionRecord::try_from)
            .collect()
    }

    async fn delete_execution(&self, id: ExecutionId) -> Result<(), StorageError> {
        let done = sqlx::query("DELETE FROM executions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(StorageError::ExecutionNotFound(id));
        }
        Ok(())
    }

    async fn delete_executions_for(&self, action_id: ActionId) -> Result<u64, StorageError> {
        let done = sqlx::query("DELETE FROM executions WHERE action_id = ?1")
            .bind(action_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected())
    }

    async fn summary(&self) -> Result<ExecutionSummary, StorageError> {
        let (total, successful) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COALESCE(SUM(status = ?1), 0) FROM executions",
        )
        .bind(ExecutionStatus::Success.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(ExecutionSummary {
            total: to_u64(total),
            successful: to_u64(successful),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_action(name: &str) -> NewAction {
        NewAction {
            name: name.into(),
            description: "desc".into(),
            endpoint_path: format!("/{name}"),
            kind: ActionKind::Webhook,
            content: r#"{"url": "http://localhost/{x}"}"#.into(),
            parameters: Parameters::from([("x".to_string(), "example".to_string())]),
            logging_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_action_round_trip() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let created = storage.create(new_action("a")).await.unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(created.kind, ActionKind::Webhook);
        assert_eq!(created.parameters["x"], "example");
        assert!(created.is_active);

        let by_key = storage
            .find_by_key(&created.public_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_key, created);

        storage.increment_execution_count(created.id).await.unwrap();
        storage.increment_execution_count(created.id).await.unwrap();
        assert!(!storage.toggle_active(created.id).await.unwrap());
        assert!(!storage.toggle_logging(created.id).await.unwrap());

        let mut update = new_action("renamed");
        update.kind = ActionKind::Script;
        let updated = storage.update(created.id, update).await.unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.kind, ActionKind::Script);
        assert_eq!(updated.public_key, created.public_key);
        assert_eq!(updated.execution_count, 2);
        assert!(!updated.is_active);

        storage.delete(created.id).await.unwrap();
        assert!(storage.get(created.id).await.unwrap().is_none());
        assert!(matches!(
            storage.delete(created.id).await,
            Err(StorageError::ActionNotFound(_))
        ));
        assert!(matches!(
            storage.toggle_active(created.id).await,
            Err(StorageError::ActionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_execution_log() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        let action = storage.create(new_action("a")).await.unwrap();

        let mut ids = Vec::new();
        for n in 0..3 {
            let id = storage
                .append(NewExecution {
                    action_id: action.id,
                    public_key: action.public_key.clone(),
                    parameters: Parameters::from([("n".to_string(), n.to_string())]),
                    request_ip: "10.1.1.1".into(),
                })
                .await
                .unwrap();
            ids.push(id);
        }

        storage
            .finalize(
                ids[0],
                Finalization {
                    status: ExecutionStatus::Success,
                    result: "ok".into(),
                    error_message: String::new(),
                    duration_ms: 12,
                },
            )
            .await
            .unwrap();
        storage
            .finalize(
                ids[1],
                Finalization {
                    status: ExecutionStatus::Error,
                    result: String::new(),
                    error_message: "timeout".into(),
                    duration_ms: 30_000,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            storage
                .finalize(
                    ids[1],
                    Finalization {
                        status: ExecutionStatus::Success,
                        result: String::new(),
                        error_message: String::new(),
                        duration_ms: 1,
                    },
                )
                .await,
            Err(StorageError::AlreadyFinalized(_))
        ));
        assert!(matches!(
            storage
                .finalize(
                    999,
                    Finalization {
                        status: ExecutionStatus::Success,
                        result: String::new(),
                        error_message: String::new(),
                        duration_ms: 1,
                    },
                )
                .await,
            Err(StorageError::ExecutionNotFound(999))
        ));

        let records = storage
            .list_executions(ExecutionFilter {
                public_key: Some(action.public_key.clone()),
                limit: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, ids[2]);
        assert_eq!(records[0].status, ExecutionStatus::Running);
        assert_eq!(records[1].error_message, "timeout");
        assert_eq!(records[1].duration_ms, Some(30_000));
        assert_eq!(records[1].parameters["n"], "1");

        assert_eq!(
            storage.summary().await.unwrap(),
            ExecutionSummary {
                total: 3,
                successful: 1
            }
        );

        storage.delete_execution(ids[0]).await.unwrap();
        assert_eq!(storage.delete_executions_for(action.id).await.unwrap(), 2);
        assert_eq!(storage.summary().await.unwrap().total, 0);
    }
}
