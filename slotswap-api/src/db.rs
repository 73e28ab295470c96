//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres, and [`PgStore`],
//! the durable [`SwapStore`] used by the server binary.
//!
//! Every changeset commits inside one transaction. Slot updates and deletes
//! are conditional statements whose `WHERE` clause carries the expectation,
//! so a zero row count means another writer got there first and the whole
//! transaction is rolled back.

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use slotswap_core::{
    EntityIdType, EntityType, ProposalData, ProposalId, Slot, SlotId, SlotStatus, SlotSwapError,
    SlotSwapResult, StorageError, StoredProposal, SwapStatus, Timestamp, UserId,
};
use slotswap_storage::{ProposalChange, SlotChange, SlotExpectation, SwapChangeset, SwapStore};
use std::time::Duration;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Clone)]
pub struct DbConfig {
    /// Full connection string; wins over the individual fields when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// How long to wait for a free connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "slotswap".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl std::fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("max_size", &self.max_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// `DATABASE_URL` if present, otherwise `SLOTSWAP_DB_HOST`, `_PORT`,
    /// `_NAME`, `_USER` and `_PASSWORD`. Pool sizing comes from
    /// `SLOTSWAP_DB_POOL_SIZE` and `SLOTSWAP_DB_TIMEOUT_SECS` either way.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            host: std::env::var("SLOTSWAP_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("SLOTSWAP_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("SLOTSWAP_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("SLOTSWAP_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("SLOTSWAP_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SLOTSWAP_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: Duration::from_secs(
                std::env::var("SLOTSWAP_DB_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        match &self.url {
            Some(url) => cfg.url = Some(url.clone()),
            None => {
                cfg.host = Some(self.host.clone());
                cfg.port = Some(self.port);
                cfg.dbname = Some(self.dbname.clone());
                cfg.user = Some(self.user.clone());
                cfg.password = Some(self.password.clone());
            }
        }

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_cfg = PoolConfig::new(self.max_size);
        pool_cfg.timeouts.wait = Some(self.timeout);
        cfg.pool = Some(pool_cfg);

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::database_error(format!("Failed to create pool: {}", e)))?;

        Ok(pool)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS slots (
    slot_id     UUID PRIMARY KEY,
    owner_id    UUID NOT NULL,
    title       TEXT NOT NULL,
    start_time  TIMESTAMPTZ NOT NULL,
    end_time    TIMESTAMPTZ NOT NULL,
    status      TEXT NOT NULL CHECK (status IN ('BUSY', 'SWAPPABLE', 'SWAP_PENDING')),
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS slots_owner_idx ON slots (owner_id);
CREATE INDEX IF NOT EXISTS slots_status_idx ON slots (status);

CREATE TABLE IF NOT EXISTS swap_proposals (
    proposal_id        UUID PRIMARY KEY,
    requester_id       UUID NOT NULL,
    responder_id       UUID NOT NULL,
    requester_slot_id  UUID NOT NULL,
    responder_slot_id  UUID NOT NULL,
    status             TEXT NOT NULL CHECK (status IN ('PENDING', 'ACCEPTED', 'REJECTED')),
    created_at         TIMESTAMPTZ NOT NULL,
    updated_at         TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS swap_proposals_requester_idx ON swap_proposals (requester_id);
CREATE INDEX IF NOT EXISTS swap_proposals_responder_idx ON swap_proposals (responder_id);
CREATE INDEX IF NOT EXISTS swap_proposals_status_idx ON swap_proposals (status);
"#;

const SLOT_COLUMNS: &str =
    "slot_id, owner_id, title, start_time, end_time, status, created_at, updated_at";

const PROPOSAL_COLUMNS: &str = "proposal_id, requester_id, responder_id, requester_slot_id, \
     responder_slot_id, status, created_at, updated_at";

// ============================================================================
// POSTGRES STORE
// ============================================================================

/// [`SwapStore`] backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn from_config(config: &DbConfig) -> ApiResult<Self> {
        Ok(Self::new(config.create_pool()?))
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn migrate(&self) -> SlotSwapResult<()> {
        let conn = self.get_conn().await?;
        conn.batch_execute(SCHEMA).await.map_err(backend)?;
        tracing::info!("Database schema ready");
        Ok(())
    }

    async fn get_conn(&self) -> SlotSwapResult<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| {
            SlotSwapError::from(StorageError::Backend {
                reason: format!("connection pool: {}", e),
            })
        })
    }

    async fn query_slots(
        &self,
        filter: &str,
        param: &(dyn tokio_postgres::types::ToSql + Sync),
    ) -> SlotSwapResult<Vec<Slot>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM slots WHERE {} = $1 ORDER BY start_time, slot_id",
            SLOT_COLUMNS, filter
        );
        let rows = conn.query(&sql, &[param]).await.map_err(backend)?;
        rows.iter().map(slot_from_row).collect()
    }

    async fn query_proposals(
        &self,
        filter: &str,
        param: &(dyn tokio_postgres::types::ToSql + Sync),
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM swap_proposals WHERE {} = $1 ORDER BY created_at DESC",
            PROPOSAL_COLUMNS, filter
        );
        let rows = conn.query(&sql, &[param]).await.map_err(backend)?;
        rows.iter().map(proposal_from_row).collect()
    }
}

fn backend(e: tokio_postgres::Error) -> SlotSwapError {
    StorageError::Backend {
        reason: e.to_string(),
    }
    .into()
}

fn decode_error(what: &str, e: impl std::fmt::Display) -> SlotSwapError {
    StorageError::Backend {
        reason: format!("failed to decode {}: {}", what, e),
    }
    .into()
}

fn slot_from_row(row: &Row) -> SlotSwapResult<Slot> {
    let get_uuid = |col: &str| row.try_get::<_, Uuid>(col).map_err(|e| decode_error(col, e));
    let get_time =
        |col: &str| row.try_get::<_, Timestamp>(col).map_err(|e| decode_error(col, e));
    let status: String = row.try_get("status").map_err(|e| decode_error("status", e))?;

    Ok(Slot {
        slot_id: SlotId::new(get_uuid("slot_id")?),
        owner_id: UserId::new(get_uuid("owner_id")?),
        title: row.try_get("title").map_err(|e| decode_error("title", e))?,
        start_time: get_time("start_time")?,
        end_time: get_time("end_time")?,
        status: SlotStatus::from_db_str(&status).map_err(|e| decode_error("status", e))?,
        created_at: get_time("created_at")?,
        updated_at: get_time("updated_at")?,
    })
}

fn proposal_from_row(row: &Row) -> SlotSwapResult<StoredProposal> {
    let get_uuid = |col: &str| row.try_get::<_, Uuid>(col).map_err(|e| decode_error(col, e));
    let get_time =
        |col: &str| row.try_get::<_, Timestamp>(col).map_err(|e| decode_error(col, e));
    let status: String = row.try_get("status").map_err(|e| decode_error("status", e))?;

    Ok(StoredProposal {
        data: ProposalData {
            proposal_id: ProposalId::new(get_uuid("proposal_id")?),
            requester_id: UserId::new(get_uuid("requester_id")?),
            responder_id: UserId::new(get_uuid("responder_id")?),
            requester_slot_id: SlotId::new(get_uuid("requester_slot_id")?),
            responder_slot_id: SlotId::new(get_uuid("responder_slot_id")?),
            created_at: get_time("created_at")?,
            updated_at: get_time("updated_at")?,
        },
        status: SwapStatus::from_db_str(&status).map_err(|e| decode_error("status", e))?,
    })
}

// ============================================================================
// CONDITIONAL WRITES
// ============================================================================

/// Explain why a conditional slot write matched no row.
async fn slot_miss(
    tx: &tokio_postgres::Transaction<'_>,
    slot_id: SlotId,
    expected: &SlotExpectation,
) -> SlotSwapError {
    let sql = format!("SELECT {} FROM slots WHERE slot_id = $1", SLOT_COLUMNS);
    match tx.query_opt(&sql, &[&slot_id.as_uuid()]).await {
        Ok(None) => StorageError::NotFound {
            entity_type: EntityType::Slot,
            id: slot_id.into(),
        }
        .into(),
        Ok(Some(row)) => match slot_from_row(&row) {
            Ok(current) => StorageError::PreconditionFailed {
                entity_type: EntityType::Slot,
                id: slot_id.into(),
                reason: expected.describe_mismatch(&current),
            }
            .into(),
            Err(e) => e,
        },
        Err(e) => backend(e),
    }
}

async fn apply_slot_change(
    tx: &tokio_postgres::Transaction<'_>,
    change: &SlotChange,
) -> SlotSwapResult<()> {
    match change {
        SlotChange::Insert(slot) => {
            let sql = format!(
                "INSERT INTO slots ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (slot_id) DO NOTHING",
                SLOT_COLUMNS
            );
            let inserted = tx
                .execute(
                    &sql,
                    &[
                        &slot.slot_id.as_uuid(),
                        &slot.owner_id.as_uuid(),
                        &slot.title,
                        &slot.start_time,
                        &slot.end_time,
                        &slot.status.as_db_str(),
                        &slot.created_at,
                        &slot.updated_at,
                    ],
                )
                .await
                .map_err(backend)?;
            if inserted == 0 {
                return Err(StorageError::InsertFailed {
                    entity_type: EntityType::Slot,
                    reason: format!("slot {} already exists", slot.slot_id),
                }
                .into());
            }
        }
        SlotChange::Update { expected, next } => {
            let updated = tx
                .execute(
                    "UPDATE slots SET owner_id = $5, title = $6, start_time = $7, end_time = $8, \
                     status = $9, updated_at = $10 \
                     WHERE slot_id = $1 AND status = $2 AND owner_id = $3 \
                     AND ($4::timestamptz IS NULL OR updated_at = $4)",
                    &[
                        &next.slot_id.as_uuid(),
                        &expected.status.as_db_str(),
                        &expected.owner_id.as_uuid(),
                        &expected.revision,
                        &next.owner_id.as_uuid(),
                        &next.title,
                        &next.start_time,
                        &next.end_time,
                        &next.status.as_db_str(),
                        &next.updated_at,
                    ],
                )
                .await
                .map_err(backend)?;
            if updated == 0 {
                return Err(slot_miss(tx, next.slot_id, expected).await);
            }
        }
        SlotChange::Delete { slot_id, expected } => {
            let deleted = tx
                .execute(
                    "DELETE FROM slots \
                     WHERE slot_id = $1 AND status = $2 AND owner_id = $3 \
                     AND ($4::timestamptz IS NULL OR updated_at = $4)",
                    &[
                        &slot_id.as_uuid(),
                        &expected.status.as_db_str(),
                        &expected.owner_id.as_uuid(),
                        &expected.revision,
                    ],
                )
                .await
                .map_err(backend)?;
            if deleted == 0 {
                return Err(slot_miss(tx, *slot_id, expected).await);
            }
        }
    }
    Ok(())
}

async fn apply_proposal_change(
    tx: &tokio_postgres::Transaction<'_>,
    change: &ProposalChange,
) -> SlotSwapResult<()> {
    match change {
        ProposalChange::Insert(proposal) => {
            let data = &proposal.data;
            let sql = format!(
                "INSERT INTO swap_proposals ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (proposal_id) DO NOTHING",
                PROPOSAL_COLUMNS
            );
            let inserted = tx
                .execute(
                    &sql,
                    &[
                        &data.proposal_id.as_uuid(),
                        &data.requester_id.as_uuid(),
                        &data.responder_id.as_uuid(),
                        &data.requester_slot_id.as_uuid(),
                        &data.responder_slot_id.as_uuid(),
                        &proposal.status.as_db_str(),
                        &data.created_at,
                        &data.updated_at,
                    ],
                )
                .await
                .map_err(backend)?;
            if inserted == 0 {
                return Err(StorageError::InsertFailed {
                    entity_type: EntityType::SwapProposal,
                    reason: format!("proposal {} already exists", data.proposal_id),
                }
                .into());
            }
        }
        ProposalChange::Resolve {
            proposal_id,
            expected,
            next,
            at,
        } => {
            let updated = tx
                .execute(
                    "UPDATE swap_proposals SET status = $3, updated_at = $4 \
                     WHERE proposal_id = $1 AND status = $2",
                    &[
                        &proposal_id.as_uuid(),
                        &expected.as_db_str(),
                        &next.as_db_str(),
                        at,
                    ],
                )
                .await
                .map_err(backend)?;
            if updated == 0 {
                let current = tx
                    .query_opt(
                        "SELECT status FROM swap_proposals WHERE proposal_id = $1",
                        &[&proposal_id.as_uuid()],
                    )
                    .await
                    .map_err(backend)?;
                let err = match current {
                    None => StorageError::NotFound {
                        entity_type: EntityType::SwapProposal,
                        id: (*proposal_id).into(),
                    },
                    Some(row) => {
                        let status: String =
                            row.try_get(0).map_err(|e| decode_error("status", e))?;
                        StorageError::PreconditionFailed {
                            entity_type: EntityType::SwapProposal,
                            id: (*proposal_id).into(),
                            reason: format!("expected {}, found {}", expected, status),
                        }
                    }
                };
                return Err(err.into());
            }
        }
    }
    Ok(())
}

#[async_trait]
impl SwapStore for PgStore {
    async fn slot_get(&self, id: SlotId) -> SlotSwapResult<Option<Slot>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM slots WHERE slot_id = $1", SLOT_COLUMNS);
        let row = conn
            .query_opt(&sql, &[&id.as_uuid()])
            .await
            .map_err(backend)?;
        row.as_ref().map(slot_from_row).transpose()
    }

    async fn slot_list_by_owner(&self, owner_id: UserId) -> SlotSwapResult<Vec<Slot>> {
        self.query_slots("owner_id", &owner_id.as_uuid()).await
    }

    async fn slot_list_by_status(&self, status: SlotStatus) -> SlotSwapResult<Vec<Slot>> {
        self.query_slots("status", &status.as_db_str()).await
    }

    async fn proposal_get(&self, id: ProposalId) -> SlotSwapResult<Option<StoredProposal>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM swap_proposals WHERE proposal_id = $1",
            PROPOSAL_COLUMNS
        );
        let row = conn
            .query_opt(&sql, &[&id.as_uuid()])
            .await
            .map_err(backend)?;
        row.as_ref().map(proposal_from_row).transpose()
    }

    async fn proposal_list_by_requester(
        &self,
        requester_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.query_proposals("requester_id", &requester_id.as_uuid())
            .await
    }

    async fn proposal_list_by_responder(
        &self,
        responder_id: UserId,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.query_proposals("responder_id", &responder_id.as_uuid())
            .await
    }

    async fn proposal_list_by_status(
        &self,
        status: SwapStatus,
    ) -> SlotSwapResult<Vec<StoredProposal>> {
        self.query_proposals("status", &status.as_db_str()).await
    }

    async fn commit(&self, changeset: SwapChangeset) -> SlotSwapResult<()> {
        if changeset.is_empty() {
            return Ok(());
        }

        let mut conn = self.get_conn().await?;
        let tx = conn.transaction().await.map_err(|e| {
            SlotSwapError::from(StorageError::TransactionFailed {
                reason: e.to_string(),
            })
        })?;

        // Dropping `tx` on an early return rolls the transaction back.
        for change in changeset.slot_changes() {
            apply_slot_change(&tx, change).await?;
        }
        for change in changeset.proposal_changes() {
            apply_proposal_change(&tx, change).await?;
        }

        tx.commit().await.map_err(|e| {
            SlotSwapError::from(StorageError::TransactionFailed {
                reason: e.to_string(),
            })
        })?;
        tracing::trace!(changes = changeset.len(), "Changeset committed");
        Ok(())
    }

    async fn health_check(&self) -> SlotSwapResult<()> {
        let conn = self.get_conn().await?;
        conn.execute("SELECT 1", &[]).await.map_err(backend)?;
        Ok(())
    }
}
