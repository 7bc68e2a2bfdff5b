//! PostgreSQL store (sqlx)

use async_trait::async_trait;
use shared::Timestamp;
use shared::models::{
    AuditRecord, AuditRecordCreate, BlockedIp, ENCRYPTED_PAYLOAD_MARKER, SecurityEvent,
    SecurityEventCreate,
};
use sqlx::PgPool;

use super::{AuditStore, BlockStore, SecurityEventStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and apply pending migrations
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {e}")))?;
        Ok(Self { pool })
    }
}

/// security_events 行（event_type 以文本存储）
#[derive(sqlx::FromRow)]
struct SecurityEventRow {
    id: i64,
    ip_address: String,
    event_type: String,
    details: Option<String>,
    created_at: i64,
}

impl TryFrom<SecurityEventRow> for SecurityEvent {
    type Error = StoreError;

    fn try_from(r: SecurityEventRow) -> Result<Self, Self::Error> {
        Ok(SecurityEvent {
            id: r.id,
            ip_address: r.ip_address,
            event_type: r
                .event_type
                .parse()
                .map_err(|e| StoreError::Decode(format!("security_events.id={}: {e}", r.id)))?,
            details: r.details,
            created_at: r.created_at,
        })
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn insert_audit(&self, record: AuditRecordCreate) -> StoreResult<AuditRecord> {
        let row = sqlx::query_as::<_, AuditRecord>(
            "INSERT INTO audit_records
                (actor_id, action, entity_type, entity_id, encrypted_payload, payload_marker, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, actor_id, action, entity_type, entity_id,
                          encrypted_payload, payload_marker, created_at",
        )
        .bind(&record.actor_id)
        .bind(&record.action)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.encrypted_payload)
        .bind(ENCRYPTED_PAYLOAD_MARKER)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn scan_audit(&self, after: Option<i64>, limit: usize) -> StoreResult<Vec<AuditRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AuditRecord>(
            "SELECT id, actor_id, action, entity_type, entity_id,
                    encrypted_payload, payload_marker, created_at
                FROM audit_records
                WHERE id > $1
                ORDER BY id ASC
                LIMIT $2",
        )
        .bind(after.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_audit_payload(&self, id: i64, encrypted_payload: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE audit_records SET encrypted_payload = $2 WHERE id = $1")
            .bind(id)
            .bind(encrypted_payload)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("audit record {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SecurityEventStore for PgStore {
    async fn append_event(&self, event: SecurityEventCreate) -> StoreResult<SecurityEvent> {
        let row = sqlx::query_as::<_, SecurityEventRow>(
            "INSERT INTO security_events (ip_address, event_type, details, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, ip_address, event_type, details, created_at",
        )
        .bind(&event.ip_address)
        .bind(event.event_type.as_str())
        .bind(&event.details)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn count_events_between(
        &self,
        ip_address: &str,
        from: Timestamp,
        to: Timestamp,
    ) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM security_events
                WHERE ip_address = $1 AND created_at >= $2 AND created_at <= $3",
        )
        .bind(ip_address)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl BlockStore for PgStore {
    /// 插入或更新封禁记录（单条语句，并发安全）
    async fn upsert_block(
        &self,
        ip_address: &str,
        reason: &str,
        expires_at: Timestamp,
        now: Timestamp,
    ) -> StoreResult<BlockedIp> {
        let row = sqlx::query_as::<_, BlockedIp>(
            "INSERT INTO blocked_ips (ip_address, reason, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $4)
                ON CONFLICT (ip_address)
                DO UPDATE SET reason = EXCLUDED.reason,
                              expires_at = EXCLUDED.expires_at,
                              updated_at = EXCLUDED.updated_at
                RETURNING ip_address, reason, expires_at, created_at, updated_at",
        )
        .bind(ip_address)
        .bind(reason)
        .bind(expires_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_block(&self, ip_address: &str) -> StoreResult<Option<BlockedIp>> {
        let row = sqlx::query_as::<_, BlockedIp>(
            "SELECT ip_address, reason, expires_at, created_at, updated_at
                FROM blocked_ips
                WHERE ip_address = $1",
        )
        .bind(ip_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
