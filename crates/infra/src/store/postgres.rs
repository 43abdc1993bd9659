//! Postgres-backed ledger store.
//!
//! One unit of work is one database transaction. Balance rows are locked with
//! `SELECT ... FOR UPDATE`; the movement log is append-only at the database
//! level (a trigger rejects `UPDATE`/`DELETE`).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (serialization failure) | `40001` | `Aborted` |
//! | Database (deadlock detected) | `40P01` | `Aborted` |
//! | Database (numeric value out of range) | `22003` | `Overflow` |
//! | Database (other) | Any other | `Backend` |
//! | PoolClosed / Io / other | N/A | `Backend` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use armory_auth::{PrincipalId, Role};
use armory_core::{BaseId, EquipmentId, MovementId};
use armory_inventory::{
    Actor, BalanceKey, CatalogSeed, InventoryBalance, MovementDraft, MovementFilter, MovementKind,
    MovementRecord,
};

use super::r#trait::{LedgerStore, LedgerTotals, StoreError, UnitOfWork};

const SCHEMA: &str = include_str!("../../migrations/0001_ledger.sql");

/// Postgres-backed ledger store.
///
/// `PgPool` is reference-counted, so the store is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and make sure the schema exists.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Apply the ledger schema (idempotent).
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresUnit { tx: Some(tx) }))
    }

    async fn balance(&self, key: BalanceKey) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT closing_balance
            FROM inventory
            WHERE equipment_id = $1 AND base_id = $2
            "#,
        )
        .bind(key.equipment_id.get())
        .bind(key.base_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("balance", e))?;

        match row {
            Some(row) => read_column(&row, "closing_balance"),
            None => Ok(0),
        }
    }

    async fn balances(&self) -> Result<Vec<InventoryBalance>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT equipment_id, base_id, opening_balance, closing_balance
            FROM inventory
            ORDER BY equipment_id, base_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("balances", e))?;

        rows.iter().map(balance_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn movements(&self, filter: MovementFilter) -> Result<Vec<MovementRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, equipment_id, from_base_id, to_base_id, quantity,
                   personnel_name, actor_id, actor_role, recorded_at
            FROM asset_movements
            WHERE ($1::text IS NULL OR kind = $1)
              AND ($2::bigint IS NULL OR equipment_id = $2)
              AND ($3::bigint IS NULL OR from_base_id = $3 OR to_base_id = $3)
            ORDER BY recorded_at, id
            "#,
        )
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.equipment_id.map(|e| e.get()))
        .bind(filter.base_id.map(|b| b.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;

        rows.iter().map(movement_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn totals(&self) -> Result<LedgerTotals, StoreError> {
        // Both aggregates must come from the same snapshot.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("totals", e))?;

        let opening = sqlx::query(
            "SELECT COALESCE(SUM(opening_balance), 0)::BIGINT AS opening_total FROM inventory",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("totals", e))?;

        let mut totals = LedgerTotals {
            opening_total: read_column(&opening, "opening_total")?,
            ..LedgerTotals::default()
        };

        let per_kind = sqlx::query(
            r#"
            SELECT kind, COALESCE(SUM(quantity), 0)::BIGINT AS total
            FROM asset_movements
            GROUP BY kind
            "#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("totals", e))?;

        for row in &per_kind {
            let kind: String = read_column(row, "kind")?;
            let kind = kind
                .parse::<MovementKind>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?;
            totals.add(kind, read_column(row, "total")?)?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(totals)
    }

    #[instrument(
        skip(self, seed),
        fields(
            equipment = seed.equipment.len(),
            bases = seed.bases.len(),
            opening_balances = seed.opening_balances.len()
        ),
        err
    )]
    async fn provision(&self, seed: &CatalogSeed) -> Result<(), StoreError> {
        seed.validate()
            .map_err(|e| StoreError::InvalidSeed(e.to_string()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for equipment in &seed.equipment {
            sqlx::query("INSERT INTO equipment (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
                .bind(equipment.id.get())
                .bind(&equipment.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("provision_equipment", e))?;
        }

        for base in &seed.bases {
            sqlx::query("INSERT INTO bases (id, name) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING")
                .bind(base.id.get())
                .bind(&base.name)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("provision_base", e))?;
        }

        for opening in &seed.opening_balances {
            sqlx::query(
                r#"
                INSERT INTO inventory (equipment_id, base_id, opening_balance, closing_balance)
                VALUES ($1, $2, $3, $3)
                ON CONFLICT (equipment_id, base_id) DO NOTHING
                "#,
            )
            .bind(opening.equipment_id.get())
            .bind(opening.base_id.get())
            .bind(opening.quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("provision_balance", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

/// One database transaction. Dropping it without commit rolls back.
struct PostgresUnit {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresUnit {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::AlreadyCommitted)
    }
}

#[async_trait]
impl UnitOfWork for PostgresUnit {
    async fn equipment_exists(&mut self, id: EquipmentId) -> Result<bool, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query("SELECT 1 AS present FROM equipment WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("equipment_exists", e))?;
        Ok(row.is_some())
    }

    async fn base_exists(&mut self, id: BaseId) -> Result<bool, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query("SELECT 1 AS present FROM bases WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("base_exists", e))?;
        Ok(row.is_some())
    }

    async fn lock_balance(&mut self, key: BalanceKey) -> Result<i64, StoreError> {
        let tx = self.tx()?;

        // Materialize the row first so there is something to lock.
        sqlx::query(
            r#"
            INSERT INTO inventory (equipment_id, base_id)
            VALUES ($1, $2)
            ON CONFLICT (equipment_id, base_id) DO NOTHING
            "#,
        )
        .bind(key.equipment_id.get())
        .bind(key.base_id.get())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_balance", e))?;

        let row = sqlx::query(
            r#"
            SELECT closing_balance
            FROM inventory
            WHERE equipment_id = $1 AND base_id = $2
            FOR UPDATE
            "#,
        )
        .bind(key.equipment_id.get())
        .bind(key.base_id.get())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_balance", e))?;

        read_column(&row, "closing_balance")
    }

    async fn apply_delta(&mut self, key: BalanceKey, delta: i64) -> Result<InventoryBalance, StoreError> {
        let tx = self.tx()?;
        let row = sqlx::query(
            r#"
            INSERT INTO inventory (equipment_id, base_id, opening_balance, closing_balance)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (equipment_id, base_id)
            DO UPDATE SET closing_balance = inventory.closing_balance + EXCLUDED.closing_balance
            RETURNING equipment_id, base_id, opening_balance, closing_balance
            "#,
        )
        .bind(key.equipment_id.get())
        .bind(key.base_id.get())
        .bind(delta)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("apply_delta", e))?;

        balance_from_row(&row)
    }

    async fn append_movement(&mut self, draft: MovementDraft) -> Result<MovementRecord, StoreError> {
        let tx = self.tx()?;
        let id = MovementId::new();

        let row = sqlx::query(
            r#"
            INSERT INTO asset_movements (
                id, kind, equipment_id, from_base_id, to_base_id, quantity,
                personnel_name, actor_id, actor_role, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, clock_timestamp())
            RETURNING recorded_at
            "#,
        )
        .bind(*id.as_uuid())
        .bind(draft.kind.as_str())
        .bind(draft.equipment_id.get())
        .bind(draft.from_base_id.map(|b| b.get()))
        .bind(draft.to_base_id.map(|b| b.get()))
        .bind(draft.quantity)
        .bind(draft.personnel_name.as_deref())
        .bind(*draft.actor.principal_id.as_uuid())
        .bind(draft.actor.role.as_str())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;

        let recorded_at: DateTime<Utc> = read_column(&row, "recorded_at")?;
        Ok(draft.into_record(id, recorded_at))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::AlreadyCommitted)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn read_column<'r, T>(row: &'r PgRow, column: &'static str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read {column}: {e}")))
}

fn balance_from_row(row: &PgRow) -> Result<InventoryBalance, StoreError> {
    Ok(InventoryBalance {
        equipment_id: EquipmentId::new(read_column(row, "equipment_id")?),
        base_id: BaseId::new(read_column(row, "base_id")?),
        opening_balance: read_column(row, "opening_balance")?,
        closing_balance: read_column(row, "closing_balance")?,
    })
}

fn movement_from_row(row: &PgRow) -> Result<MovementRecord, StoreError> {
    let kind: String = read_column(row, "kind")?;
    let role: String = read_column(row, "actor_role")?;
    let from_base_id: Option<i64> = read_column(row, "from_base_id")?;
    let to_base_id: Option<i64> = read_column(row, "to_base_id")?;
    let id: Uuid = read_column(row, "id")?;
    let actor_id: Uuid = read_column(row, "actor_id")?;

    Ok(MovementRecord {
        id: MovementId::from_uuid(id),
        kind: kind
            .parse()
            .map_err(|e: armory_core::DomainError| StoreError::Corrupt(e.to_string()))?,
        equipment_id: EquipmentId::new(read_column(row, "equipment_id")?),
        from_base_id: from_base_id.map(BaseId::new),
        to_base_id: to_base_id.map(BaseId::new),
        quantity: read_column(row, "quantity")?,
        personnel_name: read_column(row, "personnel_name")?,
        actor: Actor {
            principal_id: PrincipalId::from_uuid(actor_id),
            role: role
                .parse::<Role>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
        },
        recorded_at: read_column(row, "recorded_at")?,
    })
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::Aborted { operation, message },
                Some("22003") => StoreError::Overflow(format!("{operation}: {message}")),
                _ => StoreError::Backend { operation, message },
            }
        }
        sqlx::Error::PoolClosed => StoreError::backend(operation, "connection pool closed"),
        other => StoreError::backend(operation, other.to_string()),
    }
}
