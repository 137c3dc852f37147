//! # Transfer Repository
//!
//! Row-level writes for cross-store transfer records. A transfer is
//! written once, on success, and never mutated afterwards.
//!
//! ## Transfer Numbers
//! `TF{YYYYMM}{seq}`, sequence scoped per tenant per month, allocated with
//! the same atomic upsert pattern as order numbers.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{Transfer, TransferItem};

/// Repository for transfer rows.
pub struct TransferRepository;

impl TransferRepository {
    /// Allocates the next transfer number for a tenant.
    pub async fn next_transfer_number(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        let month = now.format("%Y%m").to_string();

        let seq: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO transfer_counters (tenant_id, month, seq)
            VALUES (?1, ?2, 1)
            ON CONFLICT (tenant_id, month) DO UPDATE SET seq = seq + 1
            RETURNING seq
            "#,
        )
        .bind(tenant_id)
        .bind(&month)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("TF{month}{seq}"))
    }

    /// Inserts a transfer header.
    pub async fn insert(conn: &mut SqliteConnection, transfer: &Transfer) -> DbResult<()> {
        debug!(
            id = %transfer.id,
            transfer_number = %transfer.transfer_number,
            "Inserting transfer"
        );

        sqlx::query(
            r#"
            INSERT INTO transfers (
                id, tenant_id, transfer_number,
                source_store_id, destination_store_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&transfer.id)
        .bind(&transfer.tenant_id)
        .bind(&transfer.transfer_number)
        .bind(&transfer.source_store_id)
        .bind(&transfer.destination_store_id)
        .bind(transfer.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts one transferred cost-tier line.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &TransferItem) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transfer_items (
                id, transfer_id, product_id,
                quantity, unit_cost_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&item.id)
        .bind(&item.transfer_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_cost_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a transfer header by its ID.
    pub async fn get_by_id(
        conn: &mut SqliteConnection,
        transfer_id: &str,
    ) -> DbResult<Option<Transfer>> {
        let transfer = sqlx::query_as::<_, Transfer>(
            r#"
            SELECT
                id, tenant_id, transfer_number,
                source_store_id, destination_store_id, created_at
            FROM transfers
            WHERE id = ?1
            "#,
        )
        .bind(transfer_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(transfer)
    }

    /// Gets all lines for a transfer, in insertion order.
    pub async fn get_items(
        conn: &mut SqliteConnection,
        transfer_id: &str,
    ) -> DbResult<Vec<TransferItem>> {
        let items = sqlx::query_as::<_, TransferItem>(
            r#"
            SELECT
                id, transfer_id, product_id,
                quantity, unit_cost_cents, created_at
            FROM transfer_items
            WHERE transfer_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }
}
