//! # Store Repository
//!
//! Store rows and online-store resolution.
//!
//! Every core operation is scoped to a physical store; online orders come
//! in against an online storefront and are resolved to its parent store
//! (and tenant) here before anything else happens.

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use meridian_core::{OnlineStore, Store};

/// Repository for store rows.
///
/// Methods take an explicit connection so callers can compose them inside
/// their own transaction.
pub struct StoreRepository;

impl StoreRepository {
    /// Inserts a store.
    pub async fn insert(conn: &mut SqliteConnection, store: &Store) -> DbResult<()> {
        debug!(id = %store.id, tenant_id = %store.tenant_id, "Inserting store");

        sqlx::query(
            r#"
            INSERT INTO stores (id, tenant_id, name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&store.id)
        .bind(&store.tenant_id)
        .bind(&store.name)
        .bind(store.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Inserts an online storefront.
    pub async fn insert_online(conn: &mut SqliteConnection, online: &OnlineStore) -> DbResult<()> {
        debug!(id = %online.id, store_id = %online.store_id, "Inserting online store");

        sqlx::query(
            r#"
            INSERT INTO online_stores (id, store_id, name, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&online.id)
        .bind(&online.store_id)
        .bind(&online.name)
        .bind(online.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Gets a store by its ID.
    pub async fn get_by_id(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            r#"
            SELECT id, tenant_id, name, created_at
            FROM stores
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(store)
    }

    /// Resolves an online storefront to its parent store.
    ///
    /// Returns the parent [`Store`] (carrying the tenant id) or `None` when
    /// the online store does not exist.
    pub async fn resolve_online_store(
        conn: &mut SqliteConnection,
        online_store_id: &str,
    ) -> DbResult<Option<Store>> {
        let store = sqlx::query_as::<_, Store>(
            r#"
            SELECT s.id, s.tenant_id, s.name, s.created_at
            FROM stores s
            INNER JOIN online_stores os ON os.store_id = s.id
            WHERE os.id = ?1
            "#,
        )
        .bind(online_store_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(store)
    }
}
