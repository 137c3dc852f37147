//! Shared fixtures for crate tests: an in-memory database plus seed
//! helpers for stores, storefronts, products, listings, and lots.

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::pool::{Database, DbConfig};
use crate::repository::lot::LotLedger;
use crate::repository::product::ProductRepository;
use crate::repository::store::StoreRepository;
use meridian_core::{NewLot, OnlineProduct, OnlineStore, Product, PurchaseLot, Store};

/// Fresh migrated in-memory database.
pub async fn test_db() -> Database {
    Database::new(DbConfig::in_memory())
        .await
        .expect("in-memory database")
}

pub async fn seed_store(db: &Database, tenant_id: &str) -> Store {
    let id = Uuid::new_v4().to_string();
    let store = Store {
        name: format!("Store {}", &id[..8]),
        id,
        tenant_id: tenant_id.to_string(),
        created_at: Utc::now(),
    };

    let mut conn = db.pool().acquire().await.unwrap();
    StoreRepository::insert(&mut *conn, &store).await.unwrap();
    store
}

/// A store together with an online storefront backed by it.
pub async fn seed_storefront(db: &Database, tenant_id: &str) -> (Store, OnlineStore) {
    let store = seed_store(db, tenant_id).await;
    let online = OnlineStore {
        id: Uuid::new_v4().to_string(),
        store_id: store.id.clone(),
        name: format!("{} Online", store.name),
        created_at: Utc::now(),
    };

    let mut conn = db.pool().acquire().await.unwrap();
    StoreRepository::insert_online(&mut *conn, &online)
        .await
        .unwrap();
    (store, online)
}

pub async fn seed_product(
    db: &Database,
    tenant_id: &str,
    sku: &str,
    price_cents: i64,
    units_per_conversion: i64,
) -> Product {
    let now = Utc::now();
    let product = Product {
        id: Uuid::new_v4().to_string(),
        tenant_id: tenant_id.to_string(),
        sku: sku.to_string(),
        name: format!("Product {sku}"),
        price_cents,
        base_unit: "piece".to_string(),
        conversion_unit: "box".to_string(),
        units_per_conversion,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let mut conn = db.pool().acquire().await.unwrap();
    ProductRepository::insert(&mut *conn, &product).await.unwrap();
    product
}

/// An online listing for `product` in `online`, snapshotting the product's
/// own name/sku as its display metadata.
pub async fn seed_listing(
    db: &Database,
    online: &OnlineStore,
    product: &Product,
) -> OnlineProduct {
    let listing = OnlineProduct {
        id: Uuid::new_v4().to_string(),
        online_store_id: online.id.clone(),
        product_id: product.id.clone(),
        name: product.name.clone(),
        sku: product.sku.clone(),
        created_at: Utc::now(),
    };

    let mut conn = db.pool().acquire().await.unwrap();
    ProductRepository::insert_online(&mut *conn, &listing)
        .await
        .unwrap();
    listing
}

/// Receives a lot dated `days_ago` back, so tests can line up FIFO order.
pub async fn receive_lot(
    db: &Database,
    product: &Product,
    store: &Store,
    quantity: i64,
    unit_cost_cents: i64,
    days_ago: i64,
) -> PurchaseLot {
    let mut conn = db.pool().acquire().await.unwrap();
    LotLedger::receive(
        &mut *conn,
        &NewLot {
            product_id: product.id.clone(),
            store_id: store.id.clone(),
            quantity,
            unit_cost_cents,
            unit: product.base_unit.clone(),
            received_at: Utc::now() - Duration::days(days_ago),
        },
    )
    .await
    .unwrap()
}
