//! Shared test utilities for the ledger.
//!
//! This module provides helpers for setting up an in-memory database and seeding
//! accounts, products, duration summaries and stocked codes with sensible defaults.

use crate::{
    core::{
        account::{self, create_account},
        catalog,
        code_pool::{self, NewCode},
        duration_summary::{self, NewSummary},
    },
    entities::{self, Role, Tier},
    errors::Result,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// would otherwise open its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// One manager -> admin -> reseller chain.
pub struct TestAccounts {
    pub manager: entities::account::Model,
    pub admin: entities::account::Model,
    pub reseller: entities::account::Model,
}

/// A database seeded with one account chain.
pub struct TestHierarchy {
    pub db: DatabaseConnection,
    pub manager: entities::account::Model,
    pub admin: entities::account::Model,
    pub reseller: entities::account::Model,
}

/// A database seeded with one account chain and a stocked "IPTV Gold" / "1 month" pool.
pub struct TestPool {
    pub db: DatabaseConnection,
    pub accounts: TestAccounts,
    pub product: entities::product::Model,
}

/// Creates a manager (tier 3), an admin under it (tier 2) and a reseller under
/// the admin (tier 1). All balances start at zero.
pub async fn seed_accounts(db: &DatabaseConnection) -> Result<TestAccounts> {
    let manager = create_account(db, "Manager", Role::Manager, Tier::Tier3, None).await?;
    let admin = create_admin(db, manager.id, "Admin").await?;
    let reseller = create_reseller(db, admin.id, "Reseller").await?;
    Ok(TestAccounts {
        manager,
        admin,
        reseller,
    })
}

/// Sets up a fresh database with one account chain.
pub async fn setup_hierarchy() -> Result<TestHierarchy> {
    let db = setup_test_db().await?;
    let accounts = seed_accounts(&db).await?;
    Ok(TestHierarchy {
        db,
        manager: accounts.manager,
        admin: accounts.admin,
        reseller: accounts.reseller,
    })
}

/// Creates a tier 2 admin under `manager_id`.
pub async fn create_admin(
    db: &DatabaseConnection,
    manager_id: i64,
    name: &str,
) -> Result<entities::account::Model> {
    create_account(db, name, Role::Admin, Tier::Tier2, Some(manager_id)).await
}

/// Creates a tier 1 reseller under `admin_id`.
pub async fn create_reseller(
    db: &DatabaseConnection,
    admin_id: i64,
    name: &str,
) -> Result<entities::account::Model> {
    create_account(db, name, Role::Reseller, Tier::Tier1, Some(admin_id)).await
}

/// Adds `amount` to an account's balance.
pub async fn fund(
    db: &DatabaseConnection,
    account_id: i64,
    amount: f64,
) -> Result<entities::account::Model> {
    account::credit(db, account_id, amount).await
}

/// Creates a product with the given name.
pub async fn create_test_product(
    db: &DatabaseConnection,
    name: &str,
) -> Result<entities::product::Model> {
    catalog::create_product(db, name).await
}

/// Summary input with sensible defaults.
///
/// # Defaults
/// * prices: 20.0 / 18.0 / 15.0 for tiers 1 / 2 / 3
/// * `minimum_threshold`: 2
pub fn test_new_summary(product_id: i64, duration_label: &str) -> NewSummary {
    NewSummary {
        product_id,
        duration_label: duration_label.to_string(),
        tier1_price: 20.0,
        tier2_price: 18.0,
        tier3_price: 15.0,
        minimum_threshold: 2,
        note: None,
    }
}

/// Creates a summary with the defaults of [`test_new_summary`].
pub async fn create_test_summary(
    db: &DatabaseConnection,
    product_id: i64,
    duration_label: &str,
) -> Result<entities::duration_summary::Model> {
    duration_summary::create_summary(db, test_new_summary(product_id, duration_label)).await
}

/// Stocks one specific code from "Test supplier".
pub async fn stock_code(
    db: &DatabaseConnection,
    product_id: i64,
    duration_label: &str,
    code: &str,
    unit_cost: f64,
) -> Result<entities::code::Model> {
    code_pool::add_code(
        db,
        NewCode {
            product_id,
            duration_label: duration_label.to_string(),
            code: code.to_string(),
            supplier: "Test supplier".to_string(),
            unit_cost,
            note: None,
        },
    )
    .await
}

/// Stocks `count` codes named `{prefix}-{product_id}-{n}` from supplier `prefix`.
pub async fn stock_codes(
    db: &DatabaseConnection,
    product_id: i64,
    duration_label: &str,
    prefix: &str,
    count: u64,
    unit_cost: f64,
) -> Result<()> {
    for n in 0..count {
        code_pool::add_code(
            db,
            NewCode {
                product_id,
                duration_label: duration_label.to_string(),
                code: format!("{prefix}-{product_id}-{duration_label}-{n}"),
                supplier: prefix.to_string(),
                unit_cost,
                note: None,
            },
        )
        .await?;
    }
    Ok(())
}

/// Sets up accounts plus product "IPTV Gold" with a "1 month" summary holding
/// `codes` codes at `unit_cost` each.
pub async fn setup_pool(codes: u64, unit_cost: f64) -> Result<TestPool> {
    let db = setup_test_db().await?;
    let accounts = seed_accounts(&db).await?;
    let product = create_test_product(&db, "IPTV Gold").await?;
    create_test_summary(&db, product.id, "1 month").await?;
    stock_codes(&db, product.id, "1 month", "P", codes, unit_cost).await?;
    Ok(TestPool {
        db,
        accounts,
        product,
    })
}
