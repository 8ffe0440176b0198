//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust models.
//! Composite uniqueness that the entity macros cannot express is added as explicit indexes.

use crate::entities::{
    Account, Code, Demande, DurationSummary, LedgerEntry, PendingTransaction, PriceOverride,
    Product, ReturnRequest, SettledTransaction, duration_summary, price_override,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};
use std::env::VarError;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/reseller_ledger.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, falling back
/// to a local `SQLite` file when it is unset.
///
/// # Errors
/// Returns [`crate::errors::Error::EnvVar`] when the variable is set but not valid unicode.
pub fn get_database_url() -> Result<String> {
    database_url_from(std::env::var("DATABASE_URL"))
}

fn database_url_from(value: std::result::Result<String, VarError>) -> Result<String> {
    match value {
        Ok(url) => Ok(url),
        Err(VarError::NotPresent) => Ok(DEFAULT_DATABASE_URL.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url()?;
    info!(url = %database_url, "Connecting to database");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all ledger tables and indexes if they do not exist yet.
///
/// Catalog and account tables come first so foreign keys resolve in order.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = vec![
        schema.create_table_from_entity(Account),
        schema.create_table_from_entity(Product),
        schema.create_table_from_entity(Code),
        schema.create_table_from_entity(DurationSummary),
        schema.create_table_from_entity(PriceOverride),
        schema.create_table_from_entity(LedgerEntry),
        schema.create_table_from_entity(ReturnRequest),
        schema.create_table_from_entity(Demande),
        schema.create_table_from_entity(SettledTransaction),
        schema.create_table_from_entity(PendingTransaction),
    ];
    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    let summary_key = Index::create()
        .name("idx_duration_summaries_product_duration")
        .table(DurationSummary)
        .col(duration_summary::Column::ProductId)
        .col(duration_summary::Column::DurationLabel)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&summary_key)).await?;

    let override_key = Index::create()
        .name("idx_price_overrides_owner_key")
        .table(PriceOverride)
        .col(price_override::Column::OwnerId)
        .col(price_override::Column::ProductKey)
        .col(price_override::Column::DurationKey)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&override_key)).await?;

    Ok(())
}
