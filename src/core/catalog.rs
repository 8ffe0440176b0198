//! Catalog collaborator - The read-only product view the ledger needs.
//!
//! Products are managed by the catalog service; this module only creates them
//! for seeding and resolves names and durations.

use crate::{
    entities::{DurationSummary, Product, duration_summary, product},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};

/// Normalises a product name or duration label for matching: trimmed, lowercase.
#[must_use]
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Creates a product with a trimmed, non-empty name.
pub async fn create_product<C>(db: &C, name: &str) -> Result<product::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::invalid("Product name cannot be empty"));
    }

    let now = chrono::Utc::now().naive_utc();
    let product = product::ActiveModel {
        name: Set(name.trim().to_string()),
        is_deleted: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    product.insert(db).await.map_err(Into::into)
}

/// Returns the current name of a product.
///
/// Soft-deleted products still resolve; ledger snapshots need their name.
pub async fn product_name<C>(db: &C, product_id: i64) -> Result<String>
where
    C: ConnectionTrait,
{
    Product::find_by_id(product_id)
        .one(db)
        .await?
        .map(|p| p.name)
        .ok_or_else(|| Error::not_found("product", product_id))
}

/// Finds a live product by name, ignoring case and surrounding whitespace.
pub async fn find_product_by_name<C>(db: &C, name: &str) -> Result<Option<product::Model>>
where
    C: ConnectionTrait,
{
    let wanted = normalize_key(name);
    let products = Product::find()
        .filter(product::Column::IsDeleted.eq(false))
        .all(db)
        .await?;
    Ok(products
        .into_iter()
        .find(|p| normalize_key(&p.name) == wanted))
}

/// True when a duration summary exists for `(product_id, label)`.
pub async fn duration_exists<C>(db: &C, product_id: i64, label: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let count = DurationSummary::find()
        .filter(duration_summary::Column::ProductId.eq(product_id))
        .filter(duration_summary::Column::DurationLabel.eq(label))
        .count(db)
        .await?;
    Ok(count > 0)
}
