//! Pricing resolver and admin resale price overrides.
//!
//! A buyer normally pays the tier price of the duration summary. An admin may
//! set a resale price for a product/duration; it applies to the resellers that
//! admin supervises.

use crate::{
    core::{
        account, catalog,
        duration_summary::{find_summary_by_label, get_summary},
        policy::{self, Action},
    },
    entities::{PriceOverride, account as account_entity, duration_summary, price_override},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Rounds a money amount to whole cents.
#[must_use]
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Returns the unit price `buyer` pays for `summary`.
///
/// An override owned by the buyer's supervisor wins when its sale price is
/// positive; otherwise the buyer's tier price applies.
pub async fn price_for<C>(
    db: &C,
    summary: &duration_summary::Model,
    buyer: &account_entity::Model,
) -> Result<f64>
where
    C: ConnectionTrait,
{
    let tier_price = summary.resolve_unit_cost(buyer.tier);

    let Some(owner_id) = buyer.supervisor_id else {
        return Ok(tier_price);
    };

    let product_name = catalog::product_name(db, summary.product_id).await?;
    let price = find_override(db, owner_id, &product_name, &summary.duration_label)
        .await?
        .map(|o| o.sale_price)
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(tier_price);

    Ok(price)
}

/// Resolves the unit price for a buyer without buying anything.
///
/// # Errors
/// `NotFound` when the buyer, product or duration summary does not exist.
pub async fn quote(
    db: &DatabaseConnection,
    buyer_id: i64,
    product_id: i64,
    duration_label: &str,
) -> Result<f64> {
    let buyer = account::get_account(db, buyer_id).await?;
    let summary = get_summary(db, product_id, duration_label).await?;
    price_for(db, &summary, &buyer).await
}

async fn find_override<C>(
    db: &C,
    owner_id: i64,
    product_name: &str,
    duration_label: &str,
) -> Result<Option<price_override::Model>>
where
    C: ConnectionTrait,
{
    PriceOverride::find()
        .filter(price_override::Column::OwnerId.eq(owner_id))
        .filter(price_override::Column::ProductKey.eq(catalog::normalize_key(product_name)))
        .filter(price_override::Column::DurationKey.eq(catalog::normalize_key(duration_label)))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates or updates an admin's resale price for a product/duration.
///
/// The admin's own tier price is snapshotted as `purchase_price`.
///
/// # Errors
/// Returns an error if:
/// - The sale price is negative or not finite
/// - The actor is not an active admin
/// - No live product or duration summary matches the names
pub async fn set_price_override(
    db: &DatabaseConnection,
    admin_id: i64,
    product_name: &str,
    duration_label: &str,
    sale_price: f64,
) -> Result<price_override::Model> {
    if !sale_price.is_finite() || sale_price < 0.0 {
        return Err(Error::InvalidAmount { amount: sale_price });
    }

    let txn = db.begin().await?;

    let admin = account::get_account(&txn, admin_id).await?;
    policy::authorize(&admin, Action::SetPriceOverride, None)?;

    let product = catalog::find_product_by_name(&txn, product_name)
        .await?
        .ok_or_else(|| Error::not_found("product", product_name.trim()))?;
    let summary = find_summary_by_label(&txn, product.id, duration_label).await?;
    let purchase_price = summary.resolve_unit_cost(admin.tier);
    let now = chrono::Utc::now();

    let saved = match find_override(&txn, admin_id, product_name, duration_label).await? {
        Some(existing) => {
            let mut active: price_override::ActiveModel = existing.into();
            active.purchase_price = Set(purchase_price);
            active.sale_price = Set(sale_price);
            active.updated_at = Set(now);
            active.update(&txn).await?
        }
        None => {
            price_override::ActiveModel {
                owner_id: Set(admin_id),
                product_name: Set(product.name.clone()),
                duration_label: Set(summary.duration_label.clone()),
                product_key: Set(catalog::normalize_key(product_name)),
                duration_key: Set(catalog::normalize_key(duration_label)),
                purchase_price: Set(purchase_price),
                sale_price: Set(sale_price),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };

    txn.commit().await?;
    info!(
        admin_id,
        product = %saved.product_name,
        duration = %saved.duration_label,
        sale_price,
        "Saved price override"
    );
    Ok(saved)
}

/// Deletes one of the admin's overrides.
pub async fn delete_price_override(
    db: &DatabaseConnection,
    admin_id: i64,
    override_id: i64,
) -> Result<()> {
    let admin = account::get_account(db, admin_id).await?;
    policy::authorize(&admin, Action::SetPriceOverride, None)?;

    let deleted = PriceOverride::delete_many()
        .filter(price_override::Column::Id.eq(override_id))
        .filter(price_override::Column::OwnerId.eq(admin_id))
        .exec(db)
        .await?;
    if deleted.rows_affected == 0 {
        return Err(Error::not_found("price override", override_id));
    }

    info!(admin_id, override_id, "Deleted price override");
    Ok(())
}

/// Lists the overrides owned by an account.
pub async fn list_price_overrides<C>(db: &C, owner_id: i64) -> Result<Vec<price_override::Model>>
where
    C: ConnectionTrait,
{
    PriceOverride::find()
        .filter(price_override::Column::OwnerId.eq(owner_id))
        .order_by_asc(price_override::Column::ProductKey)
        .order_by_asc(price_override::Column::DurationKey)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(0.1 * 3.0), 0.3);
        assert_eq!(round_cents(19.999), 20.0);
        assert_eq!(round_cents(40.0), 40.0);
    }

    #[tokio::test]
    async fn test_tier_price_without_override() -> Result<()> {
        let pool = setup_pool(1, 10.0).await?;
        let db = &pool.db;

        // Reseller is tier 1, admin tier 2, manager tier 3
        let price = quote(db, pool.accounts.reseller.id, pool.product.id, "1 month").await?;
        assert_eq!(price, 20.0);
        let price = quote(db, pool.accounts.admin.id, pool.product.id, "1 month").await?;
        assert_eq!(price, 18.0);

        assert!(matches!(
            quote(db, pool.accounts.reseller.id, pool.product.id, "2 months").await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_override_applies_to_supervised_reseller() -> Result<()> {
        let pool = setup_pool(1, 10.0).await?;
        let db = &pool.db;
        let admin = pool.accounts.admin.id;

        let saved = set_price_override(db, admin, " iptv gold ", "1 MONTH", 25.0).await?;
        assert_eq!(saved.product_name, "IPTV Gold");
        assert_eq!(saved.purchase_price, 18.0);

        let price = quote(db, pool.accounts.reseller.id, pool.product.id, "1 month").await?;
        assert_eq!(price, 25.0);

        // Upsert keeps a single row per key
        set_price_override(db, admin, "IPTV Gold", "1 month", 0.0).await?;
        let overrides = list_price_overrides(db, admin).await?;
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].sale_price, 0.0);

        // A zero override falls back to the tier price
        let price = quote(db, pool.accounts.reseller.id, pool.product.id, "1 month").await?;
        assert_eq!(price, 20.0);

        delete_price_override(db, admin, overrides[0].id).await?;
        assert!(list_price_overrides(db, admin).await?.is_empty());
        assert!(matches!(
            delete_price_override(db, admin, overrides[0].id).await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_only_admins_set_overrides() -> Result<()> {
        let pool = setup_pool(1, 10.0).await?;
        let db = &pool.db;

        let result =
            set_price_override(db, pool.accounts.reseller.id, "IPTV Gold", "1 month", 25.0).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let result =
            set_price_override(db, pool.accounts.admin.id, "IPTV Gold", "1 month", f64::NAN).await;
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let result =
            set_price_override(db, pool.accounts.admin.id, "Unknown", "1 month", 25.0).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));

        Ok(())
    }
}
