//! Duration summary business logic - Sale prices and pool-derived figures per
//! (product, duration).
//!
//! [`recompute`] is part of every code pool mutation: callers invoke it on the
//! same transaction, right after `allocate`, `restore` or intake, so `quantity`
//! and `weighted_average_cost` are never stale.

use crate::{
    core::catalog,
    entities::{Code, DurationSummary, SummaryStatus, code, duration_summary},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info};

/// Input for [`create_summary`]
#[derive(Debug, Clone)]
pub struct NewSummary {
    /// Product the duration belongs to
    pub product_id: i64,
    /// Duration label, e.g. `"1 month"`
    pub duration_label: String,
    /// Sale price for tier 1 accounts
    pub tier1_price: f64,
    /// Sale price for tier 2 accounts
    pub tier2_price: f64,
    /// Sale price for tier 3 accounts
    pub tier3_price: f64,
    /// Low-stock threshold
    pub minimum_threshold: i64,
    /// Free-form note
    pub note: Option<String>,
}

/// Creates the summary row for a (product, duration) pair.
///
/// The new row starts `active` and its derived figures are computed from
/// whatever the pool already holds for the key.
///
/// # Errors
/// Returns an error if:
/// - The label is empty, a price is negative or not finite, or the threshold is negative
/// - The product does not exist
/// - A summary already exists for the key
pub async fn create_summary(
    db: &DatabaseConnection,
    new: NewSummary,
) -> Result<duration_summary::Model> {
    let label = new.duration_label.trim().to_string();
    if label.is_empty() {
        return Err(Error::invalid("Duration label cannot be empty"));
    }
    for price in [new.tier1_price, new.tier2_price, new.tier3_price] {
        if !price.is_finite() || price < 0.0 {
            return Err(Error::InvalidAmount { amount: price });
        }
    }
    if new.minimum_threshold < 0 {
        return Err(Error::invalid("Minimum threshold cannot be negative"));
    }

    let txn = db.begin().await?;

    catalog::product_name(&txn, new.product_id).await?;
    if find_summary(&txn, new.product_id, &label).await?.is_some() {
        return Err(Error::conflict(format!(
            "Duration '{label}' already exists for product {}",
            new.product_id
        )));
    }

    let summary = duration_summary::ActiveModel {
        product_id: Set(new.product_id),
        duration_label: Set(label.clone()),
        tier1_price: Set(new.tier1_price),
        tier2_price: Set(new.tier2_price),
        tier3_price: Set(new.tier3_price),
        minimum_threshold: Set(new.minimum_threshold),
        quantity: Set(0),
        weighted_average_cost: Set(0.0),
        status: Set(SummaryStatus::Active),
        note: Set(new.note),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    summary.insert(&txn).await?;
    let summary = recompute(&txn, new.product_id, &label).await?;

    txn.commit().await?;
    info!(product_id = new.product_id, duration = %label, "Created duration summary");
    Ok(summary)
}

/// Finds the summary for a key.
pub async fn find_summary<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
) -> Result<Option<duration_summary::Model>>
where
    C: ConnectionTrait,
{
    DurationSummary::find()
        .filter(duration_summary::Column::ProductId.eq(product_id))
        .filter(duration_summary::Column::DurationLabel.eq(duration_label))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads the summary for a key, failing with `NotFound` when it does not exist.
pub async fn get_summary<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
) -> Result<duration_summary::Model>
where
    C: ConnectionTrait,
{
    find_summary(db, product_id, duration_label)
        .await?
        .ok_or_else(|| Error::not_found("duration", format!("{product_id}/{duration_label}")))
}

/// Lists every summary of a product, ordered by label.
pub async fn summaries_for_product<C>(
    db: &C,
    product_id: i64,
) -> Result<Vec<duration_summary::Model>>
where
    C: ConnectionTrait,
{
    DurationSummary::find()
        .filter(duration_summary::Column::ProductId.eq(product_id))
        .order_by_asc(duration_summary::Column::DurationLabel)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a product's summary by label, ignoring case and surrounding whitespace.
///
/// # Errors
/// `NotFound` when no label of the product matches.
pub async fn find_summary_by_label<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
) -> Result<duration_summary::Model>
where
    C: ConnectionTrait,
{
    let wanted = catalog::normalize_key(duration_label);
    summaries_for_product(db, product_id)
        .await?
        .into_iter()
        .find(|s| catalog::normalize_key(&s.duration_label) == wanted)
        .ok_or_else(|| {
            Error::not_found("duration", format!("{product_id}/{}", duration_label.trim()))
        })
}

/// Count-weighted mean cost over `(unit_cost, count)` groups; 0 for an empty pool.
#[must_use]
pub fn weighted_average(groups: &[(f64, i64)]) -> f64 {
    let (total_value, total_quantity) = groups
        .iter()
        .fold((0.0_f64, 0_i64), |(value, quantity), &(cost, count)| {
            (value + cost * count as f64, quantity + count)
        });

    if total_quantity > 0 {
        total_value / total_quantity as f64
    } else {
        0.0
    }
}

/// Rewrites `quantity` and `weighted_average_cost` from the current pool state.
///
/// Codes are grouped by distinct `(unit_cost, supplier)` and each group weighs
/// in by its size.
pub async fn recompute<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
) -> Result<duration_summary::Model>
where
    C: ConnectionTrait,
{
    let summary = get_summary(db, product_id, duration_label).await?;

    let groups: Vec<(f64, String, i64)> = Code::find()
        .select_only()
        .column(code::Column::UnitCost)
        .column(code::Column::Supplier)
        .column_as(Expr::col(code::Column::Id).count(), "code_count")
        .filter(code::Column::ProductId.eq(product_id))
        .filter(code::Column::DurationLabel.eq(duration_label))
        .group_by(code::Column::UnitCost)
        .group_by(code::Column::Supplier)
        .into_tuple()
        .all(db)
        .await?;

    let weighted: Vec<(f64, i64)> = groups.iter().map(|(cost, _, count)| (*cost, *count)).collect();
    let quantity: i64 = weighted.iter().map(|(_, count)| count).sum();
    let average = weighted_average(&weighted);

    let mut active: duration_summary::ActiveModel = summary.into();
    active.quantity = Set(quantity);
    active.weighted_average_cost = Set(average);
    let updated = active.update(db).await?;

    debug!(
        product_id,
        duration = duration_label,
        quantity,
        weighted_average_cost = average,
        "Recomputed duration summary"
    );
    Ok(updated)
}

/// Recomputes every summary from the pool in one transaction.
///
/// Returns the number of summaries rewritten.
pub async fn recompute_all(db: &DatabaseConnection) -> Result<usize> {
    let txn = db.begin().await?;

    let summaries = DurationSummary::find().all(&txn).await?;
    for summary in &summaries {
        recompute(&txn, summary.product_id, &summary.duration_label).await?;
    }

    txn.commit().await?;
    info!(summaries = summaries.len(), "Recomputed all duration summaries");
    Ok(summaries.len())
}

/// Activates or deactivates a duration for sale.
pub async fn set_status<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
    status: SummaryStatus,
) -> Result<duration_summary::Model>
where
    C: ConnectionTrait,
{
    let mut summary: duration_summary::ActiveModel =
        get_summary(db, product_id, duration_label).await?.into();
    summary.status = Set(status);
    summary.update(db).await.map_err(Into::into)
}

/// Lists summaries whose quantity is under their minimum threshold.
pub async fn low_stock<C>(db: &C) -> Result<Vec<duration_summary::Model>>
where
    C: ConnectionTrait,
{
    let summaries = DurationSummary::find()
        .order_by_asc(duration_summary::Column::ProductId)
        .order_by_asc(duration_summary::Column::DurationLabel)
        .all(db)
        .await?;
    Ok(summaries.into_iter().filter(|s| s.is_low_stock()).collect())
}
