//! Code pool - FIFO allocation and restoration of stocked codes.
//!
//! A code leaves the pool by deletion. [`allocate`] removes the selected rows
//! by id and checks the affected row count, so two concurrent purchases can
//! never both walk away with the same code: the loser sees fewer rows deleted
//! and its transaction rolls back.

use crate::{
    core::duration_summary,
    entities::{Code, code},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::HashSet;
use tracing::{debug, info};

/// A code put back into the pool by a refund.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredCode {
    /// The credential going back into stock
    pub code: String,
    /// Supplier tag for the restored row
    pub supplier: String,
    /// Cost attributed to this code
    pub unit_cost: f64,
    /// Usually the return reason
    pub note: Option<String>,
}

/// Input for [`add_code`]
#[derive(Debug, Clone)]
pub struct NewCode {
    /// Product the code unlocks
    pub product_id: i64,
    /// Duration label; a summary must exist for the key
    pub duration_label: String,
    /// The credential itself, trimmed before storage
    pub code: String,
    /// Who supplied the code
    pub supplier: String,
    /// Acquisition cost
    pub unit_cost: f64,
    /// Free-form note
    pub note: Option<String>,
}

/// Number of codes in stock for a key.
pub async fn count<C>(db: &C, product_id: i64, duration_label: &str) -> Result<u64>
where
    C: ConnectionTrait,
{
    Code::find()
        .filter(code::Column::ProductId.eq(product_id))
        .filter(code::Column::DurationLabel.eq(duration_label))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Lists the codes in stock for a key, oldest first.
pub async fn list<C>(db: &C, product_id: i64, duration_label: &str) -> Result<Vec<code::Model>>
where
    C: ConnectionTrait,
{
    Code::find()
        .filter(code::Column::ProductId.eq(product_id))
        .filter(code::Column::DurationLabel.eq(duration_label))
        .order_by_asc(code::Column::AddedAt)
        .order_by_asc(code::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Removes and returns the `n` oldest codes for a key.
///
/// Must run inside the caller's transaction; the summary is not recomputed
/// here.
///
/// # Errors
/// - `InvalidInput` when `n` is zero
/// - `InsufficientStock` when fewer than `n` codes are available, including
///   when a concurrent allocation took some of the selected rows first
pub async fn allocate<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
    n: u64,
) -> Result<Vec<code::Model>>
where
    C: ConnectionTrait,
{
    if n == 0 {
        return Err(Error::invalid("Quantity must be at least 1"));
    }

    let selected = Code::find()
        .filter(code::Column::ProductId.eq(product_id))
        .filter(code::Column::DurationLabel.eq(duration_label))
        .order_by_asc(code::Column::AddedAt)
        .order_by_asc(code::Column::Id)
        .limit(n)
        .all(db)
        .await?;

    if (selected.len() as u64) < n {
        return Err(Error::InsufficientStock {
            available: selected.len() as u64,
            requested: n,
        });
    }

    let ids: Vec<i64> = selected.iter().map(|c| c.id).collect();
    let deleted = Code::delete_many()
        .filter(code::Column::Id.is_in(ids))
        .exec(db)
        .await?;

    if deleted.rows_affected != n {
        let available = count(db, product_id, duration_label).await?;
        return Err(Error::InsufficientStock {
            available,
            requested: n,
        });
    }

    debug!(product_id, duration = duration_label, n, "Allocated codes");
    Ok(selected)
}

/// Inserts refunded codes back into the pool under a key.
///
/// Must run inside the caller's transaction; the summary is not recomputed
/// here.
///
/// # Errors
/// - `InvalidInput` when `codes` is empty or a cost is negative
/// - `Conflict` when a code repeats within `codes` or is already in stock
pub async fn restore<C>(
    db: &C,
    product_id: i64,
    duration_label: &str,
    codes: &[RestoredCode],
) -> Result<()>
where
    C: ConnectionTrait,
{
    if codes.is_empty() {
        return Err(Error::invalid("Nothing to restore"));
    }

    let mut seen = HashSet::new();
    for restored in codes {
        if !restored.unit_cost.is_finite() || restored.unit_cost < 0.0 {
            return Err(Error::InvalidAmount {
                amount: restored.unit_cost,
            });
        }
        if !seen.insert(restored.code.as_str()) {
            return Err(Error::conflict(format!(
                "Code '{}' appears twice",
                restored.code
            )));
        }
    }

    let values: Vec<String> = codes.iter().map(|c| c.code.clone()).collect();
    let existing = Code::find()
        .filter(code::Column::Code.is_in(values))
        .one(db)
        .await?;
    if let Some(existing) = existing {
        return Err(Error::conflict(format!(
            "Code '{}' is already in stock",
            existing.code
        )));
    }

    let now = chrono::Utc::now();
    let rows = codes.iter().map(|restored| code::ActiveModel {
        code: Set(restored.code.clone()),
        product_id: Set(product_id),
        duration_label: Set(duration_label.to_string()),
        supplier: Set(restored.supplier.clone()),
        unit_cost: Set(restored.unit_cost),
        note: Set(restored.note.clone()),
        added_at: Set(now),
        ..Default::default()
    });
    Code::insert_many(rows).exec(db).await?;

    debug!(
        product_id,
        duration = duration_label,
        n = codes.len(),
        "Restored codes"
    );
    Ok(())
}

/// Stocks one new code and refreshes its summary.
///
/// # Errors
/// - `InvalidInput` for an empty code or supplier, `InvalidAmount` for a bad cost
/// - `NotFound` when no summary exists for the key
/// - `Conflict` when the code is already in stock
pub async fn add_code(db: &DatabaseConnection, new: NewCode) -> Result<code::Model> {
    let value = new.code.trim().to_string();
    if value.is_empty() {
        return Err(Error::invalid("Code cannot be empty"));
    }
    if new.supplier.trim().is_empty() {
        return Err(Error::invalid("Supplier cannot be empty"));
    }
    if !new.unit_cost.is_finite() || new.unit_cost < 0.0 {
        return Err(Error::InvalidAmount {
            amount: new.unit_cost,
        });
    }

    let txn = db.begin().await?;

    duration_summary::get_summary(&txn, new.product_id, &new.duration_label).await?;

    let duplicate = Code::find()
        .filter(code::Column::Code.eq(value.as_str()))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(Error::conflict(format!("Code '{value}' is already in stock")));
    }

    let code = code::ActiveModel {
        code: Set(value),
        product_id: Set(new.product_id),
        duration_label: Set(new.duration_label.clone()),
        supplier: Set(new.supplier.trim().to_string()),
        unit_cost: Set(new.unit_cost),
        note: Set(new.note),
        added_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    duration_summary::recompute(&txn, new.product_id, &new.duration_label).await?;
    txn.commit().await?;

    info!(
        product_id = code.product_id,
        duration = %code.duration_label,
        "Stocked code"
    );
    Ok(code)
}

/// Deletes one code from stock and refreshes its summary.
///
/// # Errors
/// `NotFound` when no code has this id.
pub async fn remove_code(db: &DatabaseConnection, code_id: i64) -> Result<code::Model> {
    let txn = db.begin().await?;

    let code = get_code(&txn, code_id).await?;
    let deleted = Code::delete_by_id(code_id).exec(&txn).await?;
    if deleted.rows_affected != 1 {
        return Err(Error::not_found("code", code_id));
    }
    duration_summary::recompute(&txn, code.product_id, &code.duration_label).await?;

    txn.commit().await?;
    info!(
        code_id,
        product_id = code.product_id,
        duration = %code.duration_label,
        "Removed code"
    );
    Ok(code)
}

/// Changes the supplier, cost and note of a stocked code and refreshes its summary.
///
/// # Errors
/// - `InvalidInput` for an empty supplier, `InvalidAmount` for a bad cost
/// - `NotFound` when no code has this id
pub async fn update_code(
    db: &DatabaseConnection,
    code_id: i64,
    supplier: &str,
    unit_cost: f64,
    note: Option<String>,
) -> Result<code::Model> {
    if supplier.trim().is_empty() {
        return Err(Error::invalid("Supplier cannot be empty"));
    }
    if !unit_cost.is_finite() || unit_cost < 0.0 {
        return Err(Error::InvalidAmount { amount: unit_cost });
    }

    let txn = db.begin().await?;

    let mut code: code::ActiveModel = get_code(&txn, code_id).await?.into();
    code.supplier = Set(supplier.trim().to_string());
    code.unit_cost = Set(unit_cost);
    code.note = Set(note);
    let code = code.update(&txn).await?;
    duration_summary::recompute(&txn, code.product_id, &code.duration_label).await?;

    txn.commit().await?;
    info!(code_id, unit_cost, "Updated code");
    Ok(code)
}

async fn get_code<C>(db: &C, code_id: i64) -> Result<code::Model>
where
    C: ConnectionTrait,
{
    Code::find_by_id(code_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("code", code_id))
}
