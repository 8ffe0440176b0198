//! Purchase engine - Turns stocked codes into a priced, audited sale.
//!
//! A purchase allocates codes, refreshes the duration summary, debits the buyer
//! and writes the ledger entry in one database transaction. Events go out only
//! after commit.

use crate::{
    core::{
        account, catalog, code_pool, duration_summary, pricing,
        notify::{self, DomainEvent, Notifier},
        policy::{self, Action},
    },
    entities::{CodeList, LedgerEntry, SummaryStatus, ledger_entry},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Input for [`purchase`]
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    /// Account paying for the codes
    pub buyer_id: i64,
    /// Product to buy
    pub product_id: i64,
    /// Duration label, matched exactly
    pub duration_label: String,
    /// Number of codes, at least 1
    pub quantity: u64,
    /// Copied onto the ledger entry
    pub note: Option<String>,
}

/// Buys `quantity` codes for the buyer.
///
/// # Errors
/// Returns an error if:
/// - `quantity` is zero (`InvalidInput`)
/// - The buyer, product or duration does not exist (`NotFound`)
/// - The buyer may not purchase (`Forbidden`)
/// - The duration is inactive (`InvalidInput`)
/// - The pool holds fewer than `quantity` codes (`InsufficientStock`)
/// - The buyer's balance does not cover the total (`InsufficientBalance`)
///
/// On any error nothing is written.
#[instrument(skip(db, notifier))]
pub async fn purchase(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    request: PurchaseRequest,
) -> Result<ledger_entry::Model> {
    if request.quantity == 0 {
        return Err(Error::invalid("Quantity must be at least 1"));
    }
    let label = request.duration_label.as_str();

    let txn = db.begin().await?;

    let buyer = account::get_account(&txn, request.buyer_id).await?;
    policy::authorize(&buyer, Action::Purchase, None)?;

    let product_name = catalog::product_name(&txn, request.product_id).await?;
    let summary = duration_summary::get_summary(&txn, request.product_id, label).await?;
    if summary.status != SummaryStatus::Active {
        return Err(Error::invalid(format!(
            "{product_name} ({label}) is not for sale"
        )));
    }

    // Fast pre-check; allocate() re-validates under the transaction
    let available = code_pool::count(&txn, request.product_id, label).await?;
    if available < request.quantity {
        return Err(Error::InsufficientStock {
            available,
            requested: request.quantity,
        });
    }

    let unit_price = pricing::price_for(&txn, &summary, &buyer).await?;
    let total = pricing::round_cents(unit_price * request.quantity as f64);
    if buyer.balance < total {
        return Err(Error::InsufficientBalance {
            current: buyer.balance,
            required: total,
        });
    }

    let codes = code_pool::allocate(&txn, request.product_id, label, request.quantity).await?;
    duration_summary::recompute(&txn, request.product_id, label).await?;
    account::debit(&txn, buyer.id, total).await?;

    let entry = ledger_entry::ActiveModel {
        buyer_id: Set(buyer.id),
        product_id: Set(request.product_id),
        product_name: Set(product_name),
        duration_label: Set(label.to_string()),
        codes: Set(CodeList(codes.into_iter().map(|c| c.code).collect())),
        amount: Set(total),
        note: Set(request.note.clone()),
        reviewer_id: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        buyer_id = buyer.id,
        ledger_entry_id = entry.id,
        quantity = request.quantity,
        amount = total,
        "Purchase completed"
    );
    notify::emit(notifier, DomainEvent::BalanceChanged { account_id: buyer.id });
    notify::emit(
        notifier,
        DomainEvent::PurchaseCompleted {
            ledger_entry_id: entry.id,
        },
    );

    Ok(entry)
}

/// Loads a ledger entry, failing with `NotFound` when it does not exist.
pub async fn get_ledger_entry<C>(db: &C, ledger_entry_id: i64) -> Result<ledger_entry::Model>
where
    C: ConnectionTrait,
{
    LedgerEntry::find_by_id(ledger_entry_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("ledger entry", ledger_entry_id))
}

/// Lists a buyer's ledger entries, newest first. Includes refund reversals.
pub async fn history_for<C>(db: &C, buyer_id: i64) -> Result<Vec<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    LedgerEntry::find()
        .filter(ledger_entry::Column::BuyerId.eq(buyer_id))
        .order_by_desc(ledger_entry::Column::CreatedAt)
        .order_by_desc(ledger_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
