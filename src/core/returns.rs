//! Return/refund workflow - Reversing a purchase under manager review.
//!
//! A return request is `pending` until a top-tier reviewer approves or rejects
//! it. Approval puts the codes back, refunds the buyer, writes a negative
//! reversal entry and removes the original entry, all in one transaction.

use crate::{
    config::settings::LedgerSettings,
    core::{
        account, code_pool,
        code_pool::RestoredCode,
        duration_summary,
        notify::{self, DomainEvent, Notifier},
        policy::{self, Action},
        purchase::get_ledger_entry,
    },
    entities::{
        AccountModel, LedgerEntry, ReturnRequest, ReviewStatus, ledger_entry, return_request,
    },
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Outcome of an approved return
#[derive(Debug, Clone)]
pub struct RefundResult {
    /// The approved (and now deleted) request
    pub return_request_id: i64,
    /// Amount credited back to the buyer
    pub refunded_amount: f64,
    /// Buyer balance after the refund
    pub buyer_balance: f64,
    /// Audit row with the negated amount
    pub reversal_entry: ledger_entry::Model,
    /// Codes put back into the pool
    pub restored_codes: Vec<String>,
}

/// Files a return request for a ledger entry.
///
/// # Errors
/// - `InvalidInput` when the reason is blank
/// - `NotFound` when the entry or requester does not exist
/// - `Conflict` for reversal entries or when a pending request already exists
/// - `Forbidden` when the requester cannot see the entry
#[instrument(skip(db, notifier, reason))]
pub async fn request_return(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    ledger_entry_id: i64,
    requester_id: i64,
    reason: &str,
) -> Result<return_request::Model> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Error::invalid("A return needs a reason"));
    }

    let txn = db.begin().await?;

    let entry = get_ledger_entry(&txn, ledger_entry_id).await?;
    if entry.is_reversal() {
        return Err(Error::conflict("Refund entries cannot be returned"));
    }

    let requester = account::get_account(&txn, requester_id).await?;
    let buyer = account::get_account(&txn, entry.buyer_id).await?;
    policy::authorize(&requester, Action::RequestReturn, Some(&buyer))?;

    let pending = ReturnRequest::find()
        .filter(return_request::Column::LedgerEntryId.eq(ledger_entry_id))
        .filter(return_request::Column::Status.eq(ReviewStatus::Pending))
        .count(&txn)
        .await?;
    if pending > 0 {
        return Err(Error::conflict(format!(
            "A return is already pending for ledger entry {ledger_entry_id}"
        )));
    }

    let request = return_request::ActiveModel {
        ledger_entry_id: Set(ledger_entry_id),
        requester_id: Set(requester_id),
        reason: Set(reason.to_string()),
        status: Set(ReviewStatus::Pending),
        reviewer_id: Set(None),
        reviewed_at: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        return_request_id = request.id,
        ledger_entry_id, requester_id, "Return requested"
    );
    notify::emit(
        notifier,
        DomainEvent::ReturnRequested {
            return_request_id: request.id,
        },
    );

    Ok(request)
}

async fn load_for_review<C>(
    db: &C,
    return_request_id: i64,
    reviewer_id: i64,
) -> Result<(return_request::Model, AccountModel)>
where
    C: ConnectionTrait,
{
    let reviewer = account::get_account(db, reviewer_id).await?;
    policy::authorize(&reviewer, Action::ReviewReturn, None)?;

    let request = ReturnRequest::find_by_id(return_request_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("return request", return_request_id))?;
    if request.status.is_terminal() {
        return Err(Error::conflict(format!(
            "Return request {return_request_id} is already {:?}",
            request.status
        )));
    }

    Ok((request, reviewer))
}

/// Approves a pending return and refunds the buyer.
///
/// Every restored code carries an even share of the entry amount as its cost,
/// the configured return supplier tag and the return reason as note.
///
/// # Errors
/// - `Forbidden` unless the reviewer is a manager or admin boss
/// - `NotFound` for an unknown request, or an entry that was already reversed
/// - `Conflict` when the request is no longer pending or a code is back in stock
#[instrument(skip(db, notifier, settings))]
pub async fn approve(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    settings: &LedgerSettings,
    return_request_id: i64,
    reviewer_id: i64,
) -> Result<RefundResult> {
    let txn = db.begin().await?;

    let (request, reviewer) = load_for_review(&txn, return_request_id, reviewer_id).await?;
    close_request(&txn, return_request_id, reviewer_id, ReviewStatus::Approved).await?;
    let entry = get_ledger_entry(&txn, request.ledger_entry_id).await?;
    if entry.codes.is_empty() {
        return Err(Error::invalid(format!(
            "Ledger entry {} has no codes to restore",
            entry.id
        )));
    }

    let unit_cost = entry.amount / entry.codes.len() as f64;
    let restored: Vec<RestoredCode> = entry
        .codes
        .iter()
        .map(|code| RestoredCode {
            code: code.clone(),
            supplier: settings.return_supplier.clone(),
            unit_cost,
            note: Some(request.reason.clone()),
        })
        .collect();
    code_pool::restore(&txn, entry.product_id, &entry.duration_label, &restored).await?;
    duration_summary::recompute(&txn, entry.product_id, &entry.duration_label).await?;

    let buyer = account::credit(&txn, entry.buyer_id, entry.amount).await?;

    let reversal = ledger_entry::ActiveModel {
        buyer_id: Set(entry.buyer_id),
        product_id: Set(entry.product_id),
        product_name: Set(entry.product_name.clone()),
        duration_label: Set(entry.duration_label.clone()),
        codes: Set(entry.codes.clone()),
        amount: Set(-entry.amount),
        note: Set(Some(format!("Return approved by {}", reviewer.name))),
        reviewer_id: Set(Some(reviewer.id)),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    ReturnRequest::delete_many()
        .filter(return_request::Column::LedgerEntryId.eq(entry.id))
        .exec(&txn)
        .await?;
    let deleted = LedgerEntry::delete_by_id(entry.id).exec(&txn).await?;
    if deleted.rows_affected != 1 {
        return Err(Error::not_found("ledger entry", entry.id));
    }

    txn.commit().await?;

    info!(
        return_request_id,
        ledger_entry_id = entry.id,
        buyer_id = buyer.id,
        refunded = entry.amount,
        codes = entry.codes.len(),
        "Return approved"
    );
    notify::emit(notifier, DomainEvent::BalanceChanged { account_id: buyer.id });
    notify::emit(
        notifier,
        DomainEvent::RefundApproved {
            ledger_entry_id: entry.id,
        },
    );

    Ok(RefundResult {
        return_request_id,
        refunded_amount: entry.amount,
        buyer_balance: buyer.balance,
        reversal_entry: reversal,
        restored_codes: entry.codes.0,
    })
}

/// Moves a pending request to a terminal status; `Conflict` if it already left `pending`.
async fn close_request<C>(
    db: &C,
    return_request_id: i64,
    reviewer_id: i64,
    status: ReviewStatus,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let updated = ReturnRequest::update_many()
        .col_expr(return_request::Column::Status, Expr::value(status))
        .col_expr(return_request::Column::ReviewerId, Expr::value(reviewer_id))
        .col_expr(
            return_request::Column::ReviewedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(return_request::Column::Id.eq(return_request_id))
        .filter(return_request::Column::Status.eq(ReviewStatus::Pending))
        .exec(db)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::conflict(format!(
            "Return request {return_request_id} is no longer pending"
        )));
    }
    Ok(())
}

/// Rejects a pending return. Nothing else changes.
///
/// # Errors
/// Same authorization and state rules as [`approve`].
#[instrument(skip(db))]
pub async fn reject(
    db: &DatabaseConnection,
    return_request_id: i64,
    reviewer_id: i64,
) -> Result<return_request::Model> {
    let txn = db.begin().await?;

    load_for_review(&txn, return_request_id, reviewer_id).await?;
    close_request(&txn, return_request_id, reviewer_id, ReviewStatus::Rejected).await?;

    let request = ReturnRequest::find_by_id(return_request_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("return request", return_request_id))?;
    txn.commit().await?;

    info!(return_request_id, reviewer_id, "Return rejected");
    Ok(request)
}

/// Lists pending return requests, oldest first.
pub async fn pending_returns<C>(db: &C) -> Result<Vec<return_request::Model>>
where
    C: ConnectionTrait,
{
    ReturnRequest::find()
        .filter(return_request::Column::Status.eq(ReviewStatus::Pending))
        .order_by_asc(return_request::Column::CreatedAt)
        .order_by_asc(return_request::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::notify::{ChannelNotifier, LogNotifier};
    use crate::core::purchase::{self, PurchaseRequest};
    use crate::test_utils::*;

    async fn buy(pool: &TestPool, quantity: u64) -> Result<ledger_entry::Model> {
        purchase::purchase(
            &pool.db,
            &LogNotifier,
            PurchaseRequest {
                buyer_id: pool.accounts.reseller.id,
                product_id: pool.product.id,
                duration_label: "1 month".to_string(),
                quantity,
                note: Some("client order".to_string()),
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_approve_reverses_purchase() -> Result<()> {
        let pool = setup_pool(3, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 100.0).await?;

        let entry = buy(&pool, 2).await?;
        assert_eq!(account::get_account(db, buyer).await?.balance, 60.0);

        let request = request_return(db, &LogNotifier, entry.id, buyer, "codes do not work").await?;
        assert_eq!(request.status, ReviewStatus::Pending);

        let notifier = ChannelNotifier::new(8);
        let mut events = notifier.subscribe();
        let result = approve(
            db,
            &notifier,
            &LedgerSettings::default(),
            request.id,
            pool.accounts.manager.id,
        )
        .await?;

        assert_eq!(result.refunded_amount, 40.0);
        assert_eq!(result.buyer_balance, 100.0);
        assert_eq!(result.reversal_entry.amount, -40.0);
        assert_eq!(result.reversal_entry.reviewer_id, Some(pool.accounts.manager.id));
        assert_eq!(result.restored_codes, entry.codes.0);

        assert_eq!(code_pool::count(db, pool.product.id, "1 month").await?, 3);
        assert_eq!(account::get_account(db, buyer).await?.balance, 100.0);
        assert!(matches!(
            get_ledger_entry(db, entry.id).await,
            Err(Error::NotFound { .. })
        ));

        let history = purchase::history_for(db, buyer).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, -40.0);
        assert!(pending_returns(db).await?.is_empty());

        assert_eq!(
            events.recv().await.unwrap(),
            DomainEvent::BalanceChanged { account_id: buyer }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DomainEvent::RefundApproved {
                ledger_entry_id: entry.id
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_restored_codes_use_even_cost_and_return_tag() -> Result<()> {
        let pool = setup_pool(2, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 40.0).await?;

        let entry = buy(&pool, 2).await?;
        let request = request_return(db, &LogNotifier, entry.id, buyer, "expired").await?;
        approve(
            db,
            &LogNotifier,
            &LedgerSettings::default(),
            request.id,
            pool.accounts.manager.id,
        )
        .await?;

        let codes = code_pool::list(db, pool.product.id, "1 month").await?;
        assert_eq!(codes.len(), 2);
        for code in &codes {
            assert_eq!(code.unit_cost, 20.0);
            assert_eq!(code.supplier, "(Retour)");
            assert_eq!(code.note.as_deref(), Some("expired"));
        }

        let summary = duration_summary::get_summary(db, pool.product.id, "1 month").await?;
        assert_eq!(summary.quantity, 2);
        assert_eq!(summary.weighted_average_cost, 20.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_request_rules() -> Result<()> {
        let pool = setup_pool(3, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 100.0).await?;
        let entry = buy(&pool, 1).await?;

        assert!(matches!(
            request_return(db, &LogNotifier, entry.id, buyer, "  ").await,
            Err(Error::InvalidInput { .. })
        ));

        let other = create_reseller(db, pool.accounts.admin.id, "Other shop").await?;
        assert!(matches!(
            request_return(db, &LogNotifier, entry.id, other.id, "not mine").await,
            Err(Error::Forbidden { .. })
        ));

        // The supervising admin may file on the reseller's behalf
        request_return(db, &LogNotifier, entry.id, pool.accounts.admin.id, "broken").await?;
        assert!(matches!(
            request_return(db, &LogNotifier, entry.id, buyer, "broken").await,
            Err(Error::Conflict { .. })
        ));
        assert_eq!(pending_returns(db).await?.len(), 1);

        assert!(matches!(
            request_return(db, &LogNotifier, 999, buyer, "missing").await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_reject_is_terminal() -> Result<()> {
        let pool = setup_pool(3, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 100.0).await?;
        let entry = buy(&pool, 1).await?;
        let request = request_return(db, &LogNotifier, entry.id, buyer, "changed my mind").await?;

        assert!(matches!(
            reject(db, request.id, pool.accounts.admin.id).await,
            Err(Error::Forbidden { .. })
        ));

        let rejected = reject(db, request.id, pool.accounts.manager.id).await?;
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        assert_eq!(rejected.reviewer_id, Some(pool.accounts.manager.id));
        assert!(rejected.reviewed_at.is_some());

        assert!(matches!(
            approve(
                db,
                &LogNotifier,
                &LedgerSettings::default(),
                request.id,
                pool.accounts.manager.id
            )
            .await,
            Err(Error::Conflict { .. })
        ));
        assert!(matches!(
            reject(db, request.id, pool.accounts.manager.id).await,
            Err(Error::Conflict { .. })
        ));

        // Nothing moved
        assert_eq!(code_pool::count(db, pool.product.id, "1 month").await?, 2);
        assert_eq!(account::get_account(db, buyer).await?.balance, 80.0);
        assert_eq!(get_ledger_entry(db, entry.id).await?.amount, 20.0);

        // A fresh request is allowed once the old one is terminal
        request_return(db, &LogNotifier, entry.id, buyer, "second try").await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_second_approval_refunds_nothing() -> Result<()> {
        let pool = setup_pool(3, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        let manager = pool.accounts.manager.id;
        fund(db, buyer, 100.0).await?;
        let entry = buy(&pool, 2).await?;
        let request = request_return(db, &LogNotifier, entry.id, buyer, "faulty").await?;

        let settings = LedgerSettings::default();
        approve(db, &LogNotifier, &settings, request.id, manager).await?;
        let again = approve(db, &LogNotifier, &settings, request.id, manager).await;
        assert!(matches!(
            again,
            Err(Error::NotFound { .. } | Error::Conflict { .. })
        ));
        assert!(matches!(
            reject(db, request.id, manager).await,
            Err(Error::NotFound { .. } | Error::Conflict { .. })
        ));

        assert_eq!(code_pool::count(db, pool.product.id, "1 month").await?, 3);
        assert_eq!(account::get_account(db, buyer).await?.balance, 100.0);
        assert_eq!(purchase::history_for(db, buyer).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_approval_leaves_state_untouched() -> Result<()> {
        let pool = setup_pool(1, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 20.0).await?;
        let entry = buy(&pool, 1).await?;
        let request = request_return(db, &LogNotifier, entry.id, buyer, "duplicate").await?;

        // The same code gets stocked again before review
        stock_code(db, pool.product.id, "1 month", &entry.codes.0[0], 5.0).await?;

        let result = approve(
            db,
            &LogNotifier,
            &LedgerSettings::default(),
            request.id,
            pool.accounts.manager.id,
        )
        .await;
        assert!(matches!(result, Err(Error::Conflict { .. })));

        assert_eq!(get_ledger_entry(db, entry.id).await?.amount, 20.0);
        assert_eq!(account::get_account(db, buyer).await?.balance, 0.0);
        assert_eq!(code_pool::count(db, pool.product.id, "1 month").await?, 1);
        assert_eq!(pending_returns(db).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_reversal_entries_cannot_be_returned() -> Result<()> {
        let pool = setup_pool(1, 10.0).await?;
        let db = &pool.db;
        let buyer = pool.accounts.reseller.id;
        fund(db, buyer, 20.0).await?;
        let entry = buy(&pool, 1).await?;
        let request = request_return(db, &LogNotifier, entry.id, buyer, "faulty").await?;
        let refund = approve(
            db,
            &LogNotifier,
            &LedgerSettings::default(),
            request.id,
            pool.accounts.manager.id,
        )
        .await?;

        assert!(matches!(
            request_return(db, &LogNotifier, refund.reversal_entry.id, buyer, "again").await,
            Err(Error::Conflict { .. })
        ));

        Ok(())
    }
}
