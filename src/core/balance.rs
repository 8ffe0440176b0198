//! Balance ledger - Credit requests sent up the account hierarchy.
//!
//! A reseller asks its admin for credit, an admin asks a manager. Approval moves
//! the balance immediately; the resulting transaction goes to the settled log
//! when the request carried a proof of payment and to the pending log otherwise.

use crate::{
    config::settings::LedgerSettings,
    core::{
        account,
        notify::{self, DomainEvent, Notifier},
        policy::{self, Action},
    },
    entities::{
        Account, Demande, PendingTransaction, ReviewStatus, Role, SettledTransaction,
        account as account_entity, demande, pending_transaction, settled_transaction,
    },
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Decision on a pending demande
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Move the credit and log the transaction
    Approved,
    /// Record the refusal only
    Rejected,
}

impl From<Outcome> for ReviewStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Approved => Self::Approved,
            Outcome::Rejected => Self::Rejected,
        }
    }
}

/// Both transaction logs of one account
#[derive(Debug, Clone, Default)]
pub struct AccountTransactions {
    /// Transfers backed by a proof of payment
    pub settled: Vec<settled_transaction::Model>,
    /// Transfers still awaiting payment
    pub pending: Vec<pending_transaction::Model>,
}

/// Files a credit request.
///
/// Blank proofs count as no proof.
///
/// # Errors
/// - `InvalidAmount` for a non-positive amount, or a reseller request below the
///   configured floor
/// - `NotFound` when the requester does not exist
/// - `Forbidden` unless the requester is an active admin or reseller
#[instrument(skip(db, notifier, settings))]
pub async fn submit(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    settings: &LedgerSettings,
    requester_id: i64,
    amount: f64,
    proof: Option<String>,
) -> Result<demande::Model> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let requester = account::get_account(db, requester_id).await?;
    policy::authorize(&requester, Action::SubmitDemande, None)?;
    if requester.role == Role::Reseller && amount < settings.reseller_min_demande {
        return Err(Error::InvalidAmount { amount });
    }

    let demande = demande::ActiveModel {
        requester_id: Set(requester_id),
        amount: Set(amount),
        proof: Set(proof.filter(|p| !p.trim().is_empty())),
        status: Set(ReviewStatus::Pending),
        created_at: Set(chrono::Utc::now()),
        decided_at: Set(None),
        decider_id: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(demande_id = demande.id, requester_id, amount, "Demande submitted");
    notify::emit(
        notifier,
        DomainEvent::DemandeSubmitted {
            demande_id: demande.id,
            requester_id,
        },
    );

    Ok(demande)
}

/// Approves or rejects a pending demande.
///
/// An admin approving a reseller transfers credit from its own balance; a
/// manager approving an admin creates the credit. Rejection only records the
/// decision.
///
/// # Errors
/// - `NotFound` when the demande or an account does not exist
/// - `Forbidden` when the decider is not directly responsible for the requester
/// - `Conflict` when the demande was already decided
/// - `InsufficientBalance` when an approving admin cannot cover the amount
#[instrument(skip(db, notifier))]
pub async fn decide(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    demande_id: i64,
    decider_id: i64,
    outcome: Outcome,
) -> Result<demande::Model> {
    let txn = db.begin().await?;

    let demande = get_demande(&txn, demande_id).await?;
    let decider = account::get_account(&txn, decider_id).await?;
    let requester = account::get_account(&txn, demande.requester_id).await?;
    policy::authorize(&decider, Action::DecideDemande, Some(&requester))?;

    let status = ReviewStatus::from(outcome);
    let now = chrono::Utc::now();
    let updated = Demande::update_many()
        .col_expr(demande::Column::Status, Expr::value(status))
        .col_expr(demande::Column::DecidedAt, Expr::value(now))
        .col_expr(demande::Column::DeciderId, Expr::value(decider_id))
        .filter(demande::Column::Id.eq(demande_id))
        .filter(demande::Column::Status.eq(ReviewStatus::Pending))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(Error::conflict(format!(
            "Demande {demande_id} was already decided"
        )));
    }

    let mut moved = Vec::new();
    if outcome == Outcome::Approved {
        if decider.role == Role::Admin {
            account::debit(&txn, decider.id, demande.amount).await?;
            moved.push(decider.id);
        }
        account::credit(&txn, requester.id, demande.amount).await?;
        moved.push(requester.id);

        record_transaction(&txn, &demande, decider.id).await?;
    }

    let decided = get_demande(&txn, demande_id).await?;
    txn.commit().await?;

    info!(
        demande_id,
        decider_id,
        requester_id = requester.id,
        amount = demande.amount,
        ?outcome,
        "Demande decided"
    );
    for account_id in moved {
        notify::emit(notifier, DomainEvent::BalanceChanged { account_id });
    }
    notify::emit(notifier, DomainEvent::DemandeDecided { demande_id, status });

    Ok(decided)
}

async fn record_transaction<C>(db: &C, demande: &demande::Model, decider_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();
    match &demande.proof {
        Some(proof) => {
            settled_transaction::ActiveModel {
                demande_id: Set(demande.id),
                from_id: Set(decider_id),
                to_id: Set(demande.requester_id),
                amount: Set(demande.amount),
                proof: Set(proof.clone()),
                created_at: Set(now),
                settled_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
        None => {
            pending_transaction::ActiveModel {
                demande_id: Set(demande.id),
                from_id: Set(decider_id),
                to_id: Set(demande.requester_id),
                amount: Set(demande.amount),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }
    Ok(())
}

/// Loads a demande, failing with `NotFound` when it does not exist.
pub async fn get_demande<C>(db: &C, demande_id: i64) -> Result<demande::Model>
where
    C: ConnectionTrait,
{
    Demande::find_by_id(demande_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("demande", demande_id))
}

/// Pending demandes the account is responsible for deciding, oldest first.
///
/// Admins see their own resellers' requests, managers see every admin request.
/// Other roles decide nothing.
pub async fn pending_for<C>(db: &C, decider_id: i64) -> Result<Vec<demande::Model>>
where
    C: ConnectionTrait,
{
    let decider = account::get_account(db, decider_id).await?;
    let requesters = match decider.role {
        Role::Admin => Account::find()
            .filter(account_entity::Column::SupervisorId.eq(decider_id))
            .filter(account_entity::Column::Role.eq(Role::Reseller)),
        Role::Manager => Account::find().filter(account_entity::Column::Role.eq(Role::Admin)),
        Role::AdminBoss | Role::Reseller => return Ok(Vec::new()),
    };
    let requester_ids: Vec<i64> = requesters
        .select_only()
        .column(account_entity::Column::Id)
        .into_tuple()
        .all(db)
        .await?;

    Demande::find()
        .filter(demande::Column::Status.eq(ReviewStatus::Pending))
        .filter(demande::Column::RequesterId.is_in(requester_ids))
        .order_by_asc(demande::Column::CreatedAt)
        .order_by_asc(demande::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of demandes waiting on the account's decision.
pub async fn pending_count_for<C>(db: &C, decider_id: i64) -> Result<usize>
where
    C: ConnectionTrait,
{
    Ok(pending_for(db, decider_id).await?.len())
}

/// The requester's demandes decided at or after `since`, newest first.
pub async fn recent_decisions<C>(
    db: &C,
    requester_id: i64,
    since: DateTimeUtc,
) -> Result<Vec<demande::Model>>
where
    C: ConnectionTrait,
{
    Demande::find()
        .filter(demande::Column::RequesterId.eq(requester_id))
        .filter(demande::Column::Status.ne(ReviewStatus::Pending))
        .filter(demande::Column::DecidedAt.gte(since))
        .order_by_desc(demande::Column::DecidedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Both transaction logs where the account is sender or receiver, newest first.
pub async fn transactions_for<C>(db: &C, account_id: i64) -> Result<AccountTransactions>
where
    C: ConnectionTrait,
{
    let settled = SettledTransaction::find()
        .filter(
            Condition::any()
                .add(settled_transaction::Column::FromId.eq(account_id))
                .add(settled_transaction::Column::ToId.eq(account_id)),
        )
        .order_by_desc(settled_transaction::Column::SettledAt)
        .all(db)
        .await?;

    let pending = PendingTransaction::find()
        .filter(
            Condition::any()
                .add(pending_transaction::Column::FromId.eq(account_id))
                .add(pending_transaction::Column::ToId.eq(account_id)),
        )
        .order_by_desc(pending_transaction::Column::CreatedAt)
        .all(db)
        .await?;

    Ok(AccountTransactions { settled, pending })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::notify::{ChannelNotifier, LogNotifier};
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_admin_approval_transfers_credit() -> Result<()> {
        let fixture = setup_hierarchy().await?;
        let db = &fixture.db;
        let (admin, reseller) = (fixture.admin.id, fixture.reseller.id);
        fund(db, admin, 200.0).await?;

        let settings = LedgerSettings::default();
        let demande = submit(db, &LogNotifier, &settings, reseller, 150.0, None).await?;
        assert_eq!(demande.status, ReviewStatus::Pending);
        assert_eq!(pending_count_for(db, admin).await?, 1);

        let notifier = ChannelNotifier::new(8);
        let mut events = notifier.subscribe();
        let decided = decide(db, &notifier, demande.id, admin, Outcome::Approved).await?;
        assert_eq!(decided.status, ReviewStatus::Approved);
        assert_eq!(decided.decider_id, Some(admin));
        assert!(decided.decided_at.is_some());

        let admin_after = account::get_account(db, admin).await?;
        let reseller_after = account::get_account(db, reseller).await?;
        assert_eq!(admin_after.balance, 50.0);
        assert_eq!(reseller_after.balance, 150.0);
        assert_eq!(admin_after.balance + reseller_after.balance, 200.0);

        let logs = transactions_for(db, reseller).await?;
        assert!(logs.settled.is_empty());
        assert_eq!(logs.pending.len(), 1);
        assert_eq!(logs.pending[0].from_id, admin);
        assert_eq!(logs.pending[0].amount, 150.0);
        assert_eq!(transactions_for(db, admin).await?.pending.len(), 1);

        assert_eq!(
            events.recv().await.unwrap(),
            DomainEvent::BalanceChanged { account_id: admin }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DomainEvent::BalanceChanged {
                account_id: reseller
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DomainEvent::DemandeDecided {
                demande_id: demande.id,
                status: ReviewStatus::Approved
            }
        );
        assert_eq!(pending_count_for(db, admin).await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_manager_approval_mints_credit() -> Result<()> {
        let fixture = setup_hierarchy().await?;
        let db = &fixture.db;
        let (manager, admin) = (fixture.manager.id, fixture.admin.id);

        let demande = submit(
            db,
            &LogNotifier,
            &LedgerSettings::default(),
            admin,
            500.0,
            Some("receipts/march.png".to_string()),
        )
        .await?;
        assert_eq!(pending_count_for(db, manager).await?, 1);

        decide(db, &LogNotifier, demande.id, manager, Outcome::Approved).await?;

        assert_eq!(account::get_account(db, admin).await?.balance, 500.0);
        assert_eq!(account::get_account(db, manager).await?.balance, 0.0);

        let logs = transactions_for(db, admin).await?;
        assert_eq!(logs.settled.len(), 1);
        assert_eq!(logs.settled[0].proof, "receipts/march.png");
        assert!(logs.pending.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_submit_validation() -> Result<()> {
        let fixture = setup_hierarchy().await?;
        let db = &fixture.db;
        let settings = LedgerSettings::default();

        for amount in [0.0, -10.0, f64::NAN] {
            assert!(matches!(
                submit(db, &LogNotifier, &settings, fixture.admin.id, amount, None).await,
                Err(Error::InvalidAmount { .. })
            ));
        }

        // Resellers have a floor, admins do not
        assert!(matches!(
            submit(db, &LogNotifier, &settings, fixture.reseller.id, 100.0, None).await,
            Err(Error::InvalidAmount { amount: 100.0 })
        ));
        submit(db, &LogNotifier, &settings, fixture.admin.id, 100.0, None).await?;

        assert!(matches!(
            submit(db, &LogNotifier, &settings, fixture.manager.id, 500.0, None).await,
            Err(Error::Forbidden { .. })
        ));

        let blank = submit(
            db,
            &LogNotifier,
            &settings,
            fixture.reseller.id,
            150.0,
            Some("  ".to_string()),
        )
        .await?;
        assert!(blank.proof.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_decide_authorization_and_state() -> Result<()> {
        let fixture = setup_hierarchy().await?;
        let db = &fixture.db;
        let settings = LedgerSettings::default();
        let demande = submit(db, &LogNotifier, &settings, fixture.reseller.id, 150.0, None).await?;

        // Managers do not decide reseller requests, other admins neither
        assert!(matches!(
            decide(db, &LogNotifier, demande.id, fixture.manager.id, Outcome::Approved).await,
            Err(Error::Forbidden { .. })
        ));
        let other_admin = create_admin(db, fixture.manager.id, "Other admin").await?;
        assert!(matches!(
            decide(db, &LogNotifier, demande.id, other_admin.id, Outcome::Approved).await,
            Err(Error::Forbidden { .. })
        ));

        // The admin cannot cover the amount: nothing changes
        assert!(matches!(
            decide(db, &LogNotifier, demande.id, fixture.admin.id, Outcome::Approved).await,
            Err(Error::InsufficientBalance { .. })
        ));
        assert_eq!(get_demande(db, demande.id).await?.status, ReviewStatus::Pending);
        assert_eq!(account::get_account(db, fixture.reseller.id).await?.balance, 0.0);

        let rejected =
            decide(db, &LogNotifier, demande.id, fixture.admin.id, Outcome::Rejected).await?;
        assert_eq!(rejected.status, ReviewStatus::Rejected);
        let logs = transactions_for(db, fixture.reseller.id).await?;
        assert!(logs.settled.is_empty() && logs.pending.is_empty());

        assert!(matches!(
            decide(db, &LogNotifier, demande.id, fixture.admin.id, Outcome::Approved).await,
            Err(Error::Conflict { .. })
        ));
        assert!(matches!(
            decide(db, &LogNotifier, 999, fixture.admin.id, Outcome::Approved).await,
            Err(Error::NotFound { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_recent_decisions() -> Result<()> {
        let fixture = setup_hierarchy().await?;
        let db = &fixture.db;
        let settings = LedgerSettings::default();
        let since = chrono::Utc::now() - chrono::Duration::hours(1);

        let first = submit(db, &LogNotifier, &settings, fixture.admin.id, 50.0, None).await?;
        submit(db, &LogNotifier, &settings, fixture.admin.id, 70.0, None).await?;
        decide(db, &LogNotifier, first.id, fixture.manager.id, Outcome::Rejected).await?;

        let recent = recent_decisions(db, fixture.admin.id, since).await?;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, first.id);

        let later = chrono::Utc::now() + chrono::Duration::hours(1);
        assert!(recent_decisions(db, fixture.admin.id, later).await?.is_empty());

        Ok(())
    }
}
