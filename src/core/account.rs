//! Account collaborator - Lookups, hierarchy and balance primitives.
//!
//! The balance primitives are single guarded `UPDATE` statements so a debit can
//! never pass its balance check against a stale read. They take any
//! `ConnectionTrait`, so callers run them inside their own transaction.

use crate::{
    entities::{Account, Role, Tier, account},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::debug;

/// Creates a new account with a zero balance.
///
/// The supervisor must sit exactly one level above: resellers report to an
/// admin, admins and admin bosses to a manager (or nobody), managers to nobody.
pub async fn create_account<C>(
    db: &C,
    name: &str,
    role: Role,
    tier: Tier,
    supervisor_id: Option<i64>,
) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    if name.trim().is_empty() {
        return Err(Error::invalid("Account name cannot be empty"));
    }

    let supervisor = match supervisor_id {
        Some(id) => Some(get_account(db, id).await?),
        None => None,
    };
    let valid_supervisor = match (role, supervisor.as_ref().map(|s| s.role)) {
        (Role::Reseller, Some(Role::Admin))
        | (Role::Admin | Role::AdminBoss, Some(Role::Manager) | None)
        | (Role::Manager, None) => true,
        _ => false,
    };
    if !valid_supervisor {
        return Err(Error::invalid(format!(
            "A {role:?} cannot report to {:?}",
            supervisor.map(|s| s.role)
        )));
    }

    let account = account::ActiveModel {
        name: Set(name.trim().to_string()),
        role: Set(role),
        tier: Set(tier),
        balance: Set(0.0),
        supervisor_id: Set(supervisor_id),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    account.insert(db).await.map_err(Into::into)
}

/// Loads an account, failing with `NotFound` when it does not exist.
pub async fn get_account<C>(db: &C, account_id: i64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("account", account_id))
}

/// Returns the supervising account, if any.
pub async fn supervisor_of<C>(db: &C, account_id: i64) -> Result<Option<account::Model>>
where
    C: ConnectionTrait,
{
    let account = get_account(db, account_id).await?;
    match account.supervisor_id {
        Some(id) => Account::find_by_id(id).one(db).await.map_err(Into::into),
        None => Ok(None),
    }
}

/// Lists the accounts directly supervised by `account_id`, ordered by name.
pub async fn subordinates_of<C>(db: &C, account_id: i64) -> Result<Vec<account::Model>>
where
    C: ConnectionTrait,
{
    Account::find()
        .filter(account::Column::SupervisorId.eq(account_id))
        .order_by_asc(account::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Enables or disables an account.
pub async fn set_active<C>(db: &C, account_id: i64, is_active: bool) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let mut account: account::ActiveModel = get_account(db, account_id).await?.into();
    account.is_active = Set(is_active);
    account.update(db).await.map_err(Into::into)
}

/// Subtracts `amount` from the balance if and only if the balance covers it.
///
/// Performs `UPDATE accounts SET balance = balance - amount WHERE id = ? AND
/// balance >= amount`; when no row matches the account is re-read to report
/// either `NotFound` or `InsufficientBalance`.
pub async fn debit<C>(db: &C, account_id: i64, amount: f64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;

    let result = Account::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).sub(amount),
        )
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Balance.gte(amount))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        let account = get_account(db, account_id).await?;
        return Err(Error::InsufficientBalance {
            current: account.balance,
            required: amount,
        });
    }

    debug!(account_id, amount, "Debited account");
    get_account(db, account_id).await
}

/// Adds `amount` to the balance.
pub async fn credit<C>(db: &C, account_id: i64, amount: f64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;

    let result = Account::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).add(amount),
        )
        .filter(account::Column::Id.eq(account_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Err(Error::not_found("account", account_id));
    }

    debug!(account_id, amount, "Credited account");
    get_account(db, account_id).await
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}
