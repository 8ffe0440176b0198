//! Authorization policy for every ledger operation.
//!
//! All role and hierarchy checks live in [`authorize`]; core operations call it
//! once they have loaded the actor and the account the action targets.

use crate::{
    entities::{Role, account},
    errors::{Error, Result},
};

/// Operations subject to authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Buy codes from the pool
    Purchase,
    /// File a return for a ledger entry; target is the entry's buyer
    RequestReturn,
    /// Approve or reject a return request
    ReviewReturn,
    /// Ask the tier above for credit
    SubmitDemande,
    /// Approve or reject a demande; target is the requester
    DecideDemande,
    /// Create, change or delete a resale price override
    SetPriceOverride,
}

/// Decides whether `actor` may perform `action` on `target`.
///
/// Inactive actors are denied everything. Actions that concern another account
/// (`RequestReturn`, `DecideDemande`) are denied when no target is given.
///
/// # Errors
/// Returns [`Error::Forbidden`] with a description of the rule that failed.
pub fn authorize(
    actor: &account::Model,
    action: Action,
    target: Option<&account::Model>,
) -> Result<()> {
    if !actor.is_active {
        return Err(Error::forbidden(format!(
            "account {} is inactive",
            actor.id
        )));
    }

    match action {
        Action::Purchase => require(
            matches!(actor.role, Role::Admin | Role::Reseller),
            "only admins and resellers can purchase codes",
        ),
        Action::RequestReturn => {
            let buyer = target.ok_or_else(|| Error::forbidden("return target is unknown"))?;
            let allowed = match actor.role {
                Role::Reseller => buyer.id == actor.id,
                Role::Admin => buyer.id == actor.id || supervises(actor, buyer),
                Role::AdminBoss | Role::Manager => true,
            };
            require(allowed, "you can only request returns for orders you can see")
        }
        Action::ReviewReturn => require(
            actor.role.is_top_tier(),
            "only managers can review returns",
        ),
        Action::SubmitDemande => require(
            matches!(actor.role, Role::Admin | Role::Reseller),
            "only admins and resellers can request balance",
        ),
        Action::DecideDemande => {
            let requester =
                target.ok_or_else(|| Error::forbidden("demande requester is unknown"))?;
            match actor.role {
                Role::Admin => require(
                    requester.role == Role::Reseller && supervises(actor, requester),
                    "admins can only decide their own resellers' requests",
                ),
                Role::Manager => require(
                    requester.role == Role::Admin,
                    "managers can only decide admin requests",
                ),
                Role::AdminBoss | Role::Reseller => {
                    Err(Error::forbidden("your role cannot decide balance requests"))
                }
            }
        }
        Action::SetPriceOverride => require(
            actor.role == Role::Admin,
            "only admins can set resale prices",
        ),
    }
}

fn supervises(actor: &account::Model, subordinate: &account::Model) -> bool {
    subordinate.supervisor_id == Some(actor.id)
}

fn require(allowed: bool, message: &str) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(Error::forbidden(message))
    }
}
