//! Core module - Framework-agnostic ledger operations.
//! Every function takes a SeaORM connection; operations that mutate more than one
//! row open their own transaction, primitives accept any `ConnectionTrait` so they
//! compose inside a caller's transaction.

pub mod account;
pub mod balance;
pub mod catalog;
pub mod code_pool;
pub mod duration_summary;
pub mod notify;
pub mod policy;
pub mod pricing;
pub mod purchase;
pub mod returns;
