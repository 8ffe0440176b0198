//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the ledger tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod account;
pub mod code;
pub mod demande;
pub mod duration_summary;
pub mod ledger_entry;
pub mod pending_transaction;
pub mod price_override;
pub mod product;
pub mod return_request;
pub mod review_status;
pub mod settled_transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel, Role, Tier};
pub use code::{Column as CodeColumn, Entity as Code, Model as CodeModel};
pub use demande::{Column as DemandeColumn, Entity as Demande, Model as DemandeModel};
pub use duration_summary::{
    Column as DurationSummaryColumn, Entity as DurationSummary, Model as DurationSummaryModel,
    SummaryStatus,
};
pub use ledger_entry::{
    CodeList, Column as LedgerEntryColumn, Entity as LedgerEntry, Model as LedgerEntryModel,
};
pub use pending_transaction::{
    Column as PendingTransactionColumn, Entity as PendingTransaction,
    Model as PendingTransactionModel,
};
pub use price_override::{
    Column as PriceOverrideColumn, Entity as PriceOverride, Model as PriceOverrideModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use return_request::{
    Column as ReturnRequestColumn, Entity as ReturnRequest, Model as ReturnRequestModel,
};
pub use review_status::ReviewStatus;
pub use settled_transaction::{
    Column as SettledTransactionColumn, Entity as SettledTransaction,
    Model as SettledTransactionModel,
};
