//! Donation ledger: donors give to organizations, organizations request
//! withdrawals that are allocated FIFO against received donations, and admins
//! verify organizations and approve or reject withdrawals.
//!
//! State lives in an embedded sled database. Every money-moving call takes a
//! row lock on the organization and runs in a single sled transaction, so the
//! balance check and the writes that consume that balance are never split.

pub mod allocator;
pub mod balance;
pub mod clock;
pub mod config;
pub mod donation;
pub mod error;
pub mod locks;
pub mod records;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;
pub mod verification;
pub mod withdrawal;

pub use error::{LedgerError, LedgerResult};
pub use service::LedgerService;
