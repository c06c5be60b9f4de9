//! Usage accounting for provider calls.

pub mod ledger;
