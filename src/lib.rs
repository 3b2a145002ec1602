pub mod types;
pub mod error;
pub mod config;
pub mod observability;
pub mod utils;
pub mod rate_infra;
pub mod ledger;
pub mod comparison;
pub mod core;
pub mod migrate;
pub mod api;
