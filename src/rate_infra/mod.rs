pub mod browser;
pub mod connectors;
pub mod aggregator;
