pub mod bank;
pub mod kiosk;

use async_trait::async_trait;
use crate::types::reading::SourceReading;

/// One remote rate source.
///
/// `fetch` never fails: implementations recover locally and report a
/// `SourceReading::Fallback` when no live value could be read.
#[async_trait]
pub trait RateConnector<T>: Send + Sync {
    async fn fetch(&self) -> SourceReading<T>;
    fn source_id(&self) -> &str;
}
