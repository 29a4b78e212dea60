pub mod client;
pub mod fetchers;
pub mod model;

use crate::error::AppResult;
use crate::model::call::CallMetadata;
use crate::model::common::{CallId, DateRange};
use async_trait::async_trait;
use model::{ApiCallsPage, CallTranscript};

/// The three remote capabilities the pipeline consumes. `ApiClient`
/// implements it against the HTTP API; tests drive the pipeline with an
/// in-memory source.
#[async_trait]
pub trait CallSource: Send + Sync {
    async fn list_calls_page(&self, range: &DateRange, cursor: Option<&str>)
        -> AppResult<ApiCallsPage>;

    async fn extensive_batch(&self, ids: &[CallId], range: &DateRange)
        -> AppResult<Vec<CallMetadata>>;

    async fn transcript_batch(&self, ids: &[CallId], range: &DateRange)
        -> AppResult<Vec<CallTranscript>>;
}

#[cfg(test)]
pub mod fake;
