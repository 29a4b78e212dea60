use super::client::ApiClient;
use super::model::{
    self, ApiCallsPage, ApiExtensiveResponse, ApiTranscriptResponse, CallSummary, CallTranscript,
};
use super::CallSource;
use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::call::CallMetadata;
use crate::model::common::{CallId, DateRange};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[async_trait]
impl CallSource for ApiClient {
    async fn list_calls_page(
        &self,
        range: &DateRange,
        cursor: Option<&str>,
    ) -> AppResult<ApiCallsPage> {
        let params = model::list_params(range, cursor);
        self.get(
            config::ENDPOINT_CALLS,
            &params,
            Duration::from_secs(config::LIST_TIMEOUT_SECONDS),
        )
        .await
    }

    async fn extensive_batch(
        &self,
        ids: &[CallId],
        range: &DateRange,
    ) -> AppResult<Vec<CallMetadata>> {
        let payload = model::extensive_payload(ids, range);
        let resp: ApiExtensiveResponse = self
            .post(
                config::ENDPOINT_EXTENSIVE,
                &payload,
                Duration::from_secs(config::BATCH_TIMEOUT_SECONDS),
            )
            .await?;
        Ok(resp.calls)
    }

    async fn transcript_batch(
        &self,
        ids: &[CallId],
        range: &DateRange,
    ) -> AppResult<Vec<CallTranscript>> {
        let payload = model::transcript_payload(ids, range);
        let resp: ApiTranscriptResponse = self
            .post(
                config::ENDPOINT_TRANSCRIPT,
                &payload,
                Duration::from_secs(config::BATCH_TIMEOUT_SECONDS),
            )
            .await?;
        Ok(resp.call_transcripts)
    }
}

/// Walks the call list cursor until a page comes back without one.
/// Cancellation is honoured before each page request.
pub async fn fetch_all_calls<S>(
    source: &S,
    range: &DateRange,
    page_delay: Duration,
    cancel: &CancellationToken,
) -> AppResult<Vec<CallSummary>>
where
    S: CallSource + ?Sized,
{
    let mut all_calls: Vec<CallSummary> = Vec::new();
    let mut seen: HashSet<CallId> = HashSet::new();
    let mut cursor: Option<String> = None;
    let mut current_page = 0usize;
    let ctx = format!("Call List [{} .. {}]", range.from, range.to);

    loop {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!(
                "call list fetch after {} page(s)",
                current_page
            )));
        }
        current_page += 1;

        let page = match source.list_calls_page(range, cursor.as_deref()).await {
            Ok(page) => page,
            Err(e) => {
                log(
                    LogLevel::Warning,
                    &format!("{} - Fetch FAIL Page {}: {}", ctx, current_page, e),
                );
                return Err(e);
            }
        };

        let next_cursor = page.next_cursor().map(str::to_string);
        let page_count = page.calls.len();
        let mut duplicates = 0usize;
        for call in page.calls {
            if seen.insert(call.id.clone()) {
                all_calls.push(call);
            } else {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            log(
                LogLevel::Warning,
                &format!(
                    "{} - Page {} repeated {} already-seen call id(s); skipped.",
                    ctx, current_page, duplicates
                ),
            );
        }

        log(
            LogLevel::Info,
            &format!(
                "{} - Page {}: {} call(s), {} so far.",
                ctx,
                current_page,
                page_count,
                all_calls.len()
            ),
        );

        match next_cursor {
            Some(c) => {
                cursor = Some(c);
                sleep(page_delay).await;
            }
            None => break,
        }
    }

    Ok(all_calls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::FakeSource;

    fn range() -> DateRange {
        DateRange::parse("2025-04-07", "2025-04-14").unwrap()
    }

    #[tokio::test]
    async fn follows_cursor_until_a_page_has_none() {
        let source = FakeSource::with_pages(vec![
            vec!["1", "2", "3"],
            vec!["4", "5"],
            vec!["6"],
        ]);
        let calls = fetch_all_calls(&source, &range(), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap();

        let ids: Vec<&str> = calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6"]);
        assert_eq!(source.list_requests(), 3);
        assert_eq!(
            source.cursors_seen(),
            vec![None, Some("page-1".to_string()), Some("page-2".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_first_page_without_cursor_ends_immediately() {
        let source = FakeSource::with_pages(vec![vec![]]);
        let calls = fetch_all_calls(&source, &range(), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap();
        assert!(calls.is_empty());
        assert_eq!(source.list_requests(), 1);
    }

    #[tokio::test]
    async fn repeated_ids_across_pages_are_kept_once() {
        let source = FakeSource::with_pages(vec![vec!["1", "2"], vec!["2", "3"]]);
        let calls = fetch_all_calls(&source, &range(), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn page_failure_aborts_the_fetch() {
        let source = FakeSource::with_pages(vec![vec!["1"], vec!["2"]]).failing_list_page(2);
        let err = fetch_all_calls(&source, &range(), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ApiError { status: 500, .. }));
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_the_first_request() {
        let source = FakeSource::with_pages(vec![vec!["1"]]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = fetch_all_calls(&source, &range(), Duration::ZERO, &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(source.list_requests(), 0);
    }
}
