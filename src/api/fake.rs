use super::model::{ApiCallsPage, ApiRecords, CallSummary, CallTranscript};
use super::CallSource;
use crate::error::{AppError, AppResult};
use crate::model::call::{CallMetadata, Utterance};
use crate::model::common::{CallId, DateRange};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorded {
    list_requests: usize,
    cursors: Vec<Option<String>>,
    extensive_batches: Vec<Vec<CallId>>,
    transcript_batches: Vec<Vec<CallId>>,
}

/// In-memory `CallSource`: pages are linked by `page-<n>` cursors, batch
/// endpoints answer from per-call maps.
#[derive(Default)]
pub struct FakeSource {
    pages: Vec<Vec<CallSummary>>,
    metadata: HashMap<CallId, CallMetadata>,
    transcripts: HashMap<CallId, Vec<Utterance>>,
    failing_list_page: Option<usize>,
    failing_transcript_batch: Option<usize>,
    cancel_on_batch: Option<(usize, CancellationToken)>,
    recorded: Mutex<Recorded>,
}

pub const STARTED: &str = "2025-04-07T10:00:00Z";

impl FakeSource {
    pub fn with_pages(pages: Vec<Vec<&str>>) -> Self {
        FakeSource {
            pages: pages
                .into_iter()
                .map(|ids| {
                    ids.into_iter()
                        .map(|id| CallSummary {
                            id: id.to_string(),
                            started: Some(STARTED.to_string()),
                            title: None,
                        })
                        .collect()
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, id: &str, raw: Value) -> Self {
        let meta: CallMetadata = serde_json::from_value(raw).expect("valid metadata fixture");
        self.metadata.insert(id.to_string(), meta);
        self
    }

    pub fn with_transcript(mut self, id: &str, raw: Value) -> Self {
        let utterances: Vec<Utterance> =
            serde_json::from_value(raw).expect("valid transcript fixture");
        self.transcripts.insert(id.to_string(), utterances);
        self
    }

    pub fn failing_list_page(mut self, page: usize) -> Self {
        self.failing_list_page = Some(page);
        self
    }

    pub fn failing_transcript_batch(mut self, batch: usize) -> Self {
        self.failing_transcript_batch = Some(batch);
        self
    }

    /// Cancels `token` while answering the transcript request of `batch`.
    pub fn cancelling_on_batch(mut self, batch: usize, token: CancellationToken) -> Self {
        self.cancel_on_batch = Some((batch, token));
        self
    }

    pub fn list_requests(&self) -> usize {
        self.recorded.lock().unwrap().list_requests
    }

    pub fn cursors_seen(&self) -> Vec<Option<String>> {
        self.recorded.lock().unwrap().cursors.clone()
    }

    pub fn extensive_batches(&self) -> Vec<Vec<CallId>> {
        self.recorded.lock().unwrap().extensive_batches.clone()
    }

    pub fn transcript_batches(&self) -> Vec<Vec<CallId>> {
        self.recorded.lock().unwrap().transcript_batches.clone()
    }
}

#[async_trait]
impl CallSource for FakeSource {
    async fn list_calls_page(
        &self,
        _range: &DateRange,
        cursor: Option<&str>,
    ) -> AppResult<ApiCallsPage> {
        let index = match cursor {
            None => 0,
            Some(c) => c
                .trim_start_matches("page-")
                .parse::<usize>()
                .map_err(|_| AppError::api_error(400, "bad cursor", "fake"))?,
        };
        {
            let mut rec = self.recorded.lock().unwrap();
            rec.list_requests += 1;
            rec.cursors.push(cursor.map(str::to_string));
        }
        if self.failing_list_page == Some(index + 1) {
            return Err(AppError::api_error(500, "boom", "fake"));
        }
        let calls = self.pages.get(index).cloned().unwrap_or_default();
        let cursor = (index + 1 < self.pages.len()).then(|| format!("page-{}", index + 1));
        Ok(ApiCallsPage {
            records: ApiRecords {
                cursor,
                ..Default::default()
            },
            calls,
        })
    }

    async fn extensive_batch(
        &self,
        ids: &[CallId],
        _range: &DateRange,
    ) -> AppResult<Vec<CallMetadata>> {
        self.recorded
            .lock()
            .unwrap()
            .extensive_batches
            .push(ids.to_vec());
        Ok(ids
            .iter()
            .filter_map(|id| self.metadata.get(id).cloned())
            .collect())
    }

    async fn transcript_batch(
        &self,
        ids: &[CallId],
        _range: &DateRange,
    ) -> AppResult<Vec<CallTranscript>> {
        let batch_num = {
            let mut rec = self.recorded.lock().unwrap();
            rec.transcript_batches.push(ids.to_vec());
            rec.transcript_batches.len()
        };
        if let Some((batch, token)) = &self.cancel_on_batch {
            if *batch == batch_num {
                token.cancel();
            }
        }
        if self.failing_transcript_batch == Some(batch_num) {
            return Err(AppError::api_error(503, "unavailable", "fake"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| {
                self.transcripts.get(id).map(|t| CallTranscript {
                    call_id: id.clone(),
                    transcript: t.clone(),
                })
            })
            .collect())
    }
}
