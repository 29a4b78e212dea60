use crate::api::model::{CallSummary, CallTranscript};
use crate::api::CallSource;
use crate::config;
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use crate::model::call::{Affiliation, CallMetadata, JoinedCall, Utterance};
use crate::model::common::{iso_date, CallId, DateRange};
use std::collections::{HashMap, HashSet};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingPart {
    Metadata,
    Transcript,
    Both,
}

impl MissingPart {
    fn describe(self) -> &'static str {
        match self {
            MissingPart::Metadata => "no metadata",
            MissingPart::Transcript => "no transcript",
            MissingPart::Both => "no metadata or transcript",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedCall {
    pub call_id: CallId,
    pub missing: MissingPart,
}

#[derive(Debug, Default)]
pub struct BatchJoin {
    pub calls: Vec<JoinedCall>,
    pub dropped: Vec<DroppedCall>,
}

#[derive(Debug, Default)]
pub struct JoinOutcome {
    pub calls: Vec<JoinedCall>,
    pub dropped: Vec<DroppedCall>,
    pub batches: usize,
}

/// `<first 5 chars of id>_<YYYY-MM-DD>`. Not unique across calls that share
/// both prefix and date.
pub fn short_call_id(call_id: &str, started: Option<&str>) -> String {
    let date = match started.map(str::trim).filter(|s| !s.is_empty()) {
        None => config::UNKNOWN_DATE.to_string(),
        Some(raw) => iso_date(raw).unwrap_or_else(|| raw.chars().take(10).collect()),
    };
    let prefix: String = call_id.chars().take(config::SHORT_ID_PREFIX_LEN).collect();
    format!("{}_{}", prefix, date)
}

/// Rewrites `Unknown` affiliations to `External` and copies talk time from
/// `interaction.speakers`, matching a speaker entry's id against the
/// party's speaker id first and its party id second.
fn prepare_parties(meta: &mut CallMetadata) {
    let talk_times: HashMap<String, f64> = meta
        .interaction
        .speakers
        .iter()
        .filter_map(|s| Some((s.id.clone()?, s.talk_time?)))
        .collect();

    for party in meta.parties.iter_mut() {
        if party.affiliation == Affiliation::Unknown {
            party.affiliation = Affiliation::External;
        }
        let joined = party
            .speaker_id
            .as_ref()
            .and_then(|sid| talk_times.get(sid))
            .or_else(|| party.id.as_ref().and_then(|pid| talk_times.get(pid)))
            .copied();
        party.talk_time = joined.or(party.talk_time);
    }
}

fn build_joined_call(
    call_id: CallId,
    mut meta: CallMetadata,
    utterances: Vec<Utterance>,
    listed_start: Option<&str>,
) -> JoinedCall {
    prepare_parties(&mut meta);
    let started = meta.meta_data.started.as_deref().or(listed_start);
    let short_id = short_call_id(&call_id, started);
    JoinedCall::new(call_id, short_id, meta, utterances)
}

/// Pairs one batch's metadata with its transcripts. A call is kept only when
/// both responses contain it; output follows the batch order, with any
/// unrequested ids the responses returned appended after.
pub fn join_batch(
    batch: &[CallSummary],
    metadata: Vec<CallMetadata>,
    transcripts: Vec<CallTranscript>,
) -> BatchJoin {
    let mut order: Vec<CallId> = batch.iter().map(|c| c.id.clone()).collect();
    let mut queued: HashSet<CallId> = order.iter().cloned().collect();

    let mut meta_by_id: HashMap<CallId, CallMetadata> = HashMap::with_capacity(metadata.len());
    for meta in metadata {
        if let Some(id) = meta.meta_data.id.clone() {
            if queued.insert(id.clone()) {
                order.push(id.clone());
            }
            meta_by_id.insert(id, meta);
        }
    }

    let mut transcripts_by_id: HashMap<CallId, Vec<Utterance>> =
        HashMap::with_capacity(transcripts.len());
    for t in transcripts {
        if queued.insert(t.call_id.clone()) {
            order.push(t.call_id.clone());
        }
        transcripts_by_id.insert(t.call_id, t.transcript);
    }

    let listed_start: HashMap<&str, &str> = batch
        .iter()
        .filter_map(|c| Some((c.id.as_str(), c.started.as_deref()?)))
        .collect();

    let mut result = BatchJoin::default();
    for id in order {
        let missing = match (meta_by_id.remove(&id), transcripts_by_id.remove(&id)) {
            (Some(meta), Some(utterances)) => {
                let start = listed_start.get(id.as_str()).copied();
                result
                    .calls
                    .push(build_joined_call(id, meta, utterances, start));
                continue;
            }
            (Some(_), None) => MissingPart::Transcript,
            (None, Some(_)) => MissingPart::Metadata,
            (None, None) => MissingPart::Both,
        };
        result.dropped.push(DroppedCall {
            call_id: id,
            missing,
        });
    }
    result
}

/// Fetches metadata and transcripts batch by batch. Both requests of a batch
/// finish before the next batch starts; cancellation is checked between
/// batches only.
pub async fn fetch_joined_calls<S>(
    source: &S,
    summaries: &[CallSummary],
    range: &DateRange,
    batch_size: usize,
    cancel: &CancellationToken,
) -> AppResult<JoinOutcome>
where
    S: CallSource + ?Sized,
{
    let batch_size = batch_size.max(1);
    let total_batches = summaries.len().div_ceil(batch_size);
    let mut outcome = JoinOutcome::default();

    for (i, batch) in summaries.chunks(batch_size).enumerate() {
        let batch_num = i + 1;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!(
                "detail fetch before batch {}/{}",
                batch_num, total_batches
            )));
        }
        let batch_ctx = format!("Detail Batch {}/{}", batch_num, total_batches);
        let ids: Vec<CallId> = batch.iter().map(|c| c.id.clone()).collect();

        let metadata = source.extensive_batch(&ids, range).await.map_err(|e| {
            log(
                LogLevel::Warning,
                &format!("{} - Metadata fetch FAILED: {}", batch_ctx, e),
            );
            e
        })?;
        let transcripts = source.transcript_batch(&ids, range).await.map_err(|e| {
            log(
                LogLevel::Warning,
                &format!("{} - Transcript fetch FAILED: {}", batch_ctx, e),
            );
            e
        })?;

        let joined = join_batch(batch, metadata, transcripts);
        if !joined.dropped.is_empty() {
            let listing = joined
                .dropped
                .iter()
                .map(|d| format!("{} ({})", d.call_id, d.missing.describe()))
                .collect::<Vec<_>>()
                .join(", ");
            log(
                LogLevel::Warning,
                &format!(
                    "{} - Dropped {} call(s) without both parts: {}",
                    batch_ctx,
                    joined.dropped.len(),
                    listing
                ),
            );
        }

        outcome.calls.extend(joined.calls);
        outcome.dropped.extend(joined.dropped);
        outcome.batches += 1;

        log(
            LogLevel::Info,
            &format!(
                "{} - {} call(s) joined so far, {} dropped.",
                batch_ctx,
                outcome.calls.len(),
                outcome.dropped.len()
            ),
        );
    }

    Ok(outcome)
}
