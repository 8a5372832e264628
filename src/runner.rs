//! One scheduled run: fetch a fresh snapshot, decide, apply.
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::engine::{self, Decision, DecisionContext, Outcome, RejectReason};
use crate::model::VideoRecord;
use crate::youtube::VideoService;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("fetch failed while {step}: {source}")]
    Fetch {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("no recent videos returned by the uploads listing or metadata fetch")]
    NoVideos,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub max_results: u32,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub evaluated: usize,
    pub accepted: usize,
    pub updated: usize,
    pub failed: usize,
    pub dropped: usize,
}

impl RunSummary {
    pub fn log(&self) {
        info!(
            evaluated = self.evaluated,
            accepted = self.accepted,
            updated = self.updated,
            failed = self.failed,
            dropped = self.dropped,
            "run finished: {} evaluated, {} updated",
            self.evaluated,
            self.updated
        );
    }
}

fn fetch_err(step: &'static str) -> impl FnOnce(anyhow::Error) -> RunError {
    move |source| RunError::Fetch { step, source }
}

/// Pull the most recent uploads and convert them into records. Items that
/// fail validation are dropped with a warning and counted.
pub async fn fetch_records(
    service: &dyn VideoService,
    max_results: u32,
) -> Result<(Vec<VideoRecord>, usize), RunError> {
    let playlist_id = service
        .uploads_playlist_id()
        .await
        .map_err(fetch_err("resolving uploads playlist"))?;
    info!(%playlist_id, "resolved uploads playlist");

    let ids = service
        .recent_video_ids(&playlist_id, max_results)
        .await
        .map_err(fetch_err("listing recent uploads"))?;
    if ids.is_empty() {
        return Err(RunError::NoVideos);
    }

    let items = service
        .videos(&ids)
        .await
        .map_err(fetch_err("fetching video metadata"))?;
    if items.is_empty() {
        return Err(RunError::NoVideos);
    }

    let mut records = Vec::with_capacity(items.len());
    let mut dropped = 0;
    for item in items {
        match VideoRecord::try_from(item) {
            Ok(rec) => records.push(rec),
            Err(err) => {
                warn!(video_id = err.video_id(), %err, "dropping invalid video record");
                dropped += 1;
            }
        }
    }
    Ok((records, dropped))
}

fn log_decision(decision: &Decision) {
    let age_minutes = format!("{:.1}", decision.age_minutes());
    match decision.outcome {
        Outcome::Rejected(RejectReason::TooNew { remaining }) => info!(
            video_id = %decision.video_id,
            privacy = decision.privacy.as_str(),
            outcome = decision.outcome.label(),
            reason = decision.outcome.as_str(),
            %age_minutes,
            wait_minutes = %format!("{:.1}", engine::minutes(remaining)),
            "decision"
        ),
        outcome => info!(
            video_id = %decision.video_id,
            privacy = decision.privacy.as_str(),
            outcome = outcome.label(),
            reason = outcome.as_str(),
            %age_minutes,
            "decision"
        ),
    }
}

/// Execute one run against `service`. Only fetch-level failures abort;
/// a failed update is logged and the remaining instructions still run.
#[instrument(skip_all, fields(now = %ctx.now, dry_run = opts.dry_run))]
pub async fn run<F>(
    service: &dyn VideoService,
    ctx: &DecisionContext,
    title_fn: F,
    opts: RunOptions,
) -> Result<RunSummary, RunError>
where
    F: Fn(&str) -> String,
{
    let (records, dropped) = fetch_records(service, opts.max_results).await?;
    let eval = engine::evaluate(&records, ctx, title_fn);
    eval.decisions.iter().for_each(log_decision);

    let mut summary = RunSummary {
        evaluated: records.len(),
        accepted: eval.accepted(),
        dropped,
        ..Default::default()
    };

    if eval.instructions.is_empty() {
        info!("no videos met the update criteria");
    }

    for ins in &eval.instructions {
        if opts.dry_run {
            info!(video_id = %ins.video_id, new_title = %ins.title, "dry run: would update");
            continue;
        }
        match service.update_video(ins).await {
            Ok(()) => {
                summary.updated += 1;
                info!(video_id = %ins.video_id, new_title = %ins.title, "updated video");
            }
            Err(err) => {
                summary.failed += 1;
                error!(video_id = %ins.video_id, error = ?err, "failed to update video");
            }
        }
    }

    Ok(summary)
}
