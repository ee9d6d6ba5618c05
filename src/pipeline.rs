//! One end-to-end run: lock, load, fetch, merge, persist, filter, notify.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::filter::{select_unrecorded, Visibility};
use crate::guide::{fetch_episodes, FetchOptions, SearchApi};
use crate::lock::RunLock;
use crate::notify::{DispatchReport, Dispatcher, Reminder};
use crate::reconcile::reconcile;
use crate::storage::{Database, Episode};

/// Collaborators of a run. Built once by the binary, or by tests with
/// in-memory stand-ins.
pub struct RunContext<'a> {
    pub config: &'a Config,
    pub database: &'a Database,
    pub search: &'a dyn SearchApi,
    pub dispatcher: &'a Dispatcher,
    pub lock: &'a dyn RunLock,
    pub visibility: Visibility,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// Another run held the lock; nothing was read or written.
    Skipped,
    Completed(RunSummary),
}

#[derive(Debug)]
pub struct RunSummary {
    pub fetched: usize,
    pub stored: usize,
    /// Unrecorded episodes inside the horizon, in stored order.
    pub due: Vec<Episode>,
    /// `None` when nothing was due and no notification was attempted.
    pub notified: Option<DispatchReport>,
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Skipped => None,
            RunOutcome::Completed(summary) => Some(summary),
        }
    }
}

/// Perform one run at `now`.
///
/// The lock is held until this returns, whether it succeeds or not. A fetch
/// failure aborts before anything is written, so the stored list is either
/// the old one or the complete merged one.
///
/// # Errors
///
/// Lock I/O, database, fetch, and email failures. Chat webhook failures are
/// only logged.
pub async fn run_once(ctx: &RunContext<'_>, now: DateTime<Utc>) -> Result<RunOutcome> {
    let config = ctx.config;

    let Some(_guard) = ctx
        .lock
        .try_acquire(config.lock_timeout())
        .await
        .context("Failed to acquire run lock")?
    else {
        tracing::info!("Another run is in progress, skipping");
        return Ok(RunOutcome::Skipped);
    };

    let existing = ctx
        .database
        .load_episodes()
        .await
        .context("Failed to load stored episodes")?;

    let options = FetchOptions {
        keyword: config.keyword.clone(),
        channel: config.channel.clone(),
        max_pages: config.max_pages,
        page_delay: config.page_delay(),
        detail_base_url: config.detail_base_url.clone(),
    };
    let fetched = fetch_episodes(ctx.search, &options)
        .await
        .with_context(|| format!("Failed to fetch guide results for {:?}", config.keyword))?;
    let fetched_count = fetched.len();

    let merged = reconcile(existing, fetched);
    ctx.database
        .replace_episodes(&merged)
        .await
        .context("Failed to store merged episodes")?;
    tracing::info!(
        fetched = fetched_count,
        stored = merged.len(),
        "Episode list updated"
    );

    let due: Vec<Episode> = select_unrecorded(
        &merged,
        ctx.visibility.predicate(now),
        config.horizon_days,
        now,
    )
    .into_iter()
    .cloned()
    .collect();

    let notified = if due.is_empty() {
        tracing::info!("No unrecorded episodes airing soon");
        None
    } else {
        let refs: Vec<&Episode> = due.iter().collect();
        let reminder = Reminder::new(&refs, config.collection_url.as_deref());
        tracing::info!(count = due.len(), "Sending reminder");
        Some(
            ctx.dispatcher
                .dispatch(&reminder)
                .await
                .context("Failed to send reminder")?,
        )
    };

    Ok(RunOutcome::Completed(RunSummary {
        fetched: fetched_count,
        stored: merged.len(),
        due,
        notified,
    }))
}

/// Result of a recorded-flag edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Updated,
    UnknownTitle,
    /// A run holds the lock; its rewrite would discard the edit.
    Busy,
}

/// Set the recorded flag of `title` under the run lock.
///
/// A run rewrites the whole table from what it loaded before fetching, so
/// an edit made while a run is in flight would be lost. The edit is refused
/// instead.
///
/// # Errors
///
/// Lock I/O and database failures.
pub async fn mark_recorded(
    database: &Database,
    lock: &dyn RunLock,
    timeout: std::time::Duration,
    title: &str,
    recorded: bool,
) -> Result<MarkOutcome> {
    let Some(_guard) = lock
        .try_acquire(timeout)
        .await
        .context("Failed to acquire run lock")?
    else {
        tracing::info!(title = %title, "Run in progress, recorded flag not changed");
        return Ok(MarkOutcome::Busy);
    };

    let found = database
        .set_recorded(title, recorded)
        .await
        .context("Failed to update recorded flag")?;
    Ok(if found {
        MarkOutcome::Updated
    } else {
        MarkOutcome::UnknownTitle
    })
}
