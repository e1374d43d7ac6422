//! One publishing run: fetch, diff against the last output, and write the
//! augmented feed plus its change report when episodes changed.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::Config;
use crate::diff::{diff, EpisodeIndex};
use crate::feed::{augment, build_client, extract_episodes, fetch_feed, Episode};
use crate::report::{append_step_summary, write_commit_message, ChangeReport};
use crate::util::write_atomic;

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No episode was added or updated; nothing was written.
    Unchanged,
    /// Output feed and report artifacts were written.
    Published(ChangeReport),
    /// Changes were found but writing was disabled.
    DryRun(ChangeReport),
}

pub struct Publisher {
    config: Config,
    client: reqwest::Client,
    step_summary: Option<PathBuf>,
    dry_run: bool,
}

impl Publisher {
    /// Creates a publisher for `config`. The step-summary file is resolved
    /// from the environment once, here.
    pub fn new(config: Config) -> Result<Self> {
        let client = build_client(&config.user_agent).context("Failed to build HTTP client")?;
        let step_summary = config.step_summary_path();
        Ok(Self {
            config,
            client,
            step_summary,
            dry_run: false,
        })
    }

    /// Overrides the step-summary file resolved from the environment.
    pub fn with_step_summary(mut self, path: Option<PathBuf>) -> Self {
        self.step_summary = path;
        self
    }

    /// When set, [`run`](Self::run) computes everything but writes nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the pipeline once.
    ///
    /// # Errors
    ///
    /// Fetch failures, a malformed source feed, unreadable (but present)
    /// previous output, and write failures abort the run. Every artifact is
    /// computed before the first write.
    pub async fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;

        tracing::info!(url = %config.feed_url, "Fetching feed");
        let raw = fetch_feed(&self.client, &config.feed_url, config.request_timeout())
            .await
            .with_context(|| format!("Failed to fetch {}", config.feed_url))?;

        let new_episodes =
            extract_episodes(&raw).context("Fetched feed is not a valid RSS document")?;
        let existing = load_published_episodes(&config.output_path).await?;
        tracing::info!(
            new = new_episodes.len(),
            existing = existing.len(),
            "Comparing episodes"
        );

        let index = EpisodeIndex::from_episodes(existing);
        let changes = diff(&new_episodes, &index);

        let Some(report) = ChangeReport::from_diff(&changes) else {
            tracing::info!("No new or updated episodes");
            return Ok(RunOutcome::Unchanged);
        };

        let augmented =
            augment(&raw, &config.platform).context("Failed to add Spotify tags to feed")?;

        if self.dry_run {
            tracing::info!(title = %report.title, "Dry run, skipping writes");
            return Ok(RunOutcome::DryRun(report));
        }

        // Report first: the feed is the next run's baseline, so it only moves
        // once the report describing the move exists.
        write_commit_message(&config.commit_message_path, &report)?;
        if let Some(path) = &self.step_summary {
            append_step_summary(path, &report)?;
        }
        write_atomic(&config.output_path, augmented.as_bytes()).with_context(|| {
            format!("Failed to write feed to {}", config.output_path.display())
        })?;

        tracing::info!(
            path = %config.output_path.display(),
            added = changes.added.len(),
            updated = changes.updated.len(),
            "Feed published"
        );
        Ok(RunOutcome::Published(report))
    }
}

/// Reads the episodes of the previously published feed.
///
/// A missing file, or one that no longer parses, means "nothing published
/// yet": every fetched episode will be reported as new. Other I/O errors
/// are returned.
async fn load_published_episodes(path: &Path) -> Result<Vec<Episode>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No previous output, treating all episodes as new");
            return Ok(Vec::new());
        }
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            tracing::warn!(path = %path.display(), error = %e, "Previous output is not UTF-8, ignoring it");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read previous output {}", path.display()))
        }
    };

    match extract_episodes(&content) {
        Ok(episodes) => Ok(episodes),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Previous output is corrupt, ignoring it");
            Ok(Vec::new())
        }
    }
}
