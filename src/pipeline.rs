use anyhow::Result;
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::db::{self, NewPost};
use crate::error::DocumentError;
use crate::extract;
use crate::locator::{self, Candidate};
use crate::source::DocumentSource;
use crate::summarizer::SummaryProvider;

const FALLBACK_TITLE: &str = "Ohne Titel";

#[derive(Debug, Default)]
pub struct BatchStats {
    /// Dates probed before the batch stopped.
    pub probed: usize,
    /// Dates with no published bulletin.
    pub skipped: usize,
    pub ok: usize,
    pub failed: usize,
}

/// Drives one bulletin from dated candidate to committed post:
/// probe → fetch-or-cache → extract → summarize → enrich → commit.
/// Source and provider are injected; nothing here knows about HTTP shapes
/// or model response formats.
pub struct Pipeline<'a, S, P> {
    conn: &'a Connection,
    source: S,
    provider: P,
    cfg: PipelineConfig,
}

impl<'a, S: DocumentSource, P: SummaryProvider> Pipeline<'a, S, P> {
    pub fn new(conn: &'a Connection, source: S, provider: P, cfg: PipelineConfig) -> Self {
        Self {
            conn,
            source,
            provider,
            cfg,
        }
    }

    /// Walk the backward date window, processing each published bulletin
    /// until `target_count` have been ingested or the window is exhausted.
    /// A failed document is logged and never stops the scan.
    pub async fn run_batch(
        &self,
        start_date: NaiveDate,
        lookback_days: u32,
        target_count: usize,
    ) -> Result<BatchStats> {
        let allowed_tags = db::hashtag_names(self.conn)?;
        let window = locator::candidates(&self.cfg.base_url, start_date, lookback_days);

        let pb = ProgressBar::new(window.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} days")?
                .progress_chars("=> "),
        );

        let mut stats = BatchStats::default();
        for candidate in &window {
            stats.probed += 1;
            pb.inc(1);

            match self.source.exists(&candidate.url).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(date = %candidate.date, "no bulletin published");
                    stats.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(date = %candidate.date, "probe failed: {e}");
                    stats.failed += 1;
                    continue;
                }
            }

            match self.process(candidate, &allowed_tags).await {
                Ok(post_id) => {
                    info!(date = %candidate.date, post_id, "bulletin ingested");
                    stats.ok += 1;
                    if stats.ok >= target_count {
                        break;
                    }
                }
                Err(e) => {
                    warn!(date = %candidate.date, "bulletin failed: {e}");
                    stats.failed += 1;
                }
            }
        }
        pb.finish_and_clear();

        if stats.ok == 0 {
            info!("no bulletin found in the last {} days", lookback_days);
        }
        Ok(stats)
    }

    /// Full state machine for one confirmed candidate. Glossary and image
    /// are best-effort; extraction, summarization, and commit are not.
    async fn process(
        &self,
        candidate: &Candidate,
        allowed_tags: &[String],
    ) -> Result<i64, DocumentError> {
        let bytes = self.fetch_or_cached(candidate).await?;
        let text = extract::extract_text(&bytes, self.cfg.max_chars)?;

        let summary = self
            .provider
            .summarize(&text, allowed_tags, self.cfg.max_summary_words)
            .await?;

        let glossary = match self
            .provider
            .glossary(&summary.summary, self.cfg.max_glossary_entries)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(date = %candidate.date, "glossary generation failed, continuing without: {e}");
                Vec::new()
            }
        };

        let image = match self.provider.illustrate(&summary.kids_summary).await {
            Ok(image) => image,
            Err(e) => {
                warn!(date = %candidate.date, "illustration failed, continuing without: {e}");
                None
            }
        };

        let title = if summary.title.is_empty() {
            FALLBACK_TITLE.to_string()
        } else {
            summary.title
        };
        let post = NewPost {
            title,
            url: candidate.url.clone(),
            summary: summary.summary,
            kids_summary: summary.kids_summary,
            image,
            created_at: candidate.date.format("%Y-%m-%d").to_string(),
        };

        Ok(db::commit_post(self.conn, &post, &glossary, &summary.hashtags)?)
    }

    /// Raw bytes for a candidate. Cached bytes are immutable and are never
    /// re-fetched; a miss fetches once and writes the cache entry.
    async fn fetch_or_cached(&self, candidate: &Candidate) -> Result<Vec<u8>, DocumentError> {
        let path = self
            .cfg
            .cache_dir
            .join(locator::cache_filename(&candidate.url));
        if path.exists() {
            debug!(path = %path.display(), "cache hit, skipping fetch");
            return std::fs::read(&path).map_err(|source| DocumentError::Cache { path, source });
        }

        let bytes = self.source.fetch(&candidate.url).await?;
        std::fs::create_dir_all(&self.cfg.cache_dir)
            .and_then(|_| std::fs::write(&path, &bytes))
            .map_err(|source| DocumentError::Cache { path, source })?;
        Ok(bytes)
    }
}
