//! Per-lead orchestration and the batch loop.
//!
//! Each lead moves through fetch, extraction, pain analysis, composition,
//! and send, ending in exactly one terminal outcome. Every newly-processed
//! lead produces exactly one outreach log row; leads whose URL already has
//! a row are skipped without writing another. No per-lead failure can abort
//! the batch.

use std::path::Path;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::compose::{self, ComposeContext};
use crate::config::AppConfig;
use crate::contacts;
use crate::discover::Lead;
use crate::fetch::PageFetcher;
use crate::history::HistoryStore;
use crate::llm::LlmClient;
use crate::outreach_log::{LogEntry, LogStatus, OutreachLog};
use crate::pain::PainAnalyzer;
use crate::send::EmailSender;

/// Terminal state of one lead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadOutcome {
    /// URL already had a log row; nothing was done
    Skipped,
    FetchFailed,
    NoEmailFound,
    Sent,
    SendFailed,
}

/// Counts for one batch
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub total: usize,
    pub skipped: usize,
    pub fetch_failed: usize,
    pub no_email: usize,
    pub sent: usize,
    pub send_failed: usize,
}

impl RunStats {
    pub fn count(&mut self, outcome: LeadOutcome) {
        self.total += 1;
        match outcome {
            LeadOutcome::Skipped => self.skipped += 1,
            LeadOutcome::FetchFailed => self.fetch_failed += 1,
            LeadOutcome::NoEmailFound => self.no_email += 1,
            LeadOutcome::Sent => self.sent += 1,
            LeadOutcome::SendFailed => self.send_failed += 1,
        }
    }
}

pub struct Pipeline {
    config: AppConfig,
    fetcher: PageFetcher,
    analyzer: PainAnalyzer,
    sender: EmailSender,
    log: OutreachLog,
    history: HistoryStore,
    llm: Option<LlmClient>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        dry_run: bool,
        use_browser: bool,
        log_path: &Path,
        history_path: &Path,
    ) -> Result<Self> {
        let fetcher = PageFetcher::new(config, use_browser).context("Failed to build fetcher")?;

        let llm = if config.compose.use_llm {
            match config.credentials.openai_api_key() {
                Some(key) => Some(LlmClient::new(key, &config.compose.model)),
                None => {
                    warn!("compose.use_llm is set but no API key is configured; drafts stay template-based");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            config: config.clone(),
            fetcher,
            analyzer: PainAnalyzer::new(&config.pain),
            sender: EmailSender::new(&config.sender, dry_run),
            log: OutreachLog::new(log_path),
            history: HistoryStore::new(history_path),
            llm,
        })
    }

    /// Process one lead to a terminal outcome, writing its log row.
    pub async fn process_lead(&self, lead: &Lead) -> Result<LeadOutcome> {
        if self.log.already_processed(&lead.url) {
            debug!("Skipping {} (already in outreach log)", lead.url);
            return Ok(LeadOutcome::Skipped);
        }

        let page = self.fetcher.fetch(&lead.url).await;
        if page.is_empty() {
            self.log.record(&LogEntry::new(
                &lead.url,
                lead.contact.as_deref().unwrap_or_default(),
                "",
                LogStatus::FetchFailed,
            ))?;
            return Ok(LeadOutcome::FetchFailed);
        }

        let contact_set = contacts::extract(&page.html, Some(&page.final_url));
        let pains = self.analyzer.analyze_with_llm(&page, self.llm.as_ref()).await;

        let Some(email) = contact_set.primary_email().map(str::to_string) else {
            info!("No email found on {}", lead.url);
            self.log.record(&LogEntry::new(
                &lead.url,
                lead.contact.as_deref().unwrap_or_default(),
                "",
                LogStatus::NoEmail,
            ))?;
            return Ok(LeadOutcome::NoEmailFound);
        };

        let ctx = ComposeContext {
            title: lead.title.clone(),
            category: lead.category.clone(),
            domain: lead.domain(),
            pain_text: ComposeContext::pain_text_from(&pains),
        };

        let mut draft = compose::compose(&ctx, &self.config.sender)?;
        if let Some(llm) = &self.llm {
            draft = compose::personalize(&draft, &ctx, &self.config.sender, llm).await;
        }

        match self.sender.send(&email, &draft).await {
            Ok(()) => {
                self.log.record(&LogEntry::new(
                    &lead.url,
                    &email,
                    &draft.subject,
                    LogStatus::SentSuccessfully,
                ))?;
                Ok(LeadOutcome::Sent)
            }
            Err(e) => {
                warn!("Send failed for {}: {}", lead.url, e);
                self.log.record(&LogEntry::new(
                    &lead.url,
                    &email,
                    &draft.subject,
                    LogStatus::SendFailed,
                ))?;
                Ok(LeadOutcome::SendFailed)
            }
        }
    }

    /// Run the batch: every lead reaches a terminal outcome, per-lead errors
    /// are logged and swallowed, one history entry summarizes the run.
    pub async fn run(&self, leads: &[Lead], summary: &str) -> Result<RunStats> {
        let mut stats = RunStats::default();

        let progress = ProgressBar::new(leads.len() as u64);
        progress.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );

        for lead in leads {
            progress.set_message(lead.domain());

            // Discovery and file loading both guarantee this, but a log row
            // with a bogus URL would poison dedup forever
            if lead.url.is_empty()
                || !(lead.url.starts_with("http://") || lead.url.starts_with("https://"))
            {
                warn!("Skipping lead with invalid URL: {:?}", lead.url);
                progress.inc(1);
                continue;
            }

            match self.process_lead(lead).await {
                Ok(outcome) => {
                    debug!("{} -> {:?}", lead.url, outcome);
                    stats.count(outcome);
                }
                Err(e) => {
                    error!("Lead {} failed: {}", lead.url, e);
                    stats.total += 1;
                }
            }

            progress.inc(1);

            tokio::time::sleep(std::time::Duration::from_millis(
                self.config.pipeline.lead_delay_ms,
            ))
            .await;
        }

        progress.finish_with_message("done");

        let details = serde_json::json!({
            "leads": stats.total,
            "sent": stats.sent,
            "skipped": stats.skipped,
            "fetch_failed": stats.fetch_failed,
            "no_email": stats.no_email,
            "send_failed": stats.send_failed,
            "dry_run": self.sender.is_dry_run(),
        });
        self.history
            .append_run(summary, details)
            .context("Failed to append run history")?;

        info!(
            "Batch finished: {} leads, {} sent, {} skipped, {} fetch failures, {} without email, {} send failures",
            stats.total, stats.sent, stats.skipped, stats.fetch_failed, stats.no_email, stats.send_failed
        );

        Ok(stats)
    }

    /// Recent runs, newest first
    pub fn recent_runs(&self, n: usize) -> Vec<crate::history::HistoryEntry> {
        self.history.last_runs(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let mut stats = RunStats::default();
        stats.count(LeadOutcome::Sent);
        stats.count(LeadOutcome::Sent);
        stats.count(LeadOutcome::Skipped);
        stats.count(LeadOutcome::FetchFailed);
        stats.count(LeadOutcome::NoEmailFound);
        stats.count(LeadOutcome::SendFailed);

        assert_eq!(stats.total, 6);
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.fetch_failed, 1);
        assert_eq!(stats.no_email, 1);
        assert_eq!(stats.send_failed, 1);
    }
}
