//! Per-entry summaries laid out as a CSV report

use std::{path::Path, time::Duration};

use ask_llm::{Client as LlmClient, Conversation, Model, Role};
use async_trait::async_trait;
use color_eyre::{Result, eyre::eyre};
use futures::{StreamExt as _, stream};
use v_utils::{elog, log};

use crate::StudentSubmissionData;

pub const NO_CONTENT_SUMMARY: &str = "Content unsuitable for summary";
pub const FAILED_SUMMARY: &str = "Error generating summary";

#[async_trait]
pub trait Summarize: Send + Sync {
	async fn summarize(&self, content: &str) -> Result<String>;
}

/// Summaries from the language model
pub struct LlmSummarizer;

#[async_trait]
impl Summarize for LlmSummarizer {
	async fn summarize(&self, content: &str) -> Result<String> {
		let prompt = format!("Please summarize the following student discussion entry in one or two sentences:\n\n---\n{content}\n---\n\nSummary:");

		let mut conv = Conversation::new();
		conv.add(Role::User, prompt);

		let client = LlmClient::default().model(Model::Medium).max_tokens(256);
		let response = client.conversation(&conv).await?;

		tracing::debug!("LLM summary response: {}", response.text);
		Ok(response.text.trim().to_string())
	}
}

/// Retries a summary once, after `backoff`, when the first attempt was rate limited
pub struct RateLimitRetry<S> {
	inner: S,
	backoff: Duration,
}

impl<S: Summarize> RateLimitRetry<S> {
	pub fn new(inner: S, backoff: Duration) -> Self {
		Self { inner, backoff }
	}
}

#[async_trait]
impl<S: Summarize> Summarize for RateLimitRetry<S> {
	async fn summarize(&self, content: &str) -> Result<String> {
		match self.inner.summarize(content).await {
			Err(e) if is_rate_limited(&e) => {
				tracing::warn!("Rate limited, retrying once in {:?}: {e}", self.backoff);
				tokio::time::sleep(self.backoff).await;
				self.inner.summarize(content).await
			}
			result => result,
		}
	}
}

/// Whether a failed model call should be retried after a pause.
///
/// The API answers a rate limit with an error object instead of a completion, which surfaces as a
/// decode failure on the completion's `id` rather than as an HTTP status.
pub fn is_rate_limited(e: &color_eyre::Report) -> bool {
	e.chain().any(|cause| {
		if let Some(decode) = cause.downcast_ref::<serde_json::Error>() {
			return decode.is_data() && decode.to_string().contains("missing field `id`");
		}
		let m = cause.to_string().to_lowercase();
		m.contains("429") || m.contains("rate limit") || m.contains("rate_limit") || m.contains("resource exhausted") || m.contains("resource_exhausted")
	})
}

/// Date, content and summary of one entry slot; `None` renders as an empty cell
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct EntryCells {
	pub date: Option<String>,
	pub content: Option<String>,
	pub summary: Option<String>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReportRow {
	pub student_id: String,
	pub student_name: String,
	/// Exactly `max_entries` slots
	pub entries: Vec<EntryCells>,
}

impl ReportRow {
	fn to_record(&self) -> Vec<String> {
		let mut record = vec![self.student_id.clone(), self.student_name.clone()];
		for cells in &self.entries {
			for cell in [&cells.date, &cells.content, &cells.summary] {
				record.push(cell.clone().unwrap_or_default());
			}
		}
		record
	}
}

/// Fixed CSV header for `max_entries` entry slots
pub fn header(max_entries: usize) -> Vec<String> {
	let mut columns = vec!["student_id".to_string(), "student_name".to_string()];
	for k in 1..=max_entries {
		columns.push(format!("entry_{k}_date"));
		columns.push(format!("entry_{k}_content"));
		columns.push(format!("entry_{k}_summary"));
	}
	columns
}

/// Lay records out into rows and fill in the summaries.
///
/// Entries beyond `max_entries` are dropped with a warning. Summaries are requested with at most
/// `concurrency` in flight; a failed request leaves a placeholder instead of failing the report.
pub async fn build_rows<S: Summarize + ?Sized>(records: &[StudentSubmissionData], max_entries: usize, summarizer: &S, concurrency: usize) -> Vec<ReportRow> {
	let mut rows = Vec::with_capacity(records.len());
	// (row, slot, content) of every entry that needs a model call
	let mut pending: Vec<(usize, usize, String)> = Vec::new();

	for (i, record) in records.iter().enumerate() {
		tracing::debug!("Laying out student {} ({}) with {} entries", record.student_name, record.student_id, record.entries.len());
		if record.entries.len() > max_entries {
			tracing::warn!(
				"Student {} has {} entries, more than {max_entries}. Skipping extras for CSV.",
				record.student_id,
				record.entries.len()
			);
		}

		let mut entries = vec![EntryCells::default(); max_entries];
		for (slot, entry) in record.entries.iter().take(max_entries).enumerate() {
			entries[slot].date = Some(entry.post_date.clone());
			entries[slot].content = Some(entry.content.clone());
			if entry.has_content() {
				pending.push((i, slot, entry.content.clone()));
			} else {
				tracing::warn!("Student {}, entry {}: content not valid for summarization", record.student_id, slot + 1);
				entries[slot].summary = Some(NO_CONTENT_SUMMARY.to_string());
			}
		}

		rows.push(ReportRow {
			student_id: record.student_id.clone(),
			student_name: record.student_name.clone(),
			entries,
		});
	}

	log!("Generating {} summaries...", pending.len());
	let summaries: Vec<(usize, usize, String)> = stream::iter(pending)
		.map(|(row, slot, content)| async move {
			let summary = match summarizer.summarize(&content).await {
				Ok(s) => s,
				Err(e) => {
					elog!("Error generating summary: {e}");
					FAILED_SUMMARY.to_string()
				}
			};
			(row, slot, summary)
		})
		.buffered(concurrency.max(1))
		.collect()
		.await;
	log!("Completed {} summaries.", summaries.len());

	for (row, slot, summary) in summaries {
		rows[row].entries[slot].summary = Some(summary);
	}
	rows
}

pub fn write_csv(path: &Path, rows: &[ReportRow], max_entries: usize) -> Result<()> {
	let mut writer = csv::Writer::from_path(path).map_err(|e| eyre!("Failed to create CSV {}: {}", path.display(), e))?;
	writer.write_record(header(max_entries)).map_err(|e| eyre!("Failed to write CSV header: {}", e))?;
	for row in rows {
		writer.write_record(row.to_record()).map_err(|e| eyre!("Failed to write CSV row for {}: {}", row.student_id, e))?;
	}
	writer.flush().map_err(|e| eyre!("Failed to flush CSV {}: {}", path.display(), e))?;
	Ok(())
}

/// Build the CSV report from a compiled JSON report
pub async fn run_report<S: Summarize + ?Sized>(compiled: &Path, csv_path: &Path, max_entries: usize, summarizer: &S, concurrency: usize) -> Result<usize> {
	let records = crate::output::load_compiled(compiled)?;
	log!("Loaded {} student records from {}", records.len(), compiled.display());
	if records.is_empty() {
		tracing::warn!("No records to write to CSV");
	}

	let rows = build_rows(&records, max_entries, summarizer, concurrency).await;
	write_csv(csv_path, &rows, max_entries)?;
	log!("Wrote {} rows to CSV: {}", rows.len(), csv_path.display());
	Ok(rows.len())
}
