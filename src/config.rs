use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use v_utils::macros::{MyConfigPrimitives, Settings, SettingsNested};

#[derive(Clone, Debug, MyConfigPrimitives, Settings)]
pub struct AppConfig {
	/// Folder receiving per-student files, the compiled report and the CSV
	#[settings(default = default_output_dir())]
	pub output_dir: PathBuf,
	/// Maximum number of entries per student laid out in the CSV (default: 4)
	#[serde(default = "default_max_entries")]
	pub max_entries: usize,
	/// Write each student's record to its own file right after extraction (default: true)
	#[serde(default = "default_true")]
	pub per_student_files: bool,
	/// Summaries requested from the model at the same time (default: 4)
	#[serde(default = "default_summary_concurrency")]
	pub summary_concurrency: usize,
	/// Delay in ms before the single retry of a rate-limited summary (default: 30000)
	#[serde(default = "default_rate_limit_backoff_ms")]
	pub rate_limit_backoff_ms: u64,
	/// Save the HTML of every resolved scope for debugging
	#[serde(default)]
	pub persist_snapshots: bool,
	/// Run with visible browser window (non-headless mode)
	#[serde(default)]
	#[settings(skip)]
	pub visible: bool,
	/// Browser profile holding an authenticated session
	#[serde(default)]
	#[settings(skip)]
	pub user_data_dir: Option<PathBuf>,
	#[serde(default)]
	#[settings(flatten)]
	pub timeouts: WaitTimeouts,
}

/// Upper bounds, in ms, of every wait performed against the page
#[derive(Clone, Debug, Deserialize, Serialize, SettingsNested)]
#[serde(default)]
#[settings(prefix = "timeouts")]
pub struct WaitTimeouts {
	pub frame_holder_ms: u64,
	pub frame_element_ms: u64,
	pub frame_body_ms: u64,
	pub content_area_ms: u64,
	pub submission_description_ms: u64,
	pub no_submission_ms: u64,
	pub student_name_ms: u64,
	pub next_visible_ms: u64,
	pub network_idle_ms: u64,
	pub next_check_ms: u64,
	pub click_ms: u64,
	pub url_change_ms: u64,
}

impl Default for WaitTimeouts {
	fn default() -> Self {
		Self {
			frame_holder_ms: 5_000,
			frame_element_ms: 5_000,
			frame_body_ms: 10_000,
			content_area_ms: 7_000,
			submission_description_ms: 5_000,
			no_submission_ms: 2_000,
			student_name_ms: 1_000,
			next_visible_ms: 15_000,
			network_idle_ms: 30_000,
			next_check_ms: 5_000,
			click_ms: 10_000,
			url_change_ms: 20_000,
		}
	}
}

impl WaitTimeouts {
	/// Every wait bounded by the same `ms`; handy for fakes that answer instantly
	pub fn uniform(ms: u64) -> Self {
		Self {
			frame_holder_ms: ms,
			frame_element_ms: ms,
			frame_body_ms: ms,
			content_area_ms: ms,
			submission_description_ms: ms,
			no_submission_ms: ms,
			student_name_ms: ms,
			next_visible_ms: ms,
			network_idle_ms: ms,
			next_check_ms: ms,
			click_ms: ms,
			url_change_ms: ms,
		}
	}
}

/// `WaitTimeouts` field accessor as a `Duration`
pub fn ms(value: u64) -> Duration {
	Duration::from_millis(value)
}

fn default_output_dir() -> PathBuf {
	PathBuf::from("student_submissions_output")
}

fn default_max_entries() -> usize {
	4
}

fn default_true() -> bool {
	true
}

fn default_summary_concurrency() -> usize {
	4
}

fn default_rate_limit_backoff_ms() -> u64 {
	30_000
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			output_dir: default_output_dir(),
			max_entries: default_max_entries(),
			per_student_files: true,
			summary_concurrency: default_summary_concurrency(),
			rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
			persist_snapshots: false,
			visible: false,
			user_data_dir: None,
			timeouts: WaitTimeouts::default(),
		}
	}
}

impl AppConfig {
	pub fn compiled_report_path(&self) -> PathBuf {
		self.output_dir.join(crate::output::COMPILED_REPORT_FILE)
	}

	pub fn csv_report_path(&self) -> PathBuf {
		self.output_dir.join(crate::output::CSV_REPORT_FILE)
	}
}
