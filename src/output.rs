//! JSON persistence of harvested records

use std::{
	path::{Path, PathBuf},
	sync::LazyLock,
};

use color_eyre::{Result, eyre::eyre};
use regex::Regex;
#[cfg(feature = "xdg")]
use v_utils::xdg_state_dir;
use v_utils::{elog, log};

use crate::StudentSubmissionData;

pub const COMPILED_REPORT_FILE: &str = "ALL_students_compiled_report.json";
pub const CSV_REPORT_FILE: &str = "analyzed_student_submissions.csv";
const UNKNOWN_NAME: &str = "UnknownName";

static INVALID_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Make `name` safe for a file name: drop everything but word characters, whitespace and hyphens, then
/// turn whitespace runs into single underscores.
pub fn sanitize_filename(name: &str) -> String {
	let kept = INVALID_CHARS_RE.replace_all(name, "");
	let joined = WHITESPACE_RE.replace_all(&kept, "_");
	joined.trim_matches('_').to_string()
}

/// File name of one student's record
pub fn student_file_name(record: &StudentSubmissionData) -> String {
	let id = sanitize_filename(&record.student_id);
	let name = if record.has_student_name() { sanitize_filename(&record.student_name) } else { UNKNOWN_NAME.to_string() };
	format!("student_{id}_{name}.json")
}

/// Writes records under the run's output folder
#[derive(Clone, Debug)]
pub struct OutputSink {
	dir: PathBuf,
	per_student: bool,
}

impl OutputSink {
	pub fn new(dir: impl Into<PathBuf>, per_student: bool) -> Self {
		Self { dir: dir.into(), per_student }
	}

	pub fn compiled_path(&self) -> PathBuf {
		self.dir.join(COMPILED_REPORT_FILE)
	}

	fn ensure_dir(&self) -> Result<()> {
		if !self.dir.exists() {
			std::fs::create_dir_all(&self.dir).map_err(|e| eyre!("Failed to create output folder {}: {}", self.dir.display(), e))?;
			log!("Created output folder: {}", self.dir.display());
		}
		Ok(())
	}

	/// Persist one student's record immediately. Failures are logged, never propagated.
	pub fn write_student(&self, record: &StudentSubmissionData) -> Option<PathBuf> {
		if !self.per_student {
			return None;
		}
		let path = self.dir.join(student_file_name(record));
		match self.ensure_dir().and_then(|_| write_json(&path, record)) {
			Ok(()) => {
				log!("Saved {} ({}) to {}", record.student_name, record.student_id, path.display());
				Some(path)
			}
			Err(e) => {
				elog!("Failed to save individual file {}: {e}", path.display());
				None
			}
		}
	}

	/// Write the whole run as one JSON array
	pub fn write_compiled(&self, records: &[StudentSubmissionData]) -> Result<PathBuf> {
		self.ensure_dir()?;
		let path = self.compiled_path();
		write_json(&path, records)?;
		log!("Saved compiled report ({} records) to: {}", records.len(), path.display());
		Ok(path)
	}
}

/// Read a compiled report back
pub fn load_compiled(path: &Path) -> Result<Vec<StudentSubmissionData>> {
	let raw = std::fs::read_to_string(path).map_err(|e| eyre!("Failed to read compiled report {}: {}", path.display(), e))?;
	serde_json::from_str(&raw).map_err(|e| eyre!("Failed to decode compiled report {}: {}", path.display(), e))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
	let json = serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to serialize {}: {}", path.display(), e))?;
	std::fs::write(path, json).map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))
}

/// Save the markup a student's entries were read from, for debugging selector misses
#[cfg(feature = "xdg")]
pub fn save_snapshot(session_id: &str, label: &str, html: &str) -> Result<PathBuf> {
	let dir = xdg_state_dir!("persist_htmls").join(session_id);
	std::fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create snapshot dir: {}", e))?;

	let timestamp = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs();
	let path = dir.join(format!("{}_student_{}.html", timestamp, sanitize_filename(label)));
	std::fs::write(&path, html).map_err(|e| eyre!("Failed to write snapshot: {}", e))?;

	tracing::debug!("Saved snapshot to: {}", path.display());
	Ok(path)
}
