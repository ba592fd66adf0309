use std::fmt;

use derive_new::new;
use serde::{Deserialize, Serialize};

pub mod chrome;
pub mod config;
pub mod driver;
pub mod extract;
pub mod output;
pub mod page;
pub mod report;
pub mod resolve;
pub mod scope;
pub mod selectors;
pub mod student;

pub const ID_NOT_FOUND: &str = "ID not found";
pub const NAME_NOT_FOUND: &str = "Name not found";
pub const AUTHOR_NOT_FOUND: &str = "Author not found";
pub const DATE_NOT_FOUND: &str = "Date not found";
pub const CONTENT_NOT_FOUND: &str = "Content not found";
/// Author written on entries when the page-level student name could not be read
pub const AUTHOR_NAME_UNRESOLVED: &str = "Student name not resolved";

/// Outcome of resolving one field against the DOM.
///
/// `NotFound` is kept as its own variant instead of an empty string: the sentinel text it
/// turns into is part of the persisted record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Resolved {
	Value(String),
	NotFound,
}

impl Resolved {
	pub fn is_found(&self) -> bool {
		matches!(self, Resolved::Value(_))
	}

	/// Collapse into the persisted string, substituting `sentinel` when nothing was found
	pub fn or_sentinel(self, sentinel: &str) -> String {
		match self {
			Resolved::Value(v) => v,
			Resolved::NotFound => sentinel.to_string(),
		}
	}
}

/// One discussion post of a student
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, new)]
pub struct DiscussionEntry {
	/// Always the page-level student name, never scraped per entry
	#[serde(default = "default_author")]
	pub author: String,
	/// Raw timestamp text as found on the page; not normalized
	#[serde(default = "default_post_date")]
	pub post_date: String,
	#[serde(default = "default_content")]
	pub content: String,
}

impl DiscussionEntry {
	/// An entry carries something real if either its date or its content resolved
	pub fn has_payload(&self) -> bool {
		self.post_date != DATE_NOT_FOUND || self.content != CONTENT_NOT_FOUND
	}

	pub fn has_content(&self) -> bool {
		!self.content.trim().is_empty() && self.content != CONTENT_NOT_FOUND
	}
}

impl Default for DiscussionEntry {
	fn default() -> Self {
		Self {
			author: default_author(),
			post_date: default_post_date(),
			content: default_content(),
		}
	}
}

/// Everything extracted for one student of the roster
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, new)]
pub struct StudentSubmissionData {
	#[serde(default = "default_student_id")]
	pub student_id: String,
	#[serde(default = "default_student_name")]
	pub student_name: String,
	/// In DOM order
	#[serde(default)]
	#[new(default)]
	pub entries: Vec<DiscussionEntry>,
	/// Human-readable outcome of the extraction
	#[serde(default)]
	#[new(default)]
	pub status: Option<String>,
	#[serde(default)]
	#[new(default)]
	pub error: Option<String>,
}

impl StudentSubmissionData {
	pub fn with_status(mut self, status: impl Into<String>) -> Self {
		self.status = Some(status.into());
		self
	}

	pub fn has_student_id(&self) -> bool {
		self.student_id != ID_NOT_FOUND
	}

	pub fn has_student_name(&self) -> bool {
		self.student_name != NAME_NOT_FOUND
	}
}

impl Default for StudentSubmissionData {
	fn default() -> Self {
		Self {
			student_id: default_student_id(),
			student_name: default_student_name(),
			entries: Vec::new(),
			status: None,
			error: None,
		}
	}
}

impl fmt::Display for StudentSubmissionData {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({}): {} entr{}", self.student_name, self.student_id, self.entries.len(), if self.entries.len() == 1 { "y" } else { "ies" })?;
		if let Some(status) = &self.status {
			write!(f, " - {status}")?;
		}
		if let Some(error) = &self.error {
			write!(f, " [error: {error}]")?;
		}
		Ok(())
	}
}

fn default_author() -> String {
	AUTHOR_NOT_FOUND.to_string()
}

fn default_post_date() -> String {
	DATE_NOT_FOUND.to_string()
}

fn default_content() -> String {
	CONTENT_NOT_FOUND.to_string()
}

fn default_student_id() -> String {
	ID_NOT_FOUND.to_string()
}

fn default_student_name() -> String {
	NAME_NOT_FOUND.to_string()
}
