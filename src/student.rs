//! Identity of the student on screen and the full per-student extraction

use std::sync::LazyLock;

use color_eyre::Result;
use regex::Regex;
use v_utils::{elog, log};

use crate::{
	AUTHOR_NAME_UNRESOLVED, ID_NOT_FOUND, NAME_NOT_FOUND, StudentSubmissionData,
	config::{AppConfig, ms},
	extract::extract_entries,
	page::{Document, GraderPage, Probe},
	scope::resolve_scope,
	selectors::{NO_SUBMISSION_INDICATOR, STUDENT_NAME},
};

static STUDENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"student_id=(\d+)").expect("valid regex"));
static NAME_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(ID:|\sAttempt\s\d").expect("valid regex"));

pub const NO_SUBMISSION_STATUS: &str = "no submission for this assignment";
pub const CRITICAL_FAILURE_STATUS: &str = "Extraction failed with critical error.";

/// Who the grader currently shows
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identity {
	pub id: String,
	pub name: String,
}

impl Default for Identity {
	fn default() -> Self {
		Self {
			id: ID_NOT_FOUND.to_string(),
			name: NAME_NOT_FOUND.to_string(),
		}
	}
}

impl Identity {
	/// Author recorded on every entry of this student
	pub fn author(&self) -> String {
		if self.name == NAME_NOT_FOUND { AUTHOR_NAME_UNRESOLVED.to_string() } else { self.name.clone() }
	}

	fn record(&self) -> StudentSubmissionData {
		StudentSubmissionData::new(self.id.clone(), self.name.clone())
	}
}

/// Numeric `student_id` query parameter of a grader URL
pub fn parse_student_id(url: &str) -> Option<String> {
	STUDENT_ID_RE.captures(url).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Strip the "(ID: ...)" and "Attempt N" annotations the roster dropdown appends to names
pub fn clean_student_name(raw: &str) -> Option<String> {
	let name = NAME_SUFFIX_RE.split(raw).next().unwrap_or_default().trim();
	if name.is_empty() { None } else { Some(name.to_string()) }
}

/// Read the student name from the first visible roster label
pub async fn resolve_student_name<P: GraderPage + ?Sized>(page: &P, config: &AppConfig) -> Option<String> {
	for selector in STUDENT_NAME {
		match page.wait_visible(&Document::Top, selector, ms(config.timeouts.student_name_ms)).await {
			Ok(Probe::Found) => {}
			Ok(outcome) => {
				tracing::debug!("Name element '{selector}' not visible ({outcome:?})");
				continue;
			}
			Err(e) => {
				tracing::debug!("Checking name element '{selector}' failed: {e}");
				continue;
			}
		}
		match page.text_content(&Document::Top, selector).await {
			Ok(Some(raw)) =>
				if let Some(name) = clean_student_name(&raw) {
					return Some(name);
				},
			Ok(None) => {}
			Err(e) => tracing::debug!("Reading name element '{selector}' failed: {e}"),
		}
	}
	None
}

/// Extract the record of the student currently on screen.
///
/// Never fails: an unexpected error becomes a record with `error` set, empty entries, and whatever
/// identity had been resolved before the failure.
pub async fn extract_current_student<P: GraderPage + ?Sized>(page: &P, config: &AppConfig, session_id: &str) -> StudentSubmissionData {
	let mut identity = Identity::default();
	match harvest_student(page, config, session_id, &mut identity).await {
		Ok(record) => record,
		Err(e) => {
			elog!("Critical error during extraction for student {} ({}): {e:?}", identity.id, identity.name);
			StudentSubmissionData {
				error: Some(e.to_string()),
				..identity.record().with_status(CRITICAL_FAILURE_STATUS)
			}
		}
	}
}

async fn harvest_student<P: GraderPage + ?Sized>(page: &P, config: &AppConfig, session_id: &str, identity: &mut Identity) -> Result<StudentSubmissionData> {
	let url = page.url().await?;
	log!("Extracting student at {url}");

	match parse_student_id(&url) {
		Some(id) => {
			log!("Student ID: {id}");
			identity.id = id;
		}
		None => tracing::warn!("Student ID not found in URL"),
	}

	match resolve_student_name(page, config).await {
		Some(name) => {
			log!("Student name: {name}");
			identity.name = name;
		}
		None => tracing::warn!("Student name not found for ID {}", identity.id),
	}

	if page.wait_visible(&Document::Top, NO_SUBMISSION_INDICATOR, ms(config.timeouts.no_submission_ms)).await?.is_found() {
		log!("Student {} ({}) has no submission", identity.id, identity.name);
		return Ok(identity.record().with_status(NO_SUBMISSION_STATUS));
	}

	let scope = resolve_scope(page, &config.timeouts).await;
	let extraction = extract_entries(page, &scope, identity, config, session_id).await?;
	log!("{}", extraction.status);

	Ok(StudentSubmissionData {
		entries: extraction.entries,
		..identity.record().with_status(extraction.status)
	})
}
