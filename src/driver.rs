//! Walks the SpeedGrader roster one student at a time.
//!
//! ```text
//! AtStudent -> Extracting -> Advancing -> AtStudent (next)
//!                   |            |
//!                   +------------+--> Terminated
//! ```
//!
//! The driver owns the only mutable state of a run: the ids already seen and the records gathered so
//! far. Whatever way the loop ends, the gathered records are written to the compiled report.

use std::{collections::HashSet, fmt};

use v_utils::{elog, log};

use crate::{
	StudentSubmissionData,
	config::{AppConfig, ms},
	output::OutputSink,
	page::{ControlState, Document, GraderPage, Probe},
	selectors::NEXT_STUDENT_BUTTON,
	student::extract_current_student,
};

/// Why the roster walk stopped
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Termination {
	/// The next-student control was absent, hidden or disabled
	EndOfRoster(ControlState),
	/// The URL carried no student id; continuing would loop against unknown state
	UnresolvedId,
	/// The same student came up again, so the grader did not advance
	RepeatedId(String),
	/// Clicking next or waiting for the next student failed
	Stuck(String),
}

impl Termination {
	/// Reaching the end of the roster is the only normal way to stop
	pub fn is_normal(&self) -> bool {
		matches!(self, Termination::EndOfRoster(_))
	}
}

impl fmt::Display for Termination {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Termination::EndOfRoster(state) => write!(f, "end of roster (next control {state:?})"),
			Termination::UnresolvedId => write!(f, "student id could not be determined"),
			Termination::RepeatedId(id) => write!(f, "student {id} re-encountered, page did not advance"),
			Termination::Stuck(reason) => write!(f, "stuck while advancing: {reason}"),
		}
	}
}

#[derive(Debug)]
enum State {
	AtStudent,
	Extracting { url: String },
	Advancing { from_url: String },
	Terminated(Termination),
}

/// Everything a run produced
#[derive(Clone, Debug)]
pub struct HarvestOutcome {
	pub records: Vec<StudentSubmissionData>,
	pub termination: Termination,
}

pub struct Harvester<'a, P: GraderPage + ?Sized> {
	page: &'a P,
	config: &'a AppConfig,
	sink: OutputSink,
	session_id: String,
	seen: HashSet<String>,
	records: Vec<StudentSubmissionData>,
}

impl<'a, P: GraderPage + ?Sized> Harvester<'a, P> {
	pub fn new(page: &'a P, config: &'a AppConfig, session_id: impl Into<String>) -> Self {
		Self {
			page,
			config,
			sink: OutputSink::new(&config.output_dir, config.per_student_files),
			session_id: session_id.into(),
			seen: HashSet::new(),
			records: Vec::new(),
		}
	}

	/// Drive the roster until a terminal condition, then flush the compiled report
	pub async fn run(mut self) -> HarvestOutcome {
		let mut state = State::AtStudent;
		let termination = loop {
			state = match state {
				State::AtStudent => self.settle().await,
				State::Extracting { url } => self.extract(url).await,
				State::Advancing { from_url } => self.advance(from_url).await,
				State::Terminated(termination) => break termination,
			};
		};

		if termination.is_normal() {
			log!("Finished iterating: {termination}. Processed {} student records.", self.records.len());
		} else {
			elog!("Stopped iterating: {termination}. Processed {} student records.", self.records.len());
		}

		if let Err(e) = self.sink.write_compiled(&self.records) {
			elog!("Failed to save compiled report: {e}");
		}

		HarvestOutcome {
			records: self.records,
			termination,
		}
	}

	/// Let the page come to rest before reading it. A page that never settles is still extracted.
	async fn settle(&self) -> State {
		let url = match self.page.url().await {
			Ok(url) => url,
			Err(e) => return State::Terminated(Termination::Stuck(format!("could not read page URL: {e}"))),
		};
		log!("Processing page: {url}");

		let timeouts = &self.config.timeouts;
		match self.page.wait_visible(&Document::Top, NEXT_STUDENT_BUTTON, ms(timeouts.next_visible_ms)).await {
			Ok(Probe::Found) => match self.page.wait_network_idle(ms(timeouts.network_idle_ms)).await {
				Ok(Probe::Found) => tracing::debug!("Page network idle"),
				Ok(outcome) => tracing::warn!("Network did not settle ({outcome:?}); attempting extraction anyway"),
				Err(e) => tracing::warn!("Waiting for network idle failed: {e}; attempting extraction anyway"),
			},
			Ok(outcome) => tracing::warn!("Next button not visible ({outcome:?}); attempting extraction anyway"),
			Err(e) => tracing::warn!("Waiting for next button failed: {e}; attempting extraction anyway"),
		}

		State::Extracting { url }
	}

	async fn extract(&mut self, url: String) -> State {
		let record = extract_current_student(self.page, self.config, &self.session_id).await;
		match self.accept(record) {
			Ok(()) => State::Advancing { from_url: url },
			Err(termination) => State::Terminated(termination),
		}
	}

	/// Apply the id rules to a freshly extracted record
	fn accept(&mut self, record: StudentSubmissionData) -> Result<(), Termination> {
		if !record.has_student_id() {
			elog!("Student ID could not be determined. Stopping to avoid processing an unknown student.");
			self.records.push(record);
			return Err(Termination::UnresolvedId);
		}
		if self.seen.contains(&record.student_id) {
			tracing::warn!("Student ID {} re-encountered; the page did not advance", record.student_id);
			return Err(Termination::RepeatedId(record.student_id));
		}

		log!("Accepted {record}");
		self.seen.insert(record.student_id.clone());
		self.sink.write_student(&record);
		self.records.push(record);
		Ok(())
	}

	async fn advance(&self, from_url: String) -> State {
		let timeouts = &self.config.timeouts;

		match self.page.control_state(NEXT_STUDENT_BUTTON, ms(timeouts.next_check_ms)).await {
			Ok(ControlState::Ready) => {}
			Ok(state) => {
				log!("Next student button is {state:?}. Assuming end of student list.");
				return State::Terminated(Termination::EndOfRoster(state));
			}
			Err(e) => {
				elog!("Could not inspect next student button: {e}");
				return State::Terminated(Termination::Stuck(e.to_string()));
			}
		}

		log!("Clicking 'Next Student' button...");
		if let Err(e) = self.page.click(NEXT_STUDENT_BUTTON, ms(timeouts.click_ms)).await {
			elog!("Error clicking 'Next Student': {e}");
			return State::Terminated(Termination::Stuck(e.to_string()));
		}

		match self.page.wait_student_change(&from_url, ms(timeouts.url_change_ms)).await {
			Ok(Probe::Found) => {}
			Ok(outcome) => {
				elog!("URL did not move past {from_url} ({outcome:?}). Potential stuck page.");
				return State::Terminated(Termination::Stuck(format!("student did not change ({outcome:?})")));
			}
			Err(e) => {
				elog!("Error waiting for the next student: {e}");
				return State::Terminated(Termination::Stuck(e.to_string()));
			}
		}

		match self.page.wait_network_idle(ms(timeouts.network_idle_ms)).await {
			Ok(Probe::Found) => {
				tracing::debug!("Network idle after advancing");
				State::AtStudent
			}
			Ok(outcome) => {
				elog!("Network did not settle after advancing ({outcome:?})");
				State::Terminated(Termination::Stuck(format!("network did not settle after advancing ({outcome:?})")))
			}
			Err(e) => {
				elog!("Error waiting for network idle after advancing: {e}");
				State::Terminated(Termination::Stuck(e.to_string()))
			}
		}
	}
}
