#![allow(dead_code)]

use std::{
	path::PathBuf,
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration,
};

use async_trait::async_trait;
use color_eyre::{Result, eyre::eyre};
use scraper::{Html, Selector};
use speedgrader_harvest::{
	config::{AppConfig, WaitTimeouts},
	page::{ControlState, Document, GraderPage, Probe},
	report::Summarize,
};

pub fn grader_url(id: &str) -> String {
	format!("https://canvas.test/courses/1/gradebook/speed_grader?assignment_id=9&student_id={id}")
}

/// One roster position of the fake grader
#[derive(Clone, Debug)]
pub struct FakeStudent {
	pub url: String,
	pub top_html: String,
	pub frame_html: Option<String>,
	pub next: ControlState,
	/// Selectors that match but never become visible
	pub hidden: Vec<String>,
	/// What waiting for network idle yields while this student is shown
	pub idle: Probe,
	pub fail_snapshot: bool,
}

impl FakeStudent {
	/// Submission rendered inline in the grader page
	pub fn inline(id: &str, name: &str, submission: &str) -> Self {
		Self {
			url: grader_url(id),
			top_html: page_html(name, &main_content(submission)),
			frame_html: None,
			next: ControlState::Ready,
			hidden: Vec::new(),
			idle: Probe::Found,
			fail_snapshot: false,
		}
	}

	/// Submission rendered inside the SpeedGrader iframe
	pub fn framed(id: &str, name: &str, submission: &str) -> Self {
		Self {
			url: grader_url(id),
			top_html: page_html(name, r#"<div id="iframe_holder"><iframe id="speedgrader_iframe"></iframe></div>"#),
			frame_html: Some(format!("<html><body>{}</body></html>", main_content(submission))),
			next: ControlState::Ready,
			hidden: Vec::new(),
			idle: Probe::Found,
			fail_snapshot: false,
		}
	}

	pub fn last(mut self) -> Self {
		self.next = ControlState::Disabled;
		self
	}

	pub fn with_next(mut self, next: ControlState) -> Self {
		self.next = next;
		self
	}

	pub fn with_url(mut self, url: String) -> Self {
		self.url = url;
		self
	}

	pub fn with_hidden(mut self, selector: &str) -> Self {
		self.hidden.push(selector.to_string());
		self
	}

	pub fn with_idle(mut self, idle: Probe) -> Self {
		self.idle = idle;
		self
	}
}

pub fn page_html(name: &str, body: &str) -> String {
	format!(
		r#"<html><body>
		<span id="speedgrader_selected_student_label">{name} (ID: 0)</span>
		<button id="next-student-button">Next</button>
		{body}
		</body></html>"#
	)
}

pub fn main_content(submission: &str) -> String {
	format!(r#"<div id="content" class="ic-Layout-contentMain"><div class="submission_description">{submission}</div></div>"#)
}

pub fn entry(date: &str, text: &str) -> String {
	format!(
		r#"<div class="discussion_entry communication_message">
			<div class="header"><div class="post_date time_ago_date" data-timestamp="{date}">{date}</div></div>
			<div class="content"><div class="message user_content enhanced">{text}</div></div>
		</div>"#
	)
}

pub struct FakeGrader {
	students: Vec<FakeStudent>,
	current: AtomicUsize,
	/// When false, clicking next leaves the grader where it is
	pub advances: bool,
	pub clicks: AtomicUsize,
}

impl FakeGrader {
	pub fn new(students: Vec<FakeStudent>) -> Self {
		Self {
			students,
			current: AtomicUsize::new(0),
			advances: true,
			clicks: AtomicUsize::new(0),
		}
	}

	pub fn stuck(mut self) -> Self {
		self.advances = false;
		self
	}

	fn student(&self) -> &FakeStudent {
		&self.students[self.current.load(Ordering::SeqCst)]
	}

	fn html(&self, document: &Document) -> Option<String> {
		let student = self.student();
		match document {
			Document::Top => Some(student.top_html.clone()),
			Document::Frame(_) => student.frame_html.clone(),
		}
	}

	fn matches(&self, document: &Document, selector: &str) -> Result<Vec<String>> {
		let Some(html) = self.html(document) else { return Ok(Vec::new()) };
		let selector = Selector::parse(selector).map_err(|e| eyre!("bad selector {selector}: {e:?}"))?;
		let parsed = Html::parse_document(&html);
		Ok(parsed.select(&selector).map(|el| el.text().collect::<String>()).collect())
	}
}

#[async_trait]
impl GraderPage for FakeGrader {
	async fn url(&self) -> Result<String> {
		Ok(self.student().url.clone())
	}

	async fn wait_visible(&self, document: &Document, selector: &str, _timeout: Duration) -> Result<Probe> {
		if self.matches(document, selector)?.is_empty() {
			return Ok(Probe::NotFound);
		}
		if self.student().hidden.iter().any(|h| h == selector) {
			return Ok(Probe::TimedOut);
		}
		Ok(Probe::Found)
	}

	async fn count(&self, document: &Document, selector: &str) -> Result<usize> {
		Ok(self.matches(document, selector)?.len())
	}

	async fn text_content(&self, document: &Document, selector: &str) -> Result<Option<String>> {
		Ok(self.matches(document, selector)?.into_iter().next())
	}

	async fn snapshot(&self, document: &Document) -> Result<String> {
		if self.student().fail_snapshot {
			return Err(eyre!("target closed"));
		}
		self.html(document).ok_or_else(|| eyre!("Document {document:?} is not accessible"))
	}

	async fn control_state(&self, _selector: &str, _timeout: Duration) -> Result<ControlState> {
		Ok(self.student().next)
	}

	async fn click(&self, _selector: &str, _timeout: Duration) -> Result<()> {
		self.clicks.fetch_add(1, Ordering::SeqCst);
		let current = self.current.load(Ordering::SeqCst);
		if current + 1 >= self.students.len() {
			return Err(eyre!("nothing to click"));
		}
		if self.advances {
			self.current.store(current + 1, Ordering::SeqCst);
		}
		Ok(())
	}

	async fn wait_network_idle(&self, _timeout: Duration) -> Result<Probe> {
		Ok(self.student().idle)
	}

	async fn wait_student_change(&self, from_url: &str, _timeout: Duration) -> Result<Probe> {
		Ok(if self.student().url != from_url { Probe::Found } else { Probe::TimedOut })
	}
}

/// Summaries without a model
pub struct FakeSummarizer;

#[async_trait]
impl Summarize for FakeSummarizer {
	async fn summarize(&self, content: &str) -> Result<String> {
		Ok(format!("about: {}", content.chars().take(20).collect::<String>()))
	}
}

/// Empty scratch folder unique to this test process
pub fn scratch_dir(name: &str) -> PathBuf {
	let dir = std::env::temp_dir().join(format!("speedgrader_harvest_{name}_{}", std::process::id()));
	let _ = std::fs::remove_dir_all(&dir);
	dir
}

pub fn test_config(name: &str) -> AppConfig {
	AppConfig {
		output_dir: scratch_dir(name),
		timeouts: WaitTimeouts::uniform(10),
		..AppConfig::default()
	}
}
