//! The narrow set of live-page operations the harvest needs.
//!
//! Everything that has to observe the browser while it changes (visibility, network activity,
//! navigation) goes through [`GraderPage`]. Reads that only need the current markup are done on an
//! HTML snapshot instead, see [`GraderPage::snapshot`].

use std::time::Duration;

use async_trait::async_trait;
use color_eyre::Result;

/// Which document a query runs against
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Document {
	/// The top-level page
	Top,
	/// The content document of the first frame element matching the selector
	Frame(String),
}

impl Document {
	pub fn is_frame(&self) -> bool {
		matches!(self, Document::Frame(_))
	}
}

/// Result of a bounded wait
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Probe {
	Found,
	/// Nothing matched before the deadline
	NotFound,
	/// Something matched but never reached the awaited state before the deadline
	TimedOut,
}

impl Probe {
	pub fn is_found(self) -> bool {
		self == Probe::Found
	}
}

/// State of a clickable control
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlState {
	Absent,
	Hidden,
	Disabled,
	Ready,
}

#[async_trait]
pub trait GraderPage: Send + Sync {
	async fn url(&self) -> Result<String>;

	/// Wait until the first element matching `selector` in `document` is visible
	async fn wait_visible(&self, document: &Document, selector: &str, timeout: Duration) -> Result<Probe>;

	/// Number of elements matching `selector`; 0 when `document` itself is unavailable
	async fn count(&self, document: &Document, selector: &str) -> Result<usize>;

	/// Text content of the first element matching `selector`
	async fn text_content(&self, document: &Document, selector: &str) -> Result<Option<String>>;

	/// Serialized markup of the whole `document`
	async fn snapshot(&self, document: &Document) -> Result<String>;

	/// Poll the state of the first element matching `selector` on the top-level page for up to
	/// `timeout`, returning as soon as it is ready
	async fn control_state(&self, selector: &str, timeout: Duration) -> Result<ControlState>;

	async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

	/// Wait for in-flight requests to settle
	async fn wait_network_idle(&self, timeout: Duration) -> Result<Probe>;

	/// Wait for the URL to carry a `student_id` different from the one in `from_url`
	async fn wait_student_change(&self, from_url: &str, timeout: Duration) -> Result<Probe>;
}
