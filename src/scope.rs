//! Decide whether the submission lives in the top-level page or in the SpeedGrader frame

use v_utils::log;

use crate::{
	config::{WaitTimeouts, ms},
	page::{Document, GraderPage, Probe},
	selectors::{FRAME_HOLDER, FRAME_ROOT, SUBMISSION_FRAME},
};

/// Resolved search root for one student's submission
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Scope {
	pub document: Document,
}

impl Scope {
	pub fn top() -> Self {
		Self { document: Document::Top }
	}

	pub fn frame(selector: &str) -> Self {
		Self {
			document: Document::Frame(selector.to_string()),
		}
	}

	pub fn is_frame(&self) -> bool {
		self.document.is_frame()
	}

	pub fn describe(&self) -> &'static str {
		if self.is_frame() { "submission iframe" } else { "main page content" }
	}
}

/// Look for the submission frame, degrading to the top-level document on every miss.
///
/// Never fails: any timeout or browser error along the way leaves the scope at the top level.
pub async fn resolve_scope<P: GraderPage + ?Sized>(page: &P, timeouts: &WaitTimeouts) -> Scope {
	let top = Document::Top;

	match page.wait_visible(&top, FRAME_HOLDER, ms(timeouts.frame_holder_ms)).await {
		Ok(Probe::Found) => tracing::debug!("'{FRAME_HOLDER}' is visible"),
		Ok(outcome) => {
			tracing::warn!("'{FRAME_HOLDER}' not visible ({outcome:?}); searching the main page");
			return Scope::top();
		}
		Err(e) => {
			tracing::warn!("Probing '{FRAME_HOLDER}' failed: {e}; searching the main page");
			return Scope::top();
		}
	}

	match page.count(&top, SUBMISSION_FRAME).await {
		Ok(0) => {
			tracing::warn!("'{FRAME_HOLDER}' is visible but holds no '{SUBMISSION_FRAME}'");
			return Scope::top();
		}
		Ok(n) => tracing::debug!("Found {n} '{SUBMISSION_FRAME}' element(s), using the first"),
		Err(e) => {
			tracing::warn!("Counting '{SUBMISSION_FRAME}' failed: {e}");
			return Scope::top();
		}
	}

	match page.wait_visible(&top, SUBMISSION_FRAME, ms(timeouts.frame_element_ms)).await {
		Ok(Probe::Found) => {}
		Ok(outcome) => {
			tracing::warn!("'{SUBMISSION_FRAME}' never became visible ({outcome:?})");
			return Scope::top();
		}
		Err(e) => {
			tracing::warn!("Waiting for '{SUBMISSION_FRAME}' failed: {e}");
			return Scope::top();
		}
	}

	let frame = Scope::frame(SUBMISSION_FRAME);
	match page.wait_visible(&frame.document, FRAME_ROOT, ms(timeouts.frame_body_ms)).await {
		Ok(Probe::Found) => {
			log!("Focused on submission iframe '{SUBMISSION_FRAME}'");
			frame
		}
		Ok(outcome) => {
			tracing::warn!("Frame content never became visible ({outcome:?})");
			Scope::top()
		}
		Err(e) => {
			tracing::warn!("Waiting for frame content failed: {e}");
			Scope::top()
		}
	}
}
