//! First-hit resolution over ordered selector candidates

use scraper::{ElementRef, Selector};

use crate::Resolved;

/// Where a value is read from once a candidate's element is located
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
	Attr(&'static str),
	/// Concatenated text of the element and its descendants
	Text,
}

/// A locator paired with the priority list of value sources tried on its first match
#[derive(Clone, Copy, Debug)]
pub struct Candidate {
	pub selector: &'static str,
	pub sources: &'static [Source],
}

impl Candidate {
	pub const fn new(selector: &'static str, sources: &'static [Source]) -> Self {
		Self { selector, sources }
	}
}

/// Walk `candidates` in order and return the first non-blank value.
///
/// Only the first element matched by each selector is considered. Resolution stops at the first
/// (selector, source) pair that yields text, so a later candidate never wins over an earlier hit.
pub fn resolve(scope: ElementRef<'_>, candidates: &[Candidate]) -> Resolved {
	for candidate in candidates {
		let selector = match Selector::parse(candidate.selector) {
			Ok(s) => s,
			Err(e) => {
				tracing::warn!("Skipping unparsable selector '{}': {:?}", candidate.selector, e);
				continue;
			}
		};

		let Some(element) = scope.select(&selector).next() else {
			tracing::debug!("No element for '{}'", candidate.selector);
			continue;
		};

		for source in candidate.sources {
			let raw = match source {
				Source::Attr(name) => element.value().attr(name).map(str::to_string),
				Source::Text => Some(element.text().collect::<String>()),
			};
			if let Some(value) = raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
				tracing::debug!("'{}' resolved via {:?}", candidate.selector, source);
				return Resolved::Value(value.to_string());
			}
		}
		tracing::debug!("'{}' matched but every source was blank", candidate.selector);
	}
	Resolved::NotFound
}
