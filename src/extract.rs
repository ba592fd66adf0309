//! Discussion entries of the current student

use scraper::{ElementRef, Html, Selector};
#[cfg(feature = "xdg")]
use v_utils::elog;

use crate::{
	CONTENT_NOT_FOUND, DATE_NOT_FOUND, DiscussionEntry,
	config::{AppConfig, WaitTimeouts, ms},
	page::{GraderPage, Probe},
	resolve::resolve,
	scope::Scope,
	selectors::{CONTENT, ENTRY_FALLBACK, ENTRY_PRIMARY, MAIN_CONTENT, POST_DATE, SUBMISSION_DESCRIPTION, submission_description_in_main},
	student::Identity,
};

/// Element the entry query is run under
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SearchRoot {
	SubmissionDescription,
	MainContent,
	/// The whole scope document
	Scope,
}

impl SearchRoot {
	fn locate(self, document: &Html) -> Option<ElementRef<'_>> {
		let root = document.root_element();
		match self {
			SearchRoot::Scope => Some(root),
			SearchRoot::MainContent => first(root, MAIN_CONTENT),
			SearchRoot::SubmissionDescription => first(root, MAIN_CONTENT).and_then(|main| first(main, SUBMISSION_DESCRIPTION)),
		}
	}
}

/// Entry elements found under a root, and the ones that carried real data
#[derive(Clone, Debug, Default)]
pub struct EntryScan {
	pub matched: usize,
	pub entries: Vec<DiscussionEntry>,
}

#[derive(Clone, Debug)]
pub struct Extraction {
	pub entries: Vec<DiscussionEntry>,
	pub status: String,
}

/// Narrow the search to the content area, then to the submission description, as far as each shows up in time
pub async fn locate_search_root<P: GraderPage + ?Sized>(page: &P, scope: &Scope, timeouts: &WaitTimeouts) -> SearchRoot {
	match page.wait_visible(&scope.document, MAIN_CONTENT, ms(timeouts.content_area_ms)).await {
		Ok(Probe::Found) => {}
		Ok(outcome) => {
			tracing::warn!("'{MAIN_CONTENT}' not visible in {} ({outcome:?}); searching the whole scope", scope.describe());
			return SearchRoot::Scope;
		}
		Err(e) => {
			tracing::warn!("Waiting for '{MAIN_CONTENT}' failed: {e}; searching the whole scope");
			return SearchRoot::Scope;
		}
	}

	match page.wait_visible(&scope.document, &submission_description_in_main(), ms(timeouts.submission_description_ms)).await {
		Ok(Probe::Found) => SearchRoot::SubmissionDescription,
		Ok(outcome) => {
			tracing::warn!("'{SUBMISSION_DESCRIPTION}' not visible ({outcome:?}); searching '{MAIN_CONTENT}'");
			SearchRoot::MainContent
		}
		Err(e) => {
			tracing::warn!("Waiting for '{SUBMISSION_DESCRIPTION}' failed: {e}; searching '{MAIN_CONTENT}'");
			SearchRoot::MainContent
		}
	}
}

/// Extract every discussion entry of `student` visible in `scope`.
///
/// Zero entries is a normal outcome described by the status, not an error. Errors are only returned when
/// the scope's markup cannot be read at all.
#[cfg_attr(not(feature = "xdg"), allow(unused_variables))]
pub async fn extract_entries<P: GraderPage + ?Sized>(page: &P, scope: &Scope, student: &Identity, config: &AppConfig, session_id: &str) -> color_eyre::Result<Extraction> {
	let root = locate_search_root(page, scope, &config.timeouts).await;
	tracing::debug!("Searching entries under {root:?} in {}", scope.describe());

	let html = page.snapshot(&scope.document).await?;

	#[cfg(feature = "xdg")]
	if config.persist_snapshots {
		if let Err(e) = crate::output::save_snapshot(session_id, &student.id, &html) {
			elog!("Failed to save snapshot for student {}: {e}", student.id);
		}
	}

	let scan = scan_entries(&html, root, &student.author());
	let status = describe_scan(&scan, scope, &student.id);
	Ok(Extraction { entries: scan.entries, status })
}

/// Find entry elements under `root` of the snapshot and resolve each one's fields.
///
/// Entries whose date and content both stay unresolved are structural noise and are dropped.
pub fn scan_entries(html: &str, root: SearchRoot, author: &str) -> EntryScan {
	let document = Html::parse_document(html);
	let search_root = root.locate(&document).unwrap_or_else(|| {
		tracing::warn!("{root:?} missing from snapshot; searching the whole document");
		document.root_element()
	});

	let mut elements = select_all(search_root, ENTRY_PRIMARY);
	if elements.is_empty() {
		tracing::debug!("No entries for '{ENTRY_PRIMARY}', trying '{ENTRY_FALLBACK}'");
		elements = select_all(search_root, ENTRY_FALLBACK);
	}

	let matched = elements.len();
	let mut entries = Vec::with_capacity(matched);
	for (i, element) in elements.into_iter().enumerate() {
		let post_date = resolve(element, POST_DATE);
		let content = resolve(element, CONTENT);
		if !post_date.is_found() && !content.is_found() {
			tracing::warn!("Entry {}/{matched}: no date and no content, skipped", i + 1);
			continue;
		}
		if !post_date.is_found() {
			tracing::warn!("Entry {}/{matched}: date not found", i + 1);
		}
		if !content.is_found() {
			tracing::warn!("Entry {}/{matched}: content not found", i + 1);
		}
		entries.push(DiscussionEntry::new(author.to_string(), post_date.or_sentinel(DATE_NOT_FOUND), content.or_sentinel(CONTENT_NOT_FOUND)));
	}

	EntryScan { matched, entries }
}

fn describe_scan(scan: &EntryScan, scope: &Scope, student_id: &str) -> String {
	if scan.matched == 0 {
		format!("no entries found for student {student_id} in {}", scope.describe())
	} else if scan.entries.is_empty() {
		format!("found {} entry elements for student {student_id} but none parsed", scan.matched)
	} else {
		let origin = if scope.is_frame() { "from iframe" } else { "from main page content" };
		format!("Extracted {} entries for student {student_id} ({origin})", scan.entries.len())
	}
}

fn first<'a>(root: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
	let selector = Selector::parse(selector).ok()?;
	root.select(&selector).next()
}

fn select_all<'a>(root: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
	match Selector::parse(selector) {
		Ok(s) => root.select(&s).collect(),
		Err(e) => {
			tracing::warn!("Unparsable entry selector '{selector}': {e:?}");
			Vec::new()
		}
	}
}
