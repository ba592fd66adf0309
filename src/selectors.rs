//! CSS locators for the SpeedGrader page and the discussion markup it embeds

use crate::resolve::{Candidate, Source};

pub const NEXT_STUDENT_BUTTON: &str = "button#next-student-button, button[aria-label='Next Student'], button[data-testid='next-student-button']";

pub const STUDENT_NAME: &[&str] = &["span.ui-selectmenu-status span.ui-selectmenu-item-header", "#speedgrader_selected_student_label"];

pub const NO_SUBMISSION_INDICATOR: &str = "div#this_student_does_not_have_a_submission";

pub const FRAME_HOLDER: &str = "div#iframe_holder";
pub const SUBMISSION_FRAME: &str = "iframe#speedgrader_iframe";
pub const FRAME_ROOT: &str = "body";

pub const MAIN_CONTENT: &str = "div#content.ic-Layout-contentMain";
/// Looked up inside `MAIN_CONTENT`
pub const SUBMISSION_DESCRIPTION: &str = "div.submission_description";

pub const ENTRY_PRIMARY: &str = "div.discussion_entry.communication_message";
/// Newer discussion markup and comment threads
pub const ENTRY_FALLBACK: &str = "article.discussion-entry, div.comment_holder > div.comment";

pub const POST_DATE: &[Candidate] = &[
	Candidate::new("div.header div.post_date.time_ago_date", &[Source::Attr("data-timestamp"), Source::Attr("title"), Source::Text]),
	Candidate::new(".discussion-header-content time", &[Source::Attr("datetime"), Source::Attr("title"), Source::Text]),
	Candidate::new(".posted_at time", &[Source::Attr("datetime"), Source::Attr("title"), Source::Text]),
];

pub const CONTENT: &[Candidate] = &[
	Candidate::new("div.content div.message.user_content.enhanced", &[Source::Text]),
	Candidate::new(".message_body", &[Source::Text]),
	Candidate::new(".entry_content", &[Source::Text]),
];

/// `MAIN_CONTENT` and `SUBMISSION_DESCRIPTION` as one descendant selector
pub fn submission_description_in_main() -> String {
	format!("{MAIN_CONTENT} {SUBMISSION_DESCRIPTION}")
}
