mod common;

use common::*;
use std::sync::atomic::Ordering;

use speedgrader_harvest::{
	DiscussionEntry, ID_NOT_FOUND, StudentSubmissionData,
	config::WaitTimeouts,
	driver::{Harvester, Termination},
	extract::{SearchRoot, locate_search_root},
	output::{load_compiled, student_file_name},
	page::{ControlState, Probe},
	report::run_report,
	scope::Scope,
	selectors::{FRAME_HOLDER, FRAME_ROOT, MAIN_CONTENT, NEXT_STUDENT_BUTTON, SUBMISSION_FRAME, submission_description_in_main},
	student::{CRITICAL_FAILURE_STATUS, NO_SUBMISSION_STATUS},
};

const FRAME_IN_HOLDER: &str = r#"<div id="iframe_holder"><iframe id="speedgrader_iframe"></iframe></div>"#;

fn two_entries(tag: &str) -> String {
	format!("{}{}", entry("2024-02-01T09:00:00Z", &format!("{tag} first thoughts")), entry("2024-02-03T17:30:00Z", &format!("{tag} reply to a peer")))
}

#[tokio::test]
async fn three_student_roster_end_to_end() {
	let config = test_config("e2e");
	let page = FakeGrader::new(vec![
		FakeStudent::framed("101", "Ada Lovelace", &two_entries("ada")),
		FakeStudent::inline("102", "Alan Turing", ""),
		FakeStudent::inline("103", "Grace Hopper", &two_entries("grace")).last(),
	]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.termination, Termination::EndOfRoster(ControlState::Disabled));
	assert_eq!(outcome.records.len(), 3);
	assert_eq!(outcome.records[0].entries.len(), 2);
	assert!(outcome.records[0].status.as_deref().unwrap().ends_with("(from iframe)"));
	assert!(outcome.records[1].entries.is_empty());
	assert!(outcome.records[1].status.as_deref().unwrap().contains("no entries found"));
	assert_eq!(outcome.records[2].entries[1].content, "grace reply to a peer");
	assert!(outcome.records.iter().flat_map(|r| &r.entries).all(DiscussionEntry::has_payload));
	assert!(outcome.records[2].entries.iter().all(|e| e.author == "Grace Hopper"));

	let compiled = load_compiled(&config.compiled_report_path()).unwrap();
	assert_eq!(compiled, outcome.records);
	for record in &compiled {
		assert!(config.output_dir.join(student_file_name(record)).exists());
	}

	let rows = run_report(&config.compiled_report_path(), &config.csv_report_path(), 4, &FakeSummarizer, 2).await.unwrap();
	assert_eq!(rows, 3);

	let mut reader = csv::Reader::from_path(config.csv_report_path()).unwrap();
	let headers = reader.headers().unwrap().clone();
	assert_eq!(headers.len(), 2 + 3 * 4);
	let col = |name: &str| headers.iter().position(|h| h == name).unwrap();

	let data: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
	assert_eq!(data.len(), 3);
	for row in &data {
		for name in ["entry_3_date", "entry_3_content", "entry_3_summary", "entry_4_date"] {
			assert_eq!(&row[col(name)], "");
		}
	}
	assert_eq!(&data[0][col("student_id")], "101");
	assert_eq!(&data[0][col("entry_1_date")], "2024-02-01T09:00:00Z");
	assert!(data[0][col("entry_2_summary")].starts_with("about: ada reply"));
	assert_eq!(&data[1][col("entry_1_content")], "");
	assert_eq!(&data[2][col("student_name")], "Grace Hopper");
}

#[tokio::test]
async fn absent_next_control_ends_after_first_student() {
	let config = test_config("absent_next");
	let page = FakeGrader::new(vec![FakeStudent::inline("7", "Solo", &two_entries("solo")).with_next(ControlState::Absent)]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.termination, Termination::EndOfRoster(ControlState::Absent));
	assert!(outcome.termination.is_normal());
	assert_eq!(outcome.records.len(), 1);
	assert_eq!(page.clicks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_student_stops_without_duplicate() {
	let config = test_config("repeated");
	let page = FakeGrader::new(vec![
		FakeStudent::inline("1", "Ada", &two_entries("a")),
		FakeStudent::inline("1", "Ada", &two_entries("a")).with_url(format!("{}&attempt=2", grader_url("1"))),
		FakeStudent::inline("2", "Never Reached", "").last(),
	]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.termination, Termination::RepeatedId("1".into()));
	assert_eq!(outcome.records.len(), 1);
	assert_eq!(load_compiled(&config.compiled_report_path()).unwrap().len(), 1);
}

#[tokio::test]
async fn unresolvable_id_keeps_partial_record() {
	let config = test_config("no_id");
	let page = FakeGrader::new(vec![
		FakeStudent::inline("x", "Ada", &two_entries("a")).with_url("https://canvas.test/courses/1/gradebook/speed_grader?assignment_id=9".into()),
	]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.termination, Termination::UnresolvedId);
	assert_eq!(outcome.records.len(), 1);
	assert_eq!(outcome.records[0].student_id, ID_NOT_FOUND);
	assert_eq!(outcome.records[0].entries.len(), 2);
	assert_eq!(load_compiled(&config.compiled_report_path()).unwrap(), outcome.records);
}

#[tokio::test]
async fn stuck_navigation_terminates_with_partial_output() {
	let config = test_config("stuck");
	let page = FakeGrader::new(vec![FakeStudent::inline("1", "Ada", &two_entries("a")), FakeStudent::inline("2", "Alan", "").last()]).stuck();

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert!(matches!(outcome.termination, Termination::Stuck(_)));
	assert_eq!(outcome.records.len(), 1);
	assert!(config.compiled_report_path().exists());
}

/// Inline entries in the grader page next to `holder`, and a submission frame with a single entry of its own
fn inline_and_framed(holder: &str) -> FakeStudent {
	FakeStudent {
		top_html: page_html("Ada", &format!("{holder}{}", main_content(&two_entries("inline")))),
		frame_html: Some(format!("<html><body>{}</body></html>", main_content(&entry("2000-01-01", "frame only")))),
		..FakeStudent::inline("5", "Ada", "")
	}
	.last()
}

async fn harvest_single(name: &str, student: FakeStudent) -> StudentSubmissionData {
	let config = test_config(name);
	let page = FakeGrader::new(vec![student]);
	let mut outcome = Harvester::new(&page, &config, "test").run().await;
	assert_eq!(outcome.records.len(), 1);
	outcome.records.remove(0)
}

fn assert_read_from_top(record: &StudentSubmissionData) {
	let status = record.status.as_deref().unwrap();
	assert_eq!(record.entries.len(), 2, "{status}");
	assert_eq!(record.entries[0].content, "inline first thoughts");
	assert!(status.ends_with("(from main page content)"), "{status}");
	assert!(record.error.is_none());
}

#[tokio::test]
async fn visible_frame_is_searched_instead_of_top_document() {
	let record = harvest_single("frame_preferred", inline_and_framed(FRAME_IN_HOLDER)).await;

	assert_eq!(record.entries.len(), 1);
	assert_eq!(record.entries[0].content, "frame only");
	assert!(record.status.as_deref().unwrap().ends_with("(from iframe)"));
}

#[tokio::test]
async fn hidden_frame_holder_falls_back_to_top_document() {
	let record = harvest_single("frame_fallback", inline_and_framed(FRAME_IN_HOLDER).with_hidden(FRAME_HOLDER)).await;
	assert_read_from_top(&record);
}

#[tokio::test]
async fn holder_without_frame_element_falls_back_to_top_document() {
	let record = harvest_single("frame_missing", inline_and_framed(r#"<div id="iframe_holder"></div>"#)).await;
	assert_read_from_top(&record);
}

#[tokio::test]
async fn hidden_frame_element_falls_back_to_top_document() {
	let record = harvest_single("frame_hidden", inline_and_framed(FRAME_IN_HOLDER).with_hidden(SUBMISSION_FRAME)).await;
	assert_read_from_top(&record);
}

#[tokio::test]
async fn frame_body_never_visible_falls_back_to_top_document() {
	let record = harvest_single("frame_body_hidden", inline_and_framed(FRAME_IN_HOLDER).with_hidden(FRAME_ROOT)).await;
	assert_read_from_top(&record);
}

/// One entry in the submission description, one elsewhere in the content area, one outside it
fn layered_student() -> FakeStudent {
	let body = format!(
		r#"<div id="content" class="ic-Layout-contentMain"><div class="submission_description">{}</div>{}</div>{}"#,
		entry("2024-01-01", "in description"),
		entry("2024-01-02", "in content area"),
		entry("2024-01-03", "outside content area")
	);
	FakeStudent {
		top_html: page_html("Ada", &body),
		..FakeStudent::inline("6", "Ada", "")
	}
	.last()
}

#[tokio::test]
async fn search_root_widens_when_content_waits_time_out() {
	let timeouts = WaitTimeouts::uniform(10);
	let cases = [
		(layered_student(), SearchRoot::SubmissionDescription, vec!["in description"]),
		(
			layered_student().with_hidden(&submission_description_in_main()),
			SearchRoot::MainContent,
			vec!["in description", "in content area"],
		),
		(layered_student().with_hidden(MAIN_CONTENT), SearchRoot::Scope, vec!["in description", "in content area", "outside content area"]),
	];

	for (i, (student, root, contents)) in cases.into_iter().enumerate() {
		let page = FakeGrader::new(vec![student.clone()]);
		assert_eq!(locate_search_root(&page, &Scope::top(), &timeouts).await, root);

		let record = harvest_single(&format!("search_root_{i}"), student).await;
		let found: Vec<&str> = record.entries.iter().map(|e| e.content.as_str()).collect();
		assert_eq!(found, contents, "{root:?}");
	}
}

#[tokio::test]
async fn hidden_next_button_does_not_block_extraction() {
	let config = test_config("next_hidden");
	let page = FakeGrader::new(vec![
		FakeStudent::inline("1", "Ada", &two_entries("a")).with_hidden(NEXT_STUDENT_BUTTON),
		FakeStudent::inline("2", "Alan", &two_entries("b")).last(),
	]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.termination, Termination::EndOfRoster(ControlState::Disabled));
	assert_eq!(outcome.records.len(), 2);
	assert!(outcome.records.iter().all(|r| r.entries.len() == 2));
}

#[tokio::test]
async fn unsettled_network_does_not_block_extraction() {
	let record = harvest_single("network_unsettled", FakeStudent::inline("1", "Ada", &two_entries("a")).with_idle(Probe::TimedOut).last()).await;

	assert_eq!(record.entries.len(), 2);
	assert!(record.error.is_none());
}

#[tokio::test]
async fn network_not_settling_after_advance_is_stuck() {
	let config = test_config("unsettled_advance");
	let page = FakeGrader::new(vec![
		FakeStudent::inline("1", "Ada", &two_entries("a")),
		FakeStudent::inline("2", "Alan", &two_entries("b")).with_idle(Probe::TimedOut).last(),
	]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	match &outcome.termination {
		Termination::Stuck(reason) => assert!(reason.contains("network did not settle"), "{reason}"),
		other => panic!("unexpected termination: {other}"),
	}
	assert_eq!(outcome.records.len(), 1);
	assert_eq!(page.clicks.load(Ordering::SeqCst), 1);
	assert_eq!(load_compiled(&config.compiled_report_path()).unwrap().len(), 1);
}

#[tokio::test]
async fn explicit_no_submission_indicator() {
	let config = test_config("no_submission");
	let student = FakeStudent {
		top_html: page_html("Ada", r#"<div id="this_student_does_not_have_a_submission">No submission</div>"#),
		..FakeStudent::inline("8", "Ada", "")
	}
	.last();
	let page = FakeGrader::new(vec![student]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.records[0].status.as_deref(), Some(NO_SUBMISSION_STATUS));
	assert!(outcome.records[0].entries.is_empty());
}

#[tokio::test]
async fn unexpected_failure_becomes_error_record_and_walk_continues() {
	let config = test_config("critical");
	let broken = FakeStudent {
		fail_snapshot: true,
		..FakeStudent::inline("1", "Ada", &two_entries("a"))
	};
	let page = FakeGrader::new(vec![broken, FakeStudent::inline("2", "Alan", &two_entries("b")).last()]);

	let outcome = Harvester::new(&page, &config, "test").run().await;

	assert_eq!(outcome.records.len(), 2);
	let failed = &outcome.records[0];
	assert_eq!(failed.student_id, "1");
	assert_eq!(failed.student_name, "Ada");
	assert_eq!(failed.status.as_deref(), Some(CRITICAL_FAILURE_STATUS));
	assert_eq!(failed.error.as_deref(), Some("target closed"));
	assert!(failed.entries.is_empty());
	assert_eq!(outcome.records[1].entries.len(), 2);
}

#[tokio::test]
async fn accepted_ids_are_unique() {
	let config = test_config("unique");
	let page = FakeGrader::new((1..=5).map(|i| {
		let s = FakeStudent::inline(&i.to_string(), &format!("Student {i}"), &two_entries("x"));
		if i == 5 { s.last() } else { s }
	}).collect());

	let outcome = Harvester::new(&page, &config, "test").run().await;

	let mut ids: Vec<&str> = outcome.records.iter().map(|r| r.student_id.as_str()).collect();
	assert_eq!(ids.len(), 5);
	ids.sort();
	ids.dedup();
	assert_eq!(ids.len(), 5);
}
