use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use speedgrader_harvest::{
	chrome::{ChromePage, launch},
	config::{AppConfig, SettingsFlags, ms},
	driver::Harvester,
	report::{LlmSummarizer, RateLimitRetry, run_report},
};
use tracing_subscriber::{EnvFilter, fmt};
use v_utils::{io::confirm, log};

#[derive(Debug, Parser)]
#[command(name = "speedgrader_harvest")]
#[command(about = "Harvest per-student discussion submissions from SpeedGrader and summarize them", long_about = None)]
struct Cli {
	// config file, then `SPEEDGRADER_HARVEST_*` env, then flags such as `--output-dir` or `--timeouts-url-change-ms`
	#[clap(flatten)]
	settings: SettingsFlags,

	/// Debug-level logging (RUST_LOG takes precedence)
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	/// Walk the roster starting at a SpeedGrader URL, then build the report
	Harvest {
		/// SpeedGrader URL of the first student (`...speed_grader?assignment_id=..&student_id=..`)
		#[arg(short, long)]
		target_url: String,

		/// Run with visible browser window; waits for you to log in before starting
		#[arg(long)]
		visible: bool,

		/// Browser profile that already holds an authenticated session
		#[arg(long)]
		user_data_dir: Option<PathBuf>,

		/// Stop after the JSON files, without summarizing into CSV
		#[arg(long)]
		no_report: bool,
	},
	/// Build the CSV report from an existing compiled JSON report
	Report {
		/// Compiled JSON report (defaults to the one in the output folder)
		#[arg(short, long)]
		input: Option<PathBuf>,

		/// CSV destination (defaults to the output folder)
		#[arg(short = 'w', long)]
		output: Option<PathBuf>,
	},
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	let cli = Cli::parse();

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "info" }));
	fmt().with_env_filter(filter).with_target(false).init();

	let mut config = AppConfig::try_build(cli.settings)?;

	match cli.command {
		Command::Harvest {
			target_url,
			visible,
			user_data_dir,
			no_report,
		} => {
			config.visible |= visible;
			if user_data_dir.is_some() {
				config.user_data_dir = user_data_dir;
			}
			harvest(&config, &target_url).await?;
			if !no_report {
				report(&config, None, None).await?;
			}
		}
		Command::Report { input, output } => report(&config, input, output).await?,
	}

	Ok(())
}

async fn harvest(config: &AppConfig, target_url: &str) -> Result<()> {
	if !target_url.contains("speed_grader") {
		bail!("Expected a SpeedGrader URL, got {target_url}");
	}

	let (mut browser, handle) = launch(config).await?;
	let page = browser.new_page("about:blank").await.map_err(|e| eyre!("Failed to create new page: {}", e))?;

	log!("Navigating to target URL: {target_url}");
	page.goto(target_url).await.map_err(|e| eyre!("Failed to navigate to target URL: {}", e))?;

	// Authentication stays with the operator: a logged-in profile, or a manual login in the visible window
	if config.visible && !confirm("Log in if needed and open the first student in SpeedGrader. Start harvesting?").await {
		log!("Cancelled by user");
		browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
		handle.abort();
		return Ok(());
	}

	let session_id = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
	let page = ChromePage::new(page);
	let outcome = Harvester::new(&page, config, session_id).run().await;
	log!("Harvest ended ({}) with {} records", outcome.termination, outcome.records.len());

	drop(page);
	browser.close().await.map_err(|e| eyre!("Failed to close browser: {}", e))?;
	drop(browser);
	handle.abort();
	Ok(())
}

async fn report(config: &AppConfig, input: Option<PathBuf>, output: Option<PathBuf>) -> Result<()> {
	let compiled = input.unwrap_or_else(|| config.compiled_report_path());
	let csv_path = output.unwrap_or_else(|| config.csv_report_path());
	if !compiled.exists() {
		bail!("Cannot build report: compiled JSON report '{}' not found", compiled.display());
	}

	if std::env::var("CLAUDE_TOKEN").is_err() {
		bail!("Cannot build report: CLAUDE_TOKEN is not set");
	}

	let summarizer = RateLimitRetry::new(LlmSummarizer, ms(config.rate_limit_backoff_ms));
	run_report(&compiled, &csv_path, config.max_entries, &summarizer, config.summary_concurrency).await?;
	Ok(())
}
