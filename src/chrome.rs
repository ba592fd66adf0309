//! [`GraderPage`] over a chromiumoxide tab

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::{
	Page,
	browser::{Browser, BrowserConfig},
};
use color_eyre::{
	Result,
	eyre::{bail, eyre},
};
use futures::StreamExt;
use tokio::{task::JoinHandle, time::Instant};
use v_utils::log;

use crate::{
	config::AppConfig,
	page::{ControlState, Document, GraderPage, Probe},
	student::parse_student_id,
};

/// Upper bound of a single script evaluation
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
/// Resource count must hold still this long for the network to count as idle
const IDLE_WINDOW: Duration = Duration::from_millis(500);

/// Launch the browser and keep its CDP event stream drained
pub async fn launch(config: &AppConfig) -> Result<(Browser, JoinHandle<()>)> {
	let mut builder = BrowserConfig::builder();
	if config.visible {
		builder = builder.with_head();
	}
	if let Some(dir) = &config.user_data_dir {
		builder = builder.user_data_dir(dir);
	}
	let browser_config = builder.build().map_err(|e| eyre!("Failed to build browser config: {}", e))?;

	let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| eyre!("Failed to launch browser: {}", e))?;

	// Events are mostly noise, but the browser stalls if nobody consumes them
	let handle = tokio::spawn(async move { while let Some(_event) = handler.next().await {} });

	log!("Browser launched (visible: {})", config.visible);
	Ok((browser, handle))
}

pub struct ChromePage {
	page: Page,
	poll: Duration,
}

impl ChromePage {
	pub fn new(page: Page) -> Self {
		Self {
			page,
			poll: Duration::from_millis(250),
		}
	}

	async fn eval(&self, script: String) -> Result<serde_json::Value> {
		let result = tokio::time::timeout(CALL_TIMEOUT, self.page.evaluate(script))
			.await
			.map_err(|_| eyre!("Browser did not answer within {:?}", CALL_TIMEOUT))?
			.map_err(|e| eyre!("Failed to evaluate script: {}", e))?;
		Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
	}

	async fn element_state(&self, document: &Document, selector: &str) -> Result<ControlState> {
		let script = format!(
			r#"
			(function() {{
				const doc = {doc};
				if (!doc) return 'absent';
				const el = doc.querySelector({sel});
				if (!el) return 'absent';
				const view = doc.defaultView || window;
				const style = view.getComputedStyle(el);
				if (el.getClientRects().length === 0 || style.visibility === 'hidden' || style.display === 'none') return 'hidden';
				if (el.disabled || el.getAttribute('aria-disabled') === 'true') return 'disabled';
				return 'ready';
			}})()
			"#,
			doc = document_expr(document),
			sel = js_str(selector)
		);

		let state = match self.eval(script).await?.as_str() {
			Some("ready") => ControlState::Ready,
			Some("disabled") => ControlState::Disabled,
			Some("hidden") => ControlState::Hidden,
			_ => ControlState::Absent,
		};
		Ok(state)
	}

	async fn load_marker(&self) -> Result<(bool, u64)> {
		let script = r#"
			(function() {
				return JSON.stringify([document.readyState === 'complete', performance.getEntriesByType('resource').length]);
			})()
		"#;
		let raw = self.eval(script.to_string()).await?;
		let json_str = raw.as_str().unwrap_or("[false, 0]");
		let (complete, resources): (bool, u64) = serde_json::from_str(json_str).map_err(|e| eyre!("Failed to parse load state: {}", e))?;
		Ok((complete, resources))
	}
}

#[async_trait]
impl GraderPage for ChromePage {
	async fn url(&self) -> Result<String> {
		let url = self.page.url().await.map_err(|e| eyre!("Failed to get URL: {}", e))?;
		Ok(url.unwrap_or_default())
	}

	async fn wait_visible(&self, document: &Document, selector: &str, timeout: Duration) -> Result<Probe> {
		let deadline = Instant::now() + timeout;
		let mut attached = false;
		loop {
			match self.element_state(document, selector).await? {
				ControlState::Ready | ControlState::Disabled => return Ok(Probe::Found),
				ControlState::Hidden => attached = true,
				ControlState::Absent => {}
			}
			if Instant::now() >= deadline {
				return Ok(if attached { Probe::TimedOut } else { Probe::NotFound });
			}
			tokio::time::sleep(self.poll).await;
		}
	}

	async fn count(&self, document: &Document, selector: &str) -> Result<usize> {
		let script = format!(
			r#"
			(function() {{
				const doc = {doc};
				return doc ? doc.querySelectorAll({sel}).length : 0;
			}})()
			"#,
			doc = document_expr(document),
			sel = js_str(selector)
		);
		Ok(self.eval(script).await?.as_u64().unwrap_or(0) as usize)
	}

	async fn text_content(&self, document: &Document, selector: &str) -> Result<Option<String>> {
		let script = format!(
			r#"
			(function() {{
				const doc = {doc};
				const el = doc ? doc.querySelector({sel}) : null;
				return el ? el.textContent : null;
			}})()
			"#,
			doc = document_expr(document),
			sel = js_str(selector)
		);
		Ok(self.eval(script).await?.as_str().map(|s| s.to_string()))
	}

	async fn snapshot(&self, document: &Document) -> Result<String> {
		let script = format!(
			r#"
			(function() {{
				const doc = {doc};
				return doc && doc.documentElement ? doc.documentElement.outerHTML : null;
			}})()
			"#,
			doc = document_expr(document)
		);
		match self.eval(script).await?.as_str() {
			Some(html) => Ok(html.to_string()),
			None => bail!("Document {:?} is not accessible", document),
		}
	}

	async fn control_state(&self, selector: &str, timeout: Duration) -> Result<ControlState> {
		let deadline = Instant::now() + timeout;
		loop {
			let state = self.element_state(&Document::Top, selector).await?;
			if state == ControlState::Ready || Instant::now() >= deadline {
				return Ok(state);
			}
			tokio::time::sleep(self.poll).await;
		}
	}

	async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
		let click = async {
			let element = self.page.find_element(selector).await.map_err(|e| eyre!("Failed to find '{}': {}", selector, e))?;
			element.click().await.map_err(|e| eyre!("Failed to click '{}': {}", selector, e))?;
			Ok::<(), color_eyre::Report>(())
		};
		tokio::time::timeout(timeout, click).await.map_err(|_| eyre!("Click on '{}' did not complete within {:?}", selector, timeout))?
	}

	async fn wait_network_idle(&self, timeout: Duration) -> Result<Probe> {
		let deadline = Instant::now() + timeout;
		let mut last: Option<u64> = None;
		let mut stable_since = Instant::now();
		loop {
			let (complete, resources) = self.load_marker().await?;
			if last != Some(resources) {
				last = Some(resources);
				stable_since = Instant::now();
			} else if complete && stable_since.elapsed() >= IDLE_WINDOW {
				return Ok(Probe::Found);
			}
			if Instant::now() >= deadline {
				return Ok(Probe::TimedOut);
			}
			tokio::time::sleep(self.poll).await;
		}
	}

	async fn wait_student_change(&self, from_url: &str, timeout: Duration) -> Result<Probe> {
		let deadline = Instant::now() + timeout;
		let from = parse_student_id(from_url);
		loop {
			let current = parse_student_id(&self.url().await?);
			if current.is_some() && current != from {
				return Ok(Probe::Found);
			}
			if Instant::now() >= deadline {
				return Ok(Probe::TimedOut);
			}
			tokio::time::sleep(self.poll).await;
		}
	}
}

/// JS string literal for `s`
fn js_str(s: &str) -> String {
	serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// JS expression evaluating to the `Document` object, or null when a frame is missing or cross-origin
fn document_expr(document: &Document) -> String {
	match document {
		Document::Top => "document".to_string(),
		Document::Frame(selector) => format!(
			"(function() {{ const frame = document.querySelector({}); try {{ return frame ? frame.contentDocument : null; }} catch (e) {{ return null; }} }})()",
			js_str(selector)
		),
	}
}
