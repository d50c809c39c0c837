//! Playwright browser automation
//!
//! A long-lived `node` process runs [`BRIDGE_SCRIPT`] and keeps one page
//! open for the whole run, so interaction state carries from step to step.
//! Requests and responses are single JSON lines:
//!
//! ```text
//! -> {"id":7,"op":"style","args":{"selector":"h1","index":0,"properties":["fontSize"]}}
//! <- {"id":7,"ok":true,"value":{"fontSize":"60px"}}
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use uiparity_common::Viewport;

use crate::config::BrowserConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::session::PageSession;

/// Node side of the bridge
pub const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const [kind, headless, width, height] = process.argv.slice(2);
const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

(async () => {
  let browser, context, page;
  try {
    browser = await playwright[kind].launch({ headless: headless === 'true' });
    context = await browser.newContext({ viewport: { width: Number(width), height: Number(height) } });
    page = await context.newPage();
  } catch (error) {
    send({ ready: false, ok: false, error: error.message });
    process.exit(1);
  }

  const nth = (a) => page.locator(a.selector).nth(a.index || 0);
  const present = async (a) => (await page.locator(a.selector).count()) > (a.index || 0);

  const ops = {
    async goto(a) {
      const response = await page.goto(a.url, { waitUntil: 'domcontentloaded', timeout: a.timeout_ms });
      if (response && !response.ok()) throw new Error(`HTTP ${response.status()} for ${a.url}`);
      return null;
    },
    async count(a) {
      return await page.locator(a.selector).count();
    },
    async style(a) {
      if (!(await present(a))) return null;
      return await nth(a).evaluate((el, props) => {
        const computed = getComputedStyle(el);
        const out = {};
        for (const p of props) {
          const v = computed[p];
          if (typeof v === 'string') out[p] = v;
        }
        return out;
      }, a.properties);
    },
    async attribute(a) {
      if (!(await present(a))) return null;
      return await nth(a).getAttribute(a.name);
    },
    async text(a) {
      if (!(await present(a))) return null;
      return await nth(a).textContent();
    },
    async visible(a) {
      if (!(await present(a))) return false;
      return await nth(a).isVisible();
    },
    async focused(a) {
      return await page.evaluate((sel) => {
        const el = document.activeElement;
        return !!el && el !== document.body && !!el.closest(sel);
      }, a.selector);
    },
    async click(a) {
      await nth(a).click({ timeout: a.timeout_ms });
      return null;
    },
    async hover(a) {
      await nth(a).hover({ timeout: a.timeout_ms });
      return null;
    },
    async press(a) {
      await page.keyboard.press(a.key);
      return null;
    },
    async viewport(a) {
      await page.setViewportSize({ width: a.width, height: a.height });
      return null;
    },
    async reset() {
      await context.clearCookies();
      await page.evaluate(() => {
        try { localStorage.clear(); sessionStorage.clear(); } catch (_) {}
      });
      return null;
    },
    async close() {
      await browser.close();
      return null;
    },
  };

  send({ ready: true, ok: true });

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (error) {
      send({ ok: false, error: 'invalid request: ' + error.message });
      continue;
    }
    const op = ops[req.op];
    if (!op) {
      send({ id: req.id, ok: false, error: 'unknown op ' + req.op });
      continue;
    }
    try {
      send({ id: req.id, ok: true, value: await op(req.args || {}) });
    } catch (error) {
      send({ id: req.id, ok: false, error: error.message });
    }
    if (req.op === 'close') break;
  }
  process.exit(0);
})();
"#;

#[derive(Debug, Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    op: &'a str,
    args: Value,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: Option<bool>,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl BridgeIo {
    /// Send one request line and read lines until its response arrives
    async fn exchange(&mut self, id: u64, request: &str) -> HarnessResult<BridgeResponse> {
        self.stdin.write_all(request.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;

        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(HarnessError::Bridge("bridge process exited".to_string()));
            }
            trace!("bridge -> {}", line.trim());
            let response: BridgeResponse = serde_json::from_str(line.trim())?;
            if response.id == Some(id) {
                return Ok(response);
            }
            // Late answer to a request that already timed out
            warn!("Discarding bridge response {:?} (waiting for {})", response.id, id);
        }
    }
}

/// A browser page driven through the node bridge
pub struct PlaywrightSession {
    io: Mutex<BridgeIo>,
    child: Mutex<Option<Child>>,
    next_id: AtomicU64,
    request_timeout: Duration,
    /// Holds the bridge script on disk for the process lifetime
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Start a browser at `viewport`
    pub async fn launch(config: &BrowserConfig, viewport: &Viewport) -> HarnessResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("uiparity-bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let mut cmd = TokioCommand::new("node");
        cmd.arg(&script_path)
            .arg(config.kind.as_str())
            .arg(config.headless.to_string())
            .arg(viewport.width.to_string())
            .arg(viewport.height.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            cmd.env("NODE_PATH", node_path);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::Bridge(format!("failed to start node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| HarnessError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Bridge("bridge stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("bridge: {}", line);
                }
            });
        }

        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let mut stdout = BufReader::new(stdout);
        let mut line = String::new();
        timeout(request_timeout, stdout.read_line(&mut line))
            .await
            .map_err(|_| HarnessError::Timeout(format!("{} to launch", config.kind.as_str())))??;

        let greeting: BridgeResponse = serde_json::from_str(line.trim())
            .map_err(|e| HarnessError::Bridge(format!("invalid greeting {:?}: {}", line.trim(), e)))?;
        if greeting.ready != Some(true) {
            return Err(HarnessError::Bridge(
                greeting
                    .error
                    .unwrap_or_else(|| "browser failed to start".to_string()),
            ));
        }

        info!(
            "Launched {} ({}, {}x{})",
            config.kind.as_str(),
            if config.headless { "headless" } else { "headed" },
            viewport.width,
            viewport.height
        );

        Ok(Self {
            io: Mutex::new(BridgeIo { stdin, stdout }),
            child: Mutex::new(Some(child)),
            next_id: AtomicU64::new(1),
            request_timeout,
            _script_dir: script_dir,
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> HarnessResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(HarnessError::PlaywrightNotFound),
        }
    }

    async fn call<T: DeserializeOwned>(&self, op: &str, args: Value) -> HarnessResult<T> {
        self.call_with_deadline(op, args, self.request_timeout).await
    }

    async fn call_with_deadline<T: DeserializeOwned>(
        &self,
        op: &str,
        args: Value,
        deadline: Duration,
    ) -> HarnessResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::to_string(&BridgeRequest { id, op, args })?;
        trace!("bridge <- {}", request);

        let mut io = self.io.lock().await;
        let response = timeout(deadline, io.exchange(id, &request))
            .await
            .map_err(|_| HarnessError::Timeout(format!("bridge op '{}' ({}ms)", op, deadline.as_millis())))??;
        drop(io);

        if !response.ok {
            return Err(HarnessError::Browser {
                op: op.to_string(),
                reason: response.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        Ok(serde_json::from_value(response.value)?)
    }

    fn action_timeout_ms(&self) -> u64 {
        // Leave the bridge room to report Playwright's own timeout
        (self.request_timeout.as_millis() as u64).saturating_sub(1_000).max(1_000)
    }
}

#[async_trait]
impl PageSession for PlaywrightSession {
    async fn navigate(&self, url: &str, nav_timeout: Duration) -> HarnessResult<()> {
        let deadline = nav_timeout + Duration::from_secs(5);
        self.call_with_deadline::<Value>(
            "goto",
            json!({ "url": url, "timeout_ms": nav_timeout.as_millis() as u64 }),
            deadline,
        )
        .await?;
        Ok(())
    }

    async fn count(&self, selector: &str) -> HarnessResult<usize> {
        self.call("count", json!({ "selector": selector })).await
    }

    async fn computed_style(
        &self,
        selector: &str,
        index: usize,
        properties: &[&str],
    ) -> HarnessResult<Option<BTreeMap<String, String>>> {
        self.call(
            "style",
            json!({ "selector": selector, "index": index, "properties": properties }),
        )
        .await
    }

    async fn attribute(&self, selector: &str, index: usize, name: &str) -> HarnessResult<Option<String>> {
        self.call("attribute", json!({ "selector": selector, "index": index, "name": name }))
            .await
    }

    async fn text(&self, selector: &str, index: usize) -> HarnessResult<Option<String>> {
        self.call("text", json!({ "selector": selector, "index": index })).await
    }

    async fn is_visible(&self, selector: &str, index: usize) -> HarnessResult<bool> {
        self.call("visible", json!({ "selector": selector, "index": index })).await
    }

    async fn is_focused(&self, selector: &str) -> HarnessResult<bool> {
        self.call("focused", json!({ "selector": selector })).await
    }

    async fn click(&self, selector: &str, index: usize) -> HarnessResult<()> {
        let args = json!({ "selector": selector, "index": index, "timeout_ms": self.action_timeout_ms() });
        self.call::<Value>("click", args).await?;
        Ok(())
    }

    async fn hover(&self, selector: &str, index: usize) -> HarnessResult<()> {
        let args = json!({ "selector": selector, "index": index, "timeout_ms": self.action_timeout_ms() });
        self.call::<Value>("hover", args).await?;
        Ok(())
    }

    async fn press(&self, key: &str) -> HarnessResult<()> {
        self.call::<Value>("press", json!({ "key": key })).await?;
        Ok(())
    }

    async fn set_viewport(&self, viewport: &Viewport) -> HarnessResult<()> {
        debug!("Viewport -> {}", viewport);
        self.call::<Value>("viewport", json!({ "width": viewport.width, "height": viewport.height }))
            .await?;
        Ok(())
    }

    async fn reset_state(&self) -> HarnessResult<()> {
        self.call::<Value>("reset", json!({})).await?;
        Ok(())
    }

    async fn close(&self) -> HarnessResult<()> {
        let result = self.call::<Value>("close", json!({})).await.map(|_| ());

        if let Some(mut child) = self.child.lock().await.take() {
            match timeout(Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => debug!("Bridge exited with {}", status),
                _ => {
                    warn!("Bridge did not exit, killing it");
                    let _ = child.kill().await;
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_one_json_line() {
        let request = BridgeRequest {
            id: 3,
            op: "style",
            args: json!({ "selector": "h1", "index": 0, "properties": ["fontSize"] }),
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["op"], "style");
        assert_eq!(parsed["args"]["properties"][0], "fontSize");
    }

    #[test]
    fn test_response_shapes() {
        let ready: BridgeResponse = serde_json::from_str(r#"{"ready":true,"ok":true}"#).unwrap();
        assert_eq!(ready.ready, Some(true));
        assert!(ready.id.is_none());

        let value: BridgeResponse =
            serde_json::from_str(r#"{"id":9,"ok":true,"value":{"color":"rgb(0, 0, 0)"}}"#).unwrap();
        let styles: Option<BTreeMap<String, String>> = serde_json::from_value(value.value).unwrap();
        assert_eq!(styles.unwrap()["color"], "rgb(0, 0, 0)");

        let missing: BridgeResponse = serde_json::from_str(r#"{"id":10,"ok":true,"value":null}"#).unwrap();
        let styles: Option<BTreeMap<String, String>> = serde_json::from_value(missing.value).unwrap();
        assert!(styles.is_none());

        let failed: BridgeResponse =
            serde_json::from_str(r#"{"id":11,"ok":false,"error":"Timeout 5000ms exceeded"}"#).unwrap();
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("Timeout 5000ms exceeded"));
    }

    #[test]
    fn test_script_handles_every_op() {
        for op in [
            "goto", "count", "style", "attribute", "text", "visible", "focused", "click", "hover", "press",
            "viewport", "reset", "close",
        ] {
            assert!(
                BRIDGE_SCRIPT.contains(&format!("async {}(", op)),
                "bridge script lacks op {}",
                op
            );
        }
    }
}
