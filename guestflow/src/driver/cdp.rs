//! Chrome DevTools Protocol implementation of [`PageDriver`].
//!
//! Connects to a running Chrome/Chromium instance over its DevTools WebSocket
//! endpoint. Commands are JSON-RPC with auto-incrementing IDs correlated back
//! to callers; Network events are folded into an in-flight request counter
//! that backs `wait_for_network_idle`.
//!
//! All DOM work goes through `Runtime.evaluate` with `returnByValue`, which
//! keeps the element surface (counts, texts, attributes, clicks) in one
//! place. Selectors and texts are embedded as JSON string literals, so any
//! quoting in them is safe.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{PageDriver, RenderedGuest};
use crate::errors::DriverError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CommandResponse>>>>;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A response to a protocol command.
#[derive(Debug, Clone)]
struct CommandResponse {
    result: Option<Value>,
    error: Option<String>,
}

/// Network quiescence tracking shared with the reader task.
///
/// In-flight requests are tracked by id, not by a counter: Chrome re-emits
/// `Network.requestWillBeSent` with the same request id for every redirect
/// hop, while only one terminal finished/failed event arrives.
#[derive(Debug)]
struct NetworkActivity {
    /// Ids of requests sent but not yet finished or failed.
    inflight: parking_lot::Mutex<HashSet<String>>,
    /// Milliseconds since connect of the last network event.
    last_event_ms: AtomicU64,
}

impl NetworkActivity {
    fn new() -> Self {
        Self {
            inflight: parking_lot::Mutex::new(HashSet::new()),
            last_event_ms: AtomicU64::new(0),
        }
    }

    fn began(&self, epoch: Instant, request_id: &str) {
        self.inflight.lock().insert(request_id.to_string());
        self.touch(epoch);
    }

    fn finished(&self, epoch: Instant, request_id: &str) {
        self.inflight.lock().remove(request_id);
        self.touch(epoch);
    }

    fn touch(&self, epoch: Instant) {
        let ms = u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.last_event_ms.store(ms, Ordering::SeqCst);
    }

    fn quiet_for(&self, epoch: Instant, window: Duration) -> bool {
        if !self.inflight.lock().is_empty() {
            return false;
        }
        let last = self.last_event_ms.load(Ordering::SeqCst);
        let now = u64::try_from(epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        now.saturating_sub(last) >= window_ms
    }
}

/// DevTools page driver over a WebSocket connection.
pub struct ChromePage {
    next_id: AtomicU64,
    pending: PendingMap,
    writer: Mutex<WsSink>,
    activity: Arc<NetworkActivity>,
    epoch: Instant,
    idle_window: Duration,
    _reader: tokio::task::JoinHandle<()>,
}

impl ChromePage {
    /// Connects to a DevTools page target and enables the Page, Runtime, and
    /// Network domains.
    ///
    /// `ws_url` has the form `ws://localhost:{port}/devtools/page/{target}`,
    /// obtainable from Chrome's `/json` endpoint. `idle_window` is the quiet
    /// period that counts as network idle.
    pub async fn connect(ws_url: &str, idle_window: Duration) -> Result<Self, DriverError> {
        info!(url = ws_url, "connecting to DevTools endpoint");

        let (stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| DriverError::connect(ws_url, e.to_string()))?;
        let (writer, reader) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let activity = Arc::new(NetworkActivity::new());
        let epoch = Instant::now();

        let reader_handle = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&activity),
            epoch,
        ));

        let page = Self {
            next_id: AtomicU64::new(1),
            pending,
            writer: Mutex::new(writer),
            activity,
            epoch,
            idle_window,
            _reader: reader_handle,
        };

        for domain in ["Page", "Runtime", "Network"] {
            page.command(&format!("{domain}.enable"), json!({})).await?;
        }

        Ok(page)
    }

    /// Sends a protocol command and waits for its correlated response.
    async fn command(&self, method: &str, params: Value) -> Result<Value, DriverError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = serde_json::to_string(&json!({
            "id": id,
            "method": method,
            "params": params,
        }))
        .map_err(|e| DriverError::protocol(format!("failed to encode command: {e}")))?;

        debug!(id, method, "sending command");

        // Register before sending so the response cannot race the insert.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.writer
            .lock()
            .await
            .send(Message::Text(frame))
            .await
            .map_err(|e| DriverError::protocol(format!("websocket send failed: {e}")))?;

        let response = tokio::time::timeout(COMMAND_TIMEOUT, rx)
            .await
            .map_err(|_| DriverError::timeout(method.to_string(), COMMAND_TIMEOUT))?
            .map_err(|_| DriverError::protocol("response channel closed".to_string()))?;

        if let Some(error) = response.error {
            return Err(DriverError::protocol(format!("{method}: {error}")));
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Evaluates a script in the page and returns its value.
    async fn eval(&self, expression: &str) -> Result<Value, DriverError> {
        let result = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;

        if let Some(exception) = result.get("exceptionDetails") {
            let message = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .and_then(Value::as_str)
                .or_else(|| exception.get("text").and_then(Value::as_str))
                .unwrap_or("unknown exception")
                .to_string();
            return Err(DriverError::ScriptException { message });
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn dispatch_key(&self, event_type: &str, key: &str, code: i64) -> Result<(), DriverError> {
        self.command(
            "Input.dispatchKeyEvent",
            json!({
                "type": event_type,
                "key": key,
                "code": key,
                "windowsVirtualKeyCode": code,
                "nativeVirtualKeyCode": code,
            }),
        )
        .await?;
        Ok(())
    }
}

/// Embeds a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// Reader task: routes responses to pending callers and folds Network events
/// into the activity counter. Everything else is dropped.
async fn read_loop(
    mut reader: WsSource,
    pending: PendingMap,
    activity: Arc<NetworkActivity>,
    epoch: Instant,
) {
    while let Some(next) = reader.next().await {
        let message = match next {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "websocket read error, stopping reader");
                break;
            }
        };

        let text = match message {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => {
                info!("websocket closed by browser");
                break;
            }
            _ => continue,
        };

        let frame: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparseable protocol frame");
                continue;
            }
        };

        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            let response = CommandResponse {
                result: frame.get("result").cloned(),
                error: frame
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(String::from),
            };
            if let Some(tx) = pending.lock().await.remove(&id) {
                let _ = tx.send(response);
            }
        } else if let Some(method) = frame.get("method").and_then(Value::as_str) {
            let request_id = frame
                .pointer("/params/requestId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            match method {
                "Network.requestWillBeSent" => activity.began(epoch, request_id),
                "Network.loadingFinished" | "Network.loadingFailed" => {
                    activity.finished(epoch, request_id);
                }
                _ => {}
            }
        }
    }

    // Connection gone; fail every pending caller.
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(CommandResponse {
            result: None,
            error: Some("websocket connection closed".to_string()),
        });
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let result = self.command("Page.navigate", json!({ "url": url })).await?;
        if let Some(reason) = result.get("errorText").and_then(Value::as_str) {
            if !reason.is_empty() {
                return Err(DriverError::navigation(url, reason));
            }
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self) -> Result<(), DriverError> {
        let deadline = Instant::now() + IDLE_TIMEOUT;
        loop {
            if self.activity.quiet_for(self.epoch, self.idle_window) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout("network idle", IDLE_TIMEOUT));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, DriverError> {
        let expr = format!("document.querySelectorAll({}).length", js_str(selector));
        let value = self.eval(&expr).await?;
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| DriverError::protocol("selector count was not a number".to_string()))
    }

    async fn texts(&self, selector: &str) -> Result<Vec<String>, DriverError> {
        let expr = format!(
            "[...document.querySelectorAll({})].map(el => el.innerText)",
            js_str(selector)
        );
        let value = self.eval(&expr).await?;
        serde_json::from_value(value)
            .map_err(|e| DriverError::protocol(format!("texts result malformed: {e}")))
    }

    async fn attrs(
        &self,
        selector: &str,
        attribute: &str,
    ) -> Result<Vec<Option<String>>, DriverError> {
        let expr = format!(
            "[...document.querySelectorAll({})].map(el => el.getAttribute({}))",
            js_str(selector),
            js_str(attribute)
        );
        let value = self.eval(&expr).await?;
        serde_json::from_value(value)
            .map_err(|e| DriverError::protocol(format!("attrs result malformed: {e}")))
    }

    async fn guest_entries(
        &self,
        selector: &str,
        name_selector: &str,
    ) -> Result<Vec<RenderedGuest>, DriverError> {
        let expr = format!(
            "[...document.querySelectorAll({})].map(el => [\
             (el.querySelector({})?.innerText ?? el.innerText), \
             el.getAttribute('href')])",
            js_str(selector),
            js_str(name_selector)
        );
        let value = self.eval(&expr).await?;
        let raw: Vec<(String, Option<String>)> = serde_json::from_value(value)
            .map_err(|e| DriverError::protocol(format!("guest entries malformed: {e}")))?;
        Ok(raw
            .into_iter()
            .map(|(name_text, href)| RenderedGuest { name_text, href })
            .collect())
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.click(); return true; }})()",
            js_str(selector)
        );
        if self.eval(&expr).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::not_found(selector))
        }
    }

    async fn click_containing(
        &self,
        selector: &str,
        substrings: &[String],
    ) -> Result<(), DriverError> {
        let needles = serde_json::to_string(substrings)
            .map_err(|e| DriverError::protocol(format!("failed to encode substrings: {e}")))?;
        let expr = format!(
            "(() => {{ const needles = {needles}; \
             const el = [...document.querySelectorAll({})]\
                 .find(e => needles.every(n => (e.textContent ?? '').includes(n))); \
             if (!el) return false; el.click(); return true; }})()",
            js_str(selector)
        );
        if self.eval(&expr).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::not_found(format!(
                "{selector} containing {substrings:?}"
            )))
        }
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), DriverError> {
        // Native value setter plus an input event, so framework-controlled
        // inputs observe the change.
        let expr = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; \
             const proto = Object.getPrototypeOf(el); \
             const desc = Object.getOwnPropertyDescriptor(proto, 'value'); \
             if (desc && desc.set) {{ desc.set.call(el, {}); }} else {{ el.value = {}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true; }})()",
            js_str(selector),
            js_str(text),
            js_str(text)
        );
        if self.eval(&expr).await?.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(DriverError::not_found(selector))
        }
    }

    async fn press_end(&self, selector: &str) -> Result<(), DriverError> {
        let expr = format!(
            "(() => {{ const el = document.querySelector({}); \
             if (!el) return false; el.focus(); return true; }})()",
            js_str(selector)
        );
        if self.eval(&expr).await?.as_bool() != Some(true) {
            return Err(DriverError::not_found(selector));
        }
        self.dispatch_key("rawKeyDown", "End", 35).await?;
        self.dispatch_key("keyUp", "End", 35).await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.count(selector).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout(selector.to_string(), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn export_session(&self) -> Result<Value, DriverError> {
        let result = self.command("Network.getAllCookies", json!({})).await?;
        let cookies = result.get("cookies").cloned().unwrap_or_else(|| json!([]));
        Ok(json!({ "cookies": cookies }))
    }

    async fn import_session(&self, bundle: &Value) -> Result<(), DriverError> {
        let cookies = bundle.get("cookies").cloned().unwrap_or_else(|| json!([]));
        self.command("Network.setCookies", json!({ "cookies": cookies }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_str_escapes_quotes() {
        assert_eq!(js_str("a\"b"), r#""a\"b""#);
        assert_eq!(js_str("plain"), "\"plain\"");
    }

    #[test]
    fn test_network_activity_starts_quiet_after_window() {
        let activity = NetworkActivity::new();
        let epoch = Instant::now() - Duration::from_secs(10);
        assert!(activity.quiet_for(epoch, Duration::from_secs(2)));
    }

    #[test]
    fn test_network_activity_inflight_blocks_idle() {
        let activity = NetworkActivity::new();
        let epoch = Instant::now() - Duration::from_secs(10);
        activity.began(epoch, "req-1");
        assert!(!activity.quiet_for(epoch, Duration::from_millis(0)));
        activity.finished(epoch, "req-1");
        // Inflight drained, but the last event was just now.
        assert!(!activity.quiet_for(epoch, Duration::from_secs(2)));
        assert!(activity.quiet_for(epoch, Duration::from_millis(0)));
    }

    #[test]
    fn test_redirected_request_drains_on_single_finish() {
        // Redirect hops re-emit requestWillBeSent with the same request id
        // but produce only one terminal loadingFinished.
        let activity = NetworkActivity::new();
        let epoch = Instant::now() - Duration::from_secs(60);
        activity.began(epoch, "req-1");
        activity.began(epoch, "req-1");
        activity.finished(epoch, "req-1");
        assert!(activity.quiet_for(epoch, Duration::from_millis(0)));
    }

    #[test]
    fn test_concurrent_requests_tracked_independently() {
        let activity = NetworkActivity::new();
        let epoch = Instant::now() - Duration::from_secs(60);
        activity.began(epoch, "req-1");
        activity.began(epoch, "req-2");
        activity.finished(epoch, "req-1");
        assert!(!activity.quiet_for(epoch, Duration::from_millis(0)));
        activity.finished(epoch, "req-2");
        assert!(activity.quiet_for(epoch, Duration::from_millis(0)));
    }

    #[test]
    fn test_response_frame_parsing() {
        let frame: Value = serde_json::from_str(
            r#"{"id": 7, "result": {"result": {"type": "number", "value": 42}}}"#,
        )
        .expect("valid frame");
        assert_eq!(frame.get("id").and_then(Value::as_u64), Some(7));

        let error_frame: Value =
            serde_json::from_str(r#"{"id": 8, "error": {"code": -32000, "message": "boom"}}"#)
                .expect("valid frame");
        let message = error_frame
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str);
        assert_eq!(message, Some("boom"));
    }

    #[test]
    fn test_event_frame_has_no_id() {
        let frame: Value = serde_json::from_str(
            r#"{"method": "Network.requestWillBeSent", "params": {"requestId": "1"}}"#,
        )
        .expect("valid frame");
        assert!(frame.get("id").is_none());
        assert_eq!(
            frame.get("method").and_then(Value::as_str),
            Some("Network.requestWillBeSent")
        );
    }
}
