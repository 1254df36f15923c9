//! W3C WebDriver client for Appium-compatible endpoints

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use crate::capabilities::Capabilities;
use crate::common::{Error, Result};

use super::{ElementId, Locator, Orientation, UiDriver};

/// Key under which W3C endpoints return element references
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Key used by legacy JSONWP endpoints
const LEGACY_ELEMENT_KEY: &str = "ELEMENT";

/// An open session on the automation endpoint
#[derive(Debug)]
pub struct WebDriverSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverSession {
    /// Create a session from a capability profile
    ///
    /// No retry: an unreachable endpoint fails immediately.
    pub async fn create(
        endpoint: &str,
        capabilities: &Capabilities,
        implicit_wait: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        let body = json!({
            "capabilities": {
                "alwaysMatch": capabilities.as_value(),
                "firstMatch": [{}],
            }
        });

        tracing::info!(
            "Creating session at {} with profile '{}'",
            endpoint,
            capabilities.profile
        );

        let value = send(&client, Method::POST, &format!("{}/session", endpoint), Some(body), "new session")
            .await
            .map_err(|e| Error::SessionCreate {
                endpoint: endpoint.clone(),
                message: e.to_string(),
            })?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::SessionCreate {
                endpoint: endpoint.clone(),
                message: "response has no sessionId".to_string(),
            })?
            .to_string();

        let session = Self {
            client,
            endpoint,
            session_id,
        };

        let timeouts = session
            .command(
                Method::POST,
                "timeouts",
                Some(json!({ "implicit": implicit_wait.as_millis() as u64 })),
                "set timeouts",
            )
            .await;

        if let Err(e) = timeouts {
            // The endpoint holds the device until this session is deleted
            if let Err(quit_err) = session.quit().await {
                tracing::warn!("Failed to close half-created session: {}", quit_err);
            }
            return Err(Error::SessionCreate {
                endpoint: session.endpoint,
                message: e.to_string(),
            });
        }

        tracing::info!("Session {} ready", session.session_id);
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        name: &str,
    ) -> Result<Value> {
        let url = if path.is_empty() {
            format!("{}/session/{}", self.endpoint, self.session_id)
        } else {
            format!("{}/session/{}/{}", self.endpoint, self.session_id, path)
        };
        send(&self.client, method, &url, body, name).await
    }

    async fn app_command(&self, path: &str, app_id: &str, name: &str) -> Result<()> {
        self.command(Method::POST, path, Some(json!({ "appId": app_id })), name)
            .await?;
        Ok(())
    }
}

/// Send one WebDriver request and unwrap the `value` field
async fn send(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
    name: &str,
) -> Result<Value> {
    tracing::debug!("WebDriver {} {} ({})", method, url, name);

    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    let payload: Value = response.json().await.unwrap_or(Value::Null);
    let value = payload.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(Error::webdriver(
            name,
            format!("{} ({}): {}", error, status.as_u16(), message),
        ));
    }

    Ok(value)
}

fn parse_element(value: &Value) -> Option<ElementId> {
    value
        .get(W3C_ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
}

#[async_trait]
impl UiDriver for WebDriverSession {
    async fn find_elements(&self, locator: &Locator) -> Result<Vec<ElementId>> {
        let (using, value) = locator.strategy();
        let result = self
            .command(
                Method::POST,
                "elements",
                Some(json!({ "using": using, "value": value })),
                "find elements",
            )
            .await?;

        Ok(result
            .as_array()
            .map(|items| items.iter().filter_map(parse_element).collect())
            .unwrap_or_default())
    }

    async fn find_element(&self, locator: &Locator) -> Result<ElementId> {
        let (using, value) = locator.strategy();
        let result = self
            .command(
                Method::POST,
                "element",
                Some(json!({ "using": using, "value": value })),
                "find element",
            )
            .await
            .map_err(|e| match e {
                Error::WebDriver { ref message, .. } if message.starts_with("no such element") => {
                    Error::element_not_found(using, value)
                }
                other => other,
            })?;

        parse_element(&result).ok_or_else(|| Error::element_not_found(using, value))
    }

    async fn click(&self, element: &ElementId) -> Result<()> {
        self.command(
            Method::POST,
            &format!("element/{}/click", element.0),
            Some(json!({})),
            "click",
        )
        .await?;
        Ok(())
    }

    async fn element_text(&self, element: &ElementId) -> Result<String> {
        let value = self
            .command(Method::GET, &format!("element/{}/text", element.0), None, "get text")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool> {
        let value = self
            .command(
                Method::GET,
                &format!("element/{}/displayed", element.0),
                None,
                "is displayed",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn back(&self) -> Result<()> {
        self.command(Method::POST, "back", Some(json!({})), "back")
            .await?;
        Ok(())
    }

    async fn orientation(&self) -> Result<Orientation> {
        let value = self
            .command(Method::GET, "orientation", None, "get orientation")
            .await?;
        serde_json::from_value(value)
            .map_err(|e| Error::webdriver("get orientation", e.to_string()))
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        self.command(
            Method::POST,
            "orientation",
            Some(json!({ "orientation": orientation.as_str() })),
            "set orientation",
        )
        .await?;
        Ok(())
    }

    async fn background_app(&self, seconds: u64) -> Result<()> {
        self.command(
            Method::POST,
            "appium/app/background",
            Some(json!({ "seconds": seconds })),
            "background app",
        )
        .await?;
        Ok(())
    }

    async fn activate_app(&self, app_id: &str) -> Result<()> {
        self.app_command("appium/device/activate_app", app_id, "activate app")
            .await
    }

    async fn terminate_app(&self, app_id: &str) -> Result<()> {
        self.app_command("appium/device/terminate_app", app_id, "terminate app")
            .await
    }

    async fn press_keycode(&self, keycode: i64) -> Result<()> {
        self.command(
            Method::POST,
            "appium/device/press_keycode",
            Some(json!({ "keycode": keycode })),
            "press keycode",
        )
        .await?;
        Ok(())
    }

    async fn open_notifications(&self) -> Result<()> {
        self.command(
            Method::POST,
            "appium/device/open_notifications",
            Some(json!({})),
            "open notifications",
        )
        .await?;
        Ok(())
    }

    async fn log_messages(&self, log_type: &str) -> Result<Vec<String>> {
        let value = self
            .command(Method::POST, "log", Some(json!({ "type": log_type })), "get log")
            .await?;

        // Entries are `{timestamp, level, message}`
        Ok(value
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn execute_script(&self, script: &str, args: Value) -> Result<Value> {
        self.command(
            Method::POST,
            "execute/sync",
            Some(json!({ "script": script, "args": [args] })),
            "execute script",
        )
        .await
    }

    async fn quit(&self) -> Result<()> {
        tracing::info!("Closing session {}", self.session_id);
        self.command(Method::DELETE, "", None, "delete session")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    type Log = Arc<Mutex<Vec<(String, String, Value)>>>;

    /// Minimal HTTP/1.1 endpoint answering from `route`
    async fn fake_endpoint(
        route: fn(&str, &str, &Value) -> (u16, Value),
    ) -> (String, Log) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let server_log = log.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let log = server_log.clone();
                tokio::spawn(async move {
                    let (read_half, mut write_half) = stream.into_split();
                    let mut reader = BufReader::new(read_half);
                    loop {
                        let mut request_line = String::new();
                        if reader.read_line(&mut request_line).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let mut parts = request_line.split_whitespace();
                        let method = parts.next().unwrap_or_default().to_string();
                        let path = parts.next().unwrap_or_default().to_string();

                        let mut content_length = 0usize;
                        loop {
                            let mut header = String::new();
                            reader.read_line(&mut header).await.unwrap();
                            let header = header.trim();
                            if header.is_empty() {
                                break;
                            }
                            if let Some((name, value)) = header.split_once(':') {
                                if name.eq_ignore_ascii_case("content-length") {
                                    content_length = value.trim().parse().unwrap_or(0);
                                }
                            }
                        }

                        let mut body = vec![0u8; content_length];
                        reader.read_exact(&mut body).await.unwrap();
                        let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

                        let (status, value) = route(&method, &path, &body);
                        log.lock().unwrap().push((method, path, body));

                        let payload = json!({ "value": value }).to_string();
                        let response = format!(
                            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
                            status,
                            payload.len(),
                            payload
                        );
                        write_half.write_all(response.as_bytes()).await.unwrap();
                    }
                });
            }
        });

        (format!("http://{}", addr), log)
    }

    fn appium_route(method: &str, path: &str, body: &Value) -> (u16, Value) {
        match (method, path) {
            ("POST", "/session") => (200, json!({ "sessionId": "s1", "capabilities": {} })),
            ("POST", "/session/s1/element") => {
                if body["value"] == "missing" {
                    (404, json!({ "error": "no such element", "message": "nope" }))
                } else {
                    (200, json!({ W3C_ELEMENT_KEY: "e1" }))
                }
            }
            ("POST", "/session/s1/elements") => (
                200,
                json!([{ W3C_ELEMENT_KEY: "e1" }, { LEGACY_ELEMENT_KEY: "e2" }]),
            ),
            ("GET", "/session/s1/element/e1/text") => (200, json!("REGISTERED")),
            ("GET", "/session/s1/orientation") => (200, json!("PORTRAIT")),
            ("POST", "/session/s1/log") => (
                200,
                json!([
                    { "timestamp": 1, "level": "ALL", "message": "I/ActivityManager: Start proc" },
                    { "timestamp": 2, "level": "ALL", "message": "E/AndroidRuntime: FATAL EXCEPTION: main" },
                ]),
            ),
            _ => (200, Value::Null),
        }
    }

    fn caps() -> Capabilities {
        Capabilities::from_json(
            r#"{"p": {"platformName": "Android", "appium:appPackage": "com.example"}}"#,
            std::path::Path::new("capabilities.json"),
            "p",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (endpoint, log) = fake_endpoint(appium_route).await;

        let session = WebDriverSession::create(&endpoint, &caps(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(session.session_id(), "s1");

        let element = session
            .find_element(&Locator::Id("com.example:id/textView".into()))
            .await
            .unwrap();
        assert_eq!(element, ElementId("e1".into()));
        assert_eq!(session.element_text(&element).await.unwrap(), "REGISTERED");
        session.click(&element).await.unwrap();

        let all = session.find_elements(&Locator::Xpath("//*".into())).await.unwrap();
        assert_eq!(all, vec![ElementId("e1".into()), ElementId("e2".into())]);

        assert_eq!(session.orientation().await.unwrap(), Orientation::Portrait);
        session.set_orientation(Orientation::Landscape).await.unwrap();
        session.activate_app("com.example").await.unwrap();
        session.quit().await.unwrap();

        let log = log.lock().unwrap();
        let (_, _, create_body) = &log[0];
        assert_eq!(
            create_body["capabilities"]["alwaysMatch"]["appium:appPackage"],
            "com.example"
        );
        assert_eq!(log[1].1, "/session/s1/timeouts");
        assert_eq!(log[1].2["implicit"], 10_000);

        let paths: Vec<(&str, &str)> = log.iter().map(|(m, p, _)| (m.as_str(), p.as_str())).collect();
        assert!(paths.contains(&("POST", "/session/s1/element/e1/click")));
        assert!(paths.contains(&("POST", "/session/s1/appium/device/activate_app")));
        assert_eq!(paths.last(), Some(&("DELETE", "/session/s1")));

        let orientation_body = &log
            .iter()
            .find(|(m, p, _)| m == "POST" && p == "/session/s1/orientation")
            .unwrap()
            .2;
        assert_eq!(orientation_body["orientation"], "LANDSCAPE");
    }

    #[tokio::test]
    async fn test_device_keys_notifications_and_log() {
        let (endpoint, log) = fake_endpoint(appium_route).await;
        let session = WebDriverSession::create(&endpoint, &caps(), Duration::from_secs(1))
            .await
            .unwrap();

        session.press_keycode(3).await.unwrap();
        session.open_notifications().await.unwrap();
        let messages = session.log_messages("logcat").await.unwrap();
        assert_eq!(
            messages,
            vec![
                "I/ActivityManager: Start proc".to_string(),
                "E/AndroidRuntime: FATAL EXCEPTION: main".to_string(),
            ]
        );

        let log = log.lock().unwrap();
        let body_of = |path: &str| {
            log.iter()
                .find(|(m, p, _)| m == "POST" && p == path)
                .map(|(_, _, body)| body.clone())
                .unwrap()
        };
        assert_eq!(body_of("/session/s1/appium/device/press_keycode")["keycode"], 3);
        assert_eq!(body_of("/session/s1/appium/device/open_notifications"), json!({}));
        assert_eq!(body_of("/session/s1/log")["type"], "logcat");
    }

    #[tokio::test]
    async fn test_failed_timeouts_closes_session() {
        fn route(method: &str, path: &str, _body: &Value) -> (u16, Value) {
            match (method, path) {
                ("POST", "/session") => (200, json!({ "sessionId": "s1", "capabilities": {} })),
                ("POST", "/session/s1/timeouts") => (
                    500,
                    json!({ "error": "unknown error", "message": "instrumentation crashed" }),
                ),
                _ => (200, Value::Null),
            }
        }

        let (endpoint, log) = fake_endpoint(route).await;
        let err = WebDriverSession::create(&endpoint, &caps(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::SessionCreate { .. }), "{err}");
        assert!(err.to_string().contains("instrumentation crashed"), "{err}");

        let paths: Vec<(String, String)> = log
            .lock()
            .unwrap()
            .iter()
            .map(|(m, p, _)| (m.clone(), p.clone()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("POST".to_string(), "/session".to_string()),
                ("POST".to_string(), "/session/s1/timeouts".to_string()),
                ("DELETE".to_string(), "/session/s1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_element_maps_to_not_found() {
        let (endpoint, _log) = fake_endpoint(appium_route).await;
        let session = WebDriverSession::create(&endpoint, &caps(), Duration::from_secs(1))
            .await
            .unwrap();

        let err = session
            .find_element(&Locator::Xpath("missing".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_create_fails_without_endpoint() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = WebDriverSession::create(&format!("http://{}", addr), &caps(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SessionCreate { .. }), "{err}");
    }
}
