//! WebDriverAgent HTTP client

use crate::config::{secs, TIMING_CONFIG};
use crate::error::{DeviceError, Result};
use crate::session::{AppleSession, ForegroundApp, WindowSize};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use serde::Deserialize;
use serde_json::{json, Value};
use std::any::Any;
use std::time::Duration;
use tracing::{debug, info};

/// Where WebDriverAgent listens when no address is given (iproxy default)
pub const DEFAULT_WDA_URL: &str = "http://localhost:8100";

#[derive(Debug, Deserialize)]
struct WdaSize {
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WdaAppInfo {
    bundle_id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Turn a raw address into a WDA base URL
pub fn normalize_url(address: &str) -> String {
    let address = address.trim();
    if address.is_empty() {
        return DEFAULT_WDA_URL.to_string();
    }
    let url = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    url.trim_end_matches('/').to_string()
}

/// Pull `value` out of a WDA response, turning WDA error payloads into errors
fn unwrap_value(body: Value) -> Result<Value> {
    let value = body.get("value").cloned().unwrap_or(Value::Null);
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(DeviceError::Protocol(format!("WDA {}: {}", error, message)));
    }
    Ok(value)
}

/// Session id lives at the top level on old WDA builds and under `value` on new ones
fn session_id_of(body: &Value) -> Option<String> {
    body.get("sessionId")
        .or_else(|| body.get("value").and_then(|v| v.get("sessionId")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A WebDriverAgent session on an iOS device
#[derive(Debug, Clone)]
pub struct WdaClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WdaClient {
    /// Check WDA is up and open a session
    pub async fn open(address: &str) -> Result<Self> {
        let base_url = normalize_url(address);
        let http = reqwest::Client::builder()
            .timeout(secs(TIMING_CONFIG.wda.request_timeout))
            .build()?;

        let status = http
            .get(format!("{}/status", base_url))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        debug!("WDA status at {}: {}", base_url, status);

        let created = http
            .post(format!("{}/session", base_url))
            .json(&json!({ "capabilities": {} }))
            .send()
            .await?
            .json::<Value>()
            .await?;

        let session_id = match session_id_of(&created) {
            Some(id) => id,
            None => {
                unwrap_value(created)?;
                return Err(DeviceError::ConnectionFailed {
                    address: base_url,
                    reason: "WDA returned no session id".to_string(),
                });
            }
        };

        info!("WDA session {} open at {}", session_id, base_url);
        Ok(Self {
            http,
            base_url,
            session_id,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// GET `path` relative to the WDA root and return its `value`
    pub async fn get(&self, path: &str) -> Result<Value> {
        self.get_with_timeout(path, secs(TIMING_CONFIG.wda.request_timeout))
            .await
    }

    /// GET `path` relative to the current session
    pub async fn session_get(&self, path: &str) -> Result<Value> {
        self.get(&format!("/session/{}{}", self.session_id, path))
            .await
    }

    async fn get_with_timeout(&self, path: &str, timeout: Duration) -> Result<Value> {
        debug!("WDA GET {}", path);
        let body = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .timeout(timeout)
            .send()
            .await?
            .json::<Value>()
            .await?;
        unwrap_value(body)
    }
}

#[async_trait]
impl AppleSession for WdaClient {
    async fn screenshot(&self) -> Result<DynamicImage> {
        let value = self.get("/screenshot").await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DeviceError::Protocol("screenshot value is not a string".to_string()))?;
        // WDA wraps base64 at 76 columns on some versions
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = general_purpose::STANDARD.decode(cleaned)?;
        Ok(image::load_from_memory(&bytes)?)
    }

    async fn source(&self) -> Result<Value> {
        self.get_with_timeout(
            "/source?format=json",
            secs(TIMING_CONFIG.wda.source_timeout),
        )
        .await
    }

    async fn scale(&self) -> Result<f64> {
        let screen = self.session_get("/wda/screen").await?;
        screen
            .get("scale")
            .and_then(Value::as_f64)
            .ok_or_else(|| DeviceError::Protocol(format!("no scale in /wda/screen: {}", screen)))
    }

    async fn window_size(&self) -> Result<WindowSize> {
        let size: WdaSize = serde_json::from_value(self.session_get("/window/size").await?)?;
        Ok(WindowSize {
            width: size.width.round() as u32,
            height: size.height.round() as u32,
        })
    }

    async fn active_app(&self) -> Result<ForegroundApp> {
        let info: WdaAppInfo = serde_json::from_value(self.get("/wda/activeAppInfo").await?)?;
        debug!("active app {} ({:?})", info.bundle_id, info.name);
        Ok(ForegroundApp {
            package: info.bundle_id,
            activity: None,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
