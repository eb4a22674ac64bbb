/// Signed client for the AppAPI administrative surface.
///
/// Every call carries the shared-secret headers AppAPI expects from an ExApp
/// and the `format=json` query parameter; responses arrive wrapped in the OCS
/// envelope and this module exposes only the `ocs.data` payload.
use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tracing::debug;

use crate::config::Config;
use crate::utils::default_http_client;

/// Base64 `user:secret` pair proving the caller's AppAPI identity.
pub const HDR_AUTHORIZATION: &str = "AUTHORIZATION-APP-API";
pub const HDR_APP_ID: &str = "EX-APP-ID";
pub const HDR_APP_VERSION: &str = "EX-APP-VERSION";
/// AppAPI protocol version; sent by the platform on callbacks.
pub const HDR_PROTOCOL_VERSION: &str = "AA-VERSION";
const HDR_OCS_API_REQUEST: &str = "OCS-APIRequest";

const CONFIG_VALUES_PATH: &str = "/ocs/v1.php/apps/app_api/api/v1/ex-app/config/get-values";
const TASK_SCHEDULE_PATH: &str = "/ocs/v2.php/taskprocessing/schedule";
const TALK_BOT_PATH: &str = "/ocs/v1.php/apps/app_api/api/v1/talk_bot";

/// Task type tag for text-to-text generation on the task queue.
const TASK_TYPE_TEXT2TEXT: &str = "core:text2text";

/// Immutable ExApp identity: proves who we are on outbound calls and is the
/// reference the platform's own callbacks are checked against.
#[derive(Debug, Clone)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_version: String,
    pub app_secret: String,
}

impl AppIdentity {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_id: config.app_id.clone(),
            app_version: config.app_version.clone(),
            app_secret: config.app_secret.clone(),
        }
    }
}

pub struct PlatformClient {
    base_url: String,
    identity: AppIdentity,
    client: reqwest::Client,
}

impl PlatformClient {
    pub fn new(base_url: impl Into<String>, identity: AppIdentity) -> Self {
        Self {
            base_url: base_url.into(),
            identity,
            client: default_http_client(),
        }
    }

    pub fn identity(&self) -> &AppIdentity {
        &self.identity
    }

    /// Attach the AppAPI authentication headers for `acting_user`.
    ///
    /// The authorization value is static per (user, secret) pair; the same
    /// encoded token is reused for every call by wire contract.
    pub fn sign(&self, headers: &mut HeaderMap, acting_user: &str) -> Result<()> {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", acting_user, self.identity.app_secret));
        headers.insert(
            HDR_AUTHORIZATION,
            HeaderValue::from_str(&token).context("authorization header value")?,
        );
        headers.insert(
            HDR_APP_ID,
            HeaderValue::from_str(&self.identity.app_id).context("app id header value")?,
        );
        headers.insert(
            HDR_APP_VERSION,
            HeaderValue::from_str(&self.identity.app_version).context("app version header value")?,
        );
        headers.insert(HDR_OCS_API_REQUEST, HeaderValue::from_static("true"));
        Ok(())
    }

    /// Issue a signed OCS request and return the `ocs.data` payload.
    async fn ocs_request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut headers = HeaderMap::new();
        self.sign(&mut headers, "")?;

        let mut request = self
            .client
            .request(method, &url)
            .query(&[("format", "json")])
            .headers(headers);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("platform request to {} failed", path))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("reading platform response from {}", path))?;
        if !status.is_success() {
            bail!("platform returned {} for {}: {}", status, path, text);
        }

        debug!("platform call {} returned {}", path, status);
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("platform response from {} is not JSON", path))?;
        value
            .get("ocs")
            .and_then(|ocs| ocs.get("data"))
            .cloned()
            .ok_or_else(|| anyhow!("platform response from {} has no ocs.data", path))
    }

    /// Look up a single app config value by key.
    pub async fn config_value(&self, key: &str) -> Result<String> {
        let data = self
            .ocs_request(
                Method::POST,
                CONFIG_VALUES_PATH,
                Some(json!({ "configKeys": [key] })),
            )
            .await?;
        data.get(0)
            .and_then(|entry| entry.get("configvalue"))
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| anyhow!("config value {} missing from platform response", key))
    }

    /// Schedule an asynchronous text generation task.
    ///
    /// `webhook_uri` encodes the reply target so the completion callback is
    /// self-describing; no task table is kept on our side. The returned data
    /// object carries a `message` field when the platform rejects the task.
    pub async fn schedule_text_task(
        &self,
        prompt: &str,
        app_route: &str,
        webhook_uri: &str,
        webhook_method: &str,
    ) -> Result<Value> {
        self.ocs_request(
            Method::POST,
            TASK_SCHEDULE_PATH,
            Some(json!({
                "input": { "input": prompt },
                "type": TASK_TYPE_TEXT2TEXT,
                "appId": app_route,
                "webhookUri": webhook_uri,
                "webhookMethod": webhook_method,
            })),
        )
        .await
    }

    /// Register the Talk bot route. Returns `(id, secret)` where `id` is the
    /// derived config key under which the route secret is stored.
    pub async fn register_bot(
        &self,
        name: &str,
        route: &str,
        description: &str,
    ) -> Result<(String, String)> {
        let data = self
            .ocs_request(
                Method::POST,
                TALK_BOT_PATH,
                Some(json!({
                    "name": name,
                    "route": route,
                    "description": description,
                })),
            )
            .await?;
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("bot registration response has no id"))?;
        let secret = data
            .get("secret")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("bot registration response has no secret"))?;
        Ok((id.to_string(), secret.to_string()))
    }

    /// Remove the Talk bot route registration.
    pub async fn unregister_bot(&self, route: &str) -> Result<()> {
        self.ocs_request(Method::DELETE, TALK_BOT_PATH, Some(json!({ "route": route })))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests;
