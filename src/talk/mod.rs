pub mod event;

/// Client for the Talk bot API.
///
/// Outgoing messages are authenticated per request: a fresh nonce and an
/// HMAC-SHA256 digest over nonce + message text, keyed by the route's secret.
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::secrets::SecretCache;
use crate::utils::{default_http_client, random_string};

type HmacSha256 = Hmac<Sha256>;

/// Single-use nonce header on signed bot messages.
pub const HDR_BOT_RANDOM: &str = "X-Nextcloud-Talk-Bot-Random";
/// Hex HMAC digest header committing to nonce + message text.
pub const HDR_BOT_SIGNATURE: &str = "X-Nextcloud-Talk-Bot-Signature";

const BOT_API_PATH: &str = "/ocs/v2.php/apps/spreed/api/v1/bot";
const NONCE_LEN: usize = 32;

/// Compute the bot-protocol digest: HMAC-SHA256 keyed by the route secret,
/// fed the nonce and then the signed text under the same state: one digest
/// committing to both, not two independent ones.
pub fn sign_payload(secret: &[u8], nonce: &str, signed_text: &str) -> Result<String> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|_| anyhow!("invalid route secret key"))?;
    mac.update(nonce.as_bytes());
    mac.update(signed_text.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct TalkClient {
    base_url: String,
    bot_route: String,
    secrets: Arc<SecretCache>,
    client: reqwest::Client,
}

impl TalkClient {
    pub fn new(
        base_url: impl Into<String>,
        bot_route: impl Into<String>,
        secrets: Arc<SecretCache>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            bot_route: bot_route.into(),
            secrets,
            client: default_http_client(),
        }
    }

    /// Sign `signed_text` under the route secret and dispatch `payload` to the
    /// bot API at `url_suffix`. The nonce is generated fresh for every call
    /// and never reused.
    async fn sign_and_send(
        &self,
        method: Method,
        url_suffix: &str,
        payload: serde_json::Value,
        signed_text: &str,
    ) -> Result<reqwest::Response> {
        let secret = self.secrets.get(&self.bot_route).await?;
        let nonce = random_string(NONCE_LEN);
        let digest = sign_payload(&secret, &nonce, signed_text)?;

        let url = format!("{}{}{}", self.base_url, BOT_API_PATH, url_suffix);
        let response = self
            .client
            .request(method, &url)
            .header(HDR_BOT_RANDOM, &nonce)
            .header(HDR_BOT_SIGNATURE, &digest)
            .header("OCS-APIRequest", "true")
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow!("bot API request to {} failed: {}", url_suffix, e))?;
        Ok(response)
    }

    /// Post `text` as a reply to message `reply_to` in conversation `token`.
    ///
    /// Returns the reference id stamped on the outgoing message, a random
    /// correlation token handed back to the caller and not consulted afterwards.
    pub async fn send_message(
        &self,
        text: &str,
        reply_to: i64,
        token: &str,
        silent: bool,
    ) -> Result<String> {
        let reference_id = hex::encode(Sha256::digest(random_string(32).as_bytes()));
        let payload = json!({
            "message": text,
            "replyTo": reply_to,
            "referenceId": reference_id,
            "silent": silent,
        });
        let suffix = format!("/{}/message", urlencoding::encode(token));
        let response = self
            .sign_and_send(Method::POST, &suffix, payload, text)
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("bot API error ({}): {}", status, body);
        }
        debug!(
            "sent bot message to {} (reply_to={}, ref={})",
            token, reply_to, reference_id
        );
        Ok(reference_id)
    }
}
