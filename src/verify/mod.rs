/// Inbound request authentication.
///
/// Two independent policies, selected by the endpoint being invoked:
/// AppAPI shared-secret headers for calls arriving from the platform, and the
/// Talk bot HMAC scheme for chat webhooks from the messaging subsystem.
/// A request body is never interpreted before its policy has passed.
use axum::http::HeaderMap;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::RelayError;
use crate::platform::{
    AppIdentity, HDR_APP_ID, HDR_APP_VERSION, HDR_AUTHORIZATION, HDR_PROTOCOL_VERSION,
};
use crate::talk::{HDR_BOT_RANDOM, HDR_BOT_SIGNATURE};

type HmacSha256 = Hmac<Sha256>;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn missing(name: &str) -> RelayError {
    RelayError::Auth(format!("missing {} header", name))
}

/// Verify the AppAPI headers on a platform-originated call and return the
/// acting username.
///
/// This is a static shared-secret equality check, not per-request proof of
/// possession; replay resistance rests on transport confidentiality. That
/// asymmetry with the bot HMAC scheme is the wire contract.
pub fn platform_call(headers: &HeaderMap, identity: &AppIdentity) -> Result<String, RelayError> {
    // AA-VERSION names the AppAPI protocol version; only one exists, so the
    // value is required but not interpreted.
    header_str(headers, HDR_PROTOCOL_VERSION).ok_or_else(|| missing(HDR_PROTOCOL_VERSION))?;

    let app_id = header_str(headers, HDR_APP_ID).ok_or_else(|| missing(HDR_APP_ID))?;
    if app_id != identity.app_id {
        return Err(RelayError::Auth(format!("invalid EX-APP-ID: {}", app_id)));
    }

    let app_version = header_str(headers, HDR_APP_VERSION).ok_or_else(|| missing(HDR_APP_VERSION))?;
    if app_version != identity.app_version {
        return Err(RelayError::Auth(format!(
            "invalid EX-APP-VERSION: {}",
            app_version
        )));
    }

    let auth = header_str(headers, HDR_AUTHORIZATION).unwrap_or("");
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth)
        .map_err(|_| RelayError::Auth("authorization value is not base64".into()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| RelayError::Auth("authorization value is not UTF-8".into()))?;
    let (user, secret) = decoded
        .split_once(':')
        .ok_or_else(|| RelayError::Auth("malformed authorization value".into()))?;

    if !bool::from(secret.as_bytes().ct_eq(identity.app_secret.as_bytes())) {
        return Err(RelayError::Auth("app secret mismatch".into()));
    }
    Ok(user.to_string())
}

/// Verify the Talk bot HMAC on an inbound chat webhook: HMAC-SHA256 keyed by
/// the route secret over the nonce header value followed by the raw body,
/// compared constant-time against the signature header.
pub fn bot_webhook(secret: &[u8], headers: &HeaderMap, body: &[u8]) -> Result<(), RelayError> {
    let random = header_str(headers, HDR_BOT_RANDOM).ok_or_else(|| missing(HDR_BOT_RANDOM))?;
    let signature =
        header_str(headers, HDR_BOT_SIGNATURE).ok_or_else(|| missing(HDR_BOT_SIGNATURE))?;

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return Err(RelayError::Auth("invalid route secret".into()));
    };
    mac.update(random.as_bytes());
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    if bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        Ok(())
    } else {
        Err(RelayError::Auth("bot signature mismatch".into()))
    }
}
