//! Helpers for building tokens in tests

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Value, json};

/// Build an unsigned three-segment token around `payload`
pub fn unsigned_token(payload: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "none", "typ": "JWT"}).to_string());
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.signature")
}

/// Token whose `exp` lies `offset_secs` away from now (negative for the past)
pub fn token_expiring_in(offset_secs: i64, roles: Value) -> String {
    let exp = chrono::Utc::now().timestamp() + offset_secs;
    unsigned_token(&json!({ "exp": exp, "rol": roles }))
}
