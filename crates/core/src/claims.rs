//! Token claims and the shared decoder
//!
//! Tokens are three dot-separated segments. Only the middle segment is read
//! here: it is base64url-encoded JSON carrying the expiry and the role list.
//! Signatures are the backend's business; the client never verifies them.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Identifier of a permission or role.
///
/// The backend emits numeric ids, but string ids are accepted as well. Two
/// identifiers are equal only when both kind and value match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Number(i64),
    Text(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl std::str::FromStr for Identifier {
    type Err = std::convert::Infallible;

    /// Numeric strings become [`Identifier::Number`], anything else is text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Text(s.to_string()), Self::Number))
    }
}

/// A single capability granted through a role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Identifier,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

impl Permission {
    pub fn new(id: impl Into<Identifier>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A named bundle of permissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    #[serde(default, alias = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        rename = "permisos",
        alias = "permissions",
        deserialize_with = "lenient_list"
    )]
    pub permissions: Vec<Permission>,
}

impl Role {
    /// Whether this role is referred to by `key`, either by id or by name.
    pub fn matches(&self, key: &Identifier) -> bool {
        if self.id.as_ref() == Some(key) {
            return true;
        }
        match (key, &self.name) {
            (Identifier::Text(text), Some(name)) => text == name,
            _ => false,
        }
    }
}

/// Decoded token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiry, whole seconds since the Unix epoch
    #[serde(
        default,
        deserialize_with = "numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,
    #[serde(default, rename = "rol", deserialize_with = "lenient_list")]
    pub roles: Vec<Role>,
    /// Every other claim, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Look up a claim that is not modelled explicitly
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// `null` reads as the type's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Anything but an array reads as empty; entries that do not fit `T` are
/// dropped instead of failing the whole payload.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries,
        _ => return Ok(Vec::new()),
    };
    Ok(entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect())
}

/// RFC 7519 NumericDate, which may carry a fraction. Non-numeric values read
/// as absent.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?
        .as_f64()
        .map(|secs| secs.floor() as i64))
}

/// Reasons a token could not be turned into [`Claims`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("token has no payload segment")]
    MissingPayload,

    #[error("payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid claims JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raw JSON bytes of the claims segment
fn payload(token: &str) -> Result<Vec<u8>, DecodeError> {
    let segment = token
        .split('.')
        .nth(1)
        .filter(|s| !s.is_empty())
        .ok_or(DecodeError::MissingPayload)?;

    // Accept padded and standard-alphabet payloads too.
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    Ok(URL_SAFE_NO_PAD.decode(normalized)?)
}

/// Decode the claims segment of `token`.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
    Ok(serde_json::from_slice(&payload(token)?)?)
}

/// Whether `token` must not be sent as of `now_secs`.
///
/// Only `exp` is read; the rest of the payload may have any shape. A token
/// whose payload is not a JSON object is treated as expired. A payload
/// without a numeric `exp` never expires locally.
#[allow(clippy::cast_precision_loss)]
pub fn token_is_expired(token: &str, now_secs: i64) -> bool {
    let Ok(bytes) = payload(token) else {
        return true;
    };
    let Ok(Value::Object(claims)) = serde_json::from_slice::<Value>(&bytes) else {
        return true;
    };
    claims
        .get("exp")
        .and_then(Value::as_f64)
        .is_some_and(|exp| exp < now_secs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::unsigned_token;
    use serde_json::json;

    #[test]
    fn decodes_roles_and_permissions() {
        let token = unsigned_token(&json!({
            "exp": 4_102_444_800_i64,
            "sub": "operator@sigma.test",
            "rol": [{
                "id": 3,
                "nombre": "Mechanic",
                "permisos": [{"id": 1, "name": "view"}, {"id": 7, "name": "schedule"}]
            }]
        }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.exp, Some(4_102_444_800));
        assert_eq!(claims.roles.len(), 1);
        assert_eq!(claims.roles[0].name.as_deref(), Some("Mechanic"));
        assert_eq!(claims.roles[0].permissions[1], Permission::new(7, "schedule"));
        assert_eq!(claims.get("sub"), Some(&json!("operator@sigma.test")));
    }

    #[test]
    fn tolerates_padding_and_standard_alphabet() {
        use base64::engine::general_purpose::STANDARD;

        let payload = STANDARD.encode(br#"{"exp":10,"note":"??>>"}"#);
        let token = format!("header.{payload}.sig");

        let claims = decode(&token).unwrap();
        assert_eq!(claims.exp, Some(10));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(decode("no-dots"), Err(DecodeError::MissingPayload)));
        assert!(matches!(decode("a..c"), Err(DecodeError::MissingPayload)));
        assert!(matches!(decode("a.!!!.c"), Err(DecodeError::Base64(_))));

        let not_json = URL_SAFE_NO_PAD.encode("not json");
        assert!(matches!(
            decode(&format!("a.{not_json}.c")),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn expiry_is_compared_in_seconds() {
        let token = unsigned_token(&json!({"exp": 1_000}));
        assert!(!token_is_expired(&token, 999));
        assert!(!token_is_expired(&token, 1_000));
        assert!(token_is_expired(&token, 1_001));
    }

    #[test]
    fn missing_exp_never_expires_and_garbage_always_does() {
        let token = unsigned_token(&json!({"rol": []}));
        assert!(!token_is_expired(&token, i64::MAX));
        assert!(token_is_expired("garbage", 0));
    }

    #[test]
    fn fractional_exp_is_compared_exactly() {
        let token = unsigned_token(&json!({"exp": 1_000.5}));
        assert!(!token_is_expired(&token, 1_000));
        assert!(token_is_expired(&token, 1_001));
        assert_eq!(decode(&token).unwrap().exp, Some(1_000));
    }

    #[test]
    fn odd_claim_shapes_do_not_expire_a_live_token() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let now = exp - 3600;
        let payloads = [
            json!({"exp": exp, "rol": null}),
            json!({"exp": exp, "rol": [{"id": 1, "permisos": null}]}),
            json!({"exp": exp as f64 + 0.5}),
            json!({"exp": exp, "rol": [{"permisos": [{"id": null, "name": "view"}]}]}),
            json!({"exp": exp, "rol": {"id": 1}}),
        ];

        for payload in payloads {
            let token = unsigned_token(&payload);
            assert!(!token_is_expired(&token, now), "{payload}");
            assert!(decode(&token).is_ok(), "{payload}");
        }
    }

    #[test]
    fn null_lists_read_as_empty_and_bad_entries_are_dropped() {
        let token = unsigned_token(&json!({
            "rol": [
                {"id": 1, "permisos": null},
                {"id": 2, "nombre": null, "permisos": [
                    {"id": null, "name": "ghost"},
                    {"id": 4, "name": null},
                    {"id": 5, "name": "edit"}
                ]}
            ]
        }));

        let claims = decode(&token).unwrap();
        assert_eq!(claims.roles.len(), 2);
        assert!(claims.roles[0].permissions.is_empty());
        assert_eq!(
            claims.roles[1].permissions,
            vec![Permission::new(4, ""), Permission::new(5, "edit")]
        );

        let claims = decode(&unsigned_token(&json!({"rol": null}))).unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn non_object_payload_is_expired() {
        let body = URL_SAFE_NO_PAD.encode("[1,2,3]");
        assert!(token_is_expired(&format!("h.{body}.s"), 0));
    }

    #[test]
    fn roles_match_by_id_or_name() {
        let role: Role = serde_json::from_value(json!({"id": 2, "name": "Admin"})).unwrap();
        assert!(role.matches(&Identifier::from(2)));
        assert!(role.matches(&Identifier::from("Admin")));
        assert!(!role.matches(&Identifier::from("2")));
        assert!(!role.matches(&Identifier::from(3)));
    }

    #[test]
    fn identifiers_parse_numbers_first() {
        assert_eq!("42".parse::<Identifier>().unwrap(), Identifier::Number(42));
        assert_eq!(
            "billing.read".parse::<Identifier>().unwrap(),
            Identifier::Text("billing.read".into())
        );
    }
}
