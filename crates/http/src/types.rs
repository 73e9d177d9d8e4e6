//! Request and response bodies for the public account endpoints

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sigma_core::Identifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationRequest {
    pub token: String,
}

/// First pre-registration step: identify the person being registered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreRegisterRequest {
    pub email: String,
    pub document_type: Identifier,
    pub document_number: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreRegisterResponse {
    /// Token carried into the completion step
    #[serde(default, alias = "validation_token", alias = "validationToken")]
    pub token: Option<String>,
}

/// Second pre-registration step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRegisterRequest {
    pub token: String,
    pub password: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, alias = "mensaje")]
    pub message: Option<String>,
}

/// Entry of a lookup table such as document types or genders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Identifier,
    #[serde(alias = "nombre")]
    pub name: String,
}
