//! Public account endpoints
//!
//! Every path here is on the default public-endpoint list, so these calls go
//! out without a token and a 401 from them is returned to the caller as is.

use super::{ApiClient, ClientError};
use crate::types::{
    ActivationRequest, CatalogItem, CompleteRegisterRequest, EmailRequest, LoginRequest,
    LoginResponse, MessageResponse, PasswordResetConfirmRequest, PreRegisterRequest,
    PreRegisterResponse,
};

pub const LOGIN: &str = "/auth/login";
pub const PASSWORD_RESET_REQUEST: &str = "/auth/password-reset/request";
pub const PASSWORD_RESET_CONFIRM: &str = "/auth/password-reset/confirm";
pub const RESEND_ACTIVATION: &str = "/auth/resend-activation";
pub const PRE_REGISTER_VALIDATE: &str = "/pre-register/validate";
pub const PRE_REGISTER_COMPLETE: &str = "/pre-register/complete";
pub const ACTIVATE: &str = "/auth/activate";
pub const TYPE_DOCUMENTS: &str = "/type-documents";
pub const GENDERS: &str = "/genders";

impl ApiClient {
    /// Exchange credentials for a token
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ClientError> {
        self.post(LOGIN, credentials).await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<MessageResponse, ClientError> {
        self.acknowledge(
            PASSWORD_RESET_REQUEST,
            &EmailRequest {
                email: email.to_string(),
            },
        )
        .await
    }

    pub async fn confirm_password_reset(
        &self,
        request: &PasswordResetConfirmRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.acknowledge(PASSWORD_RESET_CONFIRM, request).await
    }

    pub async fn resend_activation(&self, email: &str) -> Result<MessageResponse, ClientError> {
        self.acknowledge(
            RESEND_ACTIVATION,
            &EmailRequest {
                email: email.to_string(),
            },
        )
        .await
    }

    pub async fn validate_pre_register(
        &self,
        request: &PreRegisterRequest,
    ) -> Result<PreRegisterResponse, ClientError> {
        self.post(PRE_REGISTER_VALIDATE, request).await
    }

    pub async fn complete_pre_register(
        &self,
        request: &CompleteRegisterRequest,
    ) -> Result<MessageResponse, ClientError> {
        self.acknowledge(PRE_REGISTER_COMPLETE, request).await
    }

    pub async fn activate_account(&self, token: &str) -> Result<MessageResponse, ClientError> {
        self.acknowledge(
            ACTIVATE,
            &ActivationRequest {
                token: token.to_string(),
            },
        )
        .await
    }

    pub async fn type_documents(&self) -> Result<Vec<CatalogItem>, ClientError> {
        self.get(TYPE_DOCUMENTS).await
    }

    pub async fn genders(&self) -> Result<Vec<CatalogItem>, ClientError> {
        self.get(GENDERS).await
    }

    async fn acknowledge<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<MessageResponse, ClientError> {
        let response: Option<MessageResponse> = self.post(path, body).await?;
        Ok(response.unwrap_or_default())
    }
}
