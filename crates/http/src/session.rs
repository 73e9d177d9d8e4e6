//! Login, logout and pre-registration flows over the service clients

use crate::client::error::ClientError;
use crate::client::interceptor::AuthInterceptor;
use crate::client::services::ServiceClients;
use crate::navigation::Navigator;
use crate::types::{
    CompleteRegisterRequest, LoginRequest, MessageResponse, PreRegisterRequest,
    PreRegisterResponse,
};
use serde_json::{Map, Value};
use sigma_core::{PermissionContext, SigmaConfig, TokenStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Everything a signed-in application needs, wired together once
#[derive(Clone, Debug)]
pub struct AuthSession {
    clients: ServiceClients,
    context: PermissionContext,
}

impl AuthSession {
    pub fn new(
        config: &SigmaConfig,
        store: TokenStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ClientError> {
        let context =
            PermissionContext::with_min_login_duration(store.clone(), config.auth.min_login_duration());
        let interceptor =
            Arc::new(AuthInterceptor::new(store, navigator, config).with_context(context.clone()));
        let clients = ServiceClients::from_config(&config.services, &interceptor)?;

        Ok(Self { clients, context })
    }

    pub fn clients(&self) -> &ServiceClients {
        &self.clients
    }

    pub fn context(&self) -> &PermissionContext {
        &self.context
    }

    /// Sign in with the users service.
    ///
    /// The token is kept persistently when `remember` is set, for the session
    /// otherwise. `on_complete` runs once the login loading state ends.
    pub async fn login<F>(
        &self,
        credentials: &LoginRequest,
        remember: bool,
        on_complete: F,
    ) -> Result<JoinHandle<()>, ClientError>
    where
        F: FnOnce() + Send + 'static,
    {
        let response = self.clients.users.login(credentials).await?;
        self.context
            .token_store()
            .set_token(&response.token, remember);
        info!(email = %credentials.email, remember, "Signed in");
        Ok(self.context.login_success(&response.token, on_complete))
    }

    pub fn logout(&self) {
        self.context.logout();
    }

    /// Validate pre-registration data, keeping the returned validation token
    pub async fn validate_pre_register(
        &self,
        request: &PreRegisterRequest,
    ) -> Result<PreRegisterResponse, ClientError> {
        let response = self.clients.users.validate_pre_register(request).await?;
        if let Some(token) = &response.token {
            self.context.token_store().set_validation_token(token);
        }
        Ok(response)
    }

    /// Finish pre-registration with the stored validation token
    pub async fn complete_pre_register(
        &self,
        password: &str,
        extra: Map<String, Value>,
    ) -> Result<MessageResponse, ClientError> {
        let store = self.context.token_store();
        let token = store
            .get_validation_token()
            .ok_or(ClientError::MissingValidationToken)?;

        let request = CompleteRegisterRequest {
            token,
            password: password.to_string(),
            extra,
        };
        let response = self.clients.users.complete_pre_register(&request).await?;
        store.remove_validation_token();
        Ok(response)
    }
}
