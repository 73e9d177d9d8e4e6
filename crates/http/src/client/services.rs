//! One client per backend service, all sharing an interceptor

use super::interceptor::AuthInterceptor;
use super::{ApiClient, ClientError};
use sigma_core::{ServiceEndpoint, ServicesConfig};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct ServiceClients {
    pub users: ApiClient,
    pub main: ApiClient,
    pub audit: ApiClient,
    pub location: ApiClient,
    pub billing: ApiClient,
}

impl ServiceClients {
    pub fn from_config(
        config: &ServicesConfig,
        interceptor: &Arc<AuthInterceptor>,
    ) -> Result<Self, ClientError> {
        let build = |endpoint: &ServiceEndpoint| {
            ApiClient::builder()
                .base_url(&endpoint.base_url)
                .timeout(endpoint.timeout())
                .interceptor(interceptor.clone())
                .build()
        };

        Ok(Self {
            users: build(&config.users)?,
            main: build(&config.main)?,
            audit: build(&config.audit)?,
            location: build(&config.location)?,
            billing: build(&config.billing)?,
        })
    }

    /// Look a client up by service name
    pub fn get(&self, name: &str) -> Option<&ApiClient> {
        match name {
            "users" => Some(&self.users),
            "main" => Some(&self.main),
            "audit" => Some(&self.audit),
            "location" => Some(&self.location),
            "billing" => Some(&self.billing),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::MockNavigator;
    use sigma_core::{SigmaConfig, TokenStore};

    #[test]
    fn builds_every_service_with_one_interceptor() {
        let config = SigmaConfig::default();
        let interceptor = Arc::new(AuthInterceptor::new(
            TokenStore::in_memory(),
            Arc::new(MockNavigator::new()),
            &config,
        ));

        let clients = ServiceClients::from_config(&config.services, &interceptor).unwrap();

        for (name, endpoint) in config.services.iter() {
            let client = clients.get(name).unwrap();
            assert_eq!(client.base_url(), endpoint.base_url);
            assert!(Arc::ptr_eq(client.interceptor(), &interceptor));
        }
        assert!(clients.get("telemetry").is_none());
    }
}
