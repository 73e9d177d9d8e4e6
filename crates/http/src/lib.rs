//! SIGMA HTTP layer: per-service clients with shared auth handling

pub mod client;
pub mod navigation;
pub mod session;
pub mod types;

pub use client::error::{CancelReason, ClientError};
pub use client::interceptor::{AuthInterceptor, PathMatcher};
pub use client::services::ServiceClients;
pub use client::{ApiClient, ApiClientBuilder, ApiRequest};
pub use navigation::Navigator;
pub use reqwest::Method;
pub use session::AuthSession;
