//! SIGMA core session types: token storage, claims, permissions and guards

pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod permissions;
pub mod storage;
pub mod validation;

#[cfg(any(test, feature = "tests"))]
pub mod testing;

pub use claims::{Claims, DecodeError, Identifier, Permission, Role, decode, token_is_expired};
pub use config::{AppConfig, AuthConfig, ServiceEndpoint, ServicesConfig, SigmaConfig};
pub use context::{PermissionContext, SessionPhase, SessionState, TokenDerivation};
pub use error::{CoreError, CoreResult};
pub use guard::{AccessDecision, AccessRequirement, Match};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageKeys, TokenStore};
pub use validation::ValidateConfig;
