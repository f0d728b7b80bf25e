//! Authentication Module
//! Mission: Token issuance, request classification, revocation and RBAC

pub mod api;
pub mod codec;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod revocation;
pub mod service;
pub mod user_store;

pub use error::AuthError;
pub use guards::{auth_guard, rbac_guard};
pub use jwt::JwtHandler;
pub use middleware::bearer_token_middleware;
pub use models::{Claims, Role, TokenKind};
pub use policy::{RoutePolicy, RouteTable, ThrottleRule};
pub use revocation::{MemoryTokenCache, RevocationCache, TokenCache};
pub use service::AuthService;
pub use user_store::{UserDirectory, UserStore};
