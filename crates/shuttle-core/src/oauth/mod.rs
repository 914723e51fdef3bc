//! OAuth - PKCE authorization と token のライフサイクル管理

pub mod config;
pub mod error;
pub mod manager;
pub mod pkce;

pub use self::config::{OAuthProviderConfig, RefreshPolicy};
pub use self::error::TokenError;
pub use self::manager::{CallbackOutcome, OAuthStores, TokenLifecycleManager};
