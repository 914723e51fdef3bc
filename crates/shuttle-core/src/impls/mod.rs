//! Implementations - ports の実装
//!
//! - in-memory stores（テスト・ローカル実行用）
//! - HTTP token endpoint（reqwest）
//! - AES-256-GCM cipher

pub mod aes_cipher;
pub mod http_token_endpoint;
pub mod inmem_oauth;
pub mod static_projects;

pub use self::aes_cipher::{AesGcmCipher, MasterKey};
pub use self::http_token_endpoint::HttpTokenEndpoint;
pub use self::inmem_oauth::{InMemoryCredentialStore, InMemoryIntegrationStore, InMemorySessionStore};
pub use self::static_projects::StaticProjectSource;
