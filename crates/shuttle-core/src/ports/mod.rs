//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（PostgreSQL, OAuth provider, 暗号化サービス）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - PostgreSQL が source of truth（正本）。プロセス間の協調は行ロックだけで行う
//! - 時刻は Clock から取得し、SQL には明示的に bind する
//! - master key は Cipher の中に閉じ込め、グローバル状態にしない

pub mod cipher;
pub mod clock;
pub mod credential_store;
pub mod id_generator;
pub mod integration_store;
pub mod job_store;
pub mod project_source;
pub mod session_store;
pub mod token_endpoint;

// 主要な trait を再エクスポート
pub use self::cipher::Cipher;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::credential_store::CredentialStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::integration_store::IntegrationStore;
pub use self::job_store::JobStore;
pub use self::project_source::ProjectSource;
pub use self::session_store::SessionStore;
pub use self::token_endpoint::{OAuthClientError, TokenEndpoint, TokenResponse};
