//! shuttle-core
//!
//! Core building blocks for the shuttle orchestrator: a durable job queue
//! drained by polling workers, and the OAuth credential lifecycle that job
//! handlers lean on when they talk to third-party APIs.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job, integration, credentials, session）
//! - **ports**: 抽象化レイヤー（JobStore, CredentialStore, SessionStore, Clock, Cipher, など）
//! - **queue**: retry policy, job record の状態遷移, in-memory JobStore
//! - **typed**: 型付き Job API（Job trait, Handler trait, TypedRegistry）
//! - **app**: アプリケーションロジック（builder, worker_loop, scheduler_loop, reaper_loop, gc_loop, runtime）
//! - **oauth**: PKCE, token lifecycle manager
//! - **impls**: ports の実装（in-memory stores, HTTP token endpoint, AES-GCM cipher）

pub mod domain;
pub mod ports;
pub mod queue;
pub mod typed;
pub mod app;
pub mod oauth;
pub mod impls;

pub mod config;
pub mod error;
pub mod observability;

pub use self::error::{CipherError, StoreError};
