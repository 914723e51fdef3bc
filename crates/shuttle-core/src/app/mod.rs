//! App - アプリケーション層
//!
//! ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AppBuilder**: Handler の登録と起動時検証
//! - **WorkerLoop**: ジョブ実行ループ（claim→handle→done/failed）
//! - **SchedulerLoop**: プロジェクトごとの定期ジョブ投入
//! - **ReaperLoop**: 期限切れ lock の回収
//! - **GcLoop**: 期限切れ OAuth session の削除
//! - **QueueStatus**: 読み取り専用ビュー
//! - **Runtime**: 上記ループの起動と停止

pub mod builder;
pub mod gc_loop;
mod periodic;
pub mod reaper_loop;
pub mod runtime;
pub mod scheduler_loop;
pub mod status;
pub mod worker_loop;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::gc_loop::GcLoop;
pub use self::reaper_loop::ReaperLoop;
pub use self::runtime::{Runtime, RuntimeHandle};
pub use self::scheduler_loop::SchedulerLoop;
pub use self::status::{QueueStatus, StatusReport};
pub use self::worker_loop::{TickReport, WorkerLoop};
