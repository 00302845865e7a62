//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて送信 run を実装します。
//!
//! # 主要コンポーネント
//! - **Campaign**: 入力一式の読み込みと前提条件チェック
//! - **OrchestratorBuilder**: orchestrator の構築とワイヤリング
//! - **DispatchOrchestrator**: recipient を 1 件ずつ送信・分類・checkpoint
//! - **DispatchWorker**: run をバックグラウンド task として起動、stop signal 付き
//! - **StatusView**: 状態ファイルの stateless な読み取り

pub mod builder;
pub mod campaign;
pub mod orchestrator;
pub mod status;
pub mod worker;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, OrchestratorBuilder};
pub use self::campaign::{Campaign, CampaignSources};
pub use self::orchestrator::{DispatchOrchestrator, RunOptions, RunReport, RunState};
pub use self::status::{StatusSnapshot, StatusView};
pub use self::worker::{DispatchHandle, DispatchWorker, StopHandle};
