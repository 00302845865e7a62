//! missive-core
//!
//! Recipient dispatch and delivery-state tracking engine.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（recipient, state, variation, classifier, outcome, ids, errors）
//! - **ports**: 抽象化レイヤー（ChannelAdapter, DeliveryStateStore, RateLimiter, Clock）
//! - **impls**: 実装（JSON ファイルストア、jitter、外部プロセスチャネル、テスト用スタブ）
//! - **recipients**: recipient テーブル（CSV）の読み込み
//! - **app**: アプリケーションロジック（campaign, builder, orchestrator, worker, status）
//! - **config**: `missive.toml`

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod recipients;
