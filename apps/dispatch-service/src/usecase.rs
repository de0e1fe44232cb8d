//! # ユースケース層
//!
//! Dispatch Service のディスパッチロジックを実装する。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・キュー・送信器を `Arc<dyn Trait>` で
//!   外部から注入
//! - **薄いハンドラ**: ハンドラは薄く保ち、ロジックはユースケースに集約
//!
//! ## モジュール構成
//!
//! - [`dispatcher`] - 通知ディスパッチャ（handle / process / dispatch）
//! - [`registry`] - (レコード種別, イベント種別) のフックレジストリ
//! - [`context`] - ディスパッチコンテキストと tera 変数構築
//! - [`renderer`] - DB 格納テンプレートの one-off レンダリング

pub mod context;
pub mod dispatcher;
pub mod registry;
pub mod renderer;

pub use context::DispatchContext;
pub use dispatcher::{
    DispatchOutcome,
    DispatchSummary,
    DispatcherDeps,
    NotificationDispatcher,
};
pub use registry::HookRegistry;
pub use renderer::TemplateRenderer;
