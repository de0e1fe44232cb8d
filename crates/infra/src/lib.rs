//! # NotiFlow インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 設計方針
//!
//! このクレートはディスパッチロジックが依存するインターフェース
//! （リポジトリ・キュー・送信トレイト）の具体的な実装を提供する。
//! 外部システムの詳細をカプセル化し、ドメイン層をインフラの変更から保護する。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理
//! - **リポジトリ実装**: ルール・スナップショット・送信済みマーカー・
//!   メールテンプレート・通知ログ・ユーザーディレクトリ
//! - **遅延ディスパッチキュー**: Redis sorted set による遅延ジョブ管理
//! - **メール送信**: SMTP / SES / Noop の 3 バックエンド
//!
//! ## 依存関係
//!
//! ```text
//! dispatch-service → infra → domain
//! ```
//!
//! インフラ層は `domain` に依存する。
//! ドメイン層はインフラ層に依存しない（依存性逆転の原則）。
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`redis`] - Redis 接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`repository`] - リポジトリ実装
//! - [`queue`] - 遅延ディスパッチキュー
//! - [`notification`] - メール送信バックエンド

pub mod db;
pub mod error;
pub mod notification;
pub mod queue;
pub mod redis;
pub mod repository;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use error::{InfraError, InfraErrorKind};
