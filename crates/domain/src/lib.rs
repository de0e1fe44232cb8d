//! # NotiFlow ドメイン層
//!
//! 通知ディスパッチのビジネスロジックを担うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: NotificationRule, User）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: RecordType,
//!   RecipientList）
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! dispatch-service → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、Redis、メール送信）には一切依存しない。
//! これにより、ディスパッチ判定ロジックの純粋性が保たれる。
//!
//! ## モジュール構成
//!
//! - [`error`] - ドメイン層で発生するエラーの定義
//! - [`rule`] - 通知ルールエンティティとイベント種別
//! - [`event`] - レコード変更イベントと遅延ディスパッチジョブ
//! - [`notification`] - メールメッセージ・受信者リスト・メールテンプレート
//! - [`user`] - 通知対象ユーザー
//! - [`clock`] - テスト可能な時刻プロバイダ
//!
//! ## 使用例
//!
//! ```rust
//! use notiflow_domain::{DomainError, rule::RuleId};
//!
//! // ルール ID の生成
//! let rule_id = RuleId::new();
//!
//! // ドメインエラーの生成
//! let error = DomainError::NotFound {
//!     entity_type: "NotificationRule",
//!     id:          rule_id.to_string(),
//! };
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod event;
pub mod notification;
pub mod rule;
pub mod user;

pub use error::DomainError;
