//! # リポジトリ実装
//!
//! ディスパッチロジックが依存する永続化トレイトと、その PostgreSQL 実装を
//! 提供する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: ディスパッチャはトレイトにのみ依存し、実装はここで提供
//! - **データベース抽象化**: sqlx を使用し、PostgreSQL 固有の処理をカプセル化
//! - **テスタビリティ**: トレイト経由でモック可能な設計（[`crate::mock`]）

pub mod notification_log_repository;
pub mod rule_repository;
pub mod sent_marker_repository;
pub mod snapshot_repository;
pub mod template_repository;
pub mod user_directory;

pub use notification_log_repository::{
    NotificationLog,
    NotificationLogRepository,
    PostgresNotificationLogRepository,
};
pub use rule_repository::{NotificationRuleRepository, PostgresNotificationRuleRepository};
pub use sent_marker_repository::{PostgresSentMarkerRepository, SentMarkerRepository};
pub use snapshot_repository::{PostgresRecordSnapshotRepository, RecordSnapshotRepository};
pub use template_repository::{MessageTemplateRepository, PostgresMessageTemplateRepository};
pub use user_directory::{PostgresUserDirectory, UserDirectory};
