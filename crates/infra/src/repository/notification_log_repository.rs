//! # NotificationLogRepository
//!
//! 通知ログの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **成功・失敗どちらも記録**: 送信結果の監査証跡として使用する
//! - **冪等性とは独立**: 重複送信の抑止は sent_markers が担い、
//!   ログは観測のためだけに存在する

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notiflow_domain::{
    event::RecordKey,
    notification::{NotificationLogId, RecipientList},
    rule::{EventKind, RecordType, RuleId},
};
use sqlx::PgPool;

use crate::error::InfraError;

/// 通知ログ（リポジトリ INSERT 用データ型）
#[derive(Debug, Clone)]
pub struct NotificationLog {
    pub id: NotificationLogId,
    pub rule_id: RuleId,
    pub record_type: RecordType,
    pub record_key: RecordKey,
    pub event_kind: EventKind,
    pub recipients: RecipientList,
    pub subject: String,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// 通知ログリポジトリトレイト
#[async_trait]
pub trait NotificationLogRepository: Send + Sync {
    /// 通知ログを挿入する
    async fn insert(&self, log: &NotificationLog) -> Result<(), InfraError>;
}

/// PostgreSQL 実装の NotificationLogRepository
#[derive(Debug, Clone)]
pub struct PostgresNotificationLogRepository {
    pool: PgPool,
}

impl PostgresNotificationLogRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationLogRepository for PostgresNotificationLogRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, log: &NotificationLog) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (
                id, rule_id, record_type, record_key, event_kind,
                recipients, subject, status, error_message, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.rule_id.as_uuid())
        .bind(log.record_type.as_str())
        .bind(log.record_key.as_str())
        .bind(log.event_kind.to_string())
        .bind(log.recipients.as_str())
        .bind(&log.subject)
        .bind(&log.status)
        .bind(&log.error_message)
        .bind(log.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresNotificationLogRepository>();
    }
}
