//! # NotificationRuleRepository
//!
//! 通知ルールの読み取りを担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **読み取り専用**: ルールの作成・編集は管理系の責務で、
//!   ディスパッチャは参照のみ行う
//! - **アクティブ限定**: すべてのクエリが `is_active` でフィルタし、
//!   無効化されたルールを処理対象から即時に外す

use async_trait::async_trait;
use notiflow_domain::rule::{
    EventKind,
    GroupSlug,
    NotificationRule,
    RecordType,
    RuleId,
    TemplateSlug,
    parse_event_kind,
};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::InfraError;

/// 通知ルールリポジトリトレイト
#[async_trait]
pub trait NotificationRuleRepository: Send + Sync {
    /// (レコード種別, イベント種別) に一致するアクティブなルールを取得する
    async fn find_active(
        &self,
        record_type: &RecordType,
        event_kind: EventKind,
    ) -> Result<Vec<NotificationRule>, InfraError>;

    /// ID でアクティブなルールを取得する
    ///
    /// 遅延ディスパッチの再実行時に使用する。無効化済み・削除済みの
    /// ルールは `None` を返す（呼び出し側は静かにスキップする）。
    async fn find_active_by_id(&self, id: &RuleId)
    -> Result<Option<NotificationRule>, InfraError>;

    /// すべてのアクティブなルールを取得する
    ///
    /// 起動時のフックレジストリ構築に使用する。
    async fn find_all_active(&self) -> Result<Vec<NotificationRule>, InfraError>;
}

/// PostgreSQL 実装の NotificationRuleRepository
#[derive(Debug, Clone)]
pub struct PostgresNotificationRuleRepository {
    pool: PgPool,
}

impl PostgresNotificationRuleRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        record_type,
        event_kind,
        is_active,
        group_slug,
        recipient_template,
        template_slug,
        interval_secs,
        created_at,
        updated_at
    FROM notification_rules
"#;

/// DB 行からルールエンティティを復元する
///
/// カラム値がドメインのバリデーションを通らない場合は
/// `InfraErrorKind::Unexpected` として表面化する（DB 側の不整合）。
fn map_rule(row: &PgRow) -> Result<NotificationRule, InfraError> {
    let event_kind = parse_event_kind(row.try_get::<&str, _>("event_kind")?)
        .map_err(|e| InfraError::unexpected(e.to_string()))?;

    let group = row
        .try_get::<Option<String>, _>("group_slug")?
        .map(GroupSlug::new)
        .transpose()
        .map_err(|e| InfraError::unexpected(e.to_string()))?;

    Ok(NotificationRule::from_db(
        RuleId::from_uuid(row.try_get("id")?),
        RecordType::new(row.try_get::<String, _>("record_type")?)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
        event_kind,
        row.try_get("is_active")?,
        group,
        row.try_get("recipient_template")?,
        TemplateSlug::new(row.try_get::<String, _>("template_slug")?)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
        row.try_get("interval_secs")?,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}

#[async_trait]
impl NotificationRuleRepository for PostgresNotificationRuleRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_active(
        &self,
        record_type: &RecordType,
        event_kind: EventKind,
    ) -> Result<Vec<NotificationRule>, InfraError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE record_type = $1 AND event_kind = $2 AND is_active \
             ORDER BY created_at"
        ))
        .bind(record_type.as_str())
        .bind(event_kind.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_rule).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_active_by_id(
        &self,
        id: &RuleId,
    ) -> Result<Option<NotificationRule>, InfraError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1 AND is_active"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_rule).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_all_active(&self) -> Result<Vec<NotificationRule>, InfraError> {
        let rows = sqlx::query(&format!(
            "{SELECT_COLUMNS} WHERE is_active ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_rule).collect()
    }
}
