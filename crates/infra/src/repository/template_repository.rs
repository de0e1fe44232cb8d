//! # MessageTemplateRepository
//!
//! DB 格納メールテンプレートの読み取りを担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **スラッグ参照**: 通知ルールは `template_slug` でテンプレートを参照する
//! - **レンダリングは関知しない**: ここではソース文字列を返すだけで、
//!   tera によるレンダリングは dispatch-service の責務

use async_trait::async_trait;
use notiflow_domain::{notification::MessageTemplate, rule::TemplateSlug};
use sqlx::{PgPool, Row};

use crate::error::InfraError;

/// メールテンプレートリポジトリトレイト
#[async_trait]
pub trait MessageTemplateRepository: Send + Sync {
    /// スラッグでテンプレートを取得する
    async fn find_by_slug(
        &self,
        slug: &TemplateSlug,
    ) -> Result<Option<MessageTemplate>, InfraError>;
}

/// PostgreSQL 実装の MessageTemplateRepository
#[derive(Debug, Clone)]
pub struct PostgresMessageTemplateRepository {
    pool: PgPool,
}

impl PostgresMessageTemplateRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageTemplateRepository for PostgresMessageTemplateRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_by_slug(
        &self,
        slug: &TemplateSlug,
    ) -> Result<Option<MessageTemplate>, InfraError> {
        let row = sqlx::query(
            r#"
            SELECT slug, subject, html_body, text_body
            FROM message_templates
            WHERE slug = $1
            "#,
        )
        .bind(slug.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(MessageTemplate {
            slug:      TemplateSlug::new(row.try_get::<String, _>("slug")?)
                .map_err(|e| InfraError::unexpected(e.to_string()))?,
            subject:   row.try_get("subject")?,
            html_body: row.try_get("html_body")?,
            text_body: row.try_get("text_body")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresMessageTemplateRepository>();
    }
}
