//! # SentMarkerRepository
//!
//! 送信済みマーカー（冪等性マーカー）を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **原子的 check-and-set**: `try_mark` は
//!   `INSERT … ON CONFLICT DO NOTHING` の 1 文で「未送信なら記録」を行う。
//!   並行する配送試行のうち 1 つだけが true を受け取る
//! - **リセット可能**: 送信失敗時にマーカーを解放して外部リトライに
//!   再送の余地を残すため、`unmark` を提供する

use async_trait::async_trait;
use notiflow_domain::{event::RecordKey, rule::RuleId};
use sqlx::PgPool;

use crate::error::InfraError;

/// 送信済みマーカーリポジトリトレイト
///
/// (ルール ID, レコードキー) の組に対して「送信済み」を記録し、
/// 同一の組への重複送信を抑止する。
#[async_trait]
pub trait SentMarkerRepository: Send + Sync {
    /// 未送信ならマーカーを記録する（原子的 check-and-set）
    ///
    /// # 戻り値
    ///
    /// - `Ok(true)`: 新規に記録した（呼び出し側が送信してよい）
    /// - `Ok(false)`: 既に記録済み（送信済み、no-op にすべき）
    async fn try_mark(&self, rule_id: &RuleId, record_key: &RecordKey)
    -> Result<bool, InfraError>;

    /// マーカーが記録済みか確認する
    async fn is_sent(&self, rule_id: &RuleId, record_key: &RecordKey)
    -> Result<bool, InfraError>;

    /// マーカーを削除する
    ///
    /// 送信失敗後の解放、または運用者による明示的なリセットに使用する。
    async fn unmark(&self, rule_id: &RuleId, record_key: &RecordKey) -> Result<(), InfraError>;
}

/// PostgreSQL 実装の SentMarkerRepository
#[derive(Debug, Clone)]
pub struct PostgresSentMarkerRepository {
    pool: PgPool,
}

impl PostgresSentMarkerRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SentMarkerRepository for PostgresSentMarkerRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn try_mark(
        &self,
        rule_id: &RuleId,
        record_key: &RecordKey,
    ) -> Result<bool, InfraError> {
        // 主キー (rule_id, record_key) との衝突時は何もしない。
        // rows_affected == 1 なら自分が勝者。
        let result = sqlx::query(
            r#"
            INSERT INTO sent_markers (rule_id, record_key, sent_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (rule_id, record_key) DO NOTHING
            "#,
        )
        .bind(rule_id.as_uuid())
        .bind(record_key.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn is_sent(
        &self,
        rule_id: &RuleId,
        record_key: &RecordKey,
    ) -> Result<bool, InfraError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM sent_markers
                WHERE rule_id = $1 AND record_key = $2
            )
            "#,
        )
        .bind(rule_id.as_uuid())
        .bind(record_key.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn unmark(&self, rule_id: &RuleId, record_key: &RecordKey) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            DELETE FROM sent_markers
            WHERE rule_id = $1 AND record_key = $2
            "#,
        )
        .bind(rule_id.as_uuid())
        .bind(record_key.as_str())
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
        assert_send_sync::<PostgresSentMarkerRepository>();
    }
}
