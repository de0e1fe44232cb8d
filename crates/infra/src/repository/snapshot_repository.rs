//! # RecordSnapshotRepository
//!
//! レコードの直前状態（スナップショット）を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **ディスパッチャが保守する**: イベント処理の最後にペイロードを
//!   upsert し、次のイベントで `old_instance` として参照できるようにする
//! - **欠損は正常系**: 初回作成イベントではスナップショットが存在しない。
//!   `find` は `Option` を返し、呼び出し側はコンテキストを縮退させて続行する

use async_trait::async_trait;
use notiflow_domain::{event::RecordKey, rule::RecordType};
use sqlx::PgPool;

use crate::error::InfraError;

/// レコードスナップショットリポジトリトレイト
#[async_trait]
pub trait RecordSnapshotRepository: Send + Sync {
    /// (レコード種別, キー) のスナップショットを取得する
    ///
    /// 存在しない場合は `Ok(None)`（エラーではない）。
    async fn find(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<Option<serde_json::Value>, InfraError>;

    /// スナップショットを挿入または更新する
    async fn upsert(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
        payload: &serde_json::Value,
    ) -> Result<(), InfraError>;

    /// スナップショットを削除する（削除イベント処理後）
    async fn remove(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<(), InfraError>;
}

/// PostgreSQL 実装の RecordSnapshotRepository
#[derive(Debug, Clone)]
pub struct PostgresRecordSnapshotRepository {
    pool: PgPool,
}

impl PostgresRecordSnapshotRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordSnapshotRepository for PostgresRecordSnapshotRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<Option<serde_json::Value>, InfraError> {
        let payload: Option<serde_json::Value> = sqlx::query_scalar(
            r#"
            SELECT payload
            FROM record_snapshots
            WHERE record_type = $1 AND record_key = $2
            "#,
        )
        .bind(record_type.as_str())
        .bind(record_key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(payload)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn upsert(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
        payload: &serde_json::Value,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO record_snapshots (record_type, record_key, payload, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (record_type, record_key)
            DO UPDATE SET payload = EXCLUDED.payload, updated_at = NOW()
            "#,
        )
        .bind(record_type.as_str())
        .bind(record_key.as_str())
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn remove(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            DELETE FROM record_snapshots
            WHERE record_type = $1 AND record_key = $2
            "#,
        )
        .bind(record_type.as_str())
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
        assert_send_sync::<PostgresRecordSnapshotRepository>();
    }
}
