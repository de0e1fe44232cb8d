//! # 遅延ディスパッチキュー
//!
//! interval 付きルールの送信ジョブを保持する遅延キュー。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `DispatchQueue` trait でキュー操作を抽象化し、
//!   ユースケーステストではインメモリモックに差し替える
//! - **Redis sorted set**: member = ジョブ JSON、score = 実行予定時刻
//!   （epoch 秒）。`ZPOPMIN` で最も早いジョブから取り出す
//! - **リトライはワーカーの責務**: キューは取り出しと再投入だけを提供し、
//!   再試行回数の管理はジョブ自身（`DispatchJob::attempt`）が持つ

use async_trait::async_trait;
use chrono::Utc;
use notiflow_domain::event::DispatchJob;
use redis::{AsyncCommands, aio::ConnectionManager};

use crate::error::InfraError;

/// 遅延ディスパッチキュートレイト
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// ジョブを `delay_secs` 秒後に実行予定としてエンキューする
    ///
    /// `delay_secs = 0` は「次のポーリングで即時実行」を意味する。
    async fn enqueue(&self, job: &DispatchJob, delay_secs: u64) -> Result<(), InfraError>;

    /// 実行予定時刻を過ぎたジョブを 1 件取り出す
    ///
    /// 期限前のジョブしか無い場合、またはキューが空の場合は `Ok(None)`。
    async fn pop_due(&self) -> Result<Option<DispatchJob>, InfraError>;
}

/// Redis sorted set 実装の DispatchQueue
///
/// `ConnectionManager` は Clone 可能なため、呼び出しごとに複製して使用する。
#[derive(Clone)]
pub struct RedisDispatchQueue {
    conn:      ConnectionManager,
    queue_key: String,
}

impl RedisDispatchQueue {
    /// 新しいキューインスタンスを作成
    ///
    /// # 引数
    ///
    /// - `conn`: Redis 接続マネージャ
    /// - `queue_key`: sorted set のキー名（`DISPATCH_QUEUE` 設定値）
    pub fn new(conn: ConnectionManager, queue_key: impl Into<String>) -> Self {
        Self {
            conn,
            queue_key: queue_key.into(),
        }
    }
}

#[async_trait]
impl DispatchQueue for RedisDispatchQueue {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn enqueue(&self, job: &DispatchJob, delay_secs: u64) -> Result<(), InfraError> {
        let member = serde_json::to_string(job)?;
        let due_at = Utc::now().timestamp() + i64::try_from(delay_secs).unwrap_or(i64::MAX);

        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&self.queue_key, member, due_at).await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn pop_due(&self) -> Result<Option<DispatchJob>, InfraError> {
        let mut conn = self.conn.clone();

        let popped: Vec<(String, f64)> = conn.zpopmin(&self.queue_key, 1).await?;
        let Some((member, score)) = popped.into_iter().next() else {
            return Ok(None);
        };

        // 最小 score のジョブがまだ期限前なら戻して次のポーリングを待つ
        if score > Utc::now().timestamp() as f64 {
            let _: () = conn.zadd(&self.queue_key, &member, score).await?;
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&member)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RedisDispatchQueue>();
    }
}
