//! # Redis 接続管理
//!
//! 遅延ディスパッチキューが使用する Redis への接続管理を行う。
//!
//! ## 設計方針
//!
//! - **ConnectionManager**: 自動再接続機能を持つ接続マネージャを使用
//! - **非同期対応**: tokio ランタイムとの統合
//!
//! ## Redis の用途
//!
//! NotiFlow では Redis を以下の目的で使用する:
//!
//! - **遅延ディスパッチキュー**: interval 付きルールの送信ジョブを
//!   sorted set（score = 実行予定時刻）で保持する

use redis::{Client, aio::ConnectionManager};

/// Redis 接続マネージャを作成する
///
/// アプリケーション起動時に一度だけ呼び出し、作成したマネージャを
/// アプリケーション全体で共有する。
///
/// # 引数
///
/// * `redis_url` - Redis 接続 URL
///   - 形式: `redis://[[username:]password@]host[:port][/database]`
///   - TLS: `rediss://` スキームで TLS 接続
///
/// # ConnectionManager の特徴
///
/// - **自動再接続**: 接続が切断されても自動的に再接続を試みる
/// - **Clone 可能**: 複数のタスクで安全に共有できる
/// - **非同期**: tokio と統合された非同期 API
pub async fn create_connection_manager(
    redis_url: &str,
) -> Result<ConnectionManager, redis::RedisError> {
    let client = Client::open(redis_url)?;
    ConnectionManager::new(client).await
}
