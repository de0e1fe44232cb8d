//! # Dispatch Service 設定
//!
//! 環境変数から Dispatch Service サーバーの設定を読み込む。

use std::env;

/// Dispatch Service サーバーの設定
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// データベース接続 URL
    pub database_url: String,
    /// Redis 接続 URL（遅延ディスパッチキュー用）
    pub redis_url: String,
    /// `users` テンプレート変数に通知適格ユーザーを展開するか
    pub notify_users: bool,
    /// 通知設定
    pub notification: NotificationConfig,
    /// 遅延キュー設定
    pub queue: QueueConfig,
}

/// 通知機能の設定
///
/// `NOTIFICATION_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `ses`: Amazon SES v2 経由で送信（本番）
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// 送信バックエンド（"smtp" | "ses" | "noop"）
    pub backend:      String,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:    String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:    u16,
    /// 送信元メールアドレス
    pub from_address: String,
}

/// 遅延ディスパッチキューの設定
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis sorted set のキー名
    pub queue_key: String,
    /// 遅延ジョブの最大再試行回数
    pub send_retry: u32,
    /// 再試行の固定遅延（秒）
    pub send_retry_delay_secs: u64,
    /// ワーカーのポーリング間隔（秒）
    pub poll_interval_secs: u64,
}

impl DispatchConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            host: env::var("DISPATCH_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("DISPATCH_PORT")
                .expect("DISPATCH_PORT が設定されていません")
                .parse()
                .expect("DISPATCH_PORT は有効なポート番号である必要があります"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL が設定されていません"),
            redis_url: env::var("REDIS_URL").expect("REDIS_URL が設定されていません"),
            notify_users: env::var("NOTIFY_USERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            notification: NotificationConfig::from_env(),
            queue: QueueConfig::from_env(),
        })
    }
}

impl NotificationConfig {
    /// 環境変数から通知設定を読み込む
    fn from_env() -> Self {
        Self {
            backend:      env::var("NOTIFICATION_BACKEND").unwrap_or_else(|_| "noop".to_string()),
            smtp_host:    env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port:    env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .expect("SMTP_PORT は有効なポート番号である必要があります"),
            from_address: env::var("NOTIFICATION_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@notiflow.example.com".to_string()),
        }
    }
}

impl QueueConfig {
    /// 環境変数から遅延キュー設定を読み込む
    fn from_env() -> Self {
        Self {
            queue_key: env::var("DISPATCH_QUEUE")
                .unwrap_or_else(|_| "notiflow:dispatch".to_string()),
            send_retry: env::var("SEND_RETRY")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .expect("SEND_RETRY は非負整数である必要があります"),
            send_retry_delay_secs: env::var("SEND_RETRY_DELAY")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("SEND_RETRY_DELAY は非負整数（秒）である必要があります"),
            poll_interval_secs: env::var("QUEUE_POLL_INTERVAL")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .expect("QUEUE_POLL_INTERVAL は非負整数（秒）である必要があります"),
        }
    }
}
