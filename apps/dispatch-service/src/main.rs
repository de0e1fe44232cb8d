//! # Dispatch Service サーバー
//!
//! レコード変更イベントをメール通知に変換する内部サービス。
//!
//! ## 役割
//!
//! Dispatch Service は通知ディスパッチの実行と送信状態の永続化を担当する:
//!
//! - **ルール解決**: (レコード種別, イベント種別) に一致するアクティブな
//!   通知ルールを取得
//! - **受信者計算**: 固定グループ、または tera テンプレートのレンダリング
//! - **即時/遅延送信**: interval 非負のルールは Redis キュー経由で遅延実行
//! - **冪等性**: 送信済みマーカーで同一 (ルール, レコード) への二重送信を抑止
//!
//! ## アクセス制御
//!
//! Dispatch Service は内部ネットワークからのみアクセス可能とする。
//! イベントはホストアプリケーションの統合レイヤーが POST する。
//!
//! ```text
//! ┌──────────────┐      ┌──────────────────┐      ┌──────────────┐
//! │  Host App    │─────→│ Dispatch Service │─────→│  SMTP / SES  │
//! └──────────────┘      └──────────────────┘      └──────────────┘
//!                           ↓           ↑
//!                      ┌─────────┐ ┌─────────┐
//!                      │Postgres │ │  Redis  │
//!                      └─────────┘ └─────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `DISPATCH_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `DISPATCH_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `REDIS_URL` | **Yes** | Redis 接続 URL |
//! | `NOTIFICATION_BACKEND` | No | `smtp` / `ses` / `noop`（デフォルト: `noop`） |
//! | `NOTIFY_USERS` | No | `users` 変数に通知適格ユーザーを展開（デフォルト: false） |
//! | `DISPATCH_QUEUE` | No | 遅延キューのキー名（デフォルト: `notiflow:dispatch`） |
//! | `SEND_RETRY` | No | 遅延ジョブの最大再試行回数（デフォルト: 3） |
//! | `SEND_RETRY_DELAY` | No | 再試行の固定遅延秒数（デフォルト: 300） |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境
//! cargo run -p notiflow-dispatch-service
//!
//! # 本番環境
//! DISPATCH_PORT=3002 DATABASE_URL=postgres://... REDIS_URL=redis://... \
//!     cargo run -p notiflow-dispatch-service --release
//! ```

mod config;
mod error;
mod handler;
mod usecase;
mod worker;

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use config::DispatchConfig;
use handler::{EventState, health_check, receive_event};
use notiflow_infra::{
    db,
    notification::{
        NoopNotificationSender,
        NotificationSender,
        SesNotificationSender,
        SmtpNotificationSender,
    },
    queue::{DispatchQueue, RedisDispatchQueue},
    redis,
    repository::{
        NotificationRuleRepository,
        PostgresMessageTemplateRepository,
        PostgresNotificationLogRepository,
        PostgresNotificationRuleRepository,
        PostgresRecordSnapshotRepository,
        PostgresSentMarkerRepository,
        PostgresUserDirectory,
    },
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use usecase::{DispatcherDeps, HookRegistry, NotificationDispatcher};
use worker::DeferredWorker;

/// Dispatch Service サーバーのエントリーポイント
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    notiflow_shared::observability::init_tracing("info,notiflow=debug");

    // 設定読み込み
    let config = DispatchConfig::from_env().expect("設定の読み込みに失敗しました");

    tracing::info!(
        "Dispatch Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("データベース接続に失敗しました");
    db::run_migrations(&pool)
        .await
        .expect("マイグレーションの適用に失敗しました");
    tracing::info!("データベースに接続しました");

    // Redis 接続（遅延ディスパッチキュー）
    let redis_conn = redis::create_connection_manager(&config.redis_url)
        .await
        .expect("Redis 接続に失敗しました");
    let queue: Arc<dyn DispatchQueue> = Arc::new(RedisDispatchQueue::new(
        redis_conn,
        config.queue.queue_key.clone(),
    ));
    tracing::info!("Redis に接続しました");

    // 送信バックエンドを選択
    let sender: Arc<dyn NotificationSender> = match config.notification.backend.as_str() {
        "smtp" => Arc::new(SmtpNotificationSender::new(
            &config.notification.smtp_host,
            config.notification.smtp_port,
            config.notification.from_address.clone(),
        )),
        "ses" => {
            let aws_config = aws_config::load_from_env().await;
            Arc::new(SesNotificationSender::new(
                aws_sdk_sesv2::Client::new(&aws_config),
                config.notification.from_address.clone(),
            ))
        }
        _ => {
            tracing::info!("通知バックエンド noop を使用します（メールは送信されません）");
            Arc::new(NoopNotificationSender)
        }
    };

    // リポジトリを初期化
    let rule_repo = PostgresNotificationRuleRepository::new(pool.clone());

    // フックレジストリを構築（アクティブなルールごとの登録）
    let active_rules = rule_repo.find_all_active().await?;
    let registry = HookRegistry::build(&active_rules);
    tracing::info!(
        rules = active_rules.len(),
        hooks = registry.len(),
        "フックレジストリを構築しました"
    );

    // ディスパッチャを組み立てる
    let deps = DispatcherDeps {
        rule_repo: Arc::new(rule_repo),
        snapshot_repo: Arc::new(PostgresRecordSnapshotRepository::new(pool.clone())),
        marker_repo: Arc::new(PostgresSentMarkerRepository::new(pool.clone())),
        template_repo: Arc::new(PostgresMessageTemplateRepository::new(pool.clone())),
        log_repo: Arc::new(PostgresNotificationLogRepository::new(pool.clone())),
        user_directory: Arc::new(PostgresUserDirectory::new(pool.clone())),
        sender,
        queue: queue.clone(),
        clock: Arc::new(notiflow_domain::clock::SystemClock),
    };
    let dispatcher = Arc::new(NotificationDispatcher::new(
        deps,
        registry,
        config.notify_users,
    ));

    // 遅延ディスパッチワーカーを起動
    let deferred_worker = DeferredWorker::new(
        dispatcher.clone(),
        queue,
        config.queue.send_retry,
        config.queue.send_retry_delay_secs,
        Duration::from_secs(config.queue.poll_interval_secs),
    );
    tokio::spawn(deferred_worker.run());

    // ルーター構築
    let event_state = Arc::new(EventState { dispatcher });
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/internal/events", post(receive_event))
        .with_state(event_state)
        .layer(TraceLayer::new_for_http());

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("アドレスのパースに失敗しました");

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Dispatch Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
