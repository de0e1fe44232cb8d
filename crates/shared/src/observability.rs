//! # トレーシング初期化
//!
//! サービスバイナリが共通で使う tracing-subscriber の初期化ヘルパー。
//!
//! ## 設計方針
//!
//! - **EnvFilter**: `RUST_LOG` 環境変数でログレベルを制御、
//!   未設定時はデフォルトフィルタを適用
//! - **init は一度だけ**: バイナリの main 冒頭で呼び出す

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// tracing サブスクライバを初期化する
///
/// `RUST_LOG` が未設定の場合は `default_filter`（例:
/// `"info,notiflow=debug"`）を使用する。
///
/// # パニック
///
/// 同一プロセスで二度呼び出すと panic する（グローバルサブスクライバの
/// 二重登録）。
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
