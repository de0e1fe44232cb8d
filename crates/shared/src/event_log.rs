//! # ビジネスイベントログの構造化ヘルパー
//!
//! 通知の送信・遅延・失敗を `jq` で効率的に調査できるよう、ログフィールドの
//! 命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"`
//! マーカーが自動付与され、
//! `jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`notification.rule_id`）を使用。tracing の
//! `$($field:ident).+` パターンでサポートされ、JSON 出力でフラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `notification.rule_id`: 対象ルール ID
/// - `notification.record_key`: 対象レコードキー
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const NOTIFICATION: &str = "notification";
        pub const DISPATCH: &str = "dispatch";
    }

    /// イベントアクション
    pub mod action {
        // 通知
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
        pub const NOTIFICATION_DEFERRED: &str = "notification.deferred";
        pub const NOTIFICATION_SKIPPED: &str = "notification.skipped";

        // ディスパッチ
        pub const EVENT_RECEIVED: &str = "dispatch.event_received";
        pub const JOB_DROPPED: &str = "dispatch.job_dropped";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const NOTIFICATION_RULE: &str = "notification_rule";
        pub const NOTIFICATION_LOG: &str = "notification_log";
        pub const DISPATCH_JOB: &str = "dispatch_job";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}
