//! # ディスパッチコンテキスト
//!
//! ルール処理の間、イベントと周辺情報（直前スナップショット・通知適格
//! ユーザー・現在時刻）を保持する値オブジェクト。
//!
//! ## 設計方針
//!
//! - **縮退を許容**: 直前スナップショットが無い（作成イベント等）場合は
//!   `old_instance` を欠損のまま進める。エラーにしない
//! - **テンプレート変数への変換**: `to_template_context()` が tera の
//!   `Context` を構築する。受信者テンプレートとメール本文テンプレートの
//!   両方が同じ変数セットを参照する

use chrono::{DateTime, Utc};
use notiflow_domain::{event::ChangeEvent, rule::RuleId, user::User};

/// ディスパッチコンテキスト
///
/// 1 イベントの処理中に共有される読み取り専用の情報。
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// 処理中のレコード変更イベント
    pub event: ChangeEvent,
    /// 直前スナップショット（レコードが過去に存在した場合のみ）
    pub old_instance: Option<serde_json::Value>,
    /// 最新スナップショット（遅延再実行時のみ設定）
    pub current_instance: Option<serde_json::Value>,
    /// 通知適格ユーザー（`NOTIFY_USERS` 無効時は空）
    pub users: Vec<User>,
    /// コンテキスト構築時刻
    pub now: DateTime<Utc>,
    /// 遅延再実行の場合、そのルール ID
    deferred_rule: Option<RuleId>,
}

impl DispatchContext {
    /// イベント受信時のコンテキストを構築する
    pub fn initial(
        event: ChangeEvent,
        old_instance: Option<serde_json::Value>,
        users: Vec<User>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event,
            old_instance,
            current_instance: None,
            users,
            now,
            deferred_rule: None,
        }
    }

    /// 遅延ディスパッチ再実行時のコンテキストを構築する
    ///
    /// 再実行時点のスナップショットを `current_instance` に設定する。
    pub fn reentry(
        event: ChangeEvent,
        current_instance: Option<serde_json::Value>,
        users: Vec<User>,
        now: DateTime<Utc>,
        rule_id: RuleId,
    ) -> Self {
        Self {
            event,
            old_instance: current_instance.clone(),
            current_instance,
            users,
            now,
            deferred_rule: Some(rule_id),
        }
    }

    /// 遅延ディスパッチの再実行か判定する
    ///
    /// 再実行では interval による再スケジュールを行わず、即時送信する。
    pub fn is_deferred_reentry(&self) -> bool {
        self.deferred_rule.is_some()
    }

    /// tera テンプレートコンテキストを構築する
    ///
    /// ## テンプレート変数
    ///
    /// | 変数 | 内容 |
    /// |------|------|
    /// | `record` | 変更後のレコード本体（JSON） |
    /// | `record_key` | レコードの主キー |
    /// | `event_kind` | イベント種別（snake_case） |
    /// | `old_instance` | 直前スナップショット（無ければ null） |
    /// | `current_instance` | 最新スナップショット（遅延再実行時のみ、無ければ null） |
    /// | `users` | 通知適格ユーザーのメールアドレス（カンマ区切り文字列） |
    /// | `user_emails` | 同上の配列（`{% for %}` 用） |
    /// | `date` | 現在日付（`YYYY-MM-DD`） |
    /// | `date_time` | 現在日時（RFC 3339） |
    pub fn to_template_context(&self) -> tera::Context {
        let mut context = tera::Context::new();

        context.insert("record", &self.event.payload);
        context.insert("record_key", self.event.record_key.as_str());
        context.insert("event_kind", &self.event.kind.to_string());
        context.insert(
            "old_instance",
            self.old_instance.as_ref().unwrap_or(&serde_json::Value::Null),
        );
        context.insert(
            "current_instance",
            self.current_instance
                .as_ref()
                .unwrap_or(&serde_json::Value::Null),
        );

        let emails: Vec<&str> = self.users.iter().map(|u| u.email().as_str()).collect();
        // `{{ users }}` で直接展開できるよう、カンマ区切り文字列でも提供する
        context.insert("users", &emails.join(","));
        context.insert("user_emails", &emails);

        context.insert("date", &self.now.format("%Y-%m-%d").to_string());
        context.insert("date_time", &self.now.to_rfc3339());

        context
    }
}
