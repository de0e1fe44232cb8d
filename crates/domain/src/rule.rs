//! # 通知ルール
//!
//! レコード変更イベントとメール通知を結びつける設定エンティティを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`NotificationRule`] | 通知ルール | レコード種別 × イベント種別ごとの通知設定 |
//! | [`EventKind`] | イベント種別 | 3 種類: 作成、更新、削除 |
//! | [`RecordType`] | レコード種別 | 監視対象のデータモデル名 |
//!
//! ## 設計方針
//!
//! - **管理者が作成・編集**: ディスパッチャからは読み取り専用
//! - **interval の符号で遅延送信を制御**: 0 以上 = その秒数だけ遅延、
//!   負数 = 遅延なし（即時送信）
//! - **受信者の二系統**: 固定グループスラッグ、または tera
//!   テンプレートのレンダリング結果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

define_uuid_id! {
    /// 通知ルール ID（一意識別子）
    ///
    /// notification_rules テーブルの主キー。UUID v7 を使用。
    pub struct RuleId;
}

define_validated_string! {
    /// レコード種別（値オブジェクト）
    ///
    /// 監視対象のデータモデルを識別する名前（例: `"order"`, `"customer"`）。
    /// フックレジストリのキーとして使用するため `Hash` を実装する。
    pub struct RecordType {
        label: "レコード種別",
        max_length: 100,
    }
}

define_validated_string! {
    /// 受信者グループスラッグ（値オブジェクト）
    ///
    /// ルールに固定の宛先が設定されている場合のグループ識別子。
    /// 設定されている場合、受信者テンプレートより優先される。
    pub struct GroupSlug {
        label: "受信者グループ",
        max_length: 100,
    }
}

define_validated_string! {
    /// メールテンプレートスラッグ（値オブジェクト）
    ///
    /// message_templates テーブルの論理キー。
    pub struct TemplateSlug {
        label: "メールテンプレートスラッグ",
        max_length: 100,
    }
}

/// イベント種別
///
/// notification_rules テーブルの `event_kind` カラムに格納される値。
/// snake_case でシリアライズされる。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    /// レコード作成
    Created,
    /// レコード更新
    Updated,
    /// レコード削除
    Deleted,
}

/// 通知ルールエンティティ
///
/// (レコード種別, イベント種別) に対する通知設定を表現する。
/// 管理者が作成・編集し、ディスパッチャは読み取りのみ行う。
///
/// # 不変条件
///
/// - `group` と `recipient_template` の少なくとも一方が無いルールは
///   受信者リストが空になり、ディスパッチ時にスキップされる
/// - `is_active` が false のルールはディスパッチ対象から除外される
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRule {
    id: RuleId,
    record_type: RecordType,
    event_kind: EventKind,
    is_active: bool,
    group: Option<GroupSlug>,
    recipient_template: Option<String>,
    template_slug: TemplateSlug,
    interval_secs: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NotificationRule {
    /// 新しい通知ルールを作成する
    ///
    /// # 引数
    ///
    /// - `id`: ルール ID
    /// - `record_type`: 監視対象のレコード種別
    /// - `event_kind`: 反応するイベント種別
    /// - `group`: 固定受信者グループ（任意）
    /// - `recipient_template`: 受信者リストの tera テンプレート（任意）
    /// - `template_slug`: メールテンプレートの参照
    /// - `interval_secs`: 遅延秒数（負数で即時送信）
    /// - `now`: 現在日時（呼び出し元から注入）
    ///
    /// # 不変条件
    ///
    /// - 作成時のステータスはアクティブ
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RuleId,
        record_type: RecordType,
        event_kind: EventKind,
        group: Option<GroupSlug>,
        recipient_template: Option<String>,
        template_slug: TemplateSlug,
        interval_secs: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            record_type,
            event_kind,
            is_active: true,
            group,
            recipient_template,
            template_slug,
            interval_secs,
            created_at: now,
            updated_at: now,
        }
    }

    /// 既存のデータからルールを復元する（データベースから取得時）
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: RuleId,
        record_type: RecordType,
        event_kind: EventKind,
        is_active: bool,
        group: Option<GroupSlug>,
        recipient_template: Option<String>,
        template_slug: TemplateSlug,
        interval_secs: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            record_type,
            event_kind,
            is_active,
            group,
            recipient_template,
            template_slug,
            interval_secs,
            created_at,
            updated_at,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn group(&self) -> Option<&GroupSlug> {
        self.group.as_ref()
    }

    pub fn recipient_template(&self) -> Option<&str> {
        self.recipient_template.as_deref()
    }

    pub fn template_slug(&self) -> &TemplateSlug {
        &self.template_slug
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ビジネスロジックメソッド

    /// 遅延送信の待機秒数を返す
    ///
    /// interval が 0 以上なら `Some(秒数)`（0 秒遅延を含む）、
    /// 負数なら `None`（即時送信）。
    pub fn send_after(&self) -> Option<u64> {
        u64::try_from(self.interval_secs).ok()
    }

    /// 無効化した新しいインスタンスを返す
    pub fn deactivated(self, now: DateTime<Utc>) -> Self {
        Self {
            is_active: false,
            updated_at: now,
            ..self
        }
    }
}

/// イベント種別の文字列をパースする
///
/// strum の `EnumString` 実装を `DomainError` に変換するヘルパー。
/// リポジトリ層が DB カラム値の復元に使用する。
pub fn parse_event_kind(value: &str) -> Result<EventKind, DomainError> {
    value
        .parse::<EventKind>()
        .map_err(|_| DomainError::Validation(format!("不正なイベント種別: {}", value)))
}
