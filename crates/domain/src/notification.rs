//! # 通知
//!
//! メール通知に関するドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`EmailMessage`] | メールメッセージ | テンプレートレンダリングの出力 |
//! | [`RecipientList`] | 受信者リスト | 正規化済みのカンマ区切り宛先 |
//! | [`MessageTemplate`] | メールテンプレート | DB 格納の tera テンプレートソース |
//!
//! ## 設計方針
//!
//! - **受信者の正規化**: テンプレートレンダリング結果から改行・復帰を除去し、
//!   前後の空白を trim する
//! - **テンプレートは DB 格納**: 管理者がスラッグで参照されるテンプレートを
//!   編集できる（レンダリングは dispatch-service の責務）

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rule::{GroupSlug, TemplateSlug};

define_uuid_id! {
    /// 通知ログ ID（一意識別子）
    ///
    /// notification_logs テーブルの主キー。UUID v7 を使用。
    pub struct NotificationLogId;
}

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),
}

/// 受信者リスト（値オブジェクト）
///
/// カンマ区切りのメールアドレス列。テンプレートレンダリング結果、
/// または固定グループスラッグから構築する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientList(String);

impl RecipientList {
    /// レンダリング結果から受信者リストを構築する
    ///
    /// 前後の空白を trim し、復帰（CR）と改行（LF）を除去する。
    /// tera テンプレートは可読性のため改行を含みがちなので、
    /// 送信前にワイヤ形式へ正規化する。
    pub fn from_rendered(raw: &str) -> Self {
        Self(raw.trim().replace(['\r', '\n'], ""))
    }

    /// 固定グループスラッグから受信者リストを構築する
    ///
    /// グループの展開は送信側の責務のため、スラッグをそのまま保持する。
    pub fn from_group(slug: &GroupSlug) -> Self {
        Self(slug.as_str().to_string())
    }

    /// 空の受信者リストを返す
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// 宛先が 1 件も無い場合に true を返す
    pub fn is_empty(&self) -> bool {
        self.addresses().next().is_none()
    }

    /// 個々の宛先を走査するイテレータを返す
    ///
    /// カンマで分割し、空要素は除外する。
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.0
            .split(',')
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecipientList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力。NotificationSender に渡される。
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// 送信先（カンマ区切りで複数可）
    pub to:        RecipientList,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
}

/// メールテンプレート
///
/// message_templates テーブルに格納される tera テンプレートソース。
/// 件名・HTML 本文・テキスト本文をディスパッチコンテキストに対して
/// レンダリングする。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    /// テンプレートの論理キー（通知ルールから参照される）
    pub slug:      TemplateSlug,
    /// 件名テンプレート
    pub subject:   String,
    /// HTML 本文テンプレート
    pub html_body: String,
    /// プレーンテキスト本文テンプレート
    pub text_body: String,
}
