//! # テンプレートレンダラー
//!
//! tera テンプレートエンジンで受信者リストとメールメッセージを生成する。
//!
//! ## 設計方針
//!
//! - **DB 格納テンプレートの one-off レンダリング**: テンプレートソースは
//!   管理者が編集する DB 行のため、事前登録ではなく `Tera::one_off` で
//!   その都度レンダリングする
//! - **受信者の正規化**: レンダリング結果は改行を含み得るため、
//!   [`RecipientList::from_rendered`] でワイヤ形式に正規化する
//! - **HTML のみ自動エスケープ**: 件名・テキスト本文・受信者リストは
//!   エスケープしない

use notiflow_domain::notification::{
    EmailMessage,
    MessageTemplate,
    NotificationError,
    RecipientList,
};
use tera::Tera;

/// テンプレートレンダラー
///
/// tera の one-off レンダリングをラップし、ディスパッチコンテキストから
/// 受信者リストと [`EmailMessage`] を生成する。
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn new() -> Self {
        Self
    }

    /// 受信者テンプレートをレンダリングして受信者リストを生成する
    pub fn render_recipients(
        &self,
        template_src: &str,
        context: &tera::Context,
    ) -> Result<RecipientList, NotificationError> {
        let rendered = Tera::one_off(template_src, context, false)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(RecipientList::from_rendered(&rendered))
    }

    /// メールテンプレートからメールメッセージを生成する
    ///
    /// # 引数
    ///
    /// - `template`: DB から取得したメールテンプレート
    /// - `recipients`: 解決済みの受信者リスト
    /// - `context`: ディスパッチコンテキストから構築した tera コンテキスト
    pub fn render_message(
        &self,
        template: &MessageTemplate,
        recipients: RecipientList,
        context: &tera::Context,
    ) -> Result<EmailMessage, NotificationError> {
        let subject = Tera::one_off(&template.subject, context, false)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?
            .trim()
            .to_string();

        let html_body = Tera::one_off(&template.html_body, context, true)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        let text_body = Tera::one_off(&template.text_body, context, false)
            .map_err(|e| NotificationError::TemplateFailed(e.to_string()))?;

        Ok(EmailMessage {
            to: recipients,
            subject,
            html_body,
            text_body,
        })
    }
}
