//! # レコード変更イベントハンドラ
//!
//! ホストアプリケーションからのレコード変更イベントを受け付ける
//! 内部 API エンドポイント。
//!
//! ## エンドポイント
//!
//! ```text
//! POST /internal/events
//! ```
//!
//! ## リクエスト例
//!
//! ```json
//! {
//!   "record_type": "order",
//!   "record_key": "42",
//!   "event_kind": "created",
//!   "payload": {"id": 42, "total": 1200}
//! }
//! ```
//!
//! レスポンスは 202 Accepted とディスパッチ結果サマリ。
//! ルール単位の失敗は `failed` 件数として返し、リクエスト自体は成功する。

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use notiflow_domain::{
    event::{ChangeEvent, RecordKey},
    rule::{EventKind, RecordType},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::ServiceError,
    usecase::{DispatchSummary, NotificationDispatcher},
};

/// イベントハンドラの状態
pub struct EventState {
    pub dispatcher: Arc<NotificationDispatcher>,
}

/// レコード変更イベントのリクエストボディ
#[derive(Debug, Deserialize)]
pub struct ChangeEventRequest {
    /// 変更されたレコードの種別
    pub record_type: String,
    /// 変更されたレコードの主キー
    pub record_key:  String,
    /// イベント種別（created / updated / deleted）
    pub event_kind:  EventKind,
    /// 変更後のレコード本体
    pub payload:     serde_json::Value,
    /// イベント発生日時（省略時は受信時刻）
    pub occurred_at: Option<DateTime<Utc>>,
}

/// ディスパッチ結果サマリのレスポンス
#[derive(Debug, Serialize)]
pub struct DispatchSummaryResponse {
    pub sent:     usize,
    pub deferred: usize,
    pub skipped:  usize,
    pub failed:   usize,
}

impl From<DispatchSummary> for DispatchSummaryResponse {
    fn from(summary: DispatchSummary) -> Self {
        Self {
            sent:     summary.sent,
            deferred: summary.deferred,
            skipped:  summary.skipped,
            failed:   summary.failed,
        }
    }
}

/// レコード変更イベントを受け付ける
///
/// バリデーション後にディスパッチャへ委譲する。
pub async fn receive_event(
    State(state): State<Arc<EventState>>,
    Json(request): Json<ChangeEventRequest>,
) -> Result<(StatusCode, Json<DispatchSummaryResponse>), ServiceError> {
    let record_type = RecordType::new(request.record_type)
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
    let record_key =
        RecordKey::new(request.record_key).map_err(|e| ServiceError::BadRequest(e.to_string()))?;

    let event = ChangeEvent::new(
        record_type,
        record_key,
        request.event_kind,
        request.payload,
        request.occurred_at.unwrap_or_else(Utc::now),
    );

    let summary = state.dispatcher.handle(event).await?;

    Ok((StatusCode::ACCEPTED, Json(summary.into())))
}
