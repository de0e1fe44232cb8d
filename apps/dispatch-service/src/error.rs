//! # Dispatch Service エラー定義
//!
//! Dispatch Service 固有のエラーと、HTTP レスポンスへの変換を定義する。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use notiflow_domain::notification::NotificationError;
use notiflow_infra::InfraError;
use serde::Serialize;
use thiserror::Error;

/// エラーレスポンス（RFC 7807 Problem Details）
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

/// Dispatch Service で発生するエラー
#[derive(Debug, Error)]
pub enum ServiceError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// インフラエラー（DB / Redis）
    #[error("インフラエラー: {0}")]
    Infra(#[from] InfraError),

    /// 通知エラー（レンダリング / 送信）
    #[error("通知エラー: {0}")]
    Notification(#[from] NotificationError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error_type, title, detail) = match &self {
            ServiceError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "https://notiflow.example.com/errors/not-found",
                "Not Found",
                msg.clone(),
            ),
            ServiceError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "https://notiflow.example.com/errors/bad-request",
                "Bad Request",
                msg.clone(),
            ),
            ServiceError::Infra(e) => {
                tracing::error!("インフラエラー: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://notiflow.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
            ServiceError::Notification(e) => {
                tracing::error!("通知エラー: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://notiflow.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
            ServiceError::Internal(msg) => {
                tracing::error!("内部エラー: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://notiflow.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error_type: error_type.to_string(),
                title: title.to_string(),
                status: status.as_u16(),
                detail,
            }),
        )
            .into_response()
    }
}
