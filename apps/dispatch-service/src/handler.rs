//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは薄く保ち、ディスパッチロジックはユースケース層に委譲

pub mod event;
pub mod health;

pub use event::{ChangeEventRequest, DispatchSummaryResponse, EventState, receive_event};
pub use health::health_check;
