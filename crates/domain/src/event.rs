//! # レコード変更イベント
//!
//! ホストアプリケーションのデータモデル変更を表現する一時的な値オブジェクトと、
//! 遅延ディスパッチキューを流れるジョブを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`ChangeEvent`] | レコード変更イベント | create/update/delete ごとに 1 件生成、永続化しない |
//! | [`RecordKey`] | レコードキー | 変更されたレコードの主キー表現 |
//! | [`DispatchJob`] | 遅延ディスパッチジョブ | キュー経由で再実行される送信依頼 |
//!
//! ## 設計方針
//!
//! - **シリアライズ可能**: イベントは HTTP 受信と Redis キューの両方を
//!   JSON で通過するため `serde` を実装する
//! - **ペイロードは非構造化**: レコード本体は `serde_json::Value` のまま持ち、
//!   テンプレートコンテキストにそのまま渡す

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rule::{EventKind, RecordType, RuleId};

define_validated_string! {
    /// レコードキー（値オブジェクト）
    ///
    /// 変更されたレコードの主キーの文字列表現。数値主キーも UUID も
    /// 文字列として受け取る。送信済みマーカーのキーの一部になる。
    pub struct RecordKey {
        label: "レコードキー",
        max_length: 255,
    }
}

/// レコード変更イベント
///
/// ホストアプリケーションのレコード 1 件の作成・更新・削除を表現する。
/// トリガーごとに生成され、永続化されない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 変更されたレコードの種別
    pub record_type: RecordType,
    /// 変更されたレコードの主キー
    pub record_key:  RecordKey,
    /// イベント種別（created / updated / deleted）
    pub kind:        EventKind,
    /// 変更後のレコード本体（削除イベントでは削除直前の状態）
    pub payload:     serde_json::Value,
    /// イベント発生日時
    pub occurred_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(
        record_type: RecordType,
        record_key: RecordKey,
        kind: EventKind,
        payload: serde_json::Value,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_type,
            record_key,
            kind,
            payload,
            occurred_at,
        }
    }
}

/// 遅延ディスパッチジョブ
///
/// interval が 0 以上のルールに対して生成され、Redis キューを経由して
/// ワーカーが再実行する。`attempt` は再試行回数で、上限を超えたジョブは
/// ワーカーが破棄する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchJob {
    /// 対象ルール ID（再実行時にアクティブ状態を再確認する）
    pub rule_id: RuleId,
    /// 元のレコード変更イベント
    pub event:   ChangeEvent,
    /// 実行済みの再試行回数（初回エンキュー時は 0）
    pub attempt: u32,
}

impl DispatchJob {
    pub fn new(rule_id: RuleId, event: ChangeEvent) -> Self {
        Self {
            rule_id,
            event,
            attempt: 0,
        }
    }

    /// 再試行回数を 1 増やした新しいジョブを返す
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_event() -> ChangeEvent {
        ChangeEvent::new(
            RecordType::new("order").unwrap(),
            RecordKey::new("42").unwrap(),
            EventKind::Created,
            serde_json::json!({"id": 42, "total": 1200}),
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
    }

    #[test]
    fn test_イベントはjsonを往復できる() {
        let event = make_event();

        let json = serde_json::to_string(&event).unwrap();
        let restored: ChangeEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, event);
    }

    #[test]
    fn test_イベント種別はsnake_caseでシリアライズされる() {
        let json = serde_json::to_value(make_event()).unwrap();

        assert_eq!(json["kind"], "created");
    }

    #[test]
    fn test_next_attempt_は再試行回数を増やす() {
        let job = DispatchJob::new(RuleId::new(), make_event());
        assert_eq!(job.attempt, 0);

        let retried = job.next_attempt().next_attempt();
        assert_eq!(retried.attempt, 2);
    }
}
