//! # フックレジストリ
//!
//! (レコード種別, イベント種別) → 登録ルールの明示的なオブザーバーテーブル。
//!
//! ## 設計方針
//!
//! - **起動時に構築**: アクティブなルール全件から構築し、イベント受信時の
//!   ファストパスとして参照する
//! - **無効化は即時反映**: ルール本体はイベントごとに再取得するため、
//!   レジストリが古くても無効化済みルールが送信されることはない
//!   （レジストリは「登録が一つも無い種別を早期に弾く」ためだけに使う）

use std::collections::HashMap;

use notiflow_domain::rule::{EventKind, NotificationRule, RecordType};

/// フックレジストリ
///
/// (レコード種別, イベント種別) ごとの登録ルール数を保持する。
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<(RecordType, EventKind), usize>,
}

impl HookRegistry {
    /// アクティブなルール一覧からレジストリを構築する
    pub fn build(rules: &[NotificationRule]) -> Self {
        let mut hooks: HashMap<(RecordType, EventKind), usize> = HashMap::new();
        for rule in rules {
            *hooks
                .entry((rule.record_type().clone(), rule.event_kind()))
                .or_insert(0) += 1;
        }
        Self { hooks }
    }

    /// (レコード種別, イベント種別) にフックが登録されているか判定する
    pub fn is_registered(&self, record_type: &RecordType, event_kind: EventKind) -> bool {
        self.hooks
            .contains_key(&(record_type.clone(), event_kind))
    }

    /// 登録されている (レコード種別, イベント種別) の組数を返す
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// 登録が一つも無い場合に true を返す
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use notiflow_domain::rule::{RuleId, TemplateSlug};
    use pretty_assertions::assert_eq;

    use super::*;

    fn make_rule(record_type: &str, event_kind: EventKind) -> NotificationRule {
        let now: DateTime<Utc> = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        NotificationRule::new(
            RuleId::new(),
            RecordType::new(record_type).unwrap(),
            event_kind,
            None,
            Some("{{ users }}".to_string()),
            TemplateSlug::new("generic").unwrap(),
            -1,
            now,
        )
    }

    #[test]
    fn test_登録済みの組はis_registeredがtrueを返す() {
        let rules = vec![
            make_rule("order", EventKind::Created),
            make_rule("order", EventKind::Created),
            make_rule("customer", EventKind::Deleted),
        ];
        let registry = HookRegistry::build(&rules);

        assert!(registry.is_registered(&RecordType::new("order").unwrap(), EventKind::Created));
        assert!(registry.is_registered(&RecordType::new("customer").unwrap(), EventKind::Deleted));
        // 同一の組は 1 エントリに集約される
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_未登録の組はis_registeredがfalseを返す() {
        let rules = vec![make_rule("order", EventKind::Created)];
        let registry = HookRegistry::build(&rules);

        assert!(!registry.is_registered(&RecordType::new("order").unwrap(), EventKind::Updated));
        assert!(!registry.is_registered(&RecordType::new("invoice").unwrap(), EventKind::Created));
    }

    #[test]
    fn test_空のルール一覧からは空のレジストリができる() {
        let registry = HookRegistry::build(&[]);
        assert!(registry.is_empty());
    }
}
