//! # テスト用モックリポジトリ
//!
//! ユースケーステストで使用するインメモリモック実装。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! notiflow-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use notiflow_domain::{
    event::{DispatchJob, RecordKey},
    notification::{EmailMessage, MessageTemplate, NotificationError},
    rule::{EventKind, NotificationRule, RecordType, RuleId, TemplateSlug},
    user::User,
};
use uuid::Uuid;

use crate::{
    error::InfraError,
    notification::NotificationSender,
    queue::DispatchQueue,
    repository::{
        MessageTemplateRepository,
        NotificationLog,
        NotificationLogRepository,
        NotificationRuleRepository,
        RecordSnapshotRepository,
        SentMarkerRepository,
        UserDirectory,
    },
};

// ===== MockNotificationRuleRepository =====

#[derive(Clone, Default)]
pub struct MockNotificationRuleRepository {
    rules: Arc<Mutex<Vec<NotificationRule>>>,
}

impl MockNotificationRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_rule(&self, rule: NotificationRule) {
        self.rules.lock().unwrap().push(rule);
    }
}

#[async_trait]
impl NotificationRuleRepository for MockNotificationRuleRepository {
    async fn find_active(
        &self,
        record_type: &RecordType,
        event_kind: EventKind,
    ) -> Result<Vec<NotificationRule>, InfraError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                r.record_type() == record_type && r.event_kind() == event_kind && r.is_active()
            })
            .cloned()
            .collect())
    }

    async fn find_active_by_id(
        &self,
        id: &RuleId,
    ) -> Result<Option<NotificationRule>, InfraError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id && r.is_active())
            .cloned())
    }

    async fn find_all_active(&self) -> Result<Vec<NotificationRule>, InfraError> {
        Ok(self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_active())
            .cloned()
            .collect())
    }
}

// ===== MockRecordSnapshotRepository =====

#[derive(Clone, Default)]
pub struct MockRecordSnapshotRepository {
    snapshots: Arc<Mutex<HashMap<(String, String), serde_json::Value>>>,
}

impl MockRecordSnapshotRepository {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// テスト準備用: スナップショットを直接投入する
    pub fn set_snapshot(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
        payload: serde_json::Value,
    ) {
        self.snapshots.lock().unwrap().insert(
            (
                record_type.as_str().to_string(),
                record_key.as_str().to_string(),
            ),
            payload,
        );
    }

    /// テスト検証用: 保持しているスナップショットを取得する
    pub fn snapshot(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Option<serde_json::Value> {
        self.snapshots
            .lock()
            .unwrap()
            .get(&(
                record_type.as_str().to_string(),
                record_key.as_str().to_string(),
            ))
            .cloned()
    }
}

#[async_trait]
impl RecordSnapshotRepository for MockRecordSnapshotRepository {
    async fn find(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<Option<serde_json::Value>, InfraError> {
        Ok(self.snapshot(record_type, record_key))
    }

    async fn upsert(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
        payload: &serde_json::Value,
    ) -> Result<(), InfraError> {
        self.set_snapshot(record_type, record_key, payload.clone());
        Ok(())
    }

    async fn remove(
        &self,
        record_type: &RecordType,
        record_key: &RecordKey,
    ) -> Result<(), InfraError> {
        self.snapshots.lock().unwrap().remove(&(
            record_type.as_str().to_string(),
            record_key.as_str().to_string(),
        ));
        Ok(())
    }
}

// ===== MockSentMarkerRepository =====

/// インメモリ実装の送信済みマーカー
///
/// `Mutex` 内の `HashSet::insert` が Postgres の
/// `INSERT … ON CONFLICT DO NOTHING` と同じ check-and-set 意味論を持つ。
#[derive(Clone, Default)]
pub struct MockSentMarkerRepository {
    markers: Arc<Mutex<HashSet<(Uuid, String)>>>,
}

impl MockSentMarkerRepository {
    pub fn new() -> Self {
        Self {
            markers: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// テスト検証用: 記録済みマーカーの件数を返す
    pub fn marker_count(&self) -> usize {
        self.markers.lock().unwrap().len()
    }
}

#[async_trait]
impl SentMarkerRepository for MockSentMarkerRepository {
    async fn try_mark(
        &self,
        rule_id: &RuleId,
        record_key: &RecordKey,
    ) -> Result<bool, InfraError> {
        Ok(self
            .markers
            .lock()
            .unwrap()
            .insert((*rule_id.as_uuid(), record_key.as_str().to_string())))
    }

    async fn is_sent(
        &self,
        rule_id: &RuleId,
        record_key: &RecordKey,
    ) -> Result<bool, InfraError> {
        Ok(self
            .markers
            .lock()
            .unwrap()
            .contains(&(*rule_id.as_uuid(), record_key.as_str().to_string())))
    }

    async fn unmark(&self, rule_id: &RuleId, record_key: &RecordKey) -> Result<(), InfraError> {
        self.markers
            .lock()
            .unwrap()
            .remove(&(*rule_id.as_uuid(), record_key.as_str().to_string()));
        Ok(())
    }
}

// ===== MockMessageTemplateRepository =====

#[derive(Clone, Default)]
pub struct MockMessageTemplateRepository {
    templates: Arc<Mutex<Vec<MessageTemplate>>>,
}

impl MockMessageTemplateRepository {
    pub fn new() -> Self {
        Self {
            templates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_template(&self, template: MessageTemplate) {
        self.templates.lock().unwrap().push(template);
    }
}

#[async_trait]
impl MessageTemplateRepository for MockMessageTemplateRepository {
    async fn find_by_slug(
        &self,
        slug: &TemplateSlug,
    ) -> Result<Option<MessageTemplate>, InfraError> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| &t.slug == slug)
            .cloned())
    }
}

// ===== MockNotificationLogRepository =====

#[derive(Clone, Default)]
pub struct MockNotificationLogRepository {
    logs: Arc<Mutex<Vec<NotificationLog>>>,
}

impl MockNotificationLogRepository {
    pub fn new() -> Self {
        Self {
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// テスト検証用: 記録されたログを取得する
    pub fn logs(&self) -> Vec<NotificationLog> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationLogRepository for MockNotificationLogRepository {
    async fn insert(&self, log: &NotificationLog) -> Result<(), InfraError> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

// ===== MockUserDirectory =====

#[derive(Clone, Default)]
pub struct MockUserDirectory {
    users: Arc<Mutex<Vec<User>>>,
}

impl MockUserDirectory {
    pub fn new() -> Self {
        Self {
            users: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }
}

#[async_trait]
impl UserDirectory for MockUserDirectory {
    async fn find_notifiable(&self) -> Result<Vec<User>, InfraError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.is_notifiable())
            .cloned()
            .collect())
    }
}

// ===== MockNotificationSender =====

/// テスト用のモック NotificationSender
///
/// 送信されたメッセージを記録する。`failing()` で構築すると
/// すべての送信が `SendFailed` になり、失敗パスを検証できる。
#[derive(Clone, Default)]
pub struct MockNotificationSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    fail: bool,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// 常に送信失敗するインスタンスを作成
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// テスト検証用: 送信されたメッセージを取得する
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        if self.fail {
            return Err(NotificationError::SendFailed(
                "モック送信失敗".to_string(),
            ));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// ===== MockDispatchQueue =====

/// テスト用のモック DispatchQueue
///
/// エンキューされたジョブと遅延秒数を FIFO で記録する。
/// `pop_due` は遅延に関係なく先頭から取り出す（時間経過はテストが制御する）。
#[derive(Clone, Default)]
pub struct MockDispatchQueue {
    entries: Arc<Mutex<Vec<(DispatchJob, u64)>>>,
}

impl MockDispatchQueue {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// テスト検証用: エンキューされた (ジョブ, 遅延秒数) を取得する
    pub fn enqueued(&self) -> Vec<(DispatchJob, u64)> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DispatchQueue for MockDispatchQueue {
    async fn enqueue(&self, job: &DispatchJob, delay_secs: u64) -> Result<(), InfraError> {
        self.entries.lock().unwrap().push((job.clone(), delay_secs));
        Ok(())
    }

    async fn pop_due(&self) -> Result<Option<DispatchJob>, InfraError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(entries.remove(0).0))
    }
}
