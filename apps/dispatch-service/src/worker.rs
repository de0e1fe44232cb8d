//! # 遅延ディスパッチワーカー
//!
//! 遅延キューをポーリングし、期限を過ぎたジョブをディスパッチャに
//! 再投入するバックグラウンドループ。
//!
//! ## 設計方針
//!
//! - **リトライはワーカーの責務**: 再実行が失敗したジョブは固定遅延で
//!   再エンキューし、`SEND_RETRY` 回を超えたら破棄する（dispatcher は
//!   リトライを関知しない）
//! - **1 件ずつ処理**: `tick` が 1 ジョブを処理し、キューが空なら
//!   ポーリング間隔だけ待機する

use std::{sync::Arc, time::Duration};

use notiflow_infra::queue::DispatchQueue;
use notiflow_shared::{event_log::event, log_business_event};

use crate::{error::ServiceError, usecase::NotificationDispatcher};

/// 遅延ディスパッチワーカー
pub struct DeferredWorker {
    dispatcher: Arc<NotificationDispatcher>,
    queue: Arc<dyn DispatchQueue>,
    max_retries: u32,
    retry_delay_secs: u64,
    poll_interval: Duration,
}

impl DeferredWorker {
    pub fn new(
        dispatcher: Arc<NotificationDispatcher>,
        queue: Arc<dyn DispatchQueue>,
        max_retries: u32,
        retry_delay_secs: u64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            queue,
            max_retries,
            retry_delay_secs,
            poll_interval,
        }
    }

    /// ワーカーループを実行する（終了しない）
    pub async fn run(self) {
        tracing::info!("遅延ディスパッチワーカーを起動しました");
        loop {
            match self.tick().await {
                // ジョブを処理した: すぐ次を見る
                Ok(true) => {}
                // キューが空: ポーリング間隔だけ待つ
                Ok(false) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    tracing::error!(error = %e, "遅延キューの処理に失敗");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// 期限を過ぎたジョブを 1 件処理する
    ///
    /// ジョブを処理した場合は `Ok(true)`、キューが空（または先頭が期限前）の
    /// 場合は `Ok(false)` を返す。ジョブの失敗はリトライ・破棄で吸収し、
    /// `Err` はキュー自体の障害のみ。
    pub async fn tick(&self) -> Result<bool, ServiceError> {
        let Some(job) = self.queue.pop_due().await? else {
            return Ok(false);
        };

        if let Err(e) = self.dispatcher.run_deferred(&job).await {
            if job.attempt < self.max_retries {
                tracing::warn!(
                    error = %e,
                    rule_id = %job.rule_id,
                    attempt = job.attempt,
                    "遅延ディスパッチに失敗。再試行をスケジュール"
                );
                let retried = job.next_attempt();
                self.queue.enqueue(&retried, self.retry_delay_secs).await?;
            } else {
                log_business_event!(
                    event.category = event::category::DISPATCH,
                    event.action = event::action::JOB_DROPPED,
                    event.entity_type = event::entity_type::DISPATCH_JOB,
                    event.result = event::result::FAILURE,
                    notification.rule_id = %job.rule_id,
                    notification.record_key = %job.event.record_key,
                    error = %e,
                    "再試行上限を超えたため遅延ジョブを破棄"
                );
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use notiflow_domain::{
        clock::FixedClock,
        event::{ChangeEvent, DispatchJob, RecordKey},
        notification::MessageTemplate,
        rule::{EventKind, GroupSlug, NotificationRule, RecordType, RuleId, TemplateSlug},
    };
    use notiflow_infra::mock::{
        MockDispatchQueue,
        MockMessageTemplateRepository,
        MockNotificationLogRepository,
        MockNotificationRuleRepository,
        MockNotificationSender,
        MockRecordSnapshotRepository,
        MockSentMarkerRepository,
        MockUserDirectory,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::usecase::{DispatcherDeps, HookRegistry};

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn make_rule() -> NotificationRule {
        NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            Some(GroupSlug::new("sales").unwrap()),
            None,
            TemplateSlug::new("generic").unwrap(),
            300,
            fixed_now(),
        )
    }

    fn make_job(rule: &NotificationRule) -> DispatchJob {
        DispatchJob::new(
            rule.id().clone(),
            ChangeEvent::new(
                RecordType::new("order").unwrap(),
                RecordKey::new("42").unwrap(),
                EventKind::Created,
                serde_json::json!({"id": 42}),
                fixed_now(),
            ),
        )
    }

    fn make_worker(
        rule: &NotificationRule,
        sender: MockNotificationSender,
        queue: MockDispatchQueue,
        max_retries: u32,
    ) -> DeferredWorker {
        let rule_repo = MockNotificationRuleRepository::new();
        rule_repo.add_rule(rule.clone());

        let template_repo = MockMessageTemplateRepository::new();
        template_repo.add_template(MessageTemplate {
            slug:      TemplateSlug::new("generic").unwrap(),
            subject:   "[NotiFlow] {{ record_key }}".to_string(),
            html_body: "<p>{{ record_key }}</p>".to_string(),
            text_body: "{{ record_key }}".to_string(),
        });

        let deps = DispatcherDeps {
            rule_repo: Arc::new(rule_repo),
            snapshot_repo: Arc::new(MockRecordSnapshotRepository::new()),
            marker_repo: Arc::new(MockSentMarkerRepository::new()),
            template_repo: Arc::new(template_repo),
            log_repo: Arc::new(MockNotificationLogRepository::new()),
            user_directory: Arc::new(MockUserDirectory::new()),
            sender: Arc::new(sender),
            queue: Arc::new(queue.clone()),
            clock: Arc::new(FixedClock::new(fixed_now())),
        };
        let dispatcher = NotificationDispatcher::new(deps, HookRegistry::build(&[]), false);

        DeferredWorker::new(
            Arc::new(dispatcher),
            Arc::new(queue),
            max_retries,
            60,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_キューが空ならfalseを返す() {
        let rule = make_rule();
        let worker = make_worker(
            &rule,
            MockNotificationSender::new(),
            MockDispatchQueue::new(),
            3,
        );

        let processed = worker.tick().await.unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn test_期限到来ジョブを処理して送信する() {
        let rule = make_rule();
        let sender = MockNotificationSender::new();
        let queue = MockDispatchQueue::new();
        queue.enqueue(&make_job(&rule), 0).await.unwrap();

        let worker = make_worker(&rule, sender.clone(), queue.clone(), 3);

        let processed = worker.tick().await.unwrap();
        assert!(processed);
        assert_eq!(sender.sent_emails().len(), 1);
        assert!(queue.enqueued().is_empty());
    }

    #[tokio::test]
    async fn test_失敗したジョブは固定遅延で再エンキューされる() {
        let rule = make_rule();
        let queue = MockDispatchQueue::new();
        queue.enqueue(&make_job(&rule), 0).await.unwrap();

        let worker = make_worker(&rule, MockNotificationSender::failing(), queue.clone(), 3);

        worker.tick().await.unwrap();

        let enqueued = queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        // 再試行回数が増え、固定遅延でスケジュールされる
        assert_eq!(enqueued[0].0.attempt, 1);
        assert_eq!(enqueued[0].1, 60);
    }

    #[tokio::test]
    async fn test_再試行上限を超えたジョブは破棄される() {
        let rule = make_rule();
        let queue = MockDispatchQueue::new();
        // attempt == max_retries のジョブは再エンキューされない
        let exhausted = make_job(&rule).next_attempt().next_attempt().next_attempt();
        queue.enqueue(&exhausted, 0).await.unwrap();

        let worker = make_worker(&rule, MockNotificationSender::failing(), queue.clone(), 3);

        worker.tick().await.unwrap();

        assert!(queue.enqueued().is_empty());
    }
}
