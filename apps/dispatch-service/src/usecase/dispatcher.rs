//! # 通知ディスパッチャ
//!
//! レコード変更イベントに反応し、ルール解決 → 受信者計算 →
//! 即時送信または遅延スケジュールを行う中核ユースケース。
//!
//! ## 設計方針
//!
//! - **依存性注入**: リポジトリ・キュー・送信器は trait で抽象化し、
//!   `Arc<dyn Trait>` で外部から注入する
//! - **ルール単位の失敗隔離**: `handle` は 1 ルールの失敗で残りを止めない。
//!   失敗は件数としてサマリに載せ、詳細はログに残す
//! - **冪等性はマーカーが担保**: 送信前に原子的 check-and-set を行い、
//!   同一 (ルール, レコードキー) への二重送信を抑止する。送信失敗時は
//!   マーカーを解放し、外部リトライに再送の余地を残す
//! - **欠損は縮退**: 直前スナップショットが無い場合はコンテキストを
//!   縮退させて続行する。遅延再実行でルールが消えていた場合は静かにスキップ

use std::sync::Arc;

use notiflow_domain::{
    clock::Clock,
    event::{ChangeEvent, DispatchJob, RecordKey},
    notification::{NotificationLogId, RecipientList},
    rule::{EventKind, NotificationRule, RuleId},
    user::User,
};
use notiflow_infra::{
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
use notiflow_shared::{event_log::event, log_business_event};

use super::{DispatchContext, HookRegistry, TemplateRenderer};
use crate::error::ServiceError;

/// ディスパッチャの依存コンポーネント
pub struct DispatcherDeps {
    pub rule_repo: Arc<dyn NotificationRuleRepository>,
    pub snapshot_repo: Arc<dyn RecordSnapshotRepository>,
    pub marker_repo: Arc<dyn SentMarkerRepository>,
    pub template_repo: Arc<dyn MessageTemplateRepository>,
    pub log_repo: Arc<dyn NotificationLogRepository>,
    pub user_directory: Arc<dyn UserDirectory>,
    pub sender: Arc<dyn NotificationSender>,
    pub queue: Arc<dyn DispatchQueue>,
    pub clock: Arc<dyn Clock>,
}

/// 1 イベントの処理結果サマリ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// 即時送信したルール数
    pub sent:     usize,
    /// 遅延スケジュールしたルール数
    pub deferred: usize,
    /// スキップしたルール数（受信者なし・送信済み）
    pub skipped:  usize,
    /// 失敗したルール数
    pub failed:   usize,
}

/// 1 ルールの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 送信した
    Sent,
    /// 遅延キューにスケジュールした
    Deferred,
    /// スキップした（受信者なし・送信済み・ルール欠損）
    Skipped,
}

/// 通知ディスパッチャ
///
/// レコード変更イベント 1 件を受け取り、一致するアクティブなルールごとに
/// 即時送信または遅延スケジュールを行う。
pub struct NotificationDispatcher {
    deps: DispatcherDeps,
    registry: HookRegistry,
    renderer: TemplateRenderer,
    notify_users: bool,
}

impl NotificationDispatcher {
    pub fn new(deps: DispatcherDeps, registry: HookRegistry, notify_users: bool) -> Self {
        Self {
            deps,
            registry,
            renderer: TemplateRenderer::new(),
            notify_users,
        }
    }

    /// レコード変更イベントを処理する
    ///
    /// フックレジストリを確認し、一致するアクティブなルールごとに
    /// `process` を実行する。ルール単位の失敗はサマリに計上して続行する。
    /// 最後にスナップショットストアを保守する（upsert / 削除イベントでは
    /// remove）。
    #[tracing::instrument(skip_all, fields(record_type = %event.record_type, event_kind = %event.kind))]
    pub async fn handle(&self, event: ChangeEvent) -> Result<DispatchSummary, ServiceError> {
        if !self.registry.is_registered(&event.record_type, event.kind) {
            tracing::debug!("フック未登録のためスキップ");
            return Ok(DispatchSummary::default());
        }

        let rules = self
            .deps
            .rule_repo
            .find_active(&event.record_type, event.kind)
            .await?;
        let ctx = self.build_initial_context(event).await?;

        let mut summary = DispatchSummary::default();
        for rule in &rules {
            match self.process(rule, &ctx).await {
                Ok(DispatchOutcome::Sent) => summary.sent += 1,
                Ok(DispatchOutcome::Deferred) => summary.deferred += 1,
                Ok(DispatchOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    // ルール単位で失敗を隔離し、残りのルールは処理を続ける
                    tracing::error!(
                        error = %e,
                        rule_id = %rule.id(),
                        "ルールのディスパッチに失敗"
                    );
                    summary.failed += 1;
                }
            }
        }

        self.store_snapshot(&ctx.event).await?;

        Ok(summary)
    }

    /// 遅延ディスパッチジョブを再実行する
    ///
    /// ルールをアクティブ条件付きで再取得し（欠損・無効化済みは静かに
    /// スキップ）、再実行時点のスナップショットをコンテキストに載せて
    /// `dispatch` する。エラーはワーカーのリトライに委ねるため伝播する。
    #[tracing::instrument(skip_all, fields(rule_id = %job.rule_id, attempt = job.attempt))]
    pub async fn run_deferred(&self, job: &DispatchJob) -> Result<DispatchOutcome, ServiceError> {
        let Some(rule) = self.deps.rule_repo.find_active_by_id(&job.rule_id).await? else {
            // ルールが削除・無効化済み: 静かにスキップ
            tracing::debug!("ルールが見つからないため遅延ディスパッチをスキップ");
            return Ok(DispatchOutcome::Skipped);
        };

        let current_instance = self
            .deps
            .snapshot_repo
            .find(&job.event.record_type, &job.event.record_key)
            .await?;
        let users = self.eligible_users().await?;
        let ctx = DispatchContext::reentry(
            job.event.clone(),
            current_instance,
            users,
            self.deps.clock.now(),
            job.rule_id.clone(),
        );

        self.dispatch(&rule, &ctx).await
    }

    /// 1 ルールを処理する
    ///
    /// interval が 0 以上かつ遅延再実行でなければ遅延キューにスケジュールし、
    /// それ以外は即時に `dispatch` する。
    async fn process(
        &self,
        rule: &NotificationRule,
        ctx: &DispatchContext,
    ) -> Result<DispatchOutcome, ServiceError> {
        if let Some(delay_secs) = rule.send_after()
            && !ctx.is_deferred_reentry()
        {
            let job = DispatchJob::new(rule.id().clone(), ctx.event.clone());
            self.deps.queue.enqueue(&job, delay_secs).await?;

            log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_DEFERRED,
                event.entity_type = event::entity_type::DISPATCH_JOB,
                event.result = event::result::SUCCESS,
                notification.rule_id = %rule.id(),
                notification.record_key = %ctx.event.record_key,
                notification.delay_secs = delay_secs,
                "通知を遅延ディスパッチにスケジュール"
            );
            return Ok(DispatchOutcome::Deferred);
        }

        self.dispatch(rule, ctx).await
    }

    /// 受信者を解決し、未送信ならメールを送信してマーカーを記録する
    ///
    /// 冪等: 同一 (ルール, レコードキー) に対する再呼び出しは no-op になる。
    async fn dispatch(
        &self,
        rule: &NotificationRule,
        ctx: &DispatchContext,
    ) -> Result<DispatchOutcome, ServiceError> {
        let template_context = ctx.to_template_context();

        let recipients = match rule.group() {
            Some(group) => RecipientList::from_group(group),
            None => match rule.recipient_template() {
                Some(src) => self.renderer.render_recipients(src, &template_context)?,
                None => RecipientList::empty(),
            },
        };

        if recipients.is_empty() {
            tracing::debug!(rule_id = %rule.id(), "受信者が空のためスキップ");
            return Ok(DispatchOutcome::Skipped);
        }

        // 原子的 check-and-set。敗者は送信済みとして no-op
        if !self
            .deps
            .marker_repo
            .try_mark(rule.id(), &ctx.event.record_key)
            .await?
        {
            tracing::debug!(
                rule_id = %rule.id(),
                record_key = %ctx.event.record_key,
                "送信済みのためスキップ"
            );
            return Ok(DispatchOutcome::Skipped);
        }

        match self.send(rule, ctx, recipients, &template_context).await {
            Ok(()) => Ok(DispatchOutcome::Sent),
            Err(e) => {
                // マーカーを解放し、外部リトライに再送の余地を残す
                self.release_marker(rule.id(), &ctx.event.record_key).await;
                Err(e)
            }
        }
    }

    /// メールテンプレートの取得・レンダリング・送信・ログ記録を行う
    async fn send(
        &self,
        rule: &NotificationRule,
        ctx: &DispatchContext,
        recipients: RecipientList,
        template_context: &tera::Context,
    ) -> Result<(), ServiceError> {
        let template = self
            .deps
            .template_repo
            .find_by_slug(rule.template_slug())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "メールテンプレートが見つかりません: {}",
                    rule.template_slug()
                ))
            })?;

        let email = self
            .renderer
            .render_message(&template, recipients.clone(), template_context)?;
        let subject = email.subject.clone();

        match self.deps.sender.send_email(&email).await {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.entity_type = event::entity_type::NOTIFICATION_LOG,
                    event.result = event::result::SUCCESS,
                    notification.rule_id = %rule.id(),
                    notification.record_key = %ctx.event.record_key,
                    notification.recipients = %recipients,
                    "通知メール送信成功"
                );
                self.insert_log(rule, ctx, recipients, subject, "sent", None)
                    .await;
                Ok(())
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.entity_type = event::entity_type::NOTIFICATION_LOG,
                    event.result = event::result::FAILURE,
                    notification.rule_id = %rule.id(),
                    notification.record_key = %ctx.event.record_key,
                    notification.recipients = %recipients,
                    error = %e,
                    "通知メール送信失敗"
                );
                self.insert_log(rule, ctx, recipients, subject, "failed", Some(e.to_string()))
                    .await;
                Err(e.into())
            }
        }
    }

    /// イベント受信時のコンテキストを構築する
    ///
    /// 直前スナップショットの欠損は正常系（作成イベント等）として
    /// `None` のまま進める。
    async fn build_initial_context(
        &self,
        event: ChangeEvent,
    ) -> Result<DispatchContext, ServiceError> {
        let old_instance = self
            .deps
            .snapshot_repo
            .find(&event.record_type, &event.record_key)
            .await?;
        let users = self.eligible_users().await?;

        Ok(DispatchContext::initial(
            event,
            old_instance,
            users,
            self.deps.clock.now(),
        ))
    }

    /// 通知適格ユーザーを取得する（`NOTIFY_USERS` 無効時は空）
    async fn eligible_users(&self) -> Result<Vec<User>, ServiceError> {
        if !self.notify_users {
            return Ok(Vec::new());
        }
        Ok(self.deps.user_directory.find_notifiable().await?)
    }

    /// スナップショットストアを保守する
    ///
    /// 次のイベントが `old_instance` として今回のペイロードを参照できるよう
    /// upsert する。削除イベントでは行を消す。
    async fn store_snapshot(&self, event: &ChangeEvent) -> Result<(), ServiceError> {
        match event.kind {
            EventKind::Deleted => {
                self.deps
                    .snapshot_repo
                    .remove(&event.record_type, &event.record_key)
                    .await?;
            }
            EventKind::Created | EventKind::Updated => {
                self.deps
                    .snapshot_repo
                    .upsert(&event.record_type, &event.record_key, &event.payload)
                    .await?;
            }
        }
        Ok(())
    }

    /// 送信済みマーカーを解放する（ベストエフォート）
    async fn release_marker(&self, rule_id: &RuleId, record_key: &RecordKey) {
        if let Err(e) = self.deps.marker_repo.unmark(rule_id, record_key).await {
            tracing::error!(
                error = %e,
                rule_id = %rule_id,
                record_key = %record_key,
                "送信済みマーカーの解放に失敗"
            );
        }
    }

    /// 通知ログを記録する（fire-and-forget）
    async fn insert_log(
        &self,
        rule: &NotificationRule,
        ctx: &DispatchContext,
        recipients: RecipientList,
        subject: String,
        status: &str,
        error_message: Option<String>,
    ) {
        let log = NotificationLog {
            id: NotificationLogId::new(),
            rule_id: rule.id().clone(),
            record_type: ctx.event.record_type.clone(),
            record_key: ctx.event.record_key.clone(),
            event_kind: ctx.event.kind,
            recipients,
            subject,
            status: status.to_string(),
            error_message,
            sent_at: self.deps.clock.now(),
        };

        if let Err(e) = self.deps.log_repo.insert(&log).await {
            tracing::error!(error = %e, "通知ログの記録に失敗");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use notiflow_domain::{
        clock::FixedClock,
        notification::MessageTemplate,
        rule::{GroupSlug, RecordType, TemplateSlug},
        user::{Email, UserId, UserName},
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

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    /// テスト用の依存一式とディスパッチャ
    struct TestHarness {
        dispatcher: NotificationDispatcher,
        snapshot_repo: MockRecordSnapshotRepository,
        marker_repo: MockSentMarkerRepository,
        log_repo: MockNotificationLogRepository,
        sender: MockNotificationSender,
        queue: MockDispatchQueue,
    }

    fn make_harness(
        rules: Vec<NotificationRule>,
        sender: MockNotificationSender,
        notify_users: bool,
    ) -> TestHarness {
        let rule_repo = MockNotificationRuleRepository::new();
        for rule in &rules {
            rule_repo.add_rule(rule.clone());
        }
        let registry = HookRegistry::build(&rules);

        let snapshot_repo = MockRecordSnapshotRepository::new();
        let marker_repo = MockSentMarkerRepository::new();
        let log_repo = MockNotificationLogRepository::new();
        let queue = MockDispatchQueue::new();

        let template_repo = MockMessageTemplateRepository::new();
        template_repo.add_template(MessageTemplate {
            slug:      TemplateSlug::new("generic").unwrap(),
            subject:   "[NotiFlow] {{ event_kind }}: {{ record_key }}".to_string(),
            html_body: "<p>レコード {{ record_key }} が変更されました</p>".to_string(),
            text_body: "レコード {{ record_key }} が変更されました".to_string(),
        });

        let user_directory = MockUserDirectory::new();
        user_directory.add_user(User::new(
            UserId::new(),
            Email::new("tanaka@example.com").unwrap(),
            UserName::new("田中太郎").unwrap(),
            fixed_now(),
        ));
        user_directory.add_user(User::new(
            UserId::new(),
            Email::new("suzuki@example.com").unwrap(),
            UserName::new("鈴木一郎").unwrap(),
            fixed_now(),
        ));

        let deps = DispatcherDeps {
            rule_repo: Arc::new(rule_repo),
            snapshot_repo: Arc::new(snapshot_repo.clone()),
            marker_repo: Arc::new(marker_repo.clone()),
            template_repo: Arc::new(template_repo),
            log_repo: Arc::new(log_repo.clone()),
            user_directory: Arc::new(user_directory),
            sender: Arc::new(sender.clone()),
            queue: Arc::new(queue.clone()),
            clock: Arc::new(FixedClock::new(fixed_now())),
        };

        TestHarness {
            dispatcher: NotificationDispatcher::new(deps, registry, notify_users),
            snapshot_repo,
            marker_repo,
            log_repo,
            sender,
            queue,
        }
    }

    fn make_event(kind: EventKind) -> ChangeEvent {
        ChangeEvent::new(
            RecordType::new("order").unwrap(),
            RecordKey::new("42").unwrap(),
            kind,
            serde_json::json!({"id": 42, "total": 1200}),
            fixed_now(),
        )
    }

    /// 固定グループ宛のルール
    fn group_rule(interval_secs: i64) -> NotificationRule {
        NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            Some(GroupSlug::new("sales").unwrap()),
            None,
            TemplateSlug::new("generic").unwrap(),
            interval_secs,
            fixed_now(),
        )
    }

    /// 受信者テンプレート付きのルール
    fn template_rule(interval_secs: i64, recipient_template: &str) -> NotificationRule {
        NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            None,
            Some(recipient_template.to_string()),
            TemplateSlug::new("generic").unwrap(),
            interval_secs,
            fixed_now(),
        )
    }

    // ===== process の分岐（interval の符号） =====

    #[tokio::test]
    async fn test_interval負のルールは即時送信しスケジュールしない() {
        let harness = make_harness(vec![group_rule(-1)], MockNotificationSender::new(), false);

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);
        assert_eq!(summary.deferred, 0);
        assert!(harness.queue.enqueued().is_empty());

        let sent = harness.sender.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.as_str(), "sales");
    }

    #[tokio::test]
    async fn test_interval非負のルールはスケジュールし即時送信しない() {
        let harness = make_harness(
            vec![template_rule(300, "{{ users }}")],
            MockNotificationSender::new(),
            true,
        );

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.sent, 0);
        assert!(harness.sender.sent_emails().is_empty());

        let enqueued = harness.queue.enqueued();
        assert_eq!(enqueued.len(), 1);
        assert_eq!(enqueued[0].1, 300);
    }

    #[tokio::test]
    async fn test_interval0のルールは0秒遅延でスケジュールされる() {
        let harness = make_harness(
            vec![template_rule(0, "{{ users }}")],
            MockNotificationSender::new(),
            true,
        );

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.deferred, 1);
        let enqueued = harness.queue.enqueued();
        assert_eq!(enqueued[0].1, 0);
    }

    // ===== 遅延再実行 =====

    #[tokio::test]
    async fn test_遅延実行はレンダリング済みユーザーリストに一度だけ送信する() {
        let harness = make_harness(
            vec![template_rule(0, "{{ users }}")],
            MockNotificationSender::new(),
            true,
        );

        harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        let job = harness.queue.pop_due().await.unwrap().unwrap();

        // 再実行: 送信される
        let outcome = harness.dispatcher.run_deferred(&job).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Sent);

        let sent = harness.sender.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].to.as_str(),
            "tanaka@example.com,suzuki@example.com"
        );

        // 二度目の再実行（キューの重複配送を想定）: マーカーにより no-op
        let outcome = harness.dispatcher.run_deferred(&job).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert_eq!(harness.sender.sent_emails().len(), 1);
    }

    #[tokio::test]
    async fn test_遅延実行でルールが無効化済みなら静かにスキップする() {
        // ルールをリポジトリに登録しないままジョブを再実行する
        let harness = make_harness(vec![], MockNotificationSender::new(), false);

        let job = DispatchJob::new(RuleId::new(), make_event(EventKind::Created));

        let outcome = harness.dispatcher.run_deferred(&job).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Skipped);
        assert!(harness.sender.sent_emails().is_empty());
    }

    #[tokio::test]
    async fn test_遅延実行時は再スケジュールせず送信する() {
        // interval 非負でも再実行コンテキストでは dispatch に進む
        let rule = group_rule(300);
        let harness = make_harness(vec![rule.clone()], MockNotificationSender::new(), false);

        let job = DispatchJob::new(rule.id().clone(), make_event(EventKind::Created));
        let outcome = harness.dispatcher.run_deferred(&job).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Sent);
        assert!(harness.queue.enqueued().is_empty());
    }

    // ===== 冪等性（送信は高々一度） =====

    #[tokio::test]
    async fn test_同一イベントの再処理は二重送信しない() {
        let rule = group_rule(-1);
        let harness = make_harness(vec![rule.clone()], MockNotificationSender::new(), false);

        let first = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();
        let second = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.sent, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(harness.sender.sent_emails().len(), 1);
        assert_eq!(harness.marker_repo.marker_count(), 1);
        assert!(
            harness
                .marker_repo
                .is_sent(rule.id(), &RecordKey::new("42").unwrap())
                .await
                .unwrap()
        );
    }

    // ===== 受信者解決 =====

    #[tokio::test]
    async fn test_受信者が空のルールはスキップされる() {
        // グループも受信者テンプレートも無いルール
        let rule = NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            None,
            None,
            TemplateSlug::new("generic").unwrap(),
            -1,
            fixed_now(),
        );
        let harness = make_harness(vec![rule], MockNotificationSender::new(), false);

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(harness.sender.sent_emails().is_empty());
        // 受信者なしはマーカーを記録しない
        assert_eq!(harness.marker_repo.marker_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_users無効時はusersテンプレートが空になる() {
        let harness = make_harness(
            vec![template_rule(-1, "{{ users }}")],
            MockNotificationSender::new(),
            false,
        );

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.skipped, 1);
        assert!(harness.sender.sent_emails().is_empty());
    }

    // ===== コンテキスト縮退（欠損レコードは非致命） =====

    #[tokio::test]
    async fn test_作成イベントはスナップショットなしで処理が進む() {
        let harness = make_harness(vec![group_rule(-1)], MockNotificationSender::new(), false);

        // 事前スナップショットなし（レコードは過去に存在しない）
        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.sent, 1);

        let logs = harness.log_repo.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "sent");
    }

    // ===== スナップショット保守 =====

    #[tokio::test]
    async fn test_処理後にスナップショットが保存される() {
        let harness = make_harness(vec![group_rule(-1)], MockNotificationSender::new(), false);

        harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        let record_type = RecordType::new("order").unwrap();
        let record_key = RecordKey::new("42").unwrap();
        assert_eq!(
            harness.snapshot_repo.snapshot(&record_type, &record_key),
            Some(serde_json::json!({"id": 42, "total": 1200}))
        );
    }

    #[tokio::test]
    async fn test_削除イベントはスナップショットを消す() {
        let rule = NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Deleted,
            Some(GroupSlug::new("sales").unwrap()),
            None,
            TemplateSlug::new("generic").unwrap(),
            -1,
            fixed_now(),
        );
        let harness = make_harness(vec![rule], MockNotificationSender::new(), false);

        let record_type = RecordType::new("order").unwrap();
        let record_key = RecordKey::new("42").unwrap();
        harness.snapshot_repo.set_snapshot(
            &record_type,
            &record_key,
            serde_json::json!({"id": 42}),
        );

        harness
            .dispatcher
            .handle(make_event(EventKind::Deleted))
            .await
            .unwrap();

        assert_eq!(
            harness.snapshot_repo.snapshot(&record_type, &record_key),
            None
        );
    }

    // ===== 失敗パス =====

    #[tokio::test]
    async fn test_送信失敗はマーカーを解放し失敗として計上される() {
        let harness = make_harness(vec![group_rule(-1)], MockNotificationSender::failing(), false);

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 0);
        // マーカーが解放され、リトライで再送できる
        assert_eq!(harness.marker_repo.marker_count(), 0);

        let logs = harness.log_repo.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "failed");
        assert!(logs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_テンプレート欠損は失敗として計上されマーカーを解放する() {
        let rule = NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            Some(GroupSlug::new("sales").unwrap()),
            None,
            TemplateSlug::new("missing-template").unwrap(),
            -1,
            fixed_now(),
        );
        let harness = make_harness(vec![rule], MockNotificationSender::new(), false);

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(harness.sender.sent_emails().is_empty());
        assert_eq!(harness.marker_repo.marker_count(), 0);
    }

    #[tokio::test]
    async fn test_1ルールの失敗は他のルールを止めない() {
        let failing_rule = NotificationRule::new(
            RuleId::new(),
            RecordType::new("order").unwrap(),
            EventKind::Created,
            Some(GroupSlug::new("sales").unwrap()),
            None,
            TemplateSlug::new("missing-template").unwrap(),
            -1,
            fixed_now(),
        );
        let harness = make_harness(
            vec![failing_rule, group_rule(-1)],
            MockNotificationSender::new(),
            false,
        );

        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Created))
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(harness.sender.sent_emails().len(), 1);
    }

    // ===== フックレジストリ =====

    #[tokio::test]
    async fn test_フック未登録のイベントは何もしない() {
        let harness = make_harness(vec![group_rule(-1)], MockNotificationSender::new(), false);

        // group_rule は Created のみ登録。Updated にはフックが無い
        let summary = harness
            .dispatcher
            .handle(make_event(EventKind::Updated))
            .await
            .unwrap();

        assert_eq!(summary, DispatchSummary::default());
        assert!(harness.sender.sent_emails().is_empty());
    }
}
