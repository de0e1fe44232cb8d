//! # ユーザー
//!
//! 通知対象ユーザーエンティティと関連する値オブジェクトを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 要件 |
//! |---|------------|------|
//! | [`User`] | ユーザー | ユーザーディレクトリのエントリ |
//! | [`UserStatus`] | ユーザー状態 | アクティブ / 非アクティブ |
//!
//! ## 設計方針
//!
//! - **Newtype パターン**: UserId は UUID をラップし、型安全性を確保
//! - **通知適格性はドメインの判定**: アクティブかつ非スタッフかつ
//!   非スーパーユーザーのみテンプレートの `users` 変数に含める

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

define_uuid_id! {
    /// ユーザー ID（一意識別子）
    ///
    /// UUID v7 を使用し、生成順にソート可能。
    pub struct UserId;
}

define_validated_string! {
    /// ユーザー名（値オブジェクト）
    pub struct UserName {
        label: "ユーザー名",
        max_length: 100,
    }
}

/// メールアドレス（値オブジェクト）
///
/// 生成時にバリデーションを実行し、不正な値の作成を防ぐ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    /// メールアドレスを作成する
    ///
    /// # バリデーション
    ///
    /// - 空文字列ではない
    /// - `local@domain` の形式であること
    /// - 最大 255 文字
    ///
    /// # エラー
    ///
    /// バリデーションに失敗した場合は `DomainError::Validation` を返す。
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };

        if local.is_empty() || domain.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    /// 文字列参照を取得する
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 所有権を持つ文字列に変換する
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserStatus {
    /// アクティブ（通知対象になり得る）
    Active,
    /// 非アクティブ（通知対象から除外）
    Inactive,
}

impl std::str::FromStr for UserStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            _ => Err(DomainError::Validation(format!(
                "不正なユーザーステータス: {}",
                s
            ))),
        }
    }
}

/// ユーザーエンティティ
///
/// ユーザーディレクトリの 1 エントリを表現する。
/// ディスパッチャは読み取りのみ行い、ユーザーの管理は別システムの責務。
///
/// # 不変条件
///
/// - スタッフまたはスーパーユーザーは一斉通知の対象にならない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    email: Email,
    name: UserName,
    status: UserStatus,
    is_staff: bool,
    is_superuser: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// 新しいユーザーを作成する
    ///
    /// # 不変条件
    ///
    /// - 作成時のステータスは `Active`、スタッフ・スーパーユーザーフラグは false
    pub fn new(id: UserId, email: Email, name: UserName, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            name,
            status: UserStatus::Active,
            is_staff: false,
            is_superuser: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// 既存のデータからユーザーを復元する（データベースから取得時）
    #[allow(clippy::too_many_arguments)]
    pub fn from_db(
        id: UserId,
        email: Email,
        name: UserName,
        status: UserStatus,
        is_staff: bool,
        is_superuser: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            name,
            status,
            is_staff,
            is_superuser,
            created_at,
            updated_at,
        }
    }

    // Getter メソッド

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // ビジネスロジックメソッド

    /// ユーザーがアクティブか判定する
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// 一斉通知の対象になるか判定する
    ///
    /// アクティブかつ非スタッフかつ非スーパーユーザーの場合に true を返す。
    pub fn is_notifiable(&self) -> bool {
        self.is_active() && !self.is_staff && !self.is_superuser
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    // フィクスチャ

    /// テスト用の固定タイムスタンプ
    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn active_user(now: DateTime<Utc>) -> User {
        User::new(
            UserId::new(),
            Email::new("user@example.com").unwrap(),
            UserName::new("田中太郎").unwrap(),
            now,
        )
    }

    // Email のテスト

    #[test]
    fn test_メールアドレスは正常な形式を受け入れる() {
        assert!(Email::new("user@example.com").is_ok());
    }

    #[rstest]
    #[case("", "空文字列")]
    #[case("no-at-sign", "@記号なし")]
    #[case("@example.com", "ローカル部分が空")]
    #[case("user@", "ドメイン部分が空")]
    #[case(&format!("{}@example.com", "a".repeat(256)), "255文字超過")]
    fn test_メールアドレスは不正な形式を拒否する(
        #[case] input: &str,
        #[case] _reason: &str,
    ) {
        assert!(Email::new(input).is_err());
    }

    // User のテスト

    #[rstest]
    fn test_新規ユーザーは通知対象(active_user: User) {
        assert!(active_user.is_notifiable());
    }

    #[rstest]
    fn test_スタッフは通知対象にならない(now: DateTime<Utc>, active_user: User) {
        let staff = User::from_db(
            active_user.id().clone(),
            active_user.email().clone(),
            active_user.name().clone(),
            UserStatus::Active,
            true,
            false,
            now,
            now,
        );

        assert!(!staff.is_notifiable());
    }

    #[rstest]
    fn test_スーパーユーザーは通知対象にならない(now: DateTime<Utc>, active_user: User) {
        let superuser = User::from_db(
            active_user.id().clone(),
            active_user.email().clone(),
            active_user.name().clone(),
            UserStatus::Active,
            false,
            true,
            now,
            now,
        );

        assert!(!superuser.is_notifiable());
    }

    #[rstest]
    fn test_非アクティブユーザーは通知対象にならない(
        now: DateTime<Utc>,
        active_user: User,
    ) {
        let inactive = User::from_db(
            active_user.id().clone(),
            active_user.email().clone(),
            active_user.name().clone(),
            UserStatus::Inactive,
            false,
            false,
            now,
            now,
        );

        assert!(!inactive.is_notifiable());
        assert_eq!(inactive.status(), UserStatus::Inactive);
    }
}
