//! # UserDirectory
//!
//! 一斉通知の対象ユーザーの参照を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **通知適格者のみ**: アクティブかつ非スタッフかつ非スーパーユーザーに
//!   限定する。フィルタは SQL 側で行い、全件ロードを避ける
//! - **読み取り専用**: ユーザーの管理は別システムの責務

use async_trait::async_trait;
use notiflow_domain::user::{Email, User, UserId, UserName, UserStatus};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::InfraError;

/// ユーザーディレクトリトレイト
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// 一斉通知の対象ユーザー一覧を取得する
    ///
    /// アクティブかつ非スタッフかつ非スーパーユーザーのみを返す。
    /// テンプレートの `users` 変数に展開される。
    async fn find_notifiable(&self) -> Result<Vec<User>, InfraError>;
}

/// PostgreSQL 実装の UserDirectory
#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_user(row: &PgRow) -> Result<User, InfraError> {
    Ok(User::from_db(
        UserId::from_uuid(row.try_get("id")?),
        Email::new(row.try_get::<String, _>("email")?)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
        UserName::new(row.try_get::<String, _>("name")?)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
        row.try_get::<String, _>("status")?
            .parse::<UserStatus>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
        row.try_get("is_staff")?,
        row.try_get("is_superuser")?,
        row.try_get("created_at")?,
        row.try_get("updated_at")?,
    ))
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_notifiable(&self) -> Result<Vec<User>, InfraError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                email,
                name,
                status,
                is_staff,
                is_superuser,
                created_at,
                updated_at
            FROM users
            WHERE status = 'active' AND NOT is_staff AND NOT is_superuser
            ORDER BY email
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_user).collect()
    }
}
