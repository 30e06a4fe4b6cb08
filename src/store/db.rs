//! PostgreSQL-backed token vault.
//!
//! Tables:
//! - `social_connections`: encrypted platform credentials, one row per (user_id, platform)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::vault::{StoredConnection, TokenVault};
use crate::error::AuthError;

pub struct PgTokenVault {
    pub pool: PgPool,
}

impl PgTokenVault {
    pub async fn new(db_url: &str) -> Result<Self, AuthError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(20)
            .connect(db_url)
            .await
            .map_err(|e| AuthError::Database(format!("Failed to connect to PostgreSQL: {e}")))?;

        Ok(Self { pool })
    }

    /// Run schema migrations.
    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS social_connections (
                id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id         TEXT NOT NULL,
                platform        TEXT NOT NULL,
                account_id      TEXT NOT NULL DEFAULT '',
                account_name    TEXT NOT NULL DEFAULT '',
                access_token    TEXT NOT NULL,
                refresh_token   TEXT,
                expires_at      TIMESTAMPTZ,
                profile         JSONB,
                connected_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                UNIQUE(user_id, platform)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_social_connections_user ON social_connections(user_id, updated_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT platform, account_id, account_name, access_token, refresh_token,
           expires_at, profile, connected_at, updated_at
    FROM social_connections
"#;

fn map_row(row: &PgRow) -> StoredConnection {
    StoredConnection {
        platform: row.get(0),
        account_id: row.get(1),
        account_name: row.get(2),
        access_token: row.get(3),
        refresh_token: row.try_get::<Option<String>, _>(4).ok().flatten(),
        expires_at: row.try_get::<Option<DateTime<Utc>>, _>(5).ok().flatten(),
        profile: row.try_get::<Option<serde_json::Value>, _>(6).ok().flatten(),
        connected_at: row.get(7),
        updated_at: row.get(8),
    }
}

/// SQL form of `platform::normalize_tag`, applied to the stored column.
const NORMALIZED_TAG: &str = "replace(lower(btrim(platform)), '-', '_')";

fn owned_tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

#[async_trait]
impl TokenVault for PgTokenVault {
    async fn replace(
        &self,
        user_id: &str,
        tags: &[&str],
        row: &StoredConnection,
    ) -> Result<(), AuthError> {
        let mut tx = self.pool.begin().await?;

        // Legacy alias rows for the same platform go first so only the canonical row remains.
        let sql = format!(
            "DELETE FROM social_connections WHERE user_id = $1 AND {NORMALIZED_TAG} = ANY($2) AND platform <> $3"
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(owned_tags(tags))
            .bind(&row.platform)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO social_connections
                (user_id, platform, account_id, account_name, access_token, refresh_token,
                 expires_at, profile, connected_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (user_id, platform)
            DO UPDATE SET
                account_id = EXCLUDED.account_id,
                account_name = EXCLUDED.account_name,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                profile = EXCLUDED.profile,
                connected_at = EXCLUDED.connected_at,
                updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(&row.platform)
        .bind(&row.account_id)
        .bind(&row.account_name)
        .bind(&row.access_token)
        .bind(&row.refresh_token)
        .bind(row.expires_at)
        .bind(&row.profile)
        .bind(row.connected_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, user_id: &str, tags: &[&str]) -> Result<Vec<StoredConnection>, AuthError> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = $1 AND {NORMALIZED_TAG} = ANY($2) ORDER BY updated_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(owned_tags(tags))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_row).collect())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<StoredConnection>, AuthError> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY updated_at DESC");
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(map_row).collect())
    }

    async fn delete(&self, user_id: &str, tags: &[&str]) -> Result<u64, AuthError> {
        let sql = format!("DELETE FROM social_connections WHERE user_id = $1 AND {NORMALIZED_TAG} = ANY($2)");
        let affected = sqlx::query(&sql)
            .bind(user_id)
            .bind(owned_tags(tags))
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected)
    }

    async fn update_credentials(
        &self,
        user_id: &str,
        platform: &str,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            UPDATE social_connections
            SET access_token = $1,
                refresh_token = COALESCE($2, refresh_token),
                expires_at = $3,
                updated_at = NOW()
            WHERE user_id = $4 AND platform = $5
            "#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at)
        .bind(user_id)
        .bind(platform)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
