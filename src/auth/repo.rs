use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{Connection, Session, User};

impl User {
    /// Executor-generic so signup can run it inside a transaction.
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
        name: Option<&str>,
        image_url: Option<&str>,
        role: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, image_url, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, image_url, customer_id, role, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(image_url)
        .bind(role)
        .fetch_one(executor)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, image_url, customer_id, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, image_url, customer_id, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(user)
    }

    pub async fn set_customer_id(
        executor: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        customer_id: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET customer_id = $2 WHERE id = $1")
            .bind(id)
            .bind(customer_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Cascades to passwords, sessions, connections and the subscription
    /// mirror through foreign keys.
    pub async fn delete(executor: impl sqlx::PgExecutor<'_>, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

/// Password hashes live in their own table so `users` rows can be loaded and
/// serialized without ever touching credential material.
pub struct Password;

impl Password {
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
        hash: &str,
    ) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO passwords (user_id, hash) VALUES ($1, $2)")
            .bind(user_id)
            .bind(hash)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn replace_by_email(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
        hash: &str,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE passwords SET hash = $2
            WHERE user_id = (SELECT id FROM users WHERE email = $1)
            "#,
        )
        .bind(email)
        .bind(hash)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn find_with_user_by_email(
        executor: impl sqlx::PgExecutor<'_>,
        email: &str,
    ) -> anyhow::Result<Option<(Uuid, String)>> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT u.id, p.hash
            FROM users u
            JOIN passwords p ON p.user_id = u.id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }

    pub async fn find_with_user_by_id(
        executor: impl sqlx::PgExecutor<'_>,
        user_id: Uuid,
    ) -> anyhow::Result<Option<(Uuid, String)>> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT u.id, p.hash
            FROM users u
            JOIN passwords p ON p.user_id = u.id
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
        Ok(row)
    }
}

impl Session {
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        id: &str,
        user_id: Uuid,
        expiration_date: OffsetDateTime,
    ) -> anyhow::Result<Session> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (id, user_id, expiration_date)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, expiration_date, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(expiration_date)
        .fetch_one(executor)
        .await?;
        Ok(session)
    }

    /// Expired rows are treated the same as missing ones.
    pub async fn find_active(
        executor: impl sqlx::PgExecutor<'_>,
        id: &str,
    ) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, expiration_date, created_at
            FROM sessions
            WHERE id = $1 AND expiration_date > now()
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(session)
    }

    pub async fn delete(executor: impl sqlx::PgExecutor<'_>, id: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

impl Connection {
    pub async fn create(
        executor: impl sqlx::PgExecutor<'_>,
        provider_name: &str,
        provider_id: &str,
        user_id: Uuid,
    ) -> anyhow::Result<Connection> {
        let connection = sqlx::query_as::<_, Connection>(
            r#"
            INSERT INTO connections (provider_name, provider_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING id, provider_name, provider_id, user_id, created_at
            "#,
        )
        .bind(provider_name)
        .bind(provider_id)
        .bind(user_id)
        .fetch_one(executor)
        .await?;
        Ok(connection)
    }

    pub async fn find(
        executor: impl sqlx::PgExecutor<'_>,
        provider_name: &str,
        provider_id: &str,
    ) -> anyhow::Result<Option<Connection>> {
        let connection = sqlx::query_as::<_, Connection>(
            r#"
            SELECT id, provider_name, provider_id, user_id, created_at
            FROM connections
            WHERE provider_name = $1 AND provider_id = $2
            "#,
        )
        .bind(provider_name)
        .bind(provider_id)
        .fetch_optional(executor)
        .await?;
        Ok(connection)
    }
}
