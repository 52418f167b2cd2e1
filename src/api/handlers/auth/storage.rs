//! Database helpers for principals, roles, and refresh-token state.

use anyhow::{Context, Result, anyhow};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_refresh_token, is_unique_violation};

/// Outcome when attempting to create a principal.
#[derive(Debug)]
pub(super) enum RegisterOutcome {
    Created,
    UsernameTaken,
    EmailTaken,
}

/// Outcome when attempting to create a role.
#[derive(Debug)]
pub(super) enum RoleOutcome {
    Created,
    Exists,
}

/// Outcome when attempting to assign a role to a principal.
#[derive(Debug)]
pub(super) enum AssignOutcome {
    Assigned,
    UserMissing,
    RoleMissing,
    AlreadyAssigned,
}

/// Outcome of one rotation attempt. `Rejected` covers unknown, revoked, and
/// expired tokens alike.
#[derive(Debug)]
pub(super) enum RotationOutcome {
    Rotated {
        user_id: Uuid,
        username: String,
        new_token: String,
    },
    Rejected,
}

/// Fields needed to check a password at login.
pub(super) struct CredentialRecord {
    pub(super) user_id: Uuid,
    pub(super) username: String,
    pub(super) password_hash: String,
}

pub(super) async fn insert_user(
    pool: &PgPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<RegisterOutcome> {
    // Username precedence over email mirrors the response contract: when both
    // are taken the caller hears about the username.
    if user_exists(pool, "username", username).await? {
        return Ok(RegisterOutcome::UsernameTaken);
    }
    if user_exists(pool, "email", email).await? {
        return Ok(RegisterOutcome::EmailTaken);
    }

    let query = r"
        INSERT INTO users (username, email, password_hash)
        VALUES ($1, $2, $3)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(RegisterOutcome::Created),
        // Race between the existence checks and the insert.
        Err(err) if is_unique_violation(&err) => {
            let constraint = match &err {
                sqlx::Error::Database(db_err) => db_err.constraint().map(str::to_string),
                _ => None,
            };
            Ok(match constraint.as_deref() {
                Some("users_email_key") => RegisterOutcome::EmailTaken,
                _ => RegisterOutcome::UsernameTaken,
            })
        }
        Err(err) => Err(err).context("failed to insert user"),
    }
}

async fn user_exists(pool: &PgPool, column: &str, value: &str) -> Result<bool> {
    let query = match column {
        "email" => "SELECT 1 FROM users WHERE email = $1 LIMIT 1",
        _ => "SELECT 1 FROM users WHERE username = $1 LIMIT 1",
    };
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(value)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .with_context(|| format!("failed to check {column} uniqueness"))?;
    Ok(row.is_some())
}

/// Look up credential data by username for login.
pub(super) async fn lookup_credentials(
    pool: &PgPool,
    username: &str,
) -> Result<Option<CredentialRecord>> {
    let query = "SELECT id, username, password_hash FROM users WHERE username = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup credentials")?;

    Ok(row.map(|row| CredentialRecord {
        user_id: row.get("id"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
    }))
}

/// Role names assigned to a principal, re-derived at each token issuance.
pub(super) async fn role_names(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let query = r"
        SELECT roles.name
        FROM roles
        JOIN user_roles ON user_roles.role_id = roles.id
        WHERE user_roles.user_id = $1
        ORDER BY roles.name
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await
        .context("failed to lookup role names")?;

    Ok(rows.iter().map(|row| row.get("name")).collect())
}

/// Create an Active refresh record with a fresh rotation family.
pub(super) async fn create_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    let family_id = Uuid::new_v4();
    let query = r"
        INSERT INTO refresh_tokens (token, user_id, family_id, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_refresh_token()?;
        let result = sqlx::query(query)
            .bind(&token)
            .bind(user_id)
            .bind(family_id)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert refresh token"),
        }
    }

    Err(anyhow!("failed to generate unique refresh token"))
}

/// Rotate a refresh token: revoke the presented record and create its
/// successor in one transaction.
///
/// The conditional `UPDATE` is the serialization point; of two concurrent
/// rotations of the same value exactly one observes an Active row. When the
/// update misses but the value exists, a dead token is being replayed and the
/// whole family is revoked before rejecting.
pub(super) async fn rotate_refresh_token(
    pool: &PgPool,
    token_value: &str,
    ttl_seconds: i64,
) -> Result<RotationOutcome> {
    let mut tx = pool.begin().await.context("begin rotation transaction")?;

    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE
        FROM users
        WHERE refresh_tokens.token = $1
          AND refresh_tokens.revoked = FALSE
          AND refresh_tokens.expires_at > NOW()
          AND users.id = refresh_tokens.user_id
        RETURNING refresh_tokens.user_id, refresh_tokens.family_id, users.username
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_value)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to rotate refresh token")?;

    let Some(row) = row else {
        revoke_family_of(&mut tx, token_value).await?;
        tx.commit().await.context("commit rotation rejection")?;
        return Ok(RotationOutcome::Rejected);
    };

    let user_id: Uuid = row.get("user_id");
    let family_id: Uuid = row.get("family_id");
    let username: String = row.get("username");

    let new_token = generate_refresh_token()?;
    let query = r"
        INSERT INTO refresh_tokens (token, user_id, family_id, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(&new_token)
        .bind(user_id)
        .bind(family_id)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert successor refresh token")?;

    tx.commit().await.context("commit rotation transaction")?;

    Ok(RotationOutcome::Rotated {
        user_id,
        username,
        new_token,
    })
}

async fn revoke_family_of(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    token_value: &str,
) -> Result<()> {
    // No-op when the token value is unknown: the subquery yields NULL and the
    // predicate matches nothing, so unknown and known-dead replays stay
    // indistinguishable to the caller.
    let query = r"
        UPDATE refresh_tokens
        SET revoked = TRUE
        WHERE revoked = FALSE
          AND family_id = (SELECT family_id FROM refresh_tokens WHERE token = $1)
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_value)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to revoke token family")?;
    Ok(())
}

/// Revoke one refresh record. Idempotent: unknown values succeed silently.
pub(super) async fn revoke_refresh_token(pool: &PgPool, token_value: &str) -> Result<()> {
    let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE token = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_value)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;
    Ok(())
}

pub(super) async fn insert_role(pool: &PgPool, name: &str) -> Result<RoleOutcome> {
    let query = "INSERT INTO roles (name) VALUES ($1)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(name)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(RoleOutcome::Created),
        Err(err) if is_unique_violation(&err) => Ok(RoleOutcome::Exists),
        Err(err) => Err(err).context("failed to insert role"),
    }
}

pub(super) async fn assign_role(
    pool: &PgPool,
    username: &str,
    role: &str,
) -> Result<AssignOutcome> {
    let query = "SELECT id FROM users WHERE username = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let user_row = sqlx::query(query)
        .bind(username)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user for role assignment")?;
    let Some(user_row) = user_row else {
        return Ok(AssignOutcome::UserMissing);
    };

    let query = "SELECT id FROM roles WHERE name = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let role_row = sqlx::query(query)
        .bind(role)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup role for assignment")?;
    let Some(role_row) = role_row else {
        return Ok(AssignOutcome::RoleMissing);
    };

    let user_id: Uuid = user_row.get("id");
    let role_id: Uuid = role_row.get("id");

    let query = "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .instrument(span)
        .await;

    match result {
        Ok(_) => Ok(AssignOutcome::Assigned),
        Err(err) if is_unique_violation(&err) => Ok(AssignOutcome::AlreadyAssigned),
        Err(err) => Err(err).context("failed to assign role"),
    }
}
