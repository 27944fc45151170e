use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned, CascadeReference, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use crate::user::auth::{AuthToken, AuthTokenValue, HashedPassword, UsernamePasswordCredentials};
use crate::user::user_models::User;
use crate::user::user_store::{UserAuthTokenStore, UserCredentialsStore, UserStore};
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

const USER_REFERENCE: CascadeReference = CascadeReference {
    table: "user",
    column: "id",
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "is_admin",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_user_handle", "handle")],
};
const USER_PASSWORD_CREDENTIALS_TABLE_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            references = Some(&USER_REFERENCE)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
    ],
    indices: &[],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            references = Some(&USER_REFERENCE)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    indices: &[("idx_auth_token_value", "value")],
};

const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        USER_TABLE_V_0,
        USER_PASSWORD_CREDENTIALS_TABLE_V_0,
        AUTH_TOKEN_TABLE_V_0,
    ],
    migration: None,
}];

fn to_unix_secs(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value.max(0) as u64)
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let mut conn = Connection::open_with_flags(
            db_path.as_ref(),
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open user database")?;

        open_versioned(&mut conn, VERSIONED_SCHEMAS)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let user_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM user", [], |r| r.get(0))
            .unwrap_or(0);
        info!("Opened user store with {} users", user_count);

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("user store connection lock poisoned"))
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str, password: &HashedPassword) -> Result<Option<User>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let inserted = tx.query_row(
            "INSERT INTO user (handle, is_admin) \
             VALUES (?1, NOT EXISTS (SELECT 1 FROM user)) \
             RETURNING id, handle, is_admin",
            params![user_handle],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    handle: row.get(1)?,
                    is_admin: row.get(2)?,
                })
            },
        );
        let user = match inserted {
            Ok(user) => user,
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                debug!("Handle {} is already taken", user_handle);
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to create user {}", user_handle))
            }
        };

        tx.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher, created) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                password.salt,
                password.hash,
                password.hasher.to_string(),
                to_unix_secs(password.created),
            ],
        )
        .with_context(|| format!("Failed to store credentials of user {}", user_handle))?;

        tx.commit()?;
        Ok(Some(user))
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                "SELECT id, handle, is_admin FROM user WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        handle: row.get(1)?,
                        is_admin: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl UserCredentialsStore for SqliteUserStore {
    fn get_password_credentials(
        &self,
        user_id: usize,
    ) -> Result<Option<UsernamePasswordCredentials>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT salt, hash, hasher, created FROM user_password_credentials \
                 WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<usize, String>(0)?,
                        row.get::<usize, String>(1)?,
                        row.get::<usize, String>(2)?,
                        row.get::<usize, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((salt, hash, hasher, created)) => Ok(Some(UsernamePasswordCredentials {
                user_id,
                salt,
                hash,
                hasher: hasher.parse()?,
                created: system_time_from_column_result(created),
            })),
        }
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.lock()?;
        let token = conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                auth_token_from_row,
            )
            .optional()?;
        Ok(token)
    }

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO auth_token (user_id, value, created, last_used) VALUES (?1, ?2, ?3, ?4)",
            params![
                token.user_id,
                token.value.0,
                to_unix_secs(token.created),
                token.last_used.map(to_unix_secs),
            ],
        )?;
        Ok(())
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.lock()?;
        let deleted = conn
            .query_row(
                "DELETE FROM auth_token WHERE value = ?1 \
                 RETURNING user_id, value, created, last_used",
                params![token.0],
                auth_token_from_row,
            )
            .optional()?;
        Ok(deleted)
    }

    fn update_user_auth_token_last_used_timestamp(
        &self,
        token: &AuthTokenValue,
        when: SystemTime,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE auth_token SET last_used = ?2 WHERE value = ?1",
            params![token.0, to_unix_secs(when)],
        )?;
        Ok(())
    }

    fn prune_auth_tokens_unused_since(&self, cutoff: SystemTime) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM auth_token WHERE COALESCE(last_used, created) < ?1",
            params![to_unix_secs(cutoff)],
        )?;
        debug!("Pruned {} auth tokens", removed);
        Ok(removed)
    }
}
