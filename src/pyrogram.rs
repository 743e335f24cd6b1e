//! Pyrogram session adapter
//!
//! Pyrogram carries `{dc_id, auth_key, user_id}` plus flags this crate does
//! not track (`test_mode`, `is_bot`).
//!
//! String layout (url-safe base64 without padding), current format:
//! `dc_id(u8) | api_id(u32 BE) | test_mode(u8) | auth_key(256) | user_id(u64 BE) | is_bot(u8)`.
//! The two legacy layouts (32-bit and 64-bit user ids, no api_id) are
//! accepted on input.
//!
//! File layout: SQLite database, schema version 3.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, Row};

use crate::{dc, Error, Result, AUTH_KEY_SIZE};

/// Current string payload: dc_id + api_id + test_mode + key + user_id + is_bot
const PAYLOAD_LEN: usize = 1 + 4 + 1 + AUTH_KEY_SIZE + 8 + 1;

/// Legacy payload with a 32-bit user id and no api_id
const PAYLOAD_LEN_OLD: usize = 1 + 1 + AUTH_KEY_SIZE + 4 + 1;

/// Legacy payload with a 64-bit user id and no api_id
const PAYLOAD_LEN_OLD_64: usize = 1 + 1 + AUTH_KEY_SIZE + 8 + 1;

/// Pyrogram SQLite schema (version 3)
const SCHEMA: &str = "
CREATE TABLE sessions (
    dc_id     INTEGER PRIMARY KEY,
    api_id    INTEGER,
    test_mode INTEGER,
    auth_key  BLOB,
    date      INTEGER NOT NULL,
    user_id   INTEGER,
    is_bot    INTEGER
);
CREATE TABLE peers (
    id             INTEGER PRIMARY KEY,
    access_hash    INTEGER,
    type           INTEGER NOT NULL,
    username       TEXT,
    phone_number   TEXT,
    last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
);
CREATE TABLE version (number INTEGER PRIMARY KEY);
CREATE INDEX idx_peers_id ON peers (id);
CREATE INDEX idx_peers_username ON peers (username);
CREATE INDEX idx_peers_phone_number ON peers (phone_number);
";

/// Schema version Pyrogram currently writes
const SCHEMA_VERSION: i32 = 3;

/// A session in Pyrogram's representation
#[derive(Debug, Clone)]
pub struct PyroSession {
    pub dc_id: i32,
    pub auth_key: [u8; AUTH_KEY_SIZE],
    pub user_id: Option<i64>,
}

impl PyroSession {
    /// Create a session from known fields
    pub fn new(dc_id: i32, auth_key: [u8; AUTH_KEY_SIZE], user_id: Option<i64>) -> Result<Self> {
        dc::validate(dc_id)?;
        Ok(Self {
            dc_id,
            auth_key,
            user_id,
        })
    }

    /// Parse a Pyrogram string session, accepting current and legacy layouts
    pub fn from_string(string: &str) -> Result<Self> {
        // Python emits without padding but tolerates it; so do we
        let payload = URL_SAFE_NO_PAD.decode(string.trim_end_matches('='))?;

        let (dc_id, test_mode, auth_key, user_id) = match payload.len() {
            PAYLOAD_LEN => {
                let mut key = [0u8; AUTH_KEY_SIZE];
                key.copy_from_slice(&payload[6..6 + AUTH_KEY_SIZE]);
                let uid = u64::from_be_bytes(
                    payload[6 + AUTH_KEY_SIZE..6 + AUTH_KEY_SIZE + 8]
                        .try_into()
                        .unwrap(),
                );
                (payload[0] as i32, payload[5] != 0, key, uid as i64)
            }
            PAYLOAD_LEN_OLD => {
                let mut key = [0u8; AUTH_KEY_SIZE];
                key.copy_from_slice(&payload[2..2 + AUTH_KEY_SIZE]);
                let uid = u32::from_be_bytes(
                    payload[2 + AUTH_KEY_SIZE..2 + AUTH_KEY_SIZE + 4]
                        .try_into()
                        .unwrap(),
                );
                (payload[0] as i32, payload[1] != 0, key, uid as i64)
            }
            PAYLOAD_LEN_OLD_64 => {
                let mut key = [0u8; AUTH_KEY_SIZE];
                key.copy_from_slice(&payload[2..2 + AUTH_KEY_SIZE]);
                let uid = u64::from_be_bytes(
                    payload[2 + AUTH_KEY_SIZE..2 + AUTH_KEY_SIZE + 8]
                        .try_into()
                        .unwrap(),
                );
                (payload[0] as i32, payload[1] != 0, key, uid as i64)
            }
            n => {
                return Err(Error::invalid_format(format!(
                    "pyrogram string session payload has {} bytes",
                    n
                )))
            }
        };

        if test_mode {
            tracing::warn!("pyrogram session is flagged test_mode; treating as production");
        }

        dc::validate(dc_id)?;
        Ok(Self {
            dc_id,
            auth_key,
            // Pyrogram stores 0 before the first successful login
            user_id: (user_id != 0).then_some(user_id),
        })
    }

    /// Serialize to a Pyrogram string session (current layout)
    pub fn to_string(&self, api_id: i32) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        payload.push(self.dc_id as u8);
        payload.extend_from_slice(&(api_id as u32).to_be_bytes());
        payload.push(0); // test_mode
        payload.extend_from_slice(&self.auth_key);
        payload.extend_from_slice(&(self.user_id.unwrap_or(0) as u64).to_be_bytes());
        payload.push(0); // is_bot

        URL_SAFE_NO_PAD.encode(payload)
    }

    /// Load a session from a Pyrogram SQLite file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound {
                file: path.display().to_string(),
                folder: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
            });
        }

        let mut conn = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .connect()
            .await?;

        let row = sqlx::query("SELECT dc_id, auth_key, user_id FROM sessions")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;

        let dc_id: i32 = row.try_get("dc_id")?;
        let key_bytes: Vec<u8> = row.try_get("auth_key")?;
        let user_id: Option<i64> = row.try_get("user_id")?;

        if key_bytes.len() != AUTH_KEY_SIZE {
            return Err(Error::invalid_format(format!(
                "pyrogram auth_key has {} bytes, expected {}",
                key_bytes.len(),
                AUTH_KEY_SIZE
            )));
        }

        let mut auth_key = [0u8; AUTH_KEY_SIZE];
        auth_key.copy_from_slice(&key_bytes);
        Self::new(dc_id, auth_key, user_id.filter(|id| *id != 0))
    }

    /// Write the session to a Pyrogram SQLite file
    ///
    /// Built at a temporary path and renamed over the target, so a failure
    /// never leaves a partial session file.
    pub async fn to_file(&self, path: impl AsRef<Path>, api_id: i32) -> Result<()> {
        let path = path.as_ref();
        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp = tempfile::NamedTempFile::new_in(parent)?;

        let mut conn = SqliteConnectOptions::new()
            .filename(tmp.path())
            .connect()
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&mut conn).await?;
        sqlx::query("INSERT INTO version VALUES (?1)")
            .bind(SCHEMA_VERSION)
            .execute(&mut conn)
            .await?;

        let date = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        sqlx::query(
            "INSERT INTO sessions (dc_id, api_id, test_mode, auth_key, date, user_id, is_bot) \
             VALUES (?1, ?2, 0, ?3, ?4, ?5, 0)",
        )
        .bind(self.dc_id)
        .bind(api_id)
        .bind(&self.auth_key[..])
        .bind(date)
        .bind(self.user_id.unwrap_or(0))
        .execute(&mut conn)
        .await?;

        conn.close().await?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::debug!("Wrote pyrogram session file: {:?}", path);
        Ok(())
    }
}
