//! Telethon session adapter
//!
//! Telethon stores `{dc_id, server address, port, auth_key}`. The user id is
//! not part of this format, so converting through it always drops it.
//!
//! String layout (after the `'1'` version prefix, url-safe base64 with
//! padding): `dc_id(u8) | ip(4 or 16 bytes) | port(u16 BE) | auth_key(256)`.
//!
//! File layout: SQLite database, schema version 7, credentials in the
//! `sessions` table.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Connection, Row};

use crate::{dc, Error, Result, AUTH_KEY_SIZE};

/// Version prefix of every Telethon string session
const STRING_VERSION: char = '1';

/// Payload size with a packed IPv4 address
const PAYLOAD_LEN_V4: usize = 1 + 4 + 2 + AUTH_KEY_SIZE;

/// Payload size with a packed IPv6 address
const PAYLOAD_LEN_V6: usize = 1 + 16 + 2 + AUTH_KEY_SIZE;

/// Telethon SQLite schema (version 7)
const SCHEMA: &str = "
CREATE TABLE version (version INTEGER PRIMARY KEY);
CREATE TABLE sessions (
    dc_id INTEGER PRIMARY KEY,
    server_address TEXT,
    port INTEGER,
    auth_key BLOB,
    takeout_id INTEGER
);
CREATE TABLE entities (
    id INTEGER PRIMARY KEY,
    hash INTEGER NOT NULL,
    username TEXT,
    phone INTEGER,
    name TEXT,
    date INTEGER
);
CREATE TABLE sent_files (
    md5_digest BLOB,
    file_size INTEGER,
    type INTEGER,
    id INTEGER,
    hash INTEGER,
    PRIMARY KEY(md5_digest, file_size, type)
);
CREATE TABLE update_state (
    id INTEGER PRIMARY KEY,
    pts INTEGER,
    qts INTEGER,
    date INTEGER,
    seq INTEGER
);
";

/// Schema version Telethon currently writes
const SCHEMA_VERSION: i32 = 7;

/// A session in Telethon's representation
#[derive(Debug, Clone)]
pub struct TeleSession {
    pub dc_id: i32,
    pub auth_key: [u8; AUTH_KEY_SIZE],
}

impl TeleSession {
    /// Create a session from known fields
    pub fn new(dc_id: i32, auth_key: [u8; AUTH_KEY_SIZE]) -> Result<Self> {
        dc::validate(dc_id)?;
        Ok(Self { dc_id, auth_key })
    }

    /// Parse a Telethon string session
    pub fn from_string(string: &str) -> Result<Self> {
        let mut chars = string.chars();
        if chars.next() != Some(STRING_VERSION) {
            return Err(Error::invalid_format(
                "telethon string session must start with '1'",
            ));
        }

        let payload = URL_SAFE.decode(chars.as_str())?;

        let ip_len = match payload.len() {
            PAYLOAD_LEN_V4 => 4,
            PAYLOAD_LEN_V6 => 16,
            n => {
                return Err(Error::invalid_format(format!(
                    "telethon string session payload has {} bytes, expected {} or {}",
                    n, PAYLOAD_LEN_V4, PAYLOAD_LEN_V6
                )))
            }
        };

        let dc_id = payload[0] as i32;
        dc::validate(dc_id)?;

        // ip (ignored, re-derived from the DC table on write) and port
        // sit between the dc id and the key
        let key_start = 1 + ip_len + 2;
        let mut auth_key = [0u8; AUTH_KEY_SIZE];
        auth_key.copy_from_slice(&payload[key_start..key_start + AUTH_KEY_SIZE]);

        Ok(Self { dc_id, auth_key })
    }

    /// Serialize to a Telethon string session
    pub fn to_string(&self) -> String {
        // Constructors only admit known DCs; fall back to DC 2 for a record
        // built by hand with an address we don't know
        let (ip, port) = dc::address(self.dc_id)
            .unwrap_or((std::net::Ipv4Addr::new(149, 154, 167, 51), 443));

        let mut payload = Vec::with_capacity(PAYLOAD_LEN_V4);
        payload.push(self.dc_id as u8);
        payload.extend_from_slice(&ip.octets());
        payload.extend_from_slice(&port.to_be_bytes());
        payload.extend_from_slice(&self.auth_key);

        format!("{}{}", STRING_VERSION, URL_SAFE.encode(payload))
    }

    /// Load a session from a Telethon SQLite file
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

        let row = sqlx::query("SELECT dc_id, auth_key FROM sessions")
            .fetch_one(&mut conn)
            .await?;
        conn.close().await?;

        let dc_id: i32 = row.try_get("dc_id")?;
        let key_bytes: Vec<u8> = row.try_get("auth_key")?;

        if key_bytes.len() != AUTH_KEY_SIZE {
            return Err(Error::invalid_format(format!(
                "telethon auth_key has {} bytes, expected {}",
                key_bytes.len(),
                AUTH_KEY_SIZE
            )));
        }

        let mut auth_key = [0u8; AUTH_KEY_SIZE];
        auth_key.copy_from_slice(&key_bytes);
        Self::new(dc_id, auth_key)
    }

    /// Write the session to a Telethon SQLite file
    ///
    /// The database is built at a temporary path and renamed over the target,
    /// so a failure never leaves a partial session file.
    pub async fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
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

        let (ip, port) = dc::address(self.dc_id)?;
        sqlx::query(
            "INSERT INTO sessions (dc_id, server_address, port, auth_key, takeout_id) \
             VALUES (?1, ?2, ?3, ?4, NULL)",
        )
        .bind(self.dc_id)
        .bind(ip.to_string())
        .bind(port as i32)
        .bind(&self.auth_key[..])
        .execute(&mut conn)
        .await?;

        conn.close().await?;
        tmp.persist(path).map_err(|e| e.error)?;

        tracing::debug!("Wrote telethon session file: {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TeleSession {
        TeleSession::new(2, [0x5C; AUTH_KEY_SIZE]).unwrap()
    }

    #[test]
    fn test_string_roundtrip() {
        let session = sample();
        let string = session.to_string();

        assert!(string.starts_with('1'));
        // 263-byte payload encodes to 352 base64 chars, plus the version char
        assert_eq!(string.len(), 353);

        let parsed = TeleSession::from_string(&string).unwrap();
        assert_eq!(parsed.dc_id, 2);
        assert_eq!(parsed.auth_key, session.auth_key);
    }

    #[test]
    fn test_string_bad_version() {
        let string = sample().to_string().replace('1', "2");
        assert!(TeleSession::from_string(&string).is_err());
    }

    #[test]
    fn test_string_bad_length() {
        assert!(TeleSession::from_string("1AAAA").is_err());
    }

    #[test]
    fn test_string_ipv6_payload() {
        // Same fields packed with a 16-byte address, as Telethon emits when
        // connected over IPv6
        let session = sample();
        let mut payload = Vec::with_capacity(PAYLOAD_LEN_V6);
        payload.push(session.dc_id as u8);
        payload.extend_from_slice(&[0u8; 16]);
        payload.extend_from_slice(&443u16.to_be_bytes());
        payload.extend_from_slice(&session.auth_key);
        let string = format!("1{}", URL_SAFE.encode(payload));

        let parsed = TeleSession::from_string(&string).unwrap();
        assert_eq!(parsed.dc_id, session.dc_id);
        assert_eq!(parsed.auth_key, session.auth_key);
    }

    #[test]
    fn test_rejects_unknown_dc() {
        assert!(TeleSession::new(9, [0u8; AUTH_KEY_SIZE]).is_err());
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("account.session");

        let session = sample();
        session.to_file(&path).await.unwrap();

        let parsed = TeleSession::from_file(&path).await.unwrap();
        assert_eq!(parsed.dc_id, session.dc_id);
        assert_eq!(parsed.auth_key, session.auth_key);
    }

    #[tokio::test]
    async fn test_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = TeleSession::from_file(dir.path().join("missing.session")).await;
        assert!(matches!(result, Err(Error::FileNotFound { .. })));
    }
}
