//! The canonical session record and its conversions
//!
//! `SessionManager` normalizes any supported source format into
//! `{dc_id, auth_key, user_id?}` and serializes it back out. Each value is
//! exclusively owned; concurrent conversions take independent managers and
//! independent live connections.

use std::path::Path;

use crate::api::ApiIdentity;
use crate::pyrogram::PyroSession;
use crate::tdata::TDataSession;
use crate::telethon::TeleSession;
use crate::{client, dc, Error, Result, AUTH_KEY_SIZE};

/// A Telegram session, independent of any storage format
#[derive(Debug, Clone)]
pub struct SessionManager {
    dc_id: i32,
    auth_key: [u8; AUTH_KEY_SIZE],
    user_id: Option<i64>,
    valid: Option<bool>,
    api: ApiIdentity,
    proxy: Option<String>,
}

impl SessionManager {
    /// Create a session from known credentials
    pub fn new(dc_id: i32, auth_key: [u8; AUTH_KEY_SIZE]) -> Result<Self> {
        dc::validate(dc_id)?;
        Ok(Self {
            dc_id,
            auth_key,
            user_id: None,
            valid: None,
            api: ApiIdentity::default(),
            proxy: None,
        })
    }

    /// Replace the API identity presented to Telegram
    pub fn with_api(mut self, api: ApiIdentity) -> Self {
        self.api = api;
        self
    }

    /// Route live connections through a proxy URL (passed to grammers as-is)
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Set the user id when the caller already knows it
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Get the datacenter ID (1-5)
    pub fn dc_id(&self) -> i32 {
        self.dc_id
    }

    /// Get the raw auth key bytes
    pub fn auth_key(&self) -> &[u8; AUTH_KEY_SIZE] {
        &self.auth_key
    }

    /// Get the auth key as lowercase hex
    pub fn auth_key_hex(&self) -> String {
        hex::encode(self.auth_key)
    }

    /// Get the user id, if known
    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    /// Result of the last validation, if any
    pub fn valid(&self) -> Option<bool> {
        self.valid
    }

    /// Get the API identity
    pub fn api(&self) -> &ApiIdentity {
        &self.api
    }

    // --- Telethon ---

    /// Parse a Telethon string session
    pub fn from_telethon_string(string: &str) -> Result<Self> {
        let session = TeleSession::from_string(string)?;
        Self::new(session.dc_id, session.auth_key)
    }

    /// Load a Telethon SQLite session file
    pub async fn from_telethon_file(path: impl AsRef<Path>) -> Result<Self> {
        let session = TeleSession::from_file(path).await?;
        Self::new(session.dc_id, session.auth_key)
    }

    /// Serialize to a Telethon string session (drops the user id)
    pub fn to_telethon_string(&self) -> String {
        self.telethon().to_string()
    }

    /// Write a Telethon SQLite session file
    pub async fn to_telethon_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.telethon().to_file(path).await
    }

    // --- Pyrogram ---

    /// Parse a Pyrogram string session (current or legacy layout)
    pub fn from_pyrogram_string(string: &str) -> Result<Self> {
        let session = PyroSession::from_string(string)?;
        let mut manager = Self::new(session.dc_id, session.auth_key)?;
        manager.user_id = session.user_id;
        Ok(manager)
    }

    /// Load a Pyrogram SQLite session file
    pub async fn from_pyrogram_file(path: impl AsRef<Path>) -> Result<Self> {
        let session = PyroSession::from_file(path).await?;
        let mut manager = Self::new(session.dc_id, session.auth_key)?;
        manager.user_id = session.user_id;
        Ok(manager)
    }

    /// Serialize to a Pyrogram string session
    pub fn to_pyrogram_string(&self) -> String {
        self.pyrogram().to_string(self.api.api_id)
    }

    /// Write a Pyrogram SQLite session file
    pub async fn to_pyrogram_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.pyrogram().to_file(path, self.api.api_id).await
    }

    // --- Telegram Desktop ---

    /// Read the main account from a tdata folder
    pub fn from_tdata_folder(path: impl AsRef<Path>) -> Result<Self> {
        let session = TDataSession::from_folder(path)?;
        let mut manager = Self::new(session.dc_id, session.auth_key)?;
        manager.user_id = Some(session.user_id);
        Ok(manager)
    }

    /// Read the main account from a passcode-protected tdata folder
    pub fn from_tdata_folder_with_passcode(
        path: impl AsRef<Path>,
        passcode: &str,
    ) -> Result<Self> {
        let session = TDataSession::from_folder_with_passcode(path, passcode)?;
        let mut manager = Self::new(session.dc_id, session.auth_key)?;
        manager.user_id = Some(session.user_id);
        Ok(manager)
    }

    /// Write a tdata folder
    ///
    /// tdata requires a resolved user id. If it is not known yet, a single
    /// live query resolves it first; when that fails nothing is written, and
    /// a known user id means no network access at all. The folder appears
    /// only after every file in it is complete.
    pub async fn to_tdata_folder(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let user_id = self.resolve_user_id().await?;

        TDataSession {
            dc_id: self.dc_id,
            auth_key: self.auth_key,
            user_id,
        }
        .to_folder(path)
    }

    // --- Live operations ---

    /// Return the user id, resolving it over a live connection if unknown
    ///
    /// The resolved id is cached: a second call never touches the network.
    /// Fails with [`Error::InvalidSession`] when Telegram reports no
    /// identity for this session.
    pub async fn resolve_user_id(&mut self) -> Result<i64> {
        if let Some(id) = self.user_id {
            return Ok(id);
        }

        match self.fetch_self_id().await? {
            Some(id) => {
                self.user_id = Some(id);
                self.valid = Some(true);
                Ok(id)
            }
            None => {
                self.valid = Some(false);
                Err(Error::InvalidSession)
            }
        }
    }

    /// Check the session against Telegram's servers
    ///
    /// A dead or revoked session yields `Ok(false)`; only transport
    /// failures surface as errors. The result is cached in [`valid`] and a
    /// freshly learned user id is kept.
    ///
    /// [`valid`]: Self::valid
    pub async fn validate(&mut self) -> Result<bool> {
        let identity = self.fetch_self_id().await?;

        if let Some(id) = identity {
            self.user_id = Some(id);
        }

        let valid = identity.is_some();
        self.valid = Some(valid);
        Ok(valid)
    }

    /// Open a connected grammers client using this session's credentials
    ///
    /// Escape hatch for callers who want to keep the connection and run
    /// their own requests; the caller owns (and thereby releases) it.
    pub async fn grammers_client(&self) -> Result<grammers_client::Client> {
        client::connect(
            self.dc_id,
            &self.auth_key,
            self.user_id,
            &self.api,
            self.proxy.as_deref(),
        )
        .await
    }

    async fn fetch_self_id(&self) -> Result<Option<i64>> {
        client::fetch_self_id(
            self.dc_id,
            &self.auth_key,
            self.user_id,
            &self.api,
            self.proxy.as_deref(),
        )
        .await
    }

    fn telethon(&self) -> TeleSession {
        TeleSession {
            dc_id: self.dc_id,
            auth_key: self.auth_key,
        }
    }

    fn pyrogram(&self) -> PyroSession {
        PyroSession {
            dc_id: self.dc_id,
            auth_key: self.auth_key,
            user_id: self.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_KEY: [u8; AUTH_KEY_SIZE] = [0x42; AUTH_KEY_SIZE];

    fn sample() -> SessionManager {
        SessionManager::new(2, SAMPLE_KEY).unwrap()
    }

    #[test]
    fn test_rejects_invalid_dc() {
        assert!(matches!(
            SessionManager::new(0, SAMPLE_KEY),
            Err(Error::InvalidDcId { dc_id: 0 })
        ));
    }

    #[test]
    fn test_cross_format_strings_preserve_credentials() {
        // telethon -> pyrogram -> telethon keeps dc_id/auth_key byte-identical
        let original = sample().to_telethon_string();

        let via_pyro = SessionManager::from_telethon_string(&original)
            .unwrap()
            .to_pyrogram_string();
        let back = SessionManager::from_pyrogram_string(&via_pyro)
            .unwrap()
            .to_telethon_string();

        assert_eq!(original, back);
    }

    #[test]
    fn test_telethon_drops_user_id() {
        let manager = sample().with_user_id(123456789);
        let string = manager.to_telethon_string();

        let parsed = SessionManager::from_telethon_string(&string).unwrap();
        assert_eq!(parsed.user_id(), None);
    }

    #[test]
    fn test_pyrogram_carries_user_id() {
        let manager = sample().with_user_id(123456789);
        let parsed = SessionManager::from_pyrogram_string(&manager.to_pyrogram_string()).unwrap();
        assert_eq!(parsed.user_id(), Some(123456789));
    }

    #[test]
    fn test_auth_key_hex() {
        assert_eq!(sample().auth_key_hex(), "42".repeat(AUTH_KEY_SIZE));
    }

    #[tokio::test]
    async fn test_resolve_user_id_cache_hit_stays_offline() {
        // A known id must be returned without touching the network; no live
        // server involved in this test, so reaching it would fail loudly
        let mut manager = sample().with_user_id(777000);
        assert_eq!(manager.resolve_user_id().await.unwrap(), 777000);
        assert_eq!(manager.resolve_user_id().await.unwrap(), 777000);
    }

    #[tokio::test]
    async fn test_to_tdata_folder_with_known_user_id_stays_offline() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("tdata");

        let mut manager = sample().with_user_id(123456789);
        manager.to_tdata_folder(&folder).await.unwrap();

        let parsed = SessionManager::from_tdata_folder(&folder).unwrap();
        assert_eq!(parsed.dc_id(), 2);
        assert_eq!(parsed.user_id(), Some(123456789));
        assert_eq!(parsed.auth_key(), &SAMPLE_KEY);
    }

    #[tokio::test]
    async fn test_file_format_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let tele_path = dir.path().join("tele.session");
        let pyro_path = dir.path().join("pyro.session");

        let manager = sample().with_user_id(42);
        manager.to_telethon_file(&tele_path).await.unwrap();
        manager.to_pyrogram_file(&pyro_path).await.unwrap();

        let from_tele = SessionManager::from_telethon_file(&tele_path).await.unwrap();
        let from_pyro = SessionManager::from_pyrogram_file(&pyro_path).await.unwrap();

        assert_eq!(from_tele.auth_key(), from_pyro.auth_key());
        assert_eq!(from_tele.dc_id(), from_pyro.dc_id());
        assert_eq!(from_tele.user_id(), None);
        assert_eq!(from_pyro.user_id(), Some(42));
    }

    #[test]
    fn test_validity_starts_unknown() {
        assert_eq!(sample().valid(), None);
    }
}
