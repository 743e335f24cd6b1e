//! Error types for tgconvert

use std::path::PathBuf;

/// Result type alias for tgconvert operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while converting or validating sessions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error while reading or writing session files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error from a Telethon/Pyrogram session file
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// Invalid base64 in a string session
    #[error("invalid base64 in session string: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The tdata folder path does not exist
    #[error("tdata folder not found: {path}")]
    FolderNotFound { path: PathBuf },

    /// Required file is missing from tdata folder
    #[error("required file not found: {file} in {folder}")]
    FileNotFound { file: String, folder: PathBuf },

    /// Failed to decrypt tdata - wrong passcode or corrupted data
    #[error("decryption failed: wrong passcode or corrupted data")]
    DecryptionFailed,

    /// MD5/SHA1 checksum mismatch in a tdata file
    #[error("checksum mismatch: data may be corrupted")]
    ChecksumMismatch,

    /// Unexpected end of data while parsing
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// Invalid data format or structure
    #[error("invalid data format: {message}")]
    InvalidFormat { message: String },

    /// Datacenter ID outside the known production set
    #[error("invalid datacenter id: {dc_id} (expected 1-5)")]
    InvalidDcId { dc_id: i32 },

    /// No accounts found in tdata
    #[error("no accounts found in tdata")]
    NoAccounts,

    /// Auth key extraction failed
    #[error("failed to extract auth key: {reason}")]
    AuthKeyExtractionFailed { reason: String },

    /// The live query found no identity: the session is dead or revoked
    #[error("session is invalid or revoked: Telegram returned no identity")]
    InvalidSession,

    /// Connection establishment failed (propagated from grammers)
    #[error(transparent)]
    Connect(#[from] grammers_mtsender::AuthorizationError),

    /// Transport/RPC failure during the live query (propagated from grammers)
    #[error(transparent)]
    Transport(#[from] grammers_mtsender::InvocationError),
}

impl Error {
    /// Create an invalid format error with a message
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: msg.into(),
        }
    }

    /// Create an auth key extraction error
    pub fn auth_key_failed(reason: impl Into<String>) -> Self {
        Self::AuthKeyExtractionFailed {
            reason: reason.into(),
        }
    }
}
