//! Telegram Desktop tdata adapter
//!
//! Parses the accounts stored in a tdata folder (optionally protected with a
//! Local Passcode) and writes fresh single-account folders that Telegram
//! Desktop can load directly.

use std::fs;
use std::path::{Path, PathBuf};

use crate::crypto::{generate_salt, AuthKey};
use crate::storage::{
    decrypt_key_data, get_absolute_path, read_key_data, read_mtp_data, write_key_data,
    write_mtp_data, KeyInfo, MtpData,
};
use crate::{Error, Result, AUTH_KEY_SIZE, DEFAULT_KEY_FILE};

/// A single account extracted from (or destined for) a tdata folder
#[derive(Debug, Clone)]
pub struct TDataSession {
    pub dc_id: i32,
    pub auth_key: [u8; AUTH_KEY_SIZE],
    pub user_id: i64,
}

impl TDataSession {
    /// Read the main account from a tdata folder
    pub fn from_folder(path: impl AsRef<Path>) -> Result<Self> {
        Self::accounts_from_folder(path, None)?
            .into_iter()
            .next()
            .ok_or(Error::NoAccounts)
    }

    /// Read the main account from a passcode-protected tdata folder
    pub fn from_folder_with_passcode(path: impl AsRef<Path>, passcode: &str) -> Result<Self> {
        Self::accounts_from_folder(path, Some(passcode))?
            .into_iter()
            .next()
            .ok_or(Error::NoAccounts)
    }

    /// Read every account stored in a tdata folder
    pub fn accounts_from_folder(
        path: impl AsRef<Path>,
        passcode: Option<&str>,
    ) -> Result<Vec<Self>> {
        let base_path = get_absolute_path(path.as_ref().to_str().unwrap_or(""));

        if !base_path.exists() {
            return Err(Error::FolderNotFound {
                path: base_path.clone(),
            });
        }

        let passcode = passcode.unwrap_or("");
        let key_data = read_key_data(&base_path, DEFAULT_KEY_FILE)?;

        let KeyInfo {
            local_key,
            account_indices,
        } = decrypt_key_data(&key_data, passcode.as_bytes())?;

        tracing::info!("Loaded key data: {} accounts found", account_indices.len());

        let mut accounts = Vec::new();
        for index in account_indices {
            match read_mtp_data(&base_path, index, &local_key, DEFAULT_KEY_FILE) {
                Ok(mtp) => {
                    tracing::info!(
                        "Loaded account {}: dc_id={}, user_id={}",
                        index,
                        mtp.dc_id,
                        mtp.user_id
                    );
                    crate::dc::validate(mtp.dc_id)?;
                    accounts.push(Self {
                        dc_id: mtp.dc_id,
                        auth_key: mtp.auth_key,
                        user_id: mtp.user_id,
                    });
                }
                Err(e) => {
                    tracing::warn!("Failed to load account {}: {}", index, e);
                }
            }
        }

        if accounts.is_empty() {
            return Err(Error::NoAccounts);
        }

        Ok(accounts)
    }

    /// Write a fresh single-account tdata folder
    ///
    /// A new local key is generated (no passcode), the key_data and MTP
    /// authorization files are assembled in a temporary directory, and the
    /// directory is renamed into place only once everything is on disk. The
    /// target path must not already exist.
    pub fn to_folder(&self, path: impl AsRef<Path>) -> Result<()> {
        let target: PathBuf = path.as_ref().to_path_buf();

        if target.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("output folder already exists: {}", target.display()),
            )));
        }

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Build in a sibling temp dir so the final rename stays on one
        // filesystem and the target never appears half-written
        let staging = tempfile::TempDir::new_in(&parent)?;

        let salt = generate_salt();
        let local_key = AuthKey::generate();

        write_key_data(staging.path(), DEFAULT_KEY_FILE, &salt, &local_key, b"", &[0])?;

        let mtp = MtpData {
            dc_id: self.dc_id,
            user_id: self.user_id,
            auth_key: self.auth_key,
        };
        write_mtp_data(staging.path(), 0, &local_key, DEFAULT_KEY_FILE, &mtp)?;

        fs::rename(staging.path(), &target)?;
        // Staging dir is gone after the rename; dropping the TempDir is a
        // no-op then, and cleans up if the rename failed
        drop(staging);

        tracing::info!("Wrote tdata folder: {:?}", target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TDataSession {
        TDataSession {
            dc_id: 2,
            auth_key: [0xAB; AUTH_KEY_SIZE],
            user_id: 123456789,
        }
    }

    #[test]
    fn test_folder_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("tdata");

        let session = sample();
        session.to_folder(&folder).unwrap();

        // The well-known main account file must exist alongside key_data
        assert!(folder.join("key_data").is_file());
        assert!(folder.join("D877F783D5D3EF8C").is_file());

        let parsed = TDataSession::from_folder(&folder).unwrap();
        assert_eq!(parsed.dc_id, session.dc_id);
        assert_eq!(parsed.auth_key, session.auth_key);
        assert_eq!(parsed.user_id, session.user_id);
    }

    #[test]
    fn test_to_folder_refuses_existing() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("tdata");
        fs::create_dir(&folder).unwrap();

        assert!(sample().to_folder(&folder).is_err());
    }

    #[test]
    fn test_from_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let result = TDataSession::from_folder(dir.path().join("nope"));
        assert!(matches!(result, Err(Error::FolderNotFound { .. })));
    }

    #[test]
    fn test_accounts_list() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("tdata");
        sample().to_folder(&folder).unwrap();

        let accounts = TDataSession::accounts_from_folder(&folder, None).unwrap();
        assert_eq!(accounts.len(), 1);
    }
}
