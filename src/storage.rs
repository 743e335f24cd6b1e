//! Storage utilities for tdata files
//!
//! Handles reading and writing of key files and per-account MTP
//! authorization data in Telegram Desktop's TDF$ container format.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::crypto::{create_local_key, decrypt_local, encrypt_local, AuthKey};
use crate::qdatastream::{QDataStream, QDataStreamWriter};
use crate::{Error, Result, AUTH_KEY_SIZE, MAX_ACCOUNTS};

/// Magic bytes at the start of tdata files
const TDATA_MAGIC: [u8; 4] = [0x54, 0x44, 0x46, 0x24]; // "TDF$"

/// App version stamped into files we write (4.1.4, matching the default
/// desktop API identity)
pub const TDATA_VERSION: u32 = 4_001_004;

/// dbi block id for MTP authorization data
const DBI_MTP_AUTHORIZATION: i32 = 0x4B;

/// Special tag for wide (64-bit) user IDs
const K_WIDE_IDS_TAG: i64 = !0i64; // All bits set = -1

/// File descriptor for reading tdata files
#[derive(Debug)]
pub struct FileDescriptor {
    pub version: u32,
    pub data: Vec<u8>,
}

/// Read a tdata file
pub fn read_file(name: &str, base_path: &Path) -> Result<FileDescriptor> {
    let path = base_path.join(name);
    let path_s = base_path.join(format!("{}s", name));

    tracing::debug!("Trying to read file: {:?}", path);

    // Try main file first, then backup (s suffix)
    // Use is_file() to skip directories
    let file_data = if path.is_file() {
        fs::read(&path)?
    } else if path_s.is_file() {
        fs::read(&path_s)?
    } else {
        return Err(Error::FileNotFound {
            file: name.to_string(),
            folder: base_path.to_path_buf(),
        });
    };

    tracing::debug!("Read {} bytes", file_data.len());
    parse_file_descriptor(&file_data)
}

/// Parse a file descriptor from raw bytes
///
/// File format:
/// - bytes[0..4]: magic "TDF$"
/// - bytes[4..8]: version (little endian)
/// - bytes[8..len-16]: data payload
/// - bytes[len-16..len]: MD5 checksum of (data + dataSize + version + magic)
fn parse_file_descriptor(data: &[u8]) -> Result<FileDescriptor> {
    if data.len() < 8 + 16 {
        return Err(Error::invalid_format("file too short"));
    }

    // Check magic
    if data[0..4] != TDATA_MAGIC {
        return Err(Error::invalid_format("invalid file magic"));
    }

    // Read version (little endian)
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);

    // Data is between header and MD5
    let data_size = data.len() - 8 - 16;
    let payload = &data[8..8 + data_size];
    let file_md5 = &data[data.len() - 16..];

    let computed_md5 = file_checksum(payload, version);

    if file_md5 != computed_md5 {
        return Err(Error::ChecksumMismatch);
    }

    Ok(FileDescriptor {
        version,
        data: payload.to_vec(),
    })
}

/// Write a tdata file in TDF$ container format
///
/// The bytes land in a temporary file first and are renamed into place, so
/// a failure can never leave a truncated file behind.
pub fn write_file(name: &str, base_path: &Path, version: u32, payload: &[u8]) -> Result<()> {
    let mut bytes = Vec::with_capacity(8 + payload.len() + 16);
    bytes.extend_from_slice(&TDATA_MAGIC);
    bytes.extend_from_slice(&version.to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&file_checksum(payload, version));

    let mut tmp = tempfile::NamedTempFile::new_in(base_path)?;
    tmp.write_all(&bytes)?;
    tmp.persist(base_path.join(name)).map_err(|e| e.error)?;

    tracing::debug!("Wrote {} ({} bytes)", name, bytes.len());
    Ok(())
}

/// MD5 trailer over (data + dataSize + version + magic)
fn file_checksum(payload: &[u8], version: u32) -> [u8; 16] {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(payload);
    hasher.update((payload.len() as u32).to_le_bytes());
    hasher.update(version.to_le_bytes());
    hasher.update(TDATA_MAGIC);
    hasher.finalize().into()
}

/// Key data parsed from key_data file
#[derive(Debug)]
pub struct KeyData {
    pub salt: Vec<u8>,
    pub key_encrypted: Vec<u8>,
    pub info_encrypted: Vec<u8>,
    pub version: u32,
}

/// Parse the key_data file
pub fn read_key_data(base_path: &Path, key_file: &str) -> Result<KeyData> {
    let name = format!("key_{}", key_file);
    let file = read_file(&name, base_path)?;

    let mut stream = QDataStream::new(&file.data);

    let salt = stream.read_qbytearray()?;
    let key_encrypted = stream.read_qbytearray()?;
    let info_encrypted = stream.read_qbytearray()?;

    Ok(KeyData {
        salt,
        key_encrypted,
        info_encrypted,
        version: file.version,
    })
}

/// Write the key_data file for a freshly generated local key
///
/// Layout mirrors what Telegram Desktop writes on first run: the salt, the
/// local key encrypted with the passcode key, and the account index list
/// encrypted with the local key.
pub fn write_key_data(
    base_path: &Path,
    key_file: &str,
    salt: &[u8],
    local_key: &AuthKey,
    passcode: &[u8],
    account_indices: &[i32],
) -> Result<()> {
    let passcode_key = create_local_key(salt, passcode);
    let key_encrypted = encrypt_local(local_key.as_bytes(), &passcode_key);

    let mut info = QDataStreamWriter::new();
    info.write_i32(account_indices.len() as i32);
    for index in account_indices {
        info.write_i32(*index);
    }
    let info_encrypted = encrypt_local(&info.into_bytes(), local_key);

    let mut payload = QDataStreamWriter::new();
    payload.write_qbytearray(salt);
    payload.write_qbytearray(&key_encrypted);
    payload.write_qbytearray(&info_encrypted);

    let name = format!("key_{}", key_file);
    write_file(&name, base_path, TDATA_VERSION, &payload.into_bytes())
}

/// Decrypted key info containing account indices
#[derive(Debug)]
pub struct KeyInfo {
    pub local_key: AuthKey,
    pub account_indices: Vec<i32>,
}

/// Decrypt the key data
pub fn decrypt_key_data(key_data: &KeyData, passcode: &[u8]) -> Result<KeyInfo> {
    // Create passcode key from salt
    let passcode_key = create_local_key(&key_data.salt, passcode);

    // Decrypt the key_encrypted to get the local key
    let decrypted_key = decrypt_local(&key_data.key_encrypted, &passcode_key)?;

    if decrypted_key.len() < AUTH_KEY_SIZE {
        return Err(Error::invalid_format(format!(
            "decrypted key too short: {} bytes",
            decrypted_key.len()
        )));
    }

    let local_key = AuthKey::from_bytes(&decrypted_key[..AUTH_KEY_SIZE])?;

    // Decrypt info to get account indices
    let decrypted_info = decrypt_local(&key_data.info_encrypted, &local_key)?;
    let mut info_stream = QDataStream::new(&decrypted_info);

    let count = info_stream.read_i32()?;

    if count <= 0 || count > MAX_ACCOUNTS as i32 {
        return Err(Error::invalid_format(format!(
            "invalid account count: {}",
            count
        )));
    }

    let mut account_indices = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let index = info_stream.read_i32()?;
        if index >= 0 && index < MAX_ACCOUNTS as i32 {
            account_indices.push(index);
        }
    }

    Ok(KeyInfo {
        local_key,
        account_indices,
    })
}

/// MTP authorization data
#[derive(Debug)]
pub struct MtpData {
    pub dc_id: i32,
    pub user_id: i64,
    pub auth_key: [u8; AUTH_KEY_SIZE],
}

/// Read MTP data file (contains the actual auth key)
///
/// The MTP data is stored in a file named by ToFilePart(ComputeDataNameKey(keyFile))
/// where keyFile is like "data" or "data#2" for multi-account
pub fn read_mtp_data(
    base_path: &Path,
    index: i32,
    local_key: &AuthKey,
    key_file: &str,
) -> Result<MtpData> {
    let file_name = mtp_data_file_name(key_file, index);

    tracing::debug!("Looking for MTP data in file: {}", file_name);

    // Read the encrypted file
    let file = read_file(&file_name, base_path)?;

    // The file contains a QByteArray which is the encrypted data
    let mut stream = QDataStream::new(&file.data);
    let encrypted = stream.read_qbytearray()?;

    // Decrypt
    let decrypted = decrypt_local(&encrypted, local_key)?;

    // Parse the decrypted MTP data
    parse_mtp_authorization(&decrypted)
}

/// Write the MTP authorization file for one account
pub fn write_mtp_data(
    base_path: &Path,
    index: i32,
    local_key: &AuthKey,
    key_file: &str,
    mtp: &MtpData,
) -> Result<()> {
    let serialized = serialize_mtp_authorization(mtp);
    let encrypted = encrypt_local(&serialized, local_key);

    let mut payload = QDataStreamWriter::new();
    payload.write_qbytearray(&encrypted);

    let file_name = mtp_data_file_name(key_file, index);
    write_file(&file_name, base_path, TDATA_VERSION, &payload.into_bytes())
}

/// File name holding the MTP data for an account index
fn mtp_data_file_name(key_file: &str, index: i32) -> String {
    let data_name = compose_data_string(key_file, index);
    to_file_part(compute_data_name_key(&data_name))
}

/// Compose data string: "data" for index 0, "data#2" for index 1, etc.
fn compose_data_string(key_file: &str, index: i32) -> String {
    let base = key_file.replace('#', "");
    if index > 0 {
        format!("{}#{}", base, index + 1)
    } else {
        base
    }
}

/// Compute data name key from key file name using MD5
fn compute_data_name_key(data_name: &str) -> u64 {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(data_name.as_bytes());
    let result: [u8; 16] = hasher.finalize().into();

    // Take lower 64 bits (little endian)
    u64::from_le_bytes([
        result[0], result[1], result[2], result[3], result[4], result[5], result[6], result[7],
    ])
}

/// Convert a FileKey (u64) to a 16-character hex file name
fn to_file_part(val: u64) -> String {
    let mut result = String::with_capacity(16);
    let mut v = val;

    for _ in 0..16 {
        let nibble = (v & 0x0F) as u8;
        let c = if nibble < 0x0A {
            (b'0' + nibble) as char
        } else {
            (b'A' + (nibble - 0x0A)) as char
        };
        result.push(c);
        v >>= 4;
    }

    result
}

/// Parse MTP authorization data from decrypted bytes
///
/// Format:
/// - int32: block_id (must be 0x4B = dbi.MtpAuthorization)
/// - QByteArray: serialized authorization data
///
/// Serialized format:
/// - int32: userId (or kWideIdsTag for new format)
/// - int32: mainDcId (or if kWideIdsTag: int64 userId, int32 mainDcId)
/// - int32: keysCount
/// - for each key:
///   - int32: dcId
///   - bytes[256]: authKey
/// - int32: keysToDestroyCount
/// - ...
fn parse_mtp_authorization(data: &[u8]) -> Result<MtpData> {
    let mut stream = QDataStream::new(data);

    // Read block ID
    let block_id = stream.read_i32()?;

    if block_id != DBI_MTP_AUTHORIZATION {
        return Err(Error::invalid_format(format!(
            "expected MtpAuthorization block (0x4B), got 0x{:02X}",
            block_id
        )));
    }

    // Read the serialized QByteArray
    let serialized = stream.read_qbytearray()?;
    let mut auth_stream = QDataStream::new(&serialized);

    // Read user ID and DC ID
    let first_int = auth_stream.read_i32()?;
    let second_int = auth_stream.read_i32()?;

    // Check for kWideIdsTag (new format with 64-bit user ID)
    let combined = ((first_int as i64) << 32) | (second_int as u32 as i64);

    let (user_id, main_dc_id) = if combined == K_WIDE_IDS_TAG {
        // New format: next is int64 userId, then int32 mainDcId
        let uid = auth_stream.read_i64()?;
        let dc = auth_stream.read_i32()?;
        (uid, dc)
    } else {
        // Old format: first_int is userId, second_int is mainDcId
        (first_int as i64, second_int)
    };

    tracing::debug!("MTP auth: user_id={}, main_dc_id={}", user_id, main_dc_id);

    // Read keys count
    let keys_count = auth_stream.read_i32()?;

    if keys_count < 0 || keys_count > 10 {
        return Err(Error::invalid_format(format!(
            "invalid keys count: {}",
            keys_count
        )));
    }

    // Read auth keys
    let mut auth_key: Option<[u8; AUTH_KEY_SIZE]> = None;

    for _ in 0..keys_count {
        let dc_id = auth_stream.read_i32()?;
        let key_bytes = auth_stream.read_raw(AUTH_KEY_SIZE)?;

        tracing::debug!("Found key for DC {}", dc_id);

        if dc_id == main_dc_id {
            let mut key = [0u8; AUTH_KEY_SIZE];
            key.copy_from_slice(&key_bytes);
            auth_key = Some(key);
        }
    }

    let auth_key = auth_key.ok_or_else(|| {
        Error::auth_key_failed(format!("no auth key found for main DC {}", main_dc_id))
    })?;

    Ok(MtpData {
        dc_id: main_dc_id,
        user_id,
        auth_key,
    })
}

/// Serialize MTP authorization data in the wide (64-bit user id) layout
fn serialize_mtp_authorization(mtp: &MtpData) -> Vec<u8> {
    let mut auth = QDataStreamWriter::new();
    auth.write_i64(K_WIDE_IDS_TAG);
    auth.write_i64(mtp.user_id);
    auth.write_i32(mtp.dc_id);

    // One key, bound to the main DC
    auth.write_i32(1);
    auth.write_i32(mtp.dc_id);
    auth.write_raw(&mtp.auth_key);

    // keysToDestroyCount
    auth.write_i32(0);

    let mut block = QDataStreamWriter::new();
    block.write_i32(DBI_MTP_AUTHORIZATION);
    block.write_qbytearray(&auth.into_bytes());
    block.into_bytes()
}

/// Get the absolute path, expanding ~ if needed
pub fn get_absolute_path(path: &str) -> PathBuf {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(&path[2..]);
        }
    }
    PathBuf::from(path)
}

/// Get default tdata path for the current OS
pub fn get_default_tdata_path() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        dirs::home_dir().map(|h| h.join(".local/share/TelegramDesktop/tdata"))
    }

    #[cfg(target_os = "macos")]
    {
        dirs::home_dir().map(|h| h.join("Library/Application Support/Telegram Desktop/tdata"))
    }

    #[cfg(target_os = "windows")]
    {
        dirs::data_local_dir().map(|d| d.join("Telegram Desktop/tdata"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let payload = vec![0x10, 0x20, 0x30, 0x40, 0x50];

        write_file("key_data", dir.path(), TDATA_VERSION, &payload).unwrap();

        let file = read_file("key_data", dir.path()).unwrap();
        assert_eq!(file.version, TDATA_VERSION);
        assert_eq!(file.data, payload);
    }

    #[test]
    fn test_file_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        write_file("data", dir.path(), TDATA_VERSION, &[1, 2, 3, 4]).unwrap();

        let path = dir.path().join("data");
        let mut bytes = fs::read(&path).unwrap();
        bytes[9] ^= 0xFF;
        fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            read_file("data", dir.path()),
            Err(Error::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_file("nope", dir.path()),
            Err(Error::FileNotFound { .. })
        ));
    }

    #[test]
    fn test_key_data_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let salt = crate::crypto::generate_salt();
        let local_key = AuthKey::generate();

        write_key_data(dir.path(), "data", &salt, &local_key, b"", &[0]).unwrap();

        let key_data = read_key_data(dir.path(), "data").unwrap();
        let info = decrypt_key_data(&key_data, b"").unwrap();
        assert_eq!(info.local_key.as_bytes(), local_key.as_bytes());
        assert_eq!(info.account_indices, vec![0]);
    }

    #[test]
    fn test_key_data_wrong_passcode() {
        let dir = tempfile::tempdir().unwrap();
        let salt = crate::crypto::generate_salt();
        let local_key = AuthKey::generate();

        write_key_data(dir.path(), "data", &salt, &local_key, b"secret", &[0]).unwrap();

        let key_data = read_key_data(dir.path(), "data").unwrap();
        assert!(decrypt_key_data(&key_data, b"wrong").is_err());
        assert!(decrypt_key_data(&key_data, b"secret").is_ok());
    }

    #[test]
    fn test_mtp_data_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let local_key = AuthKey::generate();
        let mtp = MtpData {
            dc_id: 2,
            user_id: 123456789,
            auth_key: [0xAB; AUTH_KEY_SIZE],
        };

        write_mtp_data(dir.path(), 0, &local_key, "data", &mtp).unwrap();

        let parsed = read_mtp_data(dir.path(), 0, &local_key, "data").unwrap();
        assert_eq!(parsed.dc_id, 2);
        assert_eq!(parsed.user_id, 123456789);
        assert_eq!(parsed.auth_key, mtp.auth_key);
    }

    #[test]
    fn test_compose_data_string() {
        assert_eq!(compose_data_string("data", 0), "data");
        assert_eq!(compose_data_string("data", 1), "data#2");
        assert_eq!(compose_data_string("data", 2), "data#3");
    }

    #[test]
    fn test_main_account_file_name() {
        // MD5("data") lower half, hex-reversed: the well-known main account file
        assert_eq!(mtp_data_file_name("data", 0), "D877F783D5D3EF8C");
    }
}
