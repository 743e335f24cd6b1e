//! # tgconvert
//!
//! A pure Rust library for converting Telegram account sessions between the
//! three storage formats in common use:
//!
//! - **Telethon** string sessions and SQLite session files
//! - **Pyrogram** string sessions and SQLite session files
//! - **Telegram Desktop** `tdata` folders
//!
//! All formats store the same credential: a datacenter ID and a 256-byte
//! authorization key (Pyrogram and tdata also record the account's user ID).
//! Conversion is lossless for the fields a target format can carry.
//!
//! A session can optionally be validated against Telegram's servers through
//! [grammers](https://github.com/Lonami/grammers); that is the only networking
//! this crate performs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tgconvert::SessionManager;
//!
//! fn main() -> Result<(), tgconvert::Error> {
//!     // Load from a Telethon string session...
//!     let session = SessionManager::from_telethon_string("1BVtsOK4Bu...")?;
//!     println!("DC ID: {}", session.dc_id());
//!
//!     // ...and emit the equivalent Pyrogram string session.
//!     println!("{}", session.to_pyrogram_string());
//!     Ok(())
//! }
//! ```

mod api;
mod client;
mod crypto;
mod dc;
mod error;
mod pyrogram;
mod qdatastream;
mod session;
mod storage;
mod tdata;
mod telethon;

pub use api::ApiIdentity;
pub use error::{Error, Result};
pub use pyrogram::PyroSession;
pub use session::SessionManager;
pub use storage::get_default_tdata_path;
pub use tdata::TDataSession;
pub use telethon::TeleSession;

/// Auth key size in bytes (256 bytes = 2048 bits)
pub const AUTH_KEY_SIZE: usize = 256;

/// Default key file name used by Telegram Desktop
pub const DEFAULT_KEY_FILE: &str = "data";

/// Maximum number of accounts supported by Telegram Desktop
pub const MAX_ACCOUNTS: usize = 3;
