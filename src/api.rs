//! API identities presented to Telegram when connecting
//!
//! Telegram ties a session to the application profile that created it, and
//! servers are more likely to flag a session that suddenly changes identity.
//! The presets below mirror the official clients' public credentials; the
//! desktop profile is the default because converted sessions most often end
//! up in (or come from) Telegram Desktop.

/// The application profile used when presenting a session to Telegram
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiIdentity {
    /// Application identifier issued by my.telegram.org
    pub api_id: i32,
    /// Application secret paired with `api_id`
    pub api_hash: String,
    /// Declared hardware model
    pub device_model: String,
    /// Declared operating system version
    pub system_version: String,
    /// Declared application version
    pub app_version: String,
    /// User interface language
    pub lang_code: String,
    /// Operating system language
    pub system_lang_code: String,
}

impl ApiIdentity {
    /// Official Telegram Desktop profile
    pub fn telegram_desktop() -> Self {
        Self {
            api_id: 2040,
            api_hash: "b18441a1ff607e10a989891a5462e627".to_string(),
            device_model: "Desktop".to_string(),
            system_version: "Windows 10".to_string(),
            app_version: "4.1.4 x64".to_string(),
            lang_code: "en".to_string(),
            system_lang_code: "en-US".to_string(),
        }
    }

    /// Official Telegram Android profile
    pub fn telegram_android() -> Self {
        Self {
            api_id: 6,
            api_hash: "eb06d4abfb49dc3eeb1aeb98ae0f581e".to_string(),
            device_model: "Samsung SM-G998B".to_string(),
            system_version: "SDK 31".to_string(),
            app_version: "8.4.1 (2522)".to_string(),
            lang_code: "en".to_string(),
            system_lang_code: "en-US".to_string(),
        }
    }

    /// Official Telegram iOS profile
    pub fn telegram_ios() -> Self {
        Self {
            api_id: 10840,
            api_hash: "33c45224029d59cb3ad0c16134215aeb".to_string(),
            device_model: "iPhone 13 Pro Max".to_string(),
            system_version: "14.8.1".to_string(),
            app_version: "8.4".to_string(),
            lang_code: "en".to_string(),
            system_lang_code: "en-US".to_string(),
        }
    }
}

impl Default for ApiIdentity {
    fn default() -> Self {
        Self::telegram_desktop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_desktop() {
        assert_eq!(ApiIdentity::default(), ApiIdentity::telegram_desktop());
    }

    #[test]
    fn test_presets_differ() {
        assert_ne!(
            ApiIdentity::telegram_desktop().api_id,
            ApiIdentity::telegram_android().api_id
        );
    }
}
