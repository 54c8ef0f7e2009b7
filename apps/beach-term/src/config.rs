use serde::{Deserialize, Deserializer};
use std::env;

const DEFAULT_FONT_SIZE: u16 = 14;

/// User settings consumed by terminal sessions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Right-click pastes straight into the session instead of opening the menu.
    #[serde(deserialize_with = "flag")]
    pub quick_paste: bool,
    pub font_size: u16,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Self {
        let quick_paste = env::var("BEACH_TERM_QUICK_PASTE")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let font_size = env::var("BEACH_TERM_FONT_SIZE")
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .filter(|size: &u16| *size > 0)
            .unwrap_or(DEFAULT_FONT_SIZE);
        Self {
            quick_paste,
            font_size,
        }
    }

    /// Parse the persisted settings document, e.g. `{"quickPaste":"1","fontSize":14}`.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            quick_paste: false,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

// Stored settings carry the flag as "1"/"0"; newer writers use booleans.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
        Number(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(value) => value,
        Raw::Text(value) => value.trim() == "1" || value.trim().eq_ignore_ascii_case("true"),
        Raw::Number(value) => value == 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    #[test]
    fn default_settings_disable_quick_paste() {
        let settings = Settings::default();
        assert!(!settings.quick_paste);
        assert_eq!(settings.font_size, 14);
    }

    #[test]
    fn parses_legacy_string_flag() {
        let settings = Settings::from_json(r#"{"quickPaste":"1","fontSize":16}"#).unwrap();
        assert!(settings.quick_paste);
        assert_eq!(settings.font_size, 16);

        let settings = Settings::from_json(r#"{"quickPaste":"0"}"#).unwrap();
        assert!(!settings.quick_paste);
        assert_eq!(settings.font_size, 14);
    }

    #[test]
    fn parses_boolean_flag_and_ignores_unknown_keys() {
        let settings =
            Settings::from_json(r#"{"quickPaste":true,"theme":"dark","fontSize":12}"#).unwrap();
        assert!(settings.quick_paste);
        assert_eq!(settings.font_size, 12);
    }

    #[test]
    fn from_env_reads_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe {
            env::set_var("BEACH_TERM_QUICK_PASTE", "1");
            env::set_var("BEACH_TERM_FONT_SIZE", "18");
        }
        let settings = Settings::from_env();
        assert!(settings.quick_paste);
        assert_eq!(settings.font_size, 18);

        unsafe {
            env::set_var("BEACH_TERM_FONT_SIZE", "0");
            env::remove_var("BEACH_TERM_QUICK_PASTE");
        }
        let settings = Settings::from_env();
        assert!(!settings.quick_paste);
        assert_eq!(settings.font_size, 14);

        unsafe {
            env::remove_var("BEACH_TERM_FONT_SIZE");
        }
    }
}
