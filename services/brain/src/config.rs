use crate::channel::DEFAULT_TIMEOUT;
use crate::session::SessionSettings;
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Defines the supported backends for hint generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HintProvider {
    OpenAI,
    Gemini,
    /// Offline canned hints; needs no API key.
    Canned,
}

/// Holds all brain configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub listener_url: String,
    pub channel_timeout: Duration,
    pub users_path: PathBuf,
    pub puzzles_path: PathBuf,
    pub analytics_path: PathBuf,
    pub puzzle_ids: Vec<String>,
    /// Words accepted as usernames at login; `None` means every known user.
    pub login_vocabulary: Option<Vec<String>>,
    pub hint_provider: HintProvider,
    pub openai_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub hint_model: String,
    pub max_tokens_for_hint: u32,
    pub max_login_attempts: u32,
    pub max_reprompts: u32,
    pub pin_length: usize,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    var_or(name, default)
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let listener_url = var_or("LISTENER_URL", "ws://127.0.0.1:5555/ws");
        if !(listener_url.starts_with("ws://") || listener_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "LISTENER_URL".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", listener_url),
            ));
        }

        let default_timeout_ms = DEFAULT_TIMEOUT.as_millis().to_string();
        let channel_timeout = Duration::from_millis(parse_var("CHANNEL_TIMEOUT_MS", &default_timeout_ms)?);

        let users_path = PathBuf::from(var_or("USERS_PATH", "./data/users.json"));
        let puzzles_path = PathBuf::from(var_or("PUZZLES_PATH", "./data/puzzles.json"));
        let analytics_path = PathBuf::from(var_or("ANALYTICS_PATH", "./data/usage_analytics.jsonl"));

        let puzzle_ids = list_var("PUZZLE_IDS", "puzzle_01,puzzle_02,puzzle_03");
        if puzzle_ids.is_empty() {
            return Err(ConfigError::InvalidValue(
                "PUZZLE_IDS".to_string(),
                "at least one puzzle id is required".to_string(),
            ));
        }
        let login_vocabulary = Some(list_var("LOGIN_VOCABULARY", "")).filter(|words| !words.is_empty());

        let provider_str = var_or("HINT_PROVIDER", "openai");
        let hint_provider = match provider_str.to_lowercase().as_str() {
            "openai" => HintProvider::OpenAI,
            "gemini" => HintProvider::Gemini,
            "canned" => HintProvider::Canned,
            _ => {
                return Err(ConfigError::InvalidValue(
                    "HINT_PROVIDER".to_string(),
                    format!("'{}' is not one of openai, gemini, canned", provider_str),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY").ok().map(SecretString::from);
        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok().map(SecretString::from);

        match hint_provider {
            HintProvider::OpenAI if openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for 'openai' provider".to_string(),
                ));
            }
            HintProvider::Gemini if gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for 'gemini' provider".to_string(),
                ));
            }
            _ => {}
        }

        let hint_model = var_or("HINT_MODEL", "gpt-4o-mini");
        let max_tokens_for_hint = parse_var("MAX_TOKENS_FOR_HINT", "150")?;

        let max_login_attempts: u32 = parse_var("MAX_LOGIN_ATTEMPTS", "2")?;
        if max_login_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_LOGIN_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let max_reprompts = parse_var("MAX_REPROMPTS", "5")?;
        let pin_length = parse_var("PIN_LENGTH", "4")?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            listener_url,
            channel_timeout,
            users_path,
            puzzles_path,
            analytics_path,
            puzzle_ids,
            login_vocabulary,
            hint_provider,
            openai_api_key,
            gemini_api_key,
            hint_model,
            max_tokens_for_hint,
            max_login_attempts,
            max_reprompts,
            pin_length,
            log_level,
        })
    }

    /// The session parameters derived from this configuration. Without an
    /// explicit login vocabulary the robot listens for `usernames`.
    pub fn session_settings(&self, usernames: Vec<String>) -> SessionSettings {
        SessionSettings {
            puzzle_ids: self.puzzle_ids.clone(),
            login_vocabulary: self.login_vocabulary.clone().unwrap_or(usernames),
            pin_length: self.pin_length,
            max_login_attempts: self.max_login_attempts,
            max_reprompts: self.max_reprompts,
            ..SessionSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 16] = [
        "LISTENER_URL",
        "CHANNEL_TIMEOUT_MS",
        "USERS_PATH",
        "PUZZLES_PATH",
        "ANALYTICS_PATH",
        "PUZZLE_IDS",
        "LOGIN_VOCABULARY",
        "HINT_PROVIDER",
        "OPENAI_API_KEY",
        "GEMINI_API_KEY",
        "HINT_MODEL",
        "MAX_TOKENS_FOR_HINT",
        "MAX_LOGIN_ATTEMPTS",
        "MAX_REPROMPTS",
        "PIN_LENGTH",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        unsafe {
            for var in VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal_openai() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-openai-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.listener_url, "ws://127.0.0.1:5555/ws");
        assert_eq!(config.channel_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.users_path, PathBuf::from("./data/users.json"));
        assert_eq!(config.puzzle_ids, vec!["puzzle_01", "puzzle_02", "puzzle_03"]);
        assert!(config.login_vocabulary.is_none());
        assert_eq!(config.hint_provider, HintProvider::OpenAI);
        assert_eq!(
            config.openai_api_key.as_ref().map(|k| k.expose_secret().to_string()),
            Some("test-openai-key".to_string())
        );
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.hint_model, "gpt-4o-mini");
        assert_eq!(config.max_tokens_for_hint, 150);
        assert_eq!(config.max_login_attempts, 2);
        assert_eq!(config.max_reprompts, 5);
        assert_eq!(config.pin_length, 4);
        assert_eq!(config.log_level, Level::INFO);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_canned_provider_needs_no_key() {
        clear_env_vars();
        unsafe {
            env::set_var("HINT_PROVIDER", "Canned");
            env::set_var("PUZZLE_IDS", "p1, p2");
            env::set_var("CHANNEL_TIMEOUT_MS", "250");
            env::set_var("PIN_LENGTH", "0");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.hint_provider, HintProvider::Canned);
        assert_eq!(config.puzzle_ids, vec!["p1", "p2"]);
        assert_eq!(config.channel_timeout, Duration::from_millis(250));

        let settings = config.session_settings(vec!["Mia".to_string()]);
        assert_eq!(settings.puzzle_ids, vec!["p1", "p2"]);
        assert_eq!(settings.login_vocabulary, vec!["Mia"]);
        assert_eq!(settings.pin_length, 0);
        assert_eq!(settings.max_login_attempts, 2);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_login_vocabulary_overrides_usernames() {
        clear_env_vars();
        unsafe {
            env::set_var("HINT_PROVIDER", "canned");
            env::set_var("LOGIN_VOCABULARY", "Alex, Sam");
        }

        let config = Config::from_env().expect("Config should load successfully");
        assert_eq!(config.login_vocabulary, Some(vec!["Alex".to_string(), "Sam".to_string()]));

        let settings = config.session_settings(vec!["Alex".to_string(), "DrEvans".to_string()]);
        assert_eq!(settings.login_vocabulary, vec!["Alex", "Sam"]);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();
        unsafe {
            env::set_var("HINT_PROVIDER", "gemini");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => assert!(msg.contains("GEMINI_API_KEY")),
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        let cases = [
            ("LISTENER_URL", "http://localhost:5555"),
            ("CHANNEL_TIMEOUT_MS", "soon"),
            ("HINT_PROVIDER", "llama"),
            ("MAX_LOGIN_ATTEMPTS", "0"),
            ("MAX_REPROMPTS", "-1"),
            ("PUZZLE_IDS", " , "),
            ("RUST_LOG", "not-a-level"),
        ];
        for (var, value) in cases {
            clear_env_vars();
            unsafe {
                env::set_var("HINT_PROVIDER", "canned");
                env::set_var(var, value);
            }
            match Config::from_env() {
                Err(ConfigError::InvalidValue(name, _)) => assert_eq!(name, var),
                other => panic!("Expected InvalidValue for {}, got {:?}", var, other.map(|_| ())),
            }
        }
        clear_env_vars();
    }
}
