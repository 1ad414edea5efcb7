use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub debug: bool,
    pub auth_token: String,
    pub admin_user: String,
    pub enable_swagger: bool,
    pub port: u16,
    pub timezone: String,
    pub snapshot_path: String,
    pub pokedex_cache_path: String,
    pub hide_deleted_in_public: bool,
    pub modified_window_days: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_AUTH_TOKEN -> auth_token; nested keys use a double underscore
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("database_url", "sqlite://data/pfa.db")?
            .set_default("database_max_connections", 5)?
            .set_default("debug", false)?
            .set_default("auth_token", "default-token-change-me")?
            .set_default("admin_user", "admin")?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("timezone", "UTC")?
            .set_default("snapshot_path", "logs/schedule_snapshot.json")?
            .set_default("pokedex_cache_path", "pokedex/cache/pokemon.json")?
            .set_default("hide_deleted_in_public", false)?
            .set_default("modified_window_days", 7)?
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.tz()?;
        Ok(settings)
    }

    /// Timezone used to decide which weekday "today" is.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::Message(format!("unknown timezone: {}", self.timezone)))
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    // SAFETY: serialized so no other test reads the environment concurrently.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.admin_user, "admin");
        assert_eq!(settings.modified_window_days, 7);
        assert!(!settings.hide_deleted_in_public);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        set_env("APP_AUTH_TOKEN", "from-env");
        set_env("APP_PORT", "9100");
        set_env("APP_TIMEZONE", "Europe/Warsaw");
        let settings = Settings::from_env().unwrap();
        remove_env("APP_AUTH_TOKEN");
        remove_env("APP_PORT");
        remove_env("APP_TIMEZONE");

        assert_eq!(settings.auth_token, "from-env");
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.tz().unwrap(), chrono_tz::Europe::Warsaw);
    }

    #[test]
    #[serial]
    fn test_rejects_unknown_timezone() {
        set_env("APP_TIMEZONE", "Mars/Olympus");
        let result = Settings::from_env();
        remove_env("APP_TIMEZONE");
        assert!(result.is_err());
    }
}
