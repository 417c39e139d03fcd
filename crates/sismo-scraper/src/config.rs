//! Configuration loading and resolution.
//!
//! Sources, lowest priority first: built-in defaults, a TOML file, then
//! `SISMO_*` environment variables. The CLI applies its own flags last.

use crate::error::ConfigError;
use crate::fetch::http_client::header_value;
use crate::fetch::StrategyKind;
use crate::sink::PersistMode;
use crate::store::sqlite::validate_table_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_SOURCE_URL: &str = "https://ultimosismo.igp.gob.pe/ultimo-sismo/sismos-reportados";
pub const DEFAULT_API_URL: &str = "https://ultimosismo.igp.gob.pe/api/ultimo-sismo/ajaxb/{year}";
pub const DEFAULT_TABLE_NAME: &str = "TablaSismosIGP";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const CONFIG_FILE_NAME: &str = "sismo-scraper.toml";

/// Everything the pipeline needs, passed in at construction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Page carrying the seismic report table.
    pub source_url: String,
    /// JSON endpoint; `{year}` is replaced with the current year.
    pub api_url: String,
    /// Strategies in priority order.
    pub strategies: Vec<StrategyKind>,
    pub persist: PersistMode,
    /// SQLite file. `None` keeps records in memory for the run only.
    pub store_path: Option<PathBuf>,
    pub table_name: String,
    pub http: HttpSettings,
    pub render: RenderSettings,
}

/// Headers and timeouts for plain HTTP strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    pub timeout_ms: u64,
    /// Treat a page whose table has no body rows as a failed static fetch.
    pub require_rendered_rows: bool,
}

/// Headless browser settings for the rendering strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub chromium_path: Option<PathBuf>,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub navigation_timeout_ms: u64,
    /// Upper bound on waiting for the table rows to appear.
    pub wait_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Extra delay after rows appear, letting late rows finish rendering.
    pub settle_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            strategies: vec![StrategyKind::Static, StrategyKind::Rendered, StrategyKind::Api],
            persist: PersistMode::default(),
            store_path: None,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            http: HttpSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "es-PE,es;q=0.9,en;q=0.8".to_string(),
            timeout_ms: 15_000,
            require_rendered_rows: true,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            chromium_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1920,
            viewport_height: 1080,
            navigation_timeout_ms: 30_000,
            wait_timeout_ms: 10_000,
            poll_interval_ms: 250,
            settle_ms: 2_000,
        }
    }
}

impl ScraperConfig {
    /// Resolve the configuration file and environment into a validated config.
    ///
    /// File lookup: `explicit`, then `SISMO_CONFIG`, then `./sismo-scraper.toml`.
    /// Missing files are only an error when named explicitly.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `SISMO_*` overrides. `lookup` stands in for `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SISMO_SOURCE_URL") {
            self.source_url = v;
        }
        if let Some(v) = lookup("SISMO_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("SISMO_TABLE_NAME") {
            self.table_name = v;
        }
        if let Some(v) = lookup("SISMO_STORE_PATH") {
            self.store_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SISMO_STRATEGIES") {
            self.strategies = parse_strategy_list(&v)?;
        }
        if let Some(v) = lookup("SISMO_PERSIST") {
            self.persist = v.parse().map_err(ConfigError::Invalid)?;
        }
        if let Some(v) = lookup("SISMO_CHROMIUM_PATH") {
            self.render.chromium_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_url.trim().is_empty() {
            return Err(ConfigError::Invalid("source_url is empty".into()));
        }
        if self.strategies.contains(&StrategyKind::Api) && self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api strategy enabled but api_url is empty".into()));
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::Invalid("no fetch strategies configured".into()));
        }
        validate_table_name(&self.table_name)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.http.timeout_ms == 0 || self.render.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be greater than zero".into()));
        }
        for (name, value) in [
            ("User-Agent", &self.http.user_agent),
            ("Accept", &self.http.accept),
            ("Accept-Language", &self.http.accept_language),
            ("User-Agent", &self.render.user_agent),
        ] {
            header_value(name, value).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }

    /// Render the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Parse a comma-separated strategy list such as `static,api`.
pub fn parse_strategy_list(list: &str) -> Result<Vec<StrategyKind>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().map_err(ConfigError::Invalid))
        .collect()
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var("SISMO_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    cwd_config.exists().then_some(cwd_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScraperConfig::default();
        config.validate().unwrap();
        assert_eq!(
            config.strategies,
            vec![StrategyKind::Static, StrategyKind::Rendered, StrategyKind::Api]
        );
        assert_eq!(config.persist, PersistMode::Upsert);
        assert_eq!(config.table_name, "TablaSismosIGP");
    }

    #[test]
    fn test_effective_config_reloads() {
        let mut config = ScraperConfig::default();
        config.store_path = Some(PathBuf::from("/var/lib/sismos.db"));
        config.persist = PersistMode::Replace;

        let text = config.to_toml().unwrap();
        assert_eq!(ScraperConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ScraperConfig::from_toml(
            r#"
            strategies = ["rendered", "api"]
            persist = "replace"
            table_name = "Sismos"

            [render]
            wait_timeout_ms = 20000
            "#,
        )
        .unwrap();

        assert_eq!(config.strategies, vec![StrategyKind::Rendered, StrategyKind::Api]);
        assert_eq!(config.persist, PersistMode::Replace);
        assert_eq!(config.table_name, "Sismos");
        assert_eq!(config.render.wait_timeout_ms, 20_000);
        assert_eq!(config.render.settle_ms, 2_000);
        assert_eq!(config.source_url, DEFAULT_SOURCE_URL);
    }

    #[test]
    fn test_unknown_strategy_in_toml_fails() {
        let err = ScraperConfig::from_toml(r#"strategies = ["telnet"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SISMO_STRATEGIES", "api, static"),
            ("SISMO_PERSIST", "off"),
            ("SISMO_STORE_PATH", "/var/lib/sismos.db"),
            ("SISMO_TABLE_NAME", "Otra"),
        ]
        .into_iter()
        .collect();

        let mut config = ScraperConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.strategies, vec![StrategyKind::Api, StrategyKind::Static]);
        assert_eq!(config.persist, PersistMode::Off);
        assert_eq!(config.store_path, Some(PathBuf::from("/var/lib/sismos.db")));
        assert_eq!(config.table_name, "Otra");
    }

    #[test]
    fn test_env_rejects_bad_values() {
        let mut config = ScraperConfig::default();
        let err = config
            .apply_env(|k| (k == "SISMO_PERSIST").then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let mut config = ScraperConfig::default();
        config.strategies.clear();
        assert!(config.validate().is_err());

        let mut config = ScraperConfig::default();
        config.table_name = "drop table".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsendable_headers() {
        let mut config = ScraperConfig::default();
        config.http.accept_language = "es-PE\n".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Accept-Language"), "{err}");
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "persist = \"off\"\n").unwrap();

        let config = ScraperConfig::from_file(&path).unwrap();
        assert_eq!(config.persist, PersistMode::Off);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            ScraperConfig::from_file(&missing),
            Err(ConfigError::Read { .. })
        ));
    }
}
