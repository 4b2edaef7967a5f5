//! Application configuration module / 应用配置模块
//!
//! Configuration is loaded from `config.json` in the working directory and a
//! default file is written on first run / 首次运行时创建默认配置文件.
//! Environment variables are applied on top of the file afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration / 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment (`dev`, `prod`, ...) / 运行环境
    pub app_env: String,
    /// Server configuration / 服务器配置
    pub server: ServerConfig,
    /// Database configuration / 数据库配置
    pub database: DatabaseConfig,
    /// Search pipeline configuration / 搜索配置
    pub search: SearchConfig,
    /// Wikipedia enrichment client / 维基百科客户端配置
    pub wikipedia: WikipediaConfig,
    /// Weather proxy / 天气配置
    pub weather: WeatherConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Database configuration / 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Data directory path / 数据目录路径
    pub data_dir: String,
    /// Main database file path (relative to data_dir) / 主数据库文件路径
    pub db_file: String,
    /// Full connection URL, wins over data_dir/db_file when set
    pub url: Option<String>,
    /// Page seed file (JSON), applied outside prod
    pub seed_file: String,
}

/// Search pipeline configuration / 搜索配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Ranked full-text mode instead of substring matching
    pub full_text: bool,
    /// Append Wikipedia results to page searches
    pub external_enrichment: bool,
    pub default_language: String,
    /// Result cap for the HTML search page
    pub page_limit: usize,
    /// Result cap for the JSON API
    pub api_limit: usize,
    pub local_timeout_ms: u64,
    /// Overall deadline for one search request
    pub request_budget_ms: u64,
    pub snippet_chars: usize,
    /// Cached enrichment older than this is refetched, 0 keeps it forever
    pub external_cache_ttl_secs: u64,
}

/// Wikipedia enrichment client / 维基百科客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub result_limit: usize,
}

/// Weather proxy / 天气配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_env: "dev".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            search: SearchConfig::default(),
            wikipedia: WikipediaConfig::default(),
            weather: WeatherConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            db_file: "whoknows.db".to_string(),
            url: None,
            seed_file: "seed/pages.json".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            full_text: false,
            external_enrichment: true,
            default_language: "en".to_string(),
            page_limit: 50,
            api_limit: 10,
            local_timeout_ms: 2_000,
            request_budget_ms: 10_000,
            snippet_chars: 200,
            external_cache_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            user_agent: "WhoKnowsBot/1.0 (+https://github.com/GitDenGas123456/DevOps-Valgfag)".to_string(),
            timeout_ms: 5_000,
            result_limit: 10,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_url: "https://dmigw.govcloud.dk".to_string(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

impl SearchConfig {
    pub fn local_timeout(&self) -> Duration {
        Duration::from_millis(self.local_timeout_ms)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_millis(self.request_budget_ms)
    }

    /// `None` when cached enrichment never expires
    pub fn external_cache_ttl(&self) -> Option<Duration> {
        match self.external_cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl AppConfig {
    /// Get the full database URL / 获取完整的数据库URL
    pub fn get_database_url(&self) -> String {
        if let Some(url) = &self.database.url {
            return url.clone();
        }
        let db_path = Path::new(&self.database.data_dir).join(&self.database.db_file);
        format!("sqlite:{}?mode=rwc", db_path.to_string_lossy())
    }

    /// Get the full data directory path / 获取完整的数据目录路径
    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(&self.database.data_dir)
    }

    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.app_env.to_ascii_lowercase().as_str(), "prod" | "production")
    }

    /// Apply environment overrides / 应用环境变量覆盖
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map instead.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(env) = get("APP_ENV") {
            self.app_env = env;
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(flag) = get("SEARCH_FTS").and_then(|v| parse_bool(&v)) {
            self.search.full_text = flag;
        }
        if let Some(flag) = get("EXTERNAL_SEARCH").and_then(|v| parse_bool(&v)) {
            self.search.external_enrichment = flag;
        }
        if let Some(ua) = get("WIKI_USER_AGENT") {
            self.wikipedia.user_agent = ua;
        }
        if let Some(timeout) = get("WIKI_HTTP_TIMEOUT").and_then(|v| parse_duration(&v)) {
            self.wikipedia.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }
        if let Some(key) = get("DMI_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(url) = get("DMI_API_URL") {
            self.weather.api_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = get("DMI_HTTP_TIMEOUT").and_then(|v| parse_duration(&v)) {
            self.weather.timeout_secs = timeout.as_secs().max(1);
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.search.page_limit == 0 || self.search.api_limit == 0 {
            return Err("search.page_limit and search.api_limit must be > 0".to_string());
        }
        if self.search.default_language.trim().is_empty() {
            return Err("search.default_language must not be empty".to_string());
        }
        if self.wikipedia.endpoint.trim().is_empty() {
            return Err("wikipedia.endpoint must not be empty".to_string());
        }
        Ok(())
    }
}

/// Parse a boolean-ish value: 1/true/yes/on and 0/false/no/off
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds.
/// Zero and malformed values yield `None`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: u64 = number.parse().ok()?;

    let duration = match unit.trim() {
        "" | "s" => Duration::from_secs(value),
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.checked_mul(60)?),
        "h" => Duration::from_secs(value.checked_mul(3600)?),
        _ => return None,
    };
    (!duration.is_zero()).then_some(duration)
}

/// Get the config file path / 获取配置文件路径
fn get_config_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config() -> Result<AppConfig, String> {
    let config_path = get_config_path();

    let mut config = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        config
    } else {
        let config = AppConfig::default();
        save_config(&config, &config_path)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        config
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config: &AppConfig, path: &Path) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}
