//!
//! src/config.rs  Andrew Belles  Oct 18th, 2026
//!
//! Environment backed configuration, loaded once at startup
//! and handed to every component by reference
//!

use std::path::PathBuf;
use std::time;

use url::Url;

use crate::errors::BackupError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 5000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 4;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

/// Seconds slept before each successive retry of a failed page
pub const RETRY_SCHEDULE_SECS: [u64; 6] = [1, 5, 10, 60, 120, 180];
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const LASTFM_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";
pub const LASTFM_PAGE_LIMIT: u32 = 200;
pub const DEFAULT_DB_PATH: &str = "lastfm-backup.db3";

/// Wrapper over env::var that treats blank values as unset
fn env_opt(s: &str) -> Option<String> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn ensure_http(url: &Url) -> Result<(), String> {
    match url.scheme() {
        "https" | "http" => Ok(()),
        other => Err(format!("unsupported scheme {other} for {url}"))
    }
}

///
/// Configuration for the last.fm web service
///
#[derive(Debug, Clone)]
pub struct LastFmConfig {
    pub api_key: Option<String>,  // only needed when syncing
    pub base_url: Url,
    pub page_limit: u32           // api maximum is 200
}

fn build_lastfm() -> Result<LastFmConfig, BackupError> {
    let api_key  = env_opt("LASTFM_API_KEY");
    let base_url = env_opt("LASTFM_BASE_URL")
        .unwrap_or_else(|| LASTFM_BASE_URL.to_string());

    let mut base_url = Url::parse(&base_url)
        .map_err(|e| BackupError::Config(
            format!("LASTFM_BASE_URL invalid {e}")
        ))?;

    ensure_http(&base_url).map_err(BackupError::Config)?;
    ensure_trailing_slash(&mut base_url);

    Ok( LastFmConfig { api_key, base_url, page_limit: LASTFM_PAGE_LIMIT } )
}

///
/// Configuration for Http timeouts, retries, etc.
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub schedule: Vec<time::Duration>,
    pub retryable_statuses: Vec<u16>
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            schedule: RETRY_SCHEDULE_SECS.iter()
                .map(|s| time::Duration::from_secs(*s))
                .collect(),
            retryable_statuses: RETRYABLE_STATUSES.to_vec()
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
    pub user_agent: String,
    pub retry: RetryConfig
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            user_agent: format!(
                "{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")
            ),
            retry: RetryConfig::default()
        }
    }
}

///
/// Configuration for the local sqlite store
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_path: PathBuf
}

impl PersistenceConfig {
    pub fn db_url(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { db_path: PathBuf::from(DEFAULT_DB_PATH) }
    }
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

impl LogFormat {
    pub fn parse(s: &str) -> Option<LogFormat> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "json"   => Some(LogFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,lastfm_backup=info,sqlx=warn,reqwest=warn"
                .to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: false,
            include_target: false
        }
    }
}

fn build_logging() -> Result<LoggingConfig, BackupError> {
    let mut logging = LoggingConfig::default();
    if let Some(raw) = env_opt("LOG_FORMAT") {
        logging.format = LogFormat::parse(&raw).ok_or_else(|| {
            BackupError::Config(format!("LOG_FORMAT invalid {raw}"))
        })?;
    }
    if logging.format == LogFormat::Json {
        logging.with_ansi = false;
        logging.include_target = true;
        logging.include_file_line = true;
    }
    Ok(logging)
}

///
/// AppConfig which holds everything the backup needs besides the cli request
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub lastfm: LastFmConfig,
    pub http: HttpConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, BackupError> {
    dotenvy::dotenv().ok();

    let lastfm      = build_lastfm()?;
    let http        = HttpConfig::default();
    let persistence = PersistenceConfig::default();
    let logging     = build_logging()?;

    Ok( AppConfig { lastfm, http, persistence, logging } )
}
