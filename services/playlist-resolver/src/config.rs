//!
//! src/config.rs
//!
//! Builds the service configuration from the environment (and `.env`).
//! Builders read from a captured variable map so they can be exercised
//! without touching the process environment
//!

use std::collections::HashMap;
use std::time;

use url::Url;

use crate::errors::ResolverError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const RETRY_MAX_ATTEMPTS: u8 = 4;
pub const RETRY_BASE_BACKOFF: u64 = 250;
pub const RETRY_JITTER: bool = true;
pub const RETRY_MAX_WAIT: u64 = 30;
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1/";
pub const SPOTIFY_MIN_INTERVAL: u64 = 100;
pub const LASTFM_BASE_URL: &str = "https://ws.audioscrobbler.com/2.0/";

pub const BATCH_CONCURRENCY: usize = 4;

pub type Vars = HashMap<String, String>;

/// Returns a set, non-blank variable or a config error naming it
fn env_check(vars: &Vars, s: &str) -> Result<String, ResolverError> {
    match vars.get(s) {
        Some(v) if !v.trim().is_empty() => Ok(v.clone()),
        _ => Err(ResolverError::Config(format!("{s} was not set"))),
    }
}

fn env_or(vars: &Vars, s: &str, default: &str) -> String {
    vars.get(s)
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn env_to_u64(vars: &Vars, s: &str, default: u64) -> u64 {
    vars.get(s)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_to_bool(vars: &Vars, s: &str, default: bool) -> bool {
    match vars.get(s).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

// relative joins drop the last segment without it
fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, ResolverError> {
    Url::parse(raw).map_err(|e| ResolverError::Config(format!("{name} invalid {e}")))
}

///
/// Configuration that Spotify expects when hitting endpoints
///
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
    pub api_base: Url,
    pub min_interval: time::Duration
}

fn build_spotify(vars: &Vars) -> Result<SpotifyConfig, ResolverError> {
    let client_id     = env_check(vars, "SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check(vars, "SPOTIFY_CLIENT_SECRET")?;

    let token_url = parse_url(
        "SPOTIFY_TOKEN_URL", &env_or(vars, "SPOTIFY_TOKEN_URL", SPOTIFY_TOKEN_URL)
    )?;
    let mut api_base = parse_url(
        "SPOTIFY_API_BASE", &env_or(vars, "SPOTIFY_API_BASE", SPOTIFY_API_BASE)
    )?;

    // ensure valid https and hostname for both urls
    ensure_https(&token_url).map_err(ResolverError::Config)?;
    ensure_https(&api_base).map_err(ResolverError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com").map_err(ResolverError::Config)?;
    ensure_host(&api_base, "api.spotify.com").map_err(ResolverError::Config)?;
    ensure_trailing_slash(&mut api_base);

    let min_interval = time::Duration::from_millis(
        env_to_u64(vars, "SPOTIFY_MIN_INTERVAL_MS", SPOTIFY_MIN_INTERVAL)
    );

    Ok( SpotifyConfig { client_id, client_secret, token_url, api_base, min_interval } )
}

#[derive(Debug, Clone)]
pub struct LastFmConfig {
    pub base_url: Url,
    pub api_key: String
}

/// Scrobble enrichment is optional: no key, no client
fn build_lastfm(vars: &Vars) -> Result<Option<LastFmConfig>, ResolverError> {
    let Ok(api_key) = env_check(vars, "LASTFM_API_KEY") else {
        return Ok(None);
    };

    let base_url = parse_url(
        "LASTFM_BASE_URL", &env_or(vars, "LASTFM_BASE_URL", LASTFM_BASE_URL)
    )?;
    ensure_https(&base_url).map_err(ResolverError::Config)?;

    Ok( Some(LastFmConfig { base_url, api_key }) )
}

///
/// Configuration for Http timeouts, retries, etc.
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u8,
    pub base_backoff: time::Duration,
    pub jitter: bool,
    pub max_retry_after: time::Duration,
    pub retryable_statuses: Vec<u16>
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_backoff: time::Duration::from_millis(RETRY_BASE_BACKOFF),
            jitter: RETRY_JITTER,
            max_retry_after: time::Duration::from_secs(RETRY_MAX_WAIT),
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
            retry: RetryConfig::default()
        }
    }
}

///
/// Configuration for the batch caller
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Uri,
    Display,
    Json
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<OutputFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uri" => Some(OutputFormat::Uri),
            "display" => Some(OutputFormat::Display),
            "json" => Some(OutputFormat::Json),
            _ => None
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub concurrency: usize,        // entries in flight
    pub upgrade_partial: bool,     // fetch full records for search hits
    pub dedupe: bool,              // drop repeats from the output
    pub format: OutputFormat
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: BATCH_CONCURRENCY,
            upgrade_partial: true,
            dedupe: false,
            format: OutputFormat::Uri
        }
    }
}

fn build_batch(vars: &Vars) -> Result<BatchConfig, ResolverError> {
    let defaults = BatchConfig::default();
    let format = match vars.get("PLAYLIST_FORMAT") {
        Some(raw) => OutputFormat::parse(raw).ok_or_else(|| ResolverError::Config(
            format!("PLAYLIST_FORMAT invalid: {raw}")
        ))?,
        None => defaults.format
    };
    let concurrency = env_to_u64(vars, "PLAYLIST_CONCURRENCY", defaults.concurrency as u64)
        .max(1) as usize;

    Ok( BatchConfig {
        concurrency,
        upgrade_partial: env_to_bool(vars, "PLAYLIST_UPGRADE_PARTIAL", defaults.upgrade_partial),
        dedupe: env_to_bool(vars, "PLAYLIST_DEDUPE", defaults.dedupe),
        format
    })
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
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
            filter_directives: "info,playlist_resolver=debug,reqwest=warn".to_string(),
            format: LogFormat::Pretty,
            with_ansi: true,
            include_file_line: true,
            include_target: true
        }
    }
}

fn build_logging(vars: &Vars) -> LoggingConfig {
    let mut logging = LoggingConfig::default();
    if let Some(directives) = vars.get("RUST_LOG").filter(|v| !v.trim().is_empty()) {
        logging.filter_directives = directives.clone();
    }
    if vars.get("LOG_FORMAT").is_some_and(|v| v.trim().eq_ignore_ascii_case("json")) {
        logging.format = LogFormat::Json;
        logging.with_ansi = false;
    }
    logging
}

///
/// AppConfig which holds everything the clients and the batch need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub lastfm: Option<LastFmConfig>,
    pub http: HttpConfig,
    pub batch: BatchConfig,
    pub logging: LoggingConfig
}

pub fn load_config_from(vars: &Vars) -> Result<AppConfig, ResolverError> {
    let spotify = build_spotify(vars)?;
    let lastfm  = build_lastfm(vars)?;
    let http    = HttpConfig::default();
    let batch   = build_batch(vars)?;
    let logging = build_logging(vars);

    Ok( AppConfig { spotify, lastfm, http, batch, logging } )
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ResolverError> {
    dotenvy::dotenv().ok();
    let vars: Vars = std::env::vars().collect();
    load_config_from(&vars)
}
