//!
//! src/fetch.rs
//!
//! reqwest clients for the catalog (Spotify) and scrobble (Last.fm)
//! providers: request builders for each endpoint, bearer token refresh,
//! request pacing and retries. Both clients implement the provider traits
//!

use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use reqwest::{Client, header, redirect, RequestBuilder, StatusCode};
use serde_json::Value;
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, warn};

use crate::config::{HttpConfig, LastFmConfig, RetryConfig, SpotifyConfig};
use crate::errors::ResolverError;
use crate::provider::{CatalogProvider, ScrobbleProvider};
use crate::types::{CatalogTrack, ScrobbleInfo, SearchResult};

/// Refresh the bearer this long before Spotify says it expires
const TOKEN_SKEW: Duration = Duration::from_secs(30);
const TOKEN_DEFAULT_TTL: u64 = 3600;

/// Last.fm error code for an unknown track
const LASTFM_TRACK_NOT_FOUND: i64 = 6;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, ResolverError> {
    client_helper(http)
        .default_headers(headers)
        .user_agent(concat!("playlist-resolver/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ResolverError::Http(format!("build client: {e}")))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ResolverError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers(http, h)
}

/// Minimum spacing between consecutive requests
#[derive(Debug)]
struct RateGate {
    min_interval: Duration,
    state: Mutex<Option<Instant>>
}

impl RateGate {
    fn new(min_interval: Duration) -> Self {
        Self { min_interval, state: Mutex::new(None) }
    }

    async fn wait(&self) {
        let mut last = self.state.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

/// Exponential backoff, exponent capped at 6, plus 50..=200ms of jitter
fn generate_backoff(base: Duration, attempt: u32, jitter: bool, rng: &mut SmallRng) -> Duration {
    let exp = base * (1_u32 << attempt.min(6));
    if jitter {
        exp + Duration::from_millis(rng.gen_range(50..=200))
    } else {
        exp
    }
}

fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn status_error(status: StatusCode, body: String, wait: Option<Duration>) -> ResolverError {
    match status {
        StatusCode::UNAUTHORIZED => ResolverError::Unauthorized(body),
        StatusCode::NOT_FOUND => ResolverError::NotFound(body),
        StatusCode::TOO_MANY_REQUESTS => ResolverError::RateLimited(
            wait.map(|w| format!("after {}s", w.as_secs()))
                .unwrap_or_else(|| "unspecified".to_string())
        ),
        _ => ResolverError::Status { status: status.as_u16(), body }
    }
}

///
/// Sends `request`, retrying transport errors and retryable statuses with
/// backoff until `max_attempts` sends have been made. A `Retry-After` on a
/// 429 replaces the computed backoff; one longer than `max_retry_after`
/// fails the request instead of sleeping
///
pub async fn http_with_retry(request: RequestBuilder, retry: &RetryConfig) ->
    Result<Value, ResolverError> {
    let mut rng = SmallRng::from_entropy();
    let attempts = u32::from(retry.max_attempts.max(1));
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        let response = request.try_clone()
            .ok_or_else(|| ResolverError::Http("non-cloneable request".to_string()))?
            .send()
            .await;
        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    let bytes = resp.bytes().await?;
                    return Ok(serde_json::from_slice(&bytes)?);
                }
                let wait = if status == StatusCode::TOO_MANY_REQUESTS {
                    retry_after(&resp)
                } else {
                    None
                };
                let body = resp.text().await.unwrap_or_default();
                let retryable = retry.retryable_statuses.contains(&status.as_u16());
                if !retryable || attempt >= attempts {
                    return Err(status_error(status, body, wait));
                }
                if let Some(w) = wait.filter(|w| *w > retry.max_retry_after) {
                    warn!(wait = w.as_secs(), attempt, "http.retry.too_long");
                    return Err(status_error(status, body, wait));
                }
                let backoff = wait.unwrap_or_else(||
                    generate_backoff(retry.base_backoff, attempt - 1, retry.jitter, &mut rng)
                );
                warn!(status = %status, attempt, backoff = ?backoff.as_millis(), "http.retry");
                sleep(backoff).await;
            },
            Err(e) => {
                if attempt >= attempts {
                    return Err(e.into());
                }
                let backoff = generate_backoff(retry.base_backoff, attempt - 1, retry.jitter, &mut rng);
                warn!(error = %e, attempt, backoff = ?backoff.as_millis(), "http.retry.error");
                sleep(backoff).await;
            }
        }
    }
}

#[derive(Debug, Clone)]
struct AccessToken {
    bearer: String,
    expires_at: Instant
}

#[derive(Debug)]
pub struct SpotifyClient {
    http: Client,
    cfg: SpotifyConfig,
    retry: RetryConfig,
    token: Mutex<Option<AccessToken>>,
    gate: RateGate
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) -> Result<Self, ResolverError> {
        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone(),
            token: Mutex::new(None),
            gate: RateGate::new(cfg.min_interval)
        })
    }

    /// POST {token_url}, client credentials grant
    pub fn token_request(&self) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
    }

    /// GET /v1/tracks/{id}
    pub fn track_request(&self, track_id: &str, bearer: &str) ->
        Result<RequestBuilder, ResolverError> {
        let url = self.cfg.api_base
            .join(&format!("tracks/{}", urlencoding::encode(track_id)))
            .map_err(|e| ResolverError::Http(format!("track url: {e}")))?;
        Ok(self.http.get(url).bearer_auth(bearer))
    }

    /// GET /v1/search?q=...&type=track
    pub fn search_request(&self, query: &str, bearer: &str) ->
        Result<RequestBuilder, ResolverError> {
        let mut url = self.cfg.api_base
            .join("search")
            .map_err(|e| ResolverError::Http(format!("search url: {e}")))?;
        url.set_query(Some(&format!("q={}&type=track", urlencoding::encode(query))));
        Ok(self.http.get(url).bearer_auth(bearer))
    }

    /// Current bearer, requesting a new one when missing or close to expiry
    async fn bearer(&self) -> Result<String, ResolverError> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if current.expires_at > Instant::now() + TOKEN_SKEW {
                return Ok(current.bearer.clone());
            }
        }

        let value = http_with_retry(self.token_request(), &self.retry).await?;
        let bearer = value["access_token"]
            .as_str()
            .ok_or_else(|| ResolverError::Parse("token response without access_token".to_string()))?
            .to_string();
        let ttl = value["expires_in"].as_u64().unwrap_or(TOKEN_DEFAULT_TTL);
        debug!(ttl, "spotify.token.refresh");

        *token = Some(AccessToken {
            bearer: bearer.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl)
        });
        Ok(bearer)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    /// Paced, authorized GET; a rejected bearer is replaced once
    async fn get_json<F>(&self, build: F) -> Result<Value, ResolverError>
    where
        F: Fn(&str) -> Result<RequestBuilder, ResolverError>
    {
        let bearer = self.bearer().await?;
        self.gate.wait().await;
        match http_with_retry(build(bearer.as_str())?, &self.retry).await {
            Err(ResolverError::Unauthorized(body)) => {
                warn!(body = %body, "spotify.token.rejected");
                self.invalidate_token().await;
                let bearer = self.bearer().await?;
                self.gate.wait().await;
                http_with_retry(build(bearer.as_str())?, &self.retry).await
            }
            other => other
        }
    }
}

#[async_trait]
impl CatalogProvider for SpotifyClient {
    async fn track(&self, id: &str) -> Result<CatalogTrack, ResolverError> {
        let value = self.get_json(|bearer| self.track_request(id, bearer)).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn search(&self, query: &str) -> Result<SearchResult, ResolverError> {
        let mut value = self.get_json(|bearer| self.search_request(query, bearer)).await?;
        let tracks = value.get_mut("tracks")
            .map(Value::take)
            .ok_or_else(|| ResolverError::Parse("search response without tracks".to_string()))?;
        Ok(serde_json::from_value(tracks)?)
    }
}

#[derive(Debug, Clone)]
pub struct LastFmClient {
    http: Client,
    cfg: LastFmConfig,
    retry: RetryConfig
}

impl LastFmClient {
    pub fn new(http_cfg: &HttpConfig, last_cfg: &LastFmConfig) -> Result<Self, ResolverError> {
        let http = base_client(http_cfg)?;
        Ok( Self { http, cfg: last_cfg.clone(), retry: http_cfg.retry.clone() })
    }

    /// GET /?method=track.getInfo&artist=...&track=...&api_key=...&format=json
    pub fn track_info_request(&self, artist: &str, track: &str) -> RequestBuilder {
        self.http.get(self.cfg.base_url.clone()).query(&[
            ("method", "track.getInfo"),
            ("artist", artist),
            ("track", track),
            ("api_key", &self.cfg.api_key),
            ("format", "json")
        ])
    }
}

#[async_trait]
impl ScrobbleProvider for LastFmClient {
    async fn track_info(&self, artist: &str, title: &str) -> Result<ScrobbleInfo, ResolverError> {
        let request = self.track_info_request(artist, title);
        let mut value = http_with_retry(request, &self.retry).await?;

        // logical errors arrive in a 200 body
        if let Some(code) = value.get("error").and_then(Value::as_i64) {
            let message = value["message"].as_str().unwrap_or_default().to_string();
            return Err(if code == LASTFM_TRACK_NOT_FOUND {
                ResolverError::NotFound(format!("{artist} - {title}: {message}"))
            } else {
                ResolverError::Provider { code, message }
            });
        }

        let track = value.get_mut("track")
            .map(Value::take)
            .ok_or_else(|| ResolverError::Parse("track.getInfo without track".to_string()))?;
        Ok(serde_json::from_value(track)?)
    }
}
