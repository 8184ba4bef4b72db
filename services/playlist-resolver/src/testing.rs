//!
//! src/testing.rs
//!
//! In-memory providers for unit tests. They record every call so tests can
//! assert which requests the resolver issued
//!

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ResolverError;
use crate::provider::{CatalogProvider, ScrobbleProvider};
use crate::types::{AlbumRef, ArtistRef, CatalogTrack, ScrobbleInfo, SearchResult};

pub fn partial_track(id: &str, name: &str, artists: &[&str]) -> CatalogTrack {
    CatalogTrack {
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        artists: artists.iter()
            .map(|a| ArtistRef { id: None, name: a.to_string() })
            .collect(),
        uri: Some(format!("spotify:track:{id}")),
        ..Default::default()
    }
}

pub fn full_track(id: &str, name: &str, artists: &[&str], popularity: u32) -> CatalogTrack {
    CatalogTrack {
        album: Some(AlbumRef {
            id: None,
            name: Some(format!("Album of {name}")),
            release_date: None
        }),
        popularity: Some(popularity),
        ..partial_track(id, name, artists)
    }
}

#[derive(Debug, Default)]
pub struct FakeCatalog {
    tracks: HashMap<String, CatalogTrack>,
    searches: HashMap<String, SearchResult>,
    delays: HashMap<String, Duration>,
    fail_status: Option<u16>,
    track_calls: Mutex<Vec<String>>,
    search_calls: Mutex<Vec<String>>
}

impl FakeCatalog {
    pub fn with_track(mut self, track: CatalogTrack) -> Self {
        let id = track.id.clone().unwrap_or_default();
        self.tracks.insert(id, track);
        self
    }

    pub fn with_search(mut self, query: &str, result: SearchResult) -> Self {
        self.searches.insert(query.to_string(), result);
        self
    }

    /// Delays answers for a track id or search query
    pub fn with_delay(mut self, key: &str, delay: Duration) -> Self {
        self.delays.insert(key.to_string(), delay);
        self
    }

    pub fn failing(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    pub fn track_calls(&self) -> Vec<String> {
        self.track_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }

    async fn pause(&self, key: &str) {
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn check_failure(&self) -> Result<(), ResolverError> {
        match self.fail_status {
            Some(status) => Err(ResolverError::Status {
                status,
                body: "fake failure".to_string()
            }),
            None => Ok(())
        }
    }
}

#[async_trait]
impl CatalogProvider for FakeCatalog {
    async fn track(&self, id: &str) -> Result<CatalogTrack, ResolverError> {
        self.track_calls.lock().unwrap().push(id.to_string());
        self.pause(id).await;
        self.check_failure()?;
        self.tracks.get(id)
            .cloned()
            .ok_or_else(|| ResolverError::NotFound(format!("track {id}")))
    }

    async fn search(&self, query: &str) -> Result<SearchResult, ResolverError> {
        self.search_calls.lock().unwrap().push(query.to_string());
        self.pause(query).await;
        self.check_failure()?;
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct FakeScrobbles {
    counts: HashMap<(String, String), i64>,
    calls: Mutex<Vec<(String, String)>>
}

impl FakeScrobbles {
    pub fn with_count(mut self, artist: &str, title: &str, playcount: i64) -> Self {
        self.counts.insert((artist.to_string(), title.to_string()), playcount);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScrobbleProvider for FakeScrobbles {
    async fn track_info(&self, artist: &str, title: &str) -> Result<ScrobbleInfo, ResolverError> {
        self.calls.lock().unwrap().push((artist.to_string(), title.to_string()));
        let key = (artist.to_string(), title.to_string());
        let playcount = self.counts.get(&key)
            .copied()
            .ok_or_else(|| ResolverError::NotFound(format!("{artist} - {title}")))?;
        Ok(ScrobbleInfo {
            name: Some(title.to_string()),
            playcount: Some(playcount),
            ..Default::default()
        })
    }
}
