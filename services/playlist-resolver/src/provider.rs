//!
//! src/provider.rs
//!
//! Collaborator interfaces the resolver core is written against. The
//! reqwest clients in `fetch` implement them; tests substitute fakes
//!

use async_trait::async_trait;

use crate::errors::ResolverError;
use crate::types::{CatalogTrack, ScrobbleInfo, SearchResult};

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// GET /tracks/{id}, the full record
    async fn track(&self, id: &str) -> Result<CatalogTrack, ResolverError>;

    /// GET /search?type=track, candidates in provider order
    async fn search(&self, query: &str) -> Result<SearchResult, ResolverError>;
}

#[async_trait]
pub trait ScrobbleProvider: Send + Sync {
    /// track.getInfo keyed by artist and title text
    async fn track_info(&self, artist: &str, title: &str) -> Result<ScrobbleInfo, ResolverError>;
}
