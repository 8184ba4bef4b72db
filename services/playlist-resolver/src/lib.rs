//!
//! src/lib.rs
//!
//! Resolves a plain-text list of songs (titles, `spotify:track:` URIs,
//! open.spotify.com links) into catalog tracks, with Last.fm play counts
//!

pub mod config;
pub mod errors;
pub mod logging;

pub mod fetch;
pub mod playlist;
pub mod provider;
pub mod track;
pub mod types;

#[cfg(test)]
mod testing;

pub use errors::ResolverError;
pub use provider::{CatalogProvider, ScrobbleProvider};
pub use track::{classify, Dispatch, EntryKind, Resolution, TrackRecord};
pub use types::{CatalogTrack, ScrobbleInfo, SearchResult};
