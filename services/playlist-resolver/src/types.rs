//!
//! src/types.rs
//!
//! Wire shapes of the catalog (Spotify) and scrobble (Last.fm) records
//! the resolver reads. Every field tolerates absence since search hits
//! are sparser than tracks fetched by id
//!

use serde::{Deserialize, Deserializer, Serialize};

// International standard recording code
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    #[serde(default)]
    pub isrc: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>
}

///
/// A catalog track as returned by `GET /tracks/{id}` (full) or as an item
/// of a track search (partial)
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub explicit: Option<bool>,
    #[serde(default)]
    pub external_ids: Option<ExternalIds>
}

impl CatalogTrack {
    /// Popularity is the only thing that tells a full record from a search
    /// hit; zero counts as missing
    pub fn is_full(&self) -> bool {
        self.popularity.is_some_and(|p| p > 0)
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}

/// The `tracks` object of a `type=track` search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub items: Vec<CatalogTrack>
}

///
/// The `track` object of a Last.fm `track.getInfo` response. Last.fm sends
/// counts as strings, so both strings and numbers are accepted
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrobbleInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub listeners: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub playcount: Option<i64>
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None
    })
}
