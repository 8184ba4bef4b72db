//!
//! src/track.rs
//!
//! Track resolution: classifies a text entry, fetches or searches the
//! catalog for it and merges in scrobble counts. A `TrackRecord` moves
//! from unresolved to partial (search hit) to full (fetched by id)
//!

use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::debug;

use crate::errors::ResolverError;
use crate::provider::{CatalogProvider, ScrobbleProvider};
use crate::types::{CatalogTrack, ScrobbleInfo};

/// Inline identifier scheme, e.g. `spotify:track:6GtOsEzNUhJghrIf6UTbRV`
pub const INLINE_PREFIX: &str = "spotify:track:";

/// Host and path of catalog web links, after the `http(s)://`
pub const LINK_PREFIX: &str = "open.spotify.com/track/";

/// Position of the identifier in a link split on `/`
const LINK_ID_SEGMENT: usize = 4;

/// How an entry names its track. Identifiers borrow from the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind<'a> {
    Inline(&'a str),
    Link(&'a str),
    Query(&'a str)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

///
/// Recognizes the two encodings that already carry an identifier, case
/// insensitive. A link's identifier is its raw 5th segment, query string
/// included. An encoding with nothing where the identifier should be is
/// treated as free text
///
pub fn classify(entry: &str) -> EntryKind<'_> {
    if let Some(id) = strip_prefix_ignore_case(entry, INLINE_PREFIX) {
        if !id.is_empty() {
            return EntryKind::Inline(id);
        }
    }

    let rest = strip_prefix_ignore_case(entry, "https://")
        .or_else(|| strip_prefix_ignore_case(entry, "http://"));
    if rest.is_some_and(|r| strip_prefix_ignore_case(r, LINK_PREFIX).is_some()) {
        if let Some(id) = entry.split('/').nth(LINK_ID_SEGMENT).filter(|id| !id.is_empty()) {
            return EntryKind::Link(id);
        }
    }

    EntryKind::Query(entry)
}

/// What the record knows about its catalog track
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Resolution {
    #[default]
    Unresolved,
    Partial(CatalogTrack),
    Full(CatalogTrack)
}

impl Resolution {
    pub fn from_response(response: CatalogTrack) -> Self {
        if response.is_full() {
            Resolution::Full(response)
        } else {
            Resolution::Partial(response)
        }
    }

    pub fn response(&self) -> Option<&CatalogTrack> {
        match self {
            Resolution::Unresolved => None,
            Resolution::Partial(track) | Resolution::Full(track) => Some(track)
        }
    }
}

/// The single step `TrackRecord::resolve` takes, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Resolved,
    UpgradePartial,
    FetchInline,
    FetchLink,
    Search
}

#[derive(Debug, Clone)]
pub struct TrackRecord {
    entry: String,
    resolution: Resolution,
    scrobble: Option<ScrobbleInfo>
}

impl TrackRecord {
    pub fn new(entry: impl AsRef<str>) -> Self {
        Self {
            entry: entry.as_ref().trim().to_string(),
            resolution: Resolution::Unresolved,
            scrobble: None
        }
    }

    /// Seeds the record with a known response, filed as full or partial
    pub fn with_response(entry: impl AsRef<str>, response: CatalogTrack) -> Self {
        let mut record = Self::new(entry);
        record.set_response(response);
        record
    }

    pub fn set_response(&mut self, response: CatalogTrack) {
        self.resolution = Resolution::from_response(response);
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn kind(&self) -> EntryKind<'_> {
        classify(&self.entry)
    }

    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    pub fn scrobble(&self) -> Option<&ScrobbleInfo> {
        self.scrobble.as_ref()
    }

    pub fn is_full(&self) -> bool {
        matches!(self.resolution, Resolution::Full(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.resolution, Resolution::Partial(_))
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unresolved
    }

    fn full(&self) -> Option<&CatalogTrack> {
        match &self.resolution {
            Resolution::Full(track) => Some(track),
            _ => None
        }
    }

    fn response(&self) -> Option<&CatalogTrack> {
        self.resolution.response()
    }

    pub fn dispatch(&self) -> Dispatch {
        match (&self.resolution, self.kind()) {
            (Resolution::Full(_), _) => Dispatch::Resolved,
            (Resolution::Partial(_), _) => Dispatch::UpgradePartial,
            (_, EntryKind::Inline(_)) => Dispatch::FetchInline,
            (_, EntryKind::Link(_)) => Dispatch::FetchLink,
            (_, EntryKind::Query(_)) => Dispatch::Search
        }
    }

    ///
    /// Advances the record by exactly one step. A full record returns
    /// without touching the catalog; a search leaves the record partial,
    /// so a second call upgrades it
    ///
    pub async fn resolve<C>(&mut self, catalog: &C) -> Result<&Self, ResolverError>
    where
        C: CatalogProvider + ?Sized,
    {
        let step = self.dispatch();
        debug!(entry = %self.entry, step = ?step, "track.resolve");

        match step {
            Dispatch::Resolved => Ok(&*self),
            Dispatch::UpgradePartial | Dispatch::FetchInline | Dispatch::FetchLink => {
                self.fetch(catalog).await
            }
            Dispatch::Search => self.search(catalog).await
        }
    }

    /// Fetches the full record by identifier, replacing any partial one
    pub async fn fetch<C>(&mut self, catalog: &C) -> Result<&Self, ResolverError>
    where
        C: CatalogProvider + ?Sized,
    {
        let id = self.identifier()
            .map(str::to_string)
            .ok_or_else(|| ResolverError::MissingIdentifier(self.entry.clone()))?;

        debug!(entry = %self.entry, id = %id, "track.fetch");
        let full = catalog.track(&id).await?;
        self.resolution = Resolution::Full(full);
        Ok(&*self)
    }

    /// Searches by the entry text and keeps the first hit as partial
    pub async fn search<C>(&mut self, catalog: &C) -> Result<&Self, ResolverError>
    where
        C: CatalogProvider + ?Sized,
    {
        debug!(query = %self.entry, "track.search");
        let result = catalog.search(&self.entry).await?;

        let candidate = result.items
            .into_iter()
            .next()
            .filter(|c| c.id().is_some())
            .ok_or_else(|| ResolverError::NoMatch(self.entry.clone()))?;

        self.resolution = Resolution::Partial(candidate);
        Ok(&*self)
    }

    /// Looks up scrobble counts by the resolved artist and title
    pub async fn enrich<S>(&mut self, scrobbles: &S) -> Result<&Self, ResolverError>
    where
        S: ScrobbleProvider + ?Sized,
    {
        let artist = self.artist().unwrap_or_default().to_string();
        let title  = self.title().unwrap_or_default().to_string();

        debug!(artist = %artist, title = %title, "track.enrich");
        let info = scrobbles.track_info(&artist, &title).await?;
        self.scrobble = Some(info);
        Ok(&*self)
    }

    pub fn title(&self) -> Option<&str> {
        self.response()?
            .name
            .as_deref()
            .filter(|t| !t.is_empty())
    }

    /// First credited artist
    pub fn artist(&self) -> Option<&str> {
        self.response()?
            .artists
            .first()
            .map(|a| a.name.trim())
            .filter(|a| !a.is_empty())
    }

    pub fn artists(&self) -> Option<String> {
        let artists = &self.response()?.artists;
        if artists.is_empty() {
            return None;
        }
        Some(artists.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", "))
    }

    pub fn album(&self) -> Option<&str> {
        self.full()?
            .album
            .as_ref()?
            .name
            .as_deref()
            .filter(|a| !a.is_empty())
    }

    pub fn popularity(&self) -> Option<u32> {
        self.full()?.popularity
    }

    pub fn identifier(&self) -> Option<&str> {
        self.response()
            .and_then(CatalogTrack::id)
            .or_else(|| match self.kind() {
                EntryKind::Inline(id) | EntryKind::Link(id) => Some(id),
                EntryKind::Query(_) => None
            })
    }

    pub fn uri(&self) -> Option<&str> {
        self.response()?
            .uri
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    pub fn playcount(&self) -> Option<i64> {
        self.scrobble.as_ref()?.playcount
    }

    /// `"<title> - <artist>"`, or the bare title when no artist is known
    pub fn display_name(&self) -> Option<String> {
        let title = self.title()?;
        Some(match self.artist() {
            Some(artist) => format!("{title} - {artist}"),
            None => title.to_string()
        })
    }

    pub fn canonical_string(&self) -> String {
        self.display_name().unwrap_or_else(|| self.entry.clone())
    }

    fn folded(&self) -> String {
        self.canonical_string().to_lowercase()
    }
}

impl fmt::Display for TrackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_string())
    }
}

// Equality follows what a reader of the playlist sees, not identifiers
impl PartialEq for TrackRecord {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for TrackRecord {}

impl Hash for TrackRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}
