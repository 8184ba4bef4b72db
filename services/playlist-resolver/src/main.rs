//!
//! src/main.rs
//!
//! playlist-resolver <input|-> [output]
//!
//! Reads a song list, resolves every line against the catalog and writes
//! the playlist to `output` or stdout
//!

use std::io::{Read, Write};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use playlist_resolver::errors::ResolverError;
use playlist_resolver::{config, fetch, logging, playlist};

const USAGE: &str = "usage: playlist-resolver <input|-> [output]";

fn read_input(path: &str) -> Result<String, ResolverError> {
    if path == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn write_output(path: Option<&str>, rendered: &str) -> Result<(), ResolverError> {
    match path {
        Some(path) => std::fs::write(path, rendered)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ResolverError> {
    let mut args = std::env::args().skip(1);
    let input  = args.next().ok_or_else(|| ResolverError::Config(USAGE.to_string()))?;
    let output = args.next();

    let cfgs    = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "playlist-resolver",
        version = %env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let entries = playlist::parse_entries(&read_input(&input)?);

    let spotify = fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?;
    let mut resolver = playlist::Resolver::new(Arc::new(spotify), cfgs.batch.clone());
    if let Some(lastfm_cfg) = &cfgs.lastfm {
        let lastfm = fetch::LastFmClient::new(&cfgs.http, lastfm_cfg)?;
        resolver = resolver.with_scrobbles(Arc::new(lastfm));
    }

    let shutdown = CancellationToken::new();
    let trigger = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(msg = "cancelling outstanding entries", "playlist.signal");
                shutdown.cancel();
            }
        })
    };

    let outcomes = resolver.resolve_all(entries, &shutdown).await;
    trigger.abort();

    let rendered = playlist::render(&outcomes, cfgs.batch.format, cfgs.batch.dedupe)?;
    write_output(output.as_deref(), &rendered)?;

    info!("exit");
    Ok(())
}
