use crate::model::Episode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<CatalogEntry>),
    Wrapped { episodes: Vec<CatalogEntry> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogEntry {
    Flat(Episode),
    Feed(FeedEpisode),
}

/// Episode shape served by the podcast site API: audio details nested under `file`.
#[derive(Deserialize)]
struct FeedEpisode {
    title: String,
    #[serde(default)]
    members: String,
    #[serde(default)]
    thumbnail: String,
    file: FeedFile,
}

#[derive(Deserialize)]
struct FeedFile {
    url: String,
    duration: u32,
}

impl From<CatalogEntry> for Episode {
    fn from(entry: CatalogEntry) -> Self {
        match entry {
            CatalogEntry::Flat(episode) => episode,
            CatalogEntry::Feed(feed) => Episode {
                title: feed.title,
                members: feed.members,
                thumbnail: feed.thumbnail,
                duration: feed.file.duration,
                url: feed.file.url,
            },
        }
    }
}

pub fn load_catalog(path: &Path) -> Result<Vec<Episode>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read episode catalog {}", path.display()))?;
    let episodes = parse_catalog(&raw)
        .with_context(|| format!("failed to parse episode catalog {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let episodes: Vec<Episode> = episodes
        .into_iter()
        .map(|mut episode| {
            episode.url = resolve_url(base, &episode.url);
            episode
        })
        .collect();
    tracing::info!(count = episodes.len(), path = %path.display(), "loaded episode catalog");
    Ok(episodes)
}

pub fn parse_catalog(raw: &str) -> Result<Vec<Episode>> {
    let file: CatalogFile = serde_json::from_str(raw)?;
    let entries = match file {
        CatalogFile::List(entries) => entries,
        CatalogFile::Wrapped { episodes } => episodes,
    };
    Ok(entries.into_iter().map(Episode::from).collect())
}

/// Relative local paths are resolved against the catalog's directory.
fn resolve_url(base: &Path, url: &str) -> String {
    if url.contains("://") || Path::new(url).is_absolute() || base.as_os_str().is_empty() {
        return url.to_string();
    }
    base.join(url).to_string_lossy().to_string()
}
