use std::fs;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::document::fetch_text;
use crate::error::Result;

const CACHE_DIR: &str = "lineup_predictors";

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn at(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn named(name: &str) -> Option<Self> {
        app_cache_dir().map(|dir| Self::at(dir.join(name)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(format!("{}.html", url_key(url)))
    }

    pub fn fetch_text(&self, client: &Client, url: &str) -> Result<String> {
        if let Some(body) = self.cached_body(url) {
            debug!(url, "cache hit");
            return Ok(body);
        }
        let body = fetch_text(client, url)?;
        if let Err(err) = self.store(url, &body) {
            debug!(error = %err, "http cache not saved");
        }
        Ok(body)
    }

    pub fn cached_body(&self, url: &str) -> Option<String> {
        fs::read_to_string(self.entry_path(url))
            .ok()
            .filter(|body| !body.is_empty())
    }

    fn store(&self, url: &str, body: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(url);
        let tmp = path.with_extension("html.tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

fn url_key(url: &str) -> String {
    Sha256::digest(url.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}
