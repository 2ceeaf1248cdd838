use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(anyhow!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).map(String::as_str).unwrap_or_default())
                .collect(),
        )
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns).context("write csv header")?;
        for row in &self.rows {
            writer.write_record(row).context("write csv row")?;
        }
        writer.into_inner().context("flush csv")
    }
}

pub fn num_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub name: String,
    pub version: String,
    pub rows: usize,
    pub columns: usize,
    pub created_at: String,
    pub file: String,
}

pub trait ArtifactStore {
    fn write(&self, table: &Table, name: &str) -> Result<ArtifactVersion>;
}

#[derive(Debug, Clone)]
pub struct FolderBoard {
    root: PathBuf,
}

impl FolderBoard {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.root.join(name);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("list {}", dir.display()))? {
            let entry = entry.context("read artifact dir entry")?;
            if entry.path().join("meta.json").is_file() {
                out.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        out.sort();
        Ok(out)
    }

    pub fn read_meta(&self, name: &str, version: &str) -> Result<ArtifactVersion> {
        let path = self.root.join(name).join(version).join("meta.json");
        let raw =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid meta {}", path.display()))
    }
}

impl ArtifactStore for FolderBoard {
    fn write(&self, table: &Table, name: &str) -> Result<ArtifactVersion> {
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(anyhow!("invalid artifact name {name:?}"));
        }
        let bytes = table.to_csv()?;
        let now = Utc::now();
        let version = format!("{}-{}", now.format("%Y%m%dT%H%M%S%.6fZ"), short_hash(&bytes));

        let dir = self.root.join(name).join(&version);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

        let file = format!("{name}.csv");
        write_atomic(&dir.join(&file), &bytes)?;

        let meta = ArtifactVersion {
            name: name.to_string(),
            version,
            rows: table.len(),
            columns: table.columns.len(),
            created_at: now.to_rfc3339(),
            file,
        };
        let json = serde_json::to_vec_pretty(&meta).context("serialize artifact meta")?;
        write_atomic(&dir.join("meta.json"), &json)?;

        info!(name, version = %meta.version, rows = meta.rows, "artifact written");
        Ok(meta)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest
        .iter()
        .take(3)
        .map(|b| format!("{b:02x}"))
        .collect::<String>()[..5]
        .to_string()
}
