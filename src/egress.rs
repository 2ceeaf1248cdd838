use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressIdentity {
    #[serde(rename = "proxy_address")]
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl EgressIdentity {
    pub fn proxy_url(&self) -> String {
        format!(
            "http://{}:{}@{}:{}",
            self.username, self.password, self.address, self.port
        )
    }
}

// Keep credentials out of logs.
impl fmt::Debug for EgressIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EgressIdentity")
            .field("address", &self.address)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityRotator {
    pool: Vec<EgressIdentity>,
    cursor: usize,
}

impl IdentityRotator {
    pub fn new(pool: Vec<EgressIdentity>) -> Self {
        Self { pool, cursor: 0 }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read egress pool {}", path.display()))?;
        let pool = serde_json::from_str::<Vec<EgressIdentity>>(&raw)
            .with_context(|| format!("invalid egress pool json {}", path.display()))?;
        Ok(Self::new(pool))
    }

    pub fn next(&mut self) -> Option<&EgressIdentity> {
        if self.pool.is_empty() {
            return None;
        }
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.pool.len();
        self.pool.get(idx)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}
