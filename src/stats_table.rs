use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Batting,
    Pitching,
}

impl StatKind {
    pub fn schema(self) -> &'static StatSchema {
        match self {
            StatKind::Batting => &BATTING,
            StatKind::Pitching => &PITCHING,
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKind::Batting => f.write_str("batting"),
            StatKind::Pitching => f.write_str("pitching"),
        }
    }
}

/// Which stats feed the predictors, and which of them are counting stats
/// to be turned into per-PA / per-IP rates.
#[derive(Debug, PartialEq)]
pub struct StatSchema {
    pub kind: StatKind,
    pub keep: &'static [&'static str],
    pub normalize: &'static [&'static str],
    pub denominator: &'static str,
}

impl StatSchema {
    pub fn is_normalized(&self, stat: &str) -> bool {
        self.normalize.contains(&stat)
    }
}

pub const BATTING: StatSchema = StatSchema {
    kind: StatKind::Batting,
    keep: &[
        "R", "H", "2B", "3B", "HR", "RBI", "BB", "IBB", "SO", "HBP", "SH", "SF", "GDP", "SB", "CS",
        "BA", "OBP", "SLG", "OPS",
    ],
    normalize: &[
        "R", "H", "2B", "3B", "HR", "RBI", "BB", "IBB", "SO", "HBP", "SH", "SF", "GDP", "SB", "CS",
    ],
    denominator: "PA",
};

pub const PITCHING: StatSchema = StatSchema {
    kind: StatKind::Pitching,
    keep: &[
        "H", "R", "ER", "BB", "SO", "HR", "HBP", "ERA", "2B", "3B", "IBB", "GDP", "SF", "SB", "CS",
        "PO", "BF", "Pit", "Str", "StL", "StS", "GB/FB", "LD", "PU", "WHIP", "BAbip", "SO9",
        "SO/W",
    ],
    normalize: &[
        "H", "R", "ER", "BB", "SO", "HR", "HBP", "2B", "3B", "IBB", "GDP", "SF", "SB", "CS", "PO",
        "BF", "Pit",
    ],
    denominator: "IP",
};

/// Raw scrape result: header row plus string cells, with the player id
/// pulled out of each row's link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub cells: Vec<String>,
    pub mlb_id: Option<u32>,
}

/// Cumulative stats keyed by player id. Cells are `None` when missing.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsTable {
    kind: StatKind,
    columns: Vec<String>,
    rows: HashMap<u32, Vec<Option<f64>>>,
}

impl StatsTable {
    pub fn empty(kind: StatKind) -> Self {
        Self {
            kind,
            columns: Vec::new(),
            rows: HashMap::new(),
        }
    }

    pub fn new(kind: StatKind, columns: Vec<String>) -> Self {
        Self {
            kind,
            columns,
            rows: HashMap::new(),
        }
    }

    /// Rows without a linked player are dropped; a repeated id keeps its
    /// first row.
    pub fn from_raw(kind: StatKind, raw: &RawTable) -> Self {
        let mut table = Self::new(kind, raw.headers.clone());
        for row in &raw.rows {
            let Some(id) = row.mlb_id else {
                continue;
            };
            if table.rows.contains_key(&id) {
                debug!(%kind, mlb_id = id, "duplicate stats row ignored");
                continue;
            }
            let values = (0..raw.headers.len())
                .map(|idx| row.cells.get(idx).and_then(|c| parse_stat_cell(c)))
                .collect();
            table.rows.insert(id, values);
        }
        table
    }

    /// Inserts or replaces a row. Values line up with `columns`.
    pub fn insert(&mut self, mlb_id: u32, values: Vec<Option<f64>>) {
        self.rows.insert(mlb_id, values);
    }

    pub fn kind(&self) -> StatKind {
        self.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, mlb_id: u32, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(&mlb_id)?.get(idx).copied().flatten()
    }

    /// One row per requested id, in request order, with one cell per kept
    /// stat. Counting stats are divided by the schema denominator. Absent
    /// players and zero or missing denominators give missing cells.
    pub fn select(&self, schema: &StatSchema, ids: &[Option<u32>]) -> Vec<Vec<Option<f64>>> {
        let keep_idx = schema
            .keep
            .iter()
            .map(|stat| self.columns.iter().position(|c| c == stat))
            .collect::<Vec<_>>();
        let denom_idx = self.columns.iter().position(|c| c == schema.denominator);

        ids.iter()
            .map(|id| {
                let Some(row) = id.and_then(|id| self.rows.get(&id)) else {
                    return vec![None; schema.keep.len()];
                };
                let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i).copied().flatten());
                let denom = cell(denom_idx).filter(|d| *d != 0.0);
                schema
                    .keep
                    .iter()
                    .zip(&keep_idx)
                    .map(|(stat, idx)| {
                        let raw = cell(*idx);
                        if schema.is_normalized(stat) {
                            Some(raw? / denom?)
                        } else {
                            raw
                        }
                    })
                    .collect()
            })
            .collect()
    }
}

/// Numeric cell, `"61%"` as 0.61; blanks and placeholders like `"---%"`
/// are missing.
pub fn parse_stat_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if let Some(pct) = trimmed.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|v| v / 100.0);
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
