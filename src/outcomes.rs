use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::info;

use crate::artifact::{Table, num_cell};
use crate::error::{PipelineError, Result};
use crate::game_logs::GameLogRow;
use crate::predictors::{PredictorLayout, PredictorRow};

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub predictors: PredictorRow,
    pub home: Option<bool>,
    pub outcome: Option<f64>,
    pub thr: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeMerge {
    pub outcome: String,
    pub rows: Vec<LabeledRow>,
    pub dropped: usize,
}

pub fn merge_outcomes(
    predictors: &[PredictorRow],
    game_logs: &[GameLogRow],
    outcome: &str,
) -> Result<OutcomeMerge> {
    let outcome = outcome.trim().to_lowercase();
    if !game_logs.is_empty() && !game_logs.iter().any(|g| g.has_stat(&outcome)) {
        return Err(PipelineError::Validation(format!(
            "game logs have no `{outcome}` column"
        )));
    }

    let mut by_key: HashMap<(&str, NaiveDate, u8), &GameLogRow> = HashMap::new();
    for log in game_logs {
        by_key
            .entry((log.team.as_str(), log.clean_date, log.game_date_id))
            .or_insert(log);
    }

    let joined = predictors
        .iter()
        .map(|row| {
            let mut predictors = row.clone();
            predictors.team = predictors.team.to_lowercase();
            let log = by_key
                .get(&(predictors.team.as_str(), predictors.date, predictors.game_date_id))
                .copied();
            LabeledRow {
                home: log.map(|l| l.home),
                outcome: log.and_then(|l| l.stat(&outcome)),
                thr: log.and_then(|l| l.thr.clone()),
                predictors,
            }
        })
        .collect::<Vec<_>>();

    let incomplete = joined
        .iter()
        .filter(|r| r.outcome.is_none())
        .map(|r| (r.predictors.team.clone(), r.predictors.date))
        .collect::<HashSet<_>>();
    let before = joined.len();
    let rows = joined
        .into_iter()
        .filter(|r| !incomplete.contains(&(r.predictors.team.clone(), r.predictors.date)))
        .collect::<Vec<_>>();
    let dropped = before - rows.len();

    info!(%outcome, dropped, kept = rows.len(), "dropped rows with missing outcome");
    Ok(OutcomeMerge {
        outcome,
        rows,
        dropped,
    })
}

pub fn labeled_table(layout: &PredictorLayout, merge: &OutcomeMerge) -> anyhow::Result<Table> {
    let mut columns = vec!["team".to_string(), "home_team".to_string(), "date".to_string()];
    columns.extend(layout.columns().iter().cloned());
    columns.extend(["home".to_string(), merge.outcome.clone(), "thr".to_string()]);

    let mut table = Table::new(columns);
    for row in &merge.rows {
        let p = &row.predictors;
        let mut cells = vec![
            p.team.clone(),
            p.home_team.clone(),
            p.date.format("%Y-%m-%d").to_string(),
        ];
        cells.extend(p.features.iter().map(|v| num_cell(*v)));
        cells.push(row.home.map(|h| h.to_string()).unwrap_or_default());
        cells.push(num_cell(row.outcome));
        cells.push(row.thr.clone().unwrap_or_default());
        table.push_row(cells)?;
    }
    Ok(table)
}
