use chrono::NaiveDate;

use crate::artifact::{Table, num_cell};
use crate::error::{PipelineError, Result};
use crate::lineups::{Matchup, Side};
use crate::stats_fetch::SeasonStats;
use crate::stats_table::{BATTING, PITCHING, StatSchema};

pub const BATTING_ORDER_LEN: usize = 9;
pub const OPP_PITCHER_SUFFIX: &str = "_opp_p";
pub const ID_COLUMNS: [&str; 4] = ["team", "home_team", "date", "game_date_id"];

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorLayout {
    batting: &'static StatSchema,
    pitching: &'static StatSchema,
    columns: Vec<String>,
}

impl PredictorLayout {
    pub fn new(batting: &'static StatSchema, pitching: &'static StatSchema) -> Self {
        let mut columns = Vec::with_capacity(
            batting.keep.len() * BATTING_ORDER_LEN + pitching.keep.len(),
        );
        for order in 1..=BATTING_ORDER_LEN {
            columns.extend(batting.keep.iter().map(|stat| format!("{stat}_{order}")));
        }
        columns.extend(
            pitching
                .keep
                .iter()
                .map(|stat| format!("{stat}{OPP_PITCHER_SUFFIX}")),
        );
        Self {
            batting,
            pitching,
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn batting_width(&self) -> usize {
        self.batting.keep.len() * BATTING_ORDER_LEN
    }
}

impl Default for PredictorLayout {
    fn default() -> Self {
        Self::new(&BATTING, &PITCHING)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictorRow {
    pub team: String,
    pub home_team: String,
    pub date: NaiveDate,
    pub game_date_id: u8,
    pub features: Vec<Option<f64>>,
}

impl PredictorRow {
    pub fn feature(&self, layout: &PredictorLayout, column: &str) -> Option<f64> {
        self.features.get(layout.index_of(column)?).copied().flatten()
    }

    pub fn opponent_pitcher_block<'a>(&'a self, layout: &PredictorLayout) -> &'a [Option<f64>] {
        &self.features[layout.batting_width().min(self.features.len())..]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PredictorBuilder {
    layout: PredictorLayout,
}

impl PredictorBuilder {
    pub fn new(layout: PredictorLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &PredictorLayout {
        &self.layout
    }

    pub fn build(
        &self,
        matchup: &Matchup,
        stats: &SeasonStats,
        game_date_id: u8,
    ) -> Result<[PredictorRow; 2]> {
        for side in Side::BOTH {
            let len = matchup.side(side).lineup.len();
            if len != BATTING_ORDER_LEN {
                return Err(PipelineError::LineupLength { side, len });
            }
        }

        let starters = [Side::Away, Side::Home]
            .map(|side| matchup.side(side).pitcher.as_ref().map(|p| p.mlb_id));
        let [away_starter, home_starter]: [Vec<Option<f64>>; 2] = stats
            .pitching
            .select(self.layout.pitching, &starters)
            .try_into()
            .map_err(|_| PipelineError::Parse("pitching selection lost a starter".to_string()))?;

        let row_for = |side: Side, opp_pitcher: Vec<Option<f64>>| {
            let team = matchup.side(side);
            let ids = team.lineup.iter().map(|p| Some(p.mlb_id)).collect::<Vec<_>>();
            let mut features = Vec::with_capacity(self.layout.len());
            for hitter in stats.batting.select(self.layout.batting, &ids) {
                features.extend(hitter);
            }
            features.extend(opp_pitcher);
            PredictorRow {
                team: team.team_name.clone(),
                home_team: matchup.teams.home.team_name.clone(),
                date: matchup.date,
                game_date_id,
                features,
            }
        };

        Ok([
            row_for(Side::Away, home_starter),
            row_for(Side::Home, away_starter),
        ])
    }
}

pub fn predictor_table(layout: &PredictorLayout, rows: &[PredictorRow]) -> anyhow::Result<Table> {
    let mut columns = ID_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    columns.extend(layout.columns().iter().cloned());
    let mut table = Table::new(columns);
    for row in rows {
        table.push_row(predictor_cells(row))?;
    }
    Ok(table)
}

pub(crate) fn predictor_cells(row: &PredictorRow) -> Vec<String> {
    let mut cells = vec![
        row.team.clone(),
        row.home_team.clone(),
        row.date.format("%Y-%m-%d").to_string(),
        row.game_date_id.to_string(),
    ];
    cells.extend(row.features.iter().map(|v| num_cell(*v)));
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lineups::{BySide, Player, TeamSide};
    use crate::stats_table::{StatKind, StatsTable};

    fn player(id: u32) -> Player {
        Player {
            mlb_id: id,
            display_name: format!("Player {id}"),
            profile_url: format!("/player/p-{id}"),
        }
    }

    fn side(name: &str, ids: impl IntoIterator<Item = u32>, pitcher: u32) -> TeamSide {
        TeamSide {
            team_name: name.to_string(),
            team_code: name[..3].to_uppercase(),
            pitcher: Some(player(pitcher)),
            lineup: ids.into_iter().map(player).collect(),
        }
    }

    fn matchup() -> Matchup {
        Matchup {
            date: NaiveDate::from_ymd_opt(2024, 4, 10).unwrap(),
            teams: BySide {
                away: side("Yankees", 1..=9, 100),
                home: side("Astros", 10..=18, 200),
            },
        }
    }

    fn stats_for_all_ids() -> SeasonStats {
        let mut bat_cols = vec!["PA".to_string()];
        bat_cols.extend(BATTING.keep.iter().map(|s| s.to_string()));
        let mut batting = StatsTable::new(StatKind::Batting, bat_cols);
        for id in 1..=18u32 {
            let mut row = vec![Some(10.0)];
            row.extend(BATTING.keep.iter().map(|_| Some(id as f64)));
            batting.insert(id, row);
        }

        let mut pit_cols = vec!["IP".to_string()];
        pit_cols.extend(PITCHING.keep.iter().map(|s| s.to_string()));
        let mut pitching = StatsTable::new(StatKind::Pitching, pit_cols);
        for id in [100u32, 200] {
            let mut row = vec![Some(10.0)];
            row.extend(PITCHING.keep.iter().map(|_| Some(id as f64)));
            pitching.insert(id, row);
        }
        SeasonStats { batting, pitching }
    }

    #[test]
    fn opposing_starter_is_cross_assigned() {
        let builder = PredictorBuilder::default();
        let stats = stats_for_all_ids();
        let [away, home] = builder.build(&matchup(), &stats, 1).unwrap();
        let layout = builder.layout();

        assert_eq!(away.team, "Yankees");
        assert_eq!(home.team, "Astros");
        assert_eq!(away.home_team, "Astros");
        assert_eq!(home.home_team, "Astros");

        let expected = |id: u32| {
            stats
                .pitching
                .select(&PITCHING, &[Some(id)])
                .remove(0)
        };
        assert_eq!(away.opponent_pitcher_block(layout), expected(200).as_slice());
        assert_eq!(home.opponent_pitcher_block(layout), expected(100).as_slice());
        assert_eq!(away.feature(layout, "H_opp_p"), Some(20.0));
        assert_eq!(home.feature(layout, "ERA_opp_p"), Some(100.0));

        assert_eq!(away.feature(layout, "HR_1"), Some(0.1));
        assert_eq!(away.feature(layout, "HR_9"), Some(0.9));
        assert_eq!(home.feature(layout, "HR_1"), Some(1.0));
        assert_eq!(home.feature(layout, "BA_9"), Some(18.0));
    }

    #[test]
    fn empty_window_gives_all_missing_features() {
        let builder = PredictorBuilder::default();
        let rows = builder.build(&matchup(), &SeasonStats::empty(), 2).unwrap();
        for row in &rows {
            assert_eq!(row.features.len(), builder.layout().len());
            assert!(row.features.iter().all(Option::is_none));
            assert_eq!(row.game_date_id, 2);
        }
    }

    #[test]
    fn column_count_is_fixed_regardless_of_gaps() {
        let builder = PredictorBuilder::default();
        let mut stats = stats_for_all_ids();
        stats.pitching = StatsTable::empty(StatKind::Pitching);
        let [away, home] = builder.build(&matchup(), &stats, 1).unwrap();
        assert_eq!(away.features.len(), home.features.len());
        assert_eq!(away.features.len(), 19 * 9 + 28);
        assert!(away.opponent_pitcher_block(builder.layout()).iter().all(Option::is_none));

        let table = predictor_table(builder.layout(), &[away, home]).unwrap();
        assert_eq!(table.columns.len(), 4 + 19 * 9 + 28);
        assert_eq!(table.column("game_date_id").unwrap(), vec!["1", "1"]);
        assert_eq!(table.column("date").unwrap(), vec!["2024-04-10", "2024-04-10"]);
    }

    #[test]
    fn short_lineup_is_rejected() {
        let mut m = matchup();
        m.teams.home.lineup.pop();
        let err = PredictorBuilder::default()
            .build(&m, &SeasonStats::empty(), 1)
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::LineupLength {
                side: Side::Home,
                len: 8
            }
        ));
    }

    #[test]
    fn layout_is_position_major_then_opponent_block() {
        let layout = PredictorLayout::default();
        assert_eq!(layout.len(), 19 * 9 + 28);
        assert_eq!(layout.columns()[0], "R_1");
        assert_eq!(layout.columns()[18], "OPS_1");
        assert_eq!(layout.columns()[19], "R_2");
        assert_eq!(layout.index_of("HR_4"), Some(3 * 19 + 4));
        assert_eq!(layout.columns()[layout.batting_width()], "H_opp_p");
        assert_eq!(layout.columns().last().unwrap(), "SO/W_opp_p");
    }
}
