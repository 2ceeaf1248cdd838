use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::NaiveDate;
use scraper::Html;

use lineup_predictors::artifact::FolderBoard;
use lineup_predictors::assembler::HistoricalAssembler;
use lineup_predictors::document::DocumentFetcher;
use lineup_predictors::egress::{EgressIdentity, IdentityRotator};
use lineup_predictors::error::{PipelineError, Result};
use lineup_predictors::game_logs::{GameLogSource, RawGameLog};
use lineup_predictors::lineups::LineupSource;
use lineup_predictors::pipeline::SeasonPipeline;
use lineup_predictors::season::{SeasonCalendar, SeasonDates};
use lineup_predictors::stats_fetch::{RangeStatsFetcher, RawStatsSource};
use lineup_predictors::stats_table::{BATTING, PITCHING, RawRow, RawTable, StatKind};

const FAST_CEILING: u32 = 600;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn ymd(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// Serves the same slate for every date.
struct FixtureFetcher {
    body: String,
    fetches: Rc<Cell<usize>>,
}

impl FixtureFetcher {
    fn new(body: String) -> Self {
        Self {
            body,
            fetches: Rc::new(Cell::new(0)),
        }
    }
}

impl DocumentFetcher for FixtureFetcher {
    fn fetch(&self, _url: &str) -> Result<Html> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(Html::parse_document(&self.body))
    }
}

/// Every counting stat equals the player id over 10 PA / IP. The first
/// `fail_first` calls fail like a blocked page.
#[derive(Default)]
struct SyntheticStats {
    calls: usize,
    fail_first: usize,
    proxies: Vec<Option<String>>,
}

impl RawStatsSource for SyntheticStats {
    fn fetch_range(
        &mut self,
        kind: StatKind,
        _start: NaiveDate,
        _end: NaiveDate,
        identity: Option<&EgressIdentity>,
    ) -> Result<RawTable> {
        self.calls += 1;
        if self.calls <= self.fail_first {
            return Err(PipelineError::Parse("no stats table on range page".into()));
        }
        self.proxies.push(identity.map(|i| i.address.clone()));

        let (denominator, keep, ids): (&str, &[&str], Vec<u32>) = match kind {
            StatKind::Batting => ("PA", BATTING.keep, (1..=60).collect()),
            StatKind::Pitching => ("IP", PITCHING.keep, vec![100, 200, 300, 301, 400, 401, 500]),
        };
        let mut headers = vec![denominator.to_string()];
        headers.extend(keep.iter().map(|s| s.to_string()));
        headers.push("mlbID".to_string());
        let rows = ids
            .into_iter()
            .map(|id| {
                let mut cells = vec!["10".to_string()];
                cells.extend(keep.iter().map(|_| id.to_string()));
                cells.push(id.to_string());
                RawRow {
                    cells,
                    mlb_id: Some(id),
                }
            })
            .collect();
        Ok(RawTable { headers, rows })
    }
}

/// Logs for the four fixture clubs on 2024-03-28..=2024-03-31. The Reds'
/// nightcap on 03-30 has no run total.
struct SyntheticLogs;

impl GameLogSource for SyntheticLogs {
    fn fetch_team_logs(&mut self, season: i32, team_code: &str) -> Result<Vec<RawGameLog>> {
        assert_eq!(season, 2024);
        let doubleheader = matches!(team_code, "CHC" | "CIN");
        if !matches!(team_code, "NYY" | "HOU" | "CHC" | "CIN") {
            return Ok(Vec::new());
        }
        let mut logs = Vec::new();
        for day in 28..=31 {
            let games: &[Option<u8>] = if doubleheader { &[Some(1), Some(2)] } else { &[None] };
            for game in games {
                let date = match game {
                    Some(g) => format!("Mar {day} ({g})"),
                    None => format!("Mar {day}"),
                };
                let runs = if team_code == "CIN" && day == 30 && *game == Some(2) {
                    String::new()
                } else {
                    (day - 25).to_string()
                };
                logs.push(RawGameLog {
                    cells: vec![
                        ("rk".into(), "1".into()),
                        ("date".into(), date),
                        ("home".into(), if matches!(team_code, "HOU" | "CIN") { "".into() } else { "@".into() }),
                        ("opp".into(), "OPP".into()),
                        ("r".into(), runs),
                        ("hr".into(), "1".into()),
                        ("thr".into(), "R".into()),
                    ],
                });
            }
        }
        Ok(logs)
    }
}

fn calendar() -> SeasonCalendar {
    SeasonCalendar::default().with_season(
        2024,
        SeasonDates {
            opening_day: ymd(3, 28),
            exhibition_day: ymd(7, 16),
        },
    )
}

fn rotator() -> IdentityRotator {
    IdentityRotator::new(
        ["egress-a", "egress-b"]
            .iter()
            .map(|addr| EgressIdentity {
                address: addr.to_string(),
                port: 8080,
                username: "user".into(),
                password: "secret".into(),
            })
            .collect(),
    )
}

fn assembler(stats: SyntheticStats) -> HistoricalAssembler<FixtureFetcher, SyntheticStats> {
    let lineups = LineupSource::new(FixtureFetcher::new(read_fixture("lineups_2024-04-02.html")));
    let stats = RangeStatsFetcher::with_ceiling(stats, rotator(), FAST_CEILING);
    HistoricalAssembler::new(lineups, stats, calendar())
        .with_sleep(|_| {})
}

#[test]
fn season_assembly_rows_ids_and_egress() {
    init_tracing();
    let mut assembler = assembler(SyntheticStats::default());
    let assembly = assembler.assemble_through(ymd(3, 31)).unwrap();

    assert_eq!(
        assembly.reports.iter().map(|r| r.date).collect::<Vec<_>>(),
        vec![ymd(3, 28), ymd(3, 29), ymd(3, 30)]
    );
    assert_eq!(assembly.row_count(), 18);
    assert_eq!(assembly.skipped_count(), 3);

    let opening = &assembly.reports[0];
    assert!(opening.rows.iter().all(|r| r.features.iter().all(Option::is_none)));

    let day_two = &assembly.reports[1];
    let ids = day_two
        .rows
        .iter()
        .map(|r| (r.team.as_str(), r.game_date_id))
        .collect::<Vec<_>>();
    assert_eq!(
        ids,
        vec![
            ("Yankees", 1),
            ("Astros", 1),
            ("Cubs", 1),
            ("Reds", 1),
            ("Cubs", 2),
            ("Reds", 2)
        ]
    );
    let layout = assembler.builder().layout();
    assert_eq!(day_two.rows[0].feature(layout, "H_opp_p"), Some(20.0));
    assert_eq!(day_two.rows[1].feature(layout, "H_opp_p"), Some(10.0));
    assert_eq!(day_two.rows[0].feature(layout, "HR_3"), Some(0.3));

    // Opening day skipped the query; one identity per later date.
    let source = assembler.stats().source();
    assert_eq!(source.calls, 4);
    assert_eq!(
        source.proxies,
        vec![
            Some("egress-a".to_string()),
            Some("egress-a".to_string()),
            Some("egress-b".to_string()),
            Some("egress-b".to_string())
        ]
    );
    assert_eq!(assembler.stats().rotator().cursor(), 0);
}

#[test]
fn transient_failures_rerun_the_whole_date() {
    init_tracing();
    let mut assembler = assembler(SyntheticStats {
        fail_first: 2,
        ..SyntheticStats::default()
    });
    let report = assembler
        .assemble_date_with_retry(ymd(3, 28), ymd(3, 29))
        .unwrap();
    assert_eq!(report.attempts, 3);
    assert_eq!(report.rows.len(), 6);
}

#[test]
fn structural_change_aborts_without_retry() {
    init_tracing();
    let html = read_fixture("lineups_2024-04-02.html").replacen(
        r#"<div class="starting-lineups__pitchers">"#,
        r#"<div class="starting-lineups__pitchers"><div class="starting-lineups__pitcher-name">TBD</div>"#,
        1,
    );
    let fetcher = FixtureFetcher::new(html);
    let fetches = Rc::clone(&fetcher.fetches);
    let mut assembler = HistoricalAssembler::new(
        LineupSource::new(fetcher),
        RangeStatsFetcher::with_ceiling(SyntheticStats::default(), rotator(), FAST_CEILING),
        calendar(),
    )
    .with_sleep(|_| panic!("structural errors are not retried"));

    let err = assembler.assemble_through(ymd(3, 31)).unwrap_err();
    assert!(matches!(err, PipelineError::Structural(_)));
    assert_eq!(fetches.get(), 1);
}

#[test]
fn unknown_season_is_fatal() {
    let mut assembler = assembler(SyntheticStats::default());
    let err = assembler.assemble_through(NaiveDate::from_ymd_opt(2019, 5, 1).unwrap()).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn season_run_labels_and_persists() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut pipeline = SeasonPipeline::new(
        assembler(SyntheticStats::default()),
        SyntheticLogs,
        FolderBoard::new(dir.path()),
    )
    .with_outcomes(vec!["R".to_string(), "HR".to_string()]);

    let run = pipeline.run(ymd(3, 31)).unwrap();
    assert_eq!(run.predictor_rows, 18);
    assert_eq!(run.skipped, 3);
    // 2 single-game clubs + 2 doubleheader clubs, three days before the target.
    assert_eq!(run.game_logs, 3 * (1 + 1 + 2 + 2));

    let runs = &run.merges[0];
    assert_eq!(runs.outcome, "r");
    assert_eq!(runs.dropped, 2);
    assert_eq!(runs.rows.len(), 16);
    assert!(
        !runs
            .rows
            .iter()
            .any(|r| r.predictors.team == "reds" && r.predictors.date == ymd(3, 30))
    );
    let yankees_opener = &runs.rows[0];
    assert_eq!(yankees_opener.predictors.team, "yankees");
    assert_eq!(yankees_opener.outcome, Some(3.0));
    assert_eq!(yankees_opener.home, Some(false));

    assert_eq!(run.merges[1].dropped, 0);

    let names = run.artifacts.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["lineups_2024", "game_logs_2024", "lineups_outcome_r_2024", "lineups_outcome_hr_2024"]
    );
    let labeled = &run.artifacts[2];
    assert_eq!(labeled.rows, 16);
    let csv_path = dir
        .path()
        .join(&labeled.name)
        .join(&labeled.version)
        .join(&labeled.file);
    let body = fs::read_to_string(csv_path).unwrap();
    let header = body.lines().next().unwrap();
    assert!(header.starts_with("team,home_team,date,R_1,"));
    assert!(header.ends_with("SO/W_opp_p,home,r,thr"));
    assert_eq!(pipeline.store().versions("lineups_2024").unwrap().len(), 1);
}
