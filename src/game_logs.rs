use chrono::{Datelike, NaiveDate};
use governor::clock::{Clock, DefaultClock};
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::blocking::Client;
use scraper::Html;
use tracing::{debug, info};

use crate::artifact::{Table, num_cell};
use crate::document::{element_text, fetch_text, selector};
use crate::error::{PipelineError, Result};
use crate::http_cache::ResponseCache;
use crate::pacing::{DEFAULT_REQUESTS_PER_MINUTE, SessionPacer};
use crate::retry::RetryPolicy;
use crate::season::league_today;
use crate::stats_table::parse_stat_cell;

pub const BREF_GAME_LOG_URL: &str = "https://www.baseball-reference.com/teams/tgl.cgi";

/// Lowercase lineup-page team name to baseball-reference franchise code.
pub const BREF_TEAMS: [(&str, &str); 30] = [
    ("angels", "LAA"),
    ("d-backs", "ARI"),
    ("braves", "ATL"),
    ("orioles", "BAL"),
    ("red sox", "BOS"),
    ("cubs", "CHC"),
    ("white sox", "CHW"),
    ("reds", "CIN"),
    ("guardians", "CLE"),
    ("rockies", "COL"),
    ("tigers", "DET"),
    ("marlins", "MIA"),
    ("astros", "HOU"),
    ("royals", "KCR"),
    ("dodgers", "LAD"),
    ("brewers", "MIL"),
    ("twins", "MIN"),
    ("mets", "NYM"),
    ("yankees", "NYY"),
    ("athletics", "OAK"),
    ("phillies", "PHI"),
    ("pirates", "PIT"),
    ("padres", "SDP"),
    ("mariners", "SEA"),
    ("giants", "SFG"),
    ("cardinals", "STL"),
    ("rays", "TBR"),
    ("rangers", "TEX"),
    ("blue jays", "TOR"),
    ("nationals", "WSN"),
];

pub fn bref_code(team: &str) -> Option<&'static str> {
    let key = team.trim().to_lowercase();
    BREF_TEAMS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, code)| *code)
}

/// One game-log line as scraped, cells keyed by lowercased header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGameLog {
    pub cells: Vec<(String, String)>,
}

impl RawGameLog {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

pub trait GameLogSource {
    fn fetch_team_logs(&mut self, season: i32, team_code: &str) -> Result<Vec<RawGameLog>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameLogRow {
    pub team: String,
    pub clean_date: NaiveDate,
    pub game_date_id: u8,
    pub home: bool,
    pub opponent: String,
    pub thr: Option<String>,
    pub stats: Vec<(String, Option<f64>)>,
}

impl GameLogRow {
    pub fn stat(&self, name: &str) -> Option<f64> {
        let name = name.to_lowercase();
        self.stats
            .iter()
            .find(|(s, _)| *s == name)
            .and_then(|(_, v)| *v)
    }

    pub fn has_stat(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.stats.iter().any(|(s, _)| *s == name)
    }
}

const TEXT_COLUMNS: [&str; 9] = [
    "rk",
    "gtm",
    "date",
    "home",
    "opp",
    "rslt",
    "thr",
    "oppstart",
    "opp. starter (gmesc)",
];

fn date_regex() -> Result<&'static Regex> {
    static DATE_RE: OnceCell<Regex> = OnceCell::new();
    DATE_RE.get_or_try_init(|| {
        Regex::new(r"([A-Za-z]{3}) (\d{1,2})\s*(?:\((\d+)\))?")
            .map_err(|err| PipelineError::Parse(format!("game date pattern: {err}")))
    })
}

/// `"Apr 3"` is game 1 on April 3rd; `"Jul 4 (2)"` is the second game of a
/// doubleheader. Trailing notes such as `susp` are ignored.
pub fn parse_game_date(raw: &str, season: i32) -> Result<Option<(NaiveDate, u8)>> {
    let Some(caps) = date_regex()?.captures(raw) else {
        return Ok(None);
    };
    let (Some(month), Some(day)) = (caps.get(1), caps.get(2)) else {
        return Ok(None);
    };
    let text = format!("{season} {} {}", month.as_str(), day.as_str());
    let Ok(date) = NaiveDate::parse_from_str(&text, "%Y %b %d") else {
        return Ok(None);
    };
    let game = caps
        .get(3)
        .and_then(|m| m.as_str().parse::<u8>().ok())
        .unwrap_or(1);
    Ok(Some((date, game)))
}

pub fn clean_game_log(team: &str, season: i32, raw: &RawGameLog) -> Result<Option<GameLogRow>> {
    let date = raw.get("date").unwrap_or_default();
    let Some((clean_date, game_date_id)) = parse_game_date(date, season)? else {
        return Ok(None);
    };
    let stats = raw
        .cells
        .iter()
        .filter(|(h, _)| !h.is_empty() && !TEXT_COLUMNS.contains(&h.as_str()))
        .map(|(h, v)| (h.clone(), parse_stat_cell(v)))
        .collect();
    Ok(Some(GameLogRow {
        team: team.to_lowercase(),
        clean_date,
        game_date_id,
        home: raw.get("home").is_none_or(|loc| loc.trim() != "@"),
        opponent: raw.get("opp").unwrap_or_default().to_string(),
        thr: raw
            .get("thr")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
        stats,
    }))
}

/// Every franchise's games played strictly before `through`, in
/// `BREF_TEAMS` order. Each team fetch runs under `retry`.
pub fn collect_game_logs<G: GameLogSource>(
    source: &mut G,
    through: NaiveDate,
    retry: &RetryPolicy,
) -> Result<Vec<GameLogRow>> {
    let season = through.year();
    let mut rows = Vec::new();
    for (team, code) in BREF_TEAMS {
        let raw = retry
            .run(code, || source.fetch_team_logs(season, code))?
            .value;
        let before = rows.len();
        for line in &raw {
            let Some(row) = clean_game_log(team, season, line)? else {
                continue;
            };
            if row.clean_date < through {
                rows.push(row);
            }
        }
        debug!(team, code, games = rows.len() - before, "game logs");
    }
    info!(%through, rows = rows.len(), "game logs collected");
    Ok(rows)
}

pub fn game_log_table(rows: &[GameLogRow]) -> anyhow::Result<Table> {
    let stat_names = rows
        .first()
        .map(|r| r.stats.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>())
        .unwrap_or_default();
    let mut columns = ["team", "clean_date", "game_date_id", "home", "opp", "thr"]
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>();
    columns.extend(stat_names.iter().cloned());

    let mut table = Table::new(columns);
    for row in rows {
        let mut cells = vec![
            row.team.clone(),
            row.clean_date.format("%Y-%m-%d").to_string(),
            row.game_date_id.to_string(),
            row.home.to_string(),
            row.opponent.clone(),
            row.thr.clone().unwrap_or_default(),
        ];
        cells.extend(stat_names.iter().map(|s| num_cell(row.stat(s))));
        table.push_row(cells)?;
    }
    Ok(table)
}

/// Team batting game logs from baseball-reference.
pub struct BrefGameLogSource<C: Clock = DefaultClock> {
    client: Client,
    cache: Option<ResponseCache>,
    base_url: String,
    pacer: SessionPacer<C>,
}

impl BrefGameLogSource<DefaultClock> {
    pub fn new(client: Client) -> Self {
        Self::with_pacer(
            client,
            SessionPacer::per_minute("game_logs", DEFAULT_REQUESTS_PER_MINUTE),
        )
    }
}

impl<C: Clock> BrefGameLogSource<C> {
    pub fn with_pacer(client: Client, pacer: SessionPacer<C>) -> Self {
        Self {
            client,
            cache: None,
            base_url: BREF_GAME_LOG_URL.to_string(),
            pacer,
        }
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    pub fn team_url(&self, season: i32, team_code: &str) -> String {
        format!("{}?team={team_code}&t=b&year={season}", self.base_url)
    }
}

impl<C: Clock> GameLogSource for BrefGameLogSource<C> {
    fn fetch_team_logs(&mut self, season: i32, team_code: &str) -> Result<Vec<RawGameLog>> {
        let url = self.team_url(season, team_code);
        self.pacer.pace();
        let body = match self.cache.as_ref() {
            // Only finished seasons are final.
            Some(cache) if season < league_today().year() => {
                cache.fetch_text(&self.client, &url)?
            }
            _ => fetch_text(&self.client, &url)?,
        };
        parse_game_log_table(&body)
    }
}

/// `team_batting_gamelogs` table (falls back to the first table). The
/// unnamed column holding `@` for road games becomes `home`.
pub fn parse_game_log_table(html: &str) -> Result<Vec<RawGameLog>> {
    let document = Html::parse_document(html);
    let by_id = selector("table#team_batting_gamelogs")?;
    let any_table = selector("table")?;
    let head_row_sel = selector("thead tr")?;
    let th_sel = selector("th")?;
    let body_row_sel = selector("tbody tr")?;
    let cell_sel = selector("th, td")?;

    let table = document
        .select(&by_id)
        .next()
        .or_else(|| document.select(&any_table).next())
        .ok_or_else(|| PipelineError::Parse("no game log table".to_string()))?;
    let header_row = table
        .select(&head_row_sel)
        .last()
        .ok_or_else(|| PipelineError::Parse("game log table has no header".to_string()))?;

    let mut named_home = false;
    let headers = header_row
        .select(&th_sel)
        .map(|th| {
            let text = element_text(&th).to_lowercase();
            if text.is_empty() && !named_home {
                named_home = true;
                "home".to_string()
            } else {
                text
            }
        })
        .collect::<Vec<_>>();

    let mut logs = Vec::new();
    for tr in table.select(&body_row_sel) {
        if tr.value().classes().any(|c| c == "thead") {
            continue;
        }
        let values = tr.select(&cell_sel).map(|c| element_text(&c)).collect::<Vec<_>>();
        if values.len() < 2 {
            continue;
        }
        let cells = headers.iter().cloned().zip(values).collect();
        logs.push(RawGameLog { cells });
    }
    Ok(logs)
}
