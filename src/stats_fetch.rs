use chrono::{Datelike, Days, NaiveDate};
use governor::clock::{Clock, DefaultClock};
use scraper::Html;
use tracing::{debug, info};

use crate::document::{element_text, fetch_text, selector};
use crate::egress::{EgressIdentity, IdentityRotator};
use crate::error::{PipelineError, Result};
use crate::http_cache::ResponseCache;
use crate::http_client::ClientPool;
use crate::pacing::{DEFAULT_REQUESTS_PER_MINUTE, SessionPacer};
use crate::season::league_today;
use crate::stats_table::{RawRow, RawTable, StatKind, StatsTable};

pub const BREF_DAILY_URL: &str = "https://www.baseball-reference.com/leagues/daily.cgi";
const MIN_RANGE_YEAR: i32 = 2008;

/// Source of cumulative stats for every player active in a date range.
pub trait RawStatsSource {
    fn fetch_range(
        &mut self,
        kind: StatKind,
        start: NaiveDate,
        end: NaiveDate,
        identity: Option<&EgressIdentity>,
    ) -> Result<RawTable>;
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

/// Season-to-date batting and pitching tables for one slate.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonStats {
    pub batting: StatsTable,
    pub pitching: StatsTable,
}

impl SeasonStats {
    pub fn empty() -> Self {
        Self {
            batting: StatsTable::empty(StatKind::Batting),
            pitching: StatsTable::empty(StatKind::Pitching),
        }
    }
}

pub struct RangeStatsFetcher<S, C: Clock = DefaultClock> {
    source: S,
    rotator: IdentityRotator,
    batting_pacer: SessionPacer<C>,
    pitching_pacer: SessionPacer<C>,
}

impl<S: RawStatsSource> RangeStatsFetcher<S, DefaultClock> {
    pub fn new(source: S, rotator: IdentityRotator) -> Self {
        Self::with_ceiling(source, rotator, DEFAULT_REQUESTS_PER_MINUTE)
    }

    pub fn with_ceiling(source: S, rotator: IdentityRotator, requests_per_minute: u32) -> Self {
        Self::with_pacers(
            source,
            rotator,
            SessionPacer::per_minute("batting", requests_per_minute),
            SessionPacer::per_minute("pitching", requests_per_minute),
        )
    }
}

impl<S: RawStatsSource, C: Clock> RangeStatsFetcher<S, C> {
    pub fn with_pacers(
        source: S,
        rotator: IdentityRotator,
        batting_pacer: SessionPacer<C>,
        pitching_pacer: SessionPacer<C>,
    ) -> Self {
        Self {
            source,
            rotator,
            batting_pacer,
            pitching_pacer,
        }
    }

    /// Stats accumulated from `opening_day` through the day before `date`.
    ///
    /// Opening day has no accumulation window and returns empty tables
    /// without a query. Otherwise the next egress identity is taken once
    /// and used for both the batting and the pitching request.
    pub fn fetch_season_to_date(
        &mut self,
        opening_day: NaiveDate,
        date: NaiveDate,
    ) -> Result<SeasonStats> {
        let end = previous_day(date);
        if end <= previous_day(opening_day) {
            debug!(%date, "no accumulation window before opening day");
            return Ok(SeasonStats::empty());
        }

        let identity = self.rotator.next().cloned();
        if let Some(id) = identity.as_ref() {
            debug!(address = %id.address, port = id.port, "egress identity");
        }
        let batting = self.fetch_range(StatKind::Batting, opening_day, end, identity.as_ref())?;
        let pitching = self.fetch_range(StatKind::Pitching, opening_day, end, identity.as_ref())?;
        info!(
            %date,
            batters = batting.len(),
            pitchers = pitching.len(),
            "season-to-date stats"
        );
        Ok(SeasonStats { batting, pitching })
    }

    pub fn fetch_range(
        &mut self,
        kind: StatKind,
        start: NaiveDate,
        end: NaiveDate,
        identity: Option<&EgressIdentity>,
    ) -> Result<StatsTable> {
        match kind {
            StatKind::Batting => self.batting_pacer.pace(),
            StatKind::Pitching => self.pitching_pacer.pace(),
        }
        let raw = self.source.fetch_range(kind, start, end, identity)?;
        Ok(StatsTable::from_raw(kind, &raw))
    }

    pub fn rotator(&self) -> &IdentityRotator {
        &self.rotator
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Daily-range leaderboards from baseball-reference.
pub struct BrefStatsSource {
    clients: ClientPool,
    cache: Option<ResponseCache>,
    base_url: String,
}

impl BrefStatsSource {
    pub fn new(clients: ClientPool) -> Self {
        Self {
            clients,
            cache: None,
            base_url: BREF_DAILY_URL.to_string(),
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

    pub fn range_url(&self, kind: StatKind, start: NaiveDate, end: NaiveDate) -> String {
        let kind_code = match kind {
            StatKind::Batting => "b",
            StatKind::Pitching => "p",
        };
        format!(
            "{}?user_team=&bust_cache=&type={kind_code}&lastndays=7&dates=fromandto&fromandto={}.{}&level=mlb&franch=&stat=&stat_value=0",
            self.base_url,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
        )
    }
}

impl RawStatsSource for BrefStatsSource {
    fn fetch_range(
        &mut self,
        kind: StatKind,
        start: NaiveDate,
        end: NaiveDate,
        identity: Option<&EgressIdentity>,
    ) -> Result<RawTable> {
        if start.year() < MIN_RANGE_YEAR || end.year() < MIN_RANGE_YEAR {
            return Err(PipelineError::Validation(format!(
                "range stats start in {MIN_RANGE_YEAR}; got {start}..{end}"
            )));
        }
        let url = self.range_url(kind, start, end);
        let client = self.clients.client_for(identity)?;
        // A range that closed before today is final.
        let body = match self.cache.as_ref() {
            Some(cache) if end < league_today() => cache.fetch_text(&client, &url)?,
            _ => fetch_text(&client, &url)?,
        };
        parse_range_table(&body)
    }
}

/// First table on the page: header cells minus the rank column, then one
/// row per player with the id taken from the link's `mlb_ID=` parameter.
pub fn parse_range_table(html: &str) -> Result<RawTable> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let body_row_sel = selector("tbody tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;
    let link_sel = selector("a")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| PipelineError::Parse("no stats table on range page".to_string()))?;
    let header_row = table
        .select(&row_sel)
        .next()
        .ok_or_else(|| PipelineError::Parse("stats table has no header row".to_string()))?;

    let mut headers = header_row
        .select(&th_sel)
        .skip(1)
        .map(|th| element_text(&th))
        .collect::<Vec<_>>();
    headers.push("mlbID".to_string());

    let mut rows = Vec::new();
    for tr in table.select(&body_row_sel) {
        let mut cells = tr.select(&td_sel).map(|td| element_text(&td)).collect::<Vec<_>>();
        if cells.is_empty() {
            continue;
        }
        let mlb_id = tr
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| href.rsplit("mlb_ID=").next())
            .and_then(|id| id.trim().parse::<u32>().ok());
        cells.push(mlb_id.map(|id| id.to_string()).unwrap_or_default());
        rows.push(RawRow { cells, mlb_id });
    }
    Ok(RawTable { headers, rows })
}
