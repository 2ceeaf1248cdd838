use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use governor::clock::{Clock, DefaultClock};
use tracing::{debug, info, warn};

use crate::document::DocumentFetcher;
use crate::error::Result;
use crate::lineups::{LineupSource, SkipReason};
use crate::predictors::{PredictorBuilder, PredictorRow};
use crate::retry::RetryPolicy;
use crate::season::SeasonCalendar;
use crate::stats_fetch::{RangeStatsFetcher, RawStatsSource};

#[derive(Debug, Default)]
pub struct DoubleheaderCounter {
    seen: HashMap<String, u8>,
}

impl DoubleheaderCounter {
    pub fn assign(&mut self, pairing: &str) -> u8 {
        let count = self.seen.entry(pairing.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        if *count > 2 {
            warn!(pairing, sighting = *count, "more than two games for pairing; using id 2");
        }
        (*count).min(2)
    }
}

#[derive(Debug, Clone)]
pub struct DateReport {
    pub date: NaiveDate,
    pub rows: Vec<PredictorRow>,
    pub skipped: Vec<SkipReason>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SeasonAssembly {
    pub reports: Vec<DateReport>,
}

impl SeasonAssembly {
    pub fn rows(&self) -> impl Iterator<Item = &PredictorRow> {
        self.reports.iter().flat_map(|r| r.rows.iter())
    }

    pub fn into_rows(self) -> Vec<PredictorRow> {
        self.reports.into_iter().flat_map(|r| r.rows).collect()
    }

    pub fn row_count(&self) -> usize {
        self.reports.iter().map(|r| r.rows.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.reports.iter().map(|r| r.skipped.len()).sum()
    }
}

pub struct HistoricalAssembler<F, S, C: Clock = DefaultClock> {
    lineups: LineupSource<F>,
    stats: RangeStatsFetcher<S, C>,
    builder: PredictorBuilder,
    calendar: SeasonCalendar,
    retry: RetryPolicy,
    sleep: fn(Duration),
}

impl<F, S, C> HistoricalAssembler<F, S, C>
where
    F: DocumentFetcher,
    S: RawStatsSource,
    C: Clock,
{
    pub fn new(
        lineups: LineupSource<F>,
        stats: RangeStatsFetcher<S, C>,
        calendar: SeasonCalendar,
    ) -> Self {
        Self {
            lineups,
            stats,
            builder: PredictorBuilder::default(),
            calendar,
            retry: RetryPolicy::default(),
            sleep: thread::sleep,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_builder(mut self, builder: PredictorBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn builder(&self) -> &PredictorBuilder {
        &self.builder
    }

    pub fn calendar(&self) -> &SeasonCalendar {
        &self.calendar
    }

    pub fn stats(&self) -> &RangeStatsFetcher<S, C> {
        &self.stats
    }

    pub fn assemble_date(&mut self, opening_day: NaiveDate, date: NaiveDate) -> Result<DateReport> {
        let slate = self.lineups.lineups_for_date(date)?;
        let stats = self.stats.fetch_season_to_date(opening_day, date)?;

        let mut counter = DoubleheaderCounter::default();
        let mut rows = Vec::with_capacity(slate.matchups.len() * 2);
        let mut skipped = slate.skipped;
        for matchup in &slate.matchups {
            let pairing = matchup.pairing();
            let game_date_id = counter.assign(&pairing);
            match self.builder.build(matchup, &stats, game_date_id) {
                Ok(pair) => rows.extend(pair),
                Err(err) => {
                    debug!(%date, %pairing, error = %err, "matchup skipped");
                    skipped.push(SkipReason::BuildFailed {
                        pairing,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(DateReport {
            date,
            rows,
            skipped,
            attempts: 1,
        })
    }

    pub fn assemble_date_with_retry(
        &mut self,
        opening_day: NaiveDate,
        date: NaiveDate,
    ) -> Result<DateReport> {
        let retry = self.retry;
        let sleep = self.sleep;
        let label = date.to_string();
        let outcome = retry.run_with_sleep(
            &label,
            || self.assemble_date(opening_day, date),
            sleep,
        )?;
        let mut report = outcome.value;
        report.attempts = outcome.attempts;
        info!(
            %date,
            rows = report.rows.len(),
            skipped = report.skipped.len(),
            attempt = report.attempts,
            "date assembled"
        );
        Ok(report)
    }

    pub fn assemble_through(&mut self, target: NaiveDate) -> Result<SeasonAssembly> {
        let dates = self.calendar.dates_through(target)?;
        let opening_day = self.calendar.season(target.year())?.opening_day;

        let mut assembly = SeasonAssembly::default();
        for date in dates {
            let report = self.assemble_date_with_retry(opening_day, date)?;
            if report.rows.is_empty() {
                debug!(%date, "no rows for date");
            }
            assembly.reports.push(report);
        }
        info!(
            %target,
            dates = assembly.reports.len(),
            rows = assembly.row_count(),
            skipped = assembly.skipped_count(),
            "season assembled"
        );
        Ok(assembly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_pairings_get_second_game_id() {
        let mut counter = DoubleheaderCounter::default();
        assert_eq!(counter.assign("Astros@Yankees"), 1);
        assert_eq!(counter.assign("Mets@Braves"), 1);
        assert_eq!(counter.assign("Astros@Yankees"), 2);
        assert_eq!(counter.assign("Yankees@Astros"), 1);
    }

    #[test]
    fn third_sighting_stays_at_two() {
        let mut counter = DoubleheaderCounter::default();
        let ids = (0..3).map(|_| counter.assign("Cubs@Reds")).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 2]);
    }
}
