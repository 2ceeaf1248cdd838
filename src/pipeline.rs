use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use governor::clock::{Clock, DefaultClock};
use tracing::info;

use crate::artifact::{ArtifactStore, ArtifactVersion, FolderBoard};
use crate::assembler::HistoricalAssembler;
use crate::config::PipelineConfig;
use crate::document::{DocumentFetcher, HttpDocumentFetcher};
use crate::egress::IdentityRotator;
use crate::game_logs::{BrefGameLogSource, GameLogSource, collect_game_logs, game_log_table};
use crate::http_cache::ResponseCache;
use crate::http_client::{ClientPool, build_client};
use crate::lineups::LineupSource;
use crate::outcomes::{OutcomeMerge, labeled_table, merge_outcomes};
use crate::pacing::SessionPacer;
use crate::predictors::predictor_table;
use crate::retry::RetryPolicy;
use crate::stats_fetch::{BrefStatsSource, RangeStatsFetcher, RawStatsSource};

#[derive(Debug, Clone)]
pub struct SeasonRun {
    pub target: NaiveDate,
    pub dates: usize,
    pub predictor_rows: usize,
    pub skipped: usize,
    pub game_logs: usize,
    pub merges: Vec<OutcomeMerge>,
    pub artifacts: Vec<ArtifactVersion>,
}

pub struct SeasonPipeline<F, S, G, A, C: Clock = DefaultClock> {
    assembler: HistoricalAssembler<F, S, C>,
    game_logs: G,
    store: A,
    outcomes: Vec<String>,
    retry: RetryPolicy,
}

pub type LiveSeasonPipeline = SeasonPipeline<
    HttpDocumentFetcher,
    BrefStatsSource,
    BrefGameLogSource,
    FolderBoard,
>;

impl LiveSeasonPipeline {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let timeout = config.request_timeout();
        let client = build_client(None, timeout).context("build http client")?;
        let cache = |name: &str| {
            if !config.response_cache {
                return None;
            }
            match config.cache_dir.as_ref() {
                Some(dir) => Some(ResponseCache::at(dir.join(name))),
                None => ResponseCache::named(name),
            }
        };

        let lineups = LineupSource::with_base_url(
            HttpDocumentFetcher::with_client(client.clone()),
            &config.lineups_base_url,
        );

        let rotator = match config.egress_pool.as_ref() {
            Some(path) => IdentityRotator::load(path)?,
            None => IdentityRotator::default(),
        };
        info!(identities = rotator.len(), "egress pool");
        let mut stats_source =
            BrefStatsSource::new(ClientPool::new(timeout)).with_base_url(&config.stats_base_url);
        if let Some(cache) = cache("range_stats") {
            stats_source = stats_source.with_cache(cache);
        }
        let stats = RangeStatsFetcher::with_ceiling(stats_source, rotator, config.requests_per_minute);

        let mut game_logs = BrefGameLogSource::with_pacer(
            client,
            SessionPacer::per_minute("game_logs", config.requests_per_minute),
        )
        .with_base_url(&config.game_log_base_url);
        if let Some(cache) = cache("game_logs") {
            game_logs = game_logs.with_cache(cache);
        }

        let assembler = HistoricalAssembler::new(lineups, stats, config.calendar())
            .with_retry(config.retry_policy());
        Ok(SeasonPipeline::new(
            assembler,
            game_logs,
            FolderBoard::new(&config.artifact_dir),
        )
        .with_outcomes(config.outcomes.clone())
        .with_retry(config.retry_policy()))
    }
}

impl<F, S, G, A, C> SeasonPipeline<F, S, G, A, C>
where
    F: DocumentFetcher,
    S: RawStatsSource,
    G: GameLogSource,
    A: ArtifactStore,
    C: Clock,
{
    pub fn new(assembler: HistoricalAssembler<F, S, C>, game_logs: G, store: A) -> Self {
        Self {
            assembler,
            game_logs,
            store,
            outcomes: vec!["R".to_string()],
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_outcomes(mut self, outcomes: Vec<String>) -> Self {
        self.outcomes = outcomes;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &A {
        &self.store
    }

    pub fn run(&mut self, target: NaiveDate) -> Result<SeasonRun> {
        let year = target.year();
        let assembly = self
            .assembler
            .assemble_through(target)
            .with_context(|| format!("assemble {year} through {target}"))?;
        let layout = self.assembler.builder().layout().clone();
        let dates = assembly.reports.len();
        let skipped = assembly.skipped_count();
        let rows = assembly.into_rows();

        let mut artifacts = Vec::new();
        let lineup_table = predictor_table(&layout, &rows)?;
        artifacts.push(self.store.write(&lineup_table, &format!("lineups_{year}"))?);

        let logs = collect_game_logs(&mut self.game_logs, target, &self.retry)
            .with_context(|| format!("collect {year} game logs"))?;
        artifacts.push(self.store.write(&game_log_table(&logs)?, &format!("game_logs_{year}"))?);

        let mut merges = Vec::with_capacity(self.outcomes.len());
        for outcome in &self.outcomes {
            let merge = merge_outcomes(&rows, &logs, outcome)
                .with_context(|| format!("merge outcome {outcome}"))?;
            let name = format!("lineups_outcome_{}_{year}", merge.outcome);
            artifacts.push(self.store.write(&labeled_table(&layout, &merge)?, &name)?);
            merges.push(merge);
        }

        info!(
            %target,
            dates,
            rows = rows.len(),
            skipped,
            game_logs = logs.len(),
            artifacts = artifacts.len(),
            "season run complete"
        );
        Ok(SeasonRun {
            target,
            dates,
            predictor_rows: rows.len(),
            skipped,
            game_logs: logs.len(),
            merges,
            artifacts,
        })
    }
}
