use std::fmt;

use chrono::NaiveDate;
use deunicode::deunicode;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{DocumentFetcher, element_text, selector};
use crate::error::{PipelineError, Result};

pub const LINEUPS_BASE_URL: &str = "https://www.mlb.com/starting-lineups";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Away,
    Home,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Away, Side::Home];

    fn css(self) -> &'static str {
        match self {
            Side::Away => "away",
            Side::Home => "home",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.css())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BySide<T> {
    pub away: T,
    pub home: T,
}

impl<T> BySide<T> {
    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Away => &self.away,
            Side::Home => &self.home,
        }
    }

    pub fn map<U>(&self, mut f: impl FnMut(Side, &T) -> U) -> BySide<U> {
        BySide {
            away: f(Side::Away, &self.away),
            home: f(Side::Home, &self.home),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub mlb_id: u32,
    pub display_name: String,
    pub profile_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSide {
    pub team_name: String,
    pub team_code: String,
    pub pitcher: Option<Player>,
    pub lineup: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub date: NaiveDate,
    pub teams: BySide<TeamSide>,
}

impl Matchup {
    pub fn side(&self, side: Side) -> &TeamSide {
        self.teams.get(side)
    }

    pub fn pairing(&self) -> String {
        format!("{}@{}", self.teams.home.team_name, self.teams.away.team_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingLineup(Side),
    MissingPitcher(Side),
    MalformedFragment(String),
    BuildFailed { pairing: String, reason: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingLineup(side) => write!(f, "{side} lineup not posted"),
            SkipReason::MissingPitcher(side) => write!(f, "{side} starter not announced"),
            SkipReason::MalformedFragment(msg) => write!(f, "malformed matchup: {msg}"),
            SkipReason::BuildFailed { pairing, reason } => {
                write!(f, "{pairing}: predictors not built: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Valid(Matchup),
    Skipped(SkipReason),
}

pub fn parse_player_id(url: &str) -> Option<u32> {
    url.trim()
        .trim_end_matches('/')
        .rsplit('-')
        .next()?
        .parse::<u32>()
        .ok()
}

pub fn ascii_name(raw: &str) -> String {
    deunicode(raw.trim())
}

fn player_from_link(link: &ElementRef<'_>) -> std::result::Result<Player, SkipReason> {
    let url = link.value().attr("href").unwrap_or_default().to_string();
    let Some(mlb_id) = parse_player_id(&url) else {
        return Err(SkipReason::MalformedFragment(format!(
            "no player id in href {url:?}"
        )));
    };
    Ok(Player {
        mlb_id,
        display_name: ascii_name(&element_text(link)),
        profile_url: url,
    })
}

fn team_identity(
    fragment: &ElementRef<'_>,
    side: Side,
) -> Result<std::result::Result<(String, String), SkipReason>> {
    let name_sel = selector(&format!(
        "span.starting-lineups__team-name.starting-lineups__team-name--{}",
        side.css()
    ))?;
    let link_sel = selector("a.starting-lineups__team-name--link")?;

    let Some(name_el) = fragment.select(&name_sel).next() else {
        return Ok(Err(SkipReason::MalformedFragment(format!(
            "no {side} team name"
        ))));
    };
    let code = name_el
        .select(&link_sel)
        .next()
        .and_then(|a| a.value().attr("data-tri-code"))
        .map(|c| c.trim().to_string());
    let Some(code) = code else {
        return Ok(Err(SkipReason::MalformedFragment(format!(
            "no {side} team code"
        ))));
    };
    Ok(Ok((element_text(&name_el), code)))
}

fn starting_pitchers(
    fragment: &ElementRef<'_>,
) -> Result<std::result::Result<BySide<Option<Player>>, SkipReason>> {
    let slot_sel = selector("div.starting-lineups__pitcher-name")?;
    let link_sel = selector("a.starting-lineups__pitcher--link")?;

    let slots = fragment.select(&slot_sel).collect::<Vec<_>>();
    let [away_slot, home_slot] = slots.as_slice() else {
        return Err(PipelineError::Structural(format!(
            "two pitchers expected; found {}",
            slots.len()
        )));
    };

    let read = |slot: &ElementRef<'_>| match slot.select(&link_sel).next() {
        None => Ok(None),
        Some(link) => player_from_link(&link).map(Some),
    };
    let away = match read(away_slot) {
        Ok(p) => p,
        Err(reason) => return Ok(Err(reason)),
    };
    let home = match read(home_slot) {
        Ok(p) => p,
        Err(reason) => return Ok(Err(reason)),
    };
    Ok(Ok(BySide { away, home }))
}

fn batting_order(
    fragment: &ElementRef<'_>,
    side: Side,
) -> Result<std::result::Result<Vec<Player>, SkipReason>> {
    let list_sel = selector(&format!(
        "ol.starting-lineups__team.starting-lineups__team--{}",
        side.css()
    ))?;
    let player_sel = selector("a.starting-lineups__player--link")?;

    let Some(list) = fragment.select(&list_sel).next() else {
        return Ok(Err(SkipReason::MalformedFragment(format!(
            "no {side} lineup container"
        ))));
    };
    let mut players = Vec::new();
    for link in list.select(&player_sel) {
        match player_from_link(&link) {
            Ok(player) => players.push(player),
            Err(reason) => return Ok(Err(reason)),
        }
    }
    Ok(Ok(players))
}

pub fn extract_matchup(fragment: ElementRef<'_>, date: NaiveDate) -> Result<Extraction> {
    macro_rules! or_skip {
        ($e:expr) => {
            match $e? {
                Ok(v) => v,
                Err(reason) => return Ok(Extraction::Skipped(reason)),
            }
        };
    }

    let pitchers = or_skip!(starting_pitchers(&fragment));
    let away_id = or_skip!(team_identity(&fragment, Side::Away));
    let home_id = or_skip!(team_identity(&fragment, Side::Home));
    let away_lineup = or_skip!(batting_order(&fragment, Side::Away));
    let home_lineup = or_skip!(batting_order(&fragment, Side::Home));

    let lineups = BySide {
        away: away_lineup,
        home: home_lineup,
    };
    for side in Side::BOTH {
        if lineups.get(side).is_empty() {
            return Ok(Extraction::Skipped(SkipReason::MissingLineup(side)));
        }
    }
    for side in Side::BOTH {
        if pitchers.get(side).is_none() {
            return Ok(Extraction::Skipped(SkipReason::MissingPitcher(side)));
        }
    }

    let BySide {
        away: away_pitcher,
        home: home_pitcher,
    } = pitchers;
    let BySide {
        away: away_lineup,
        home: home_lineup,
    } = lineups;
    Ok(Extraction::Valid(Matchup {
        date,
        teams: BySide {
            away: TeamSide {
                team_name: away_id.0,
                team_code: away_id.1,
                pitcher: away_pitcher,
                lineup: away_lineup,
            },
            home: TeamSide {
                team_name: home_id.0,
                team_code: home_id.1,
                pitcher: home_pitcher,
                lineup: home_lineup,
            },
        },
    }))
}

#[derive(Debug, Clone)]
pub struct LineupSlate {
    pub date: NaiveDate,
    pub matchups: Vec<Matchup>,
    pub skipped: Vec<SkipReason>,
}

pub struct LineupSource<F> {
    fetcher: F,
    base_url: String,
}

impl<F: DocumentFetcher> LineupSource<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_base_url(fetcher, LINEUPS_BASE_URL)
    }

    pub fn with_base_url(fetcher: F, base_url: &str) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.base_url, date.format("%Y-%m-%d"))
    }

    pub fn lineups_for_date(&self, date: NaiveDate) -> Result<LineupSlate> {
        let document = self.fetcher.fetch(&self.url_for(date))?;
        let matchup_sel = selector("div.starting-lineups__matchup")?;

        let mut matchups = Vec::new();
        let mut skipped = Vec::new();
        for fragment in document.select(&matchup_sel) {
            match extract_matchup(fragment, date)? {
                Extraction::Valid(m) => matchups.push(m),
                Extraction::Skipped(reason) => {
                    debug!(%date, %reason, "matchup skipped");
                    skipped.push(reason);
                }
            }
        }
        Ok(LineupSlate {
            date,
            matchups,
            skipped,
        })
    }
}
