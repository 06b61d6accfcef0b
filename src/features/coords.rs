//! Coordinate aliasing and home/away indicator

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::schema;
use crate::data::EventTable;
use crate::{HockeyError, Result, Stage};

/// Team side of the shooting team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Map a team-side cell; anything but the exact home marker is away
    pub fn from_team(value: &str) -> Self {
        if value == schema::HOME_MARKER {
            Side::Home
        } else {
            Side::Away
        }
    }

    pub fn is_home(&self) -> bool {
        matches!(self, Side::Home)
    }

    /// 1 for home, 0 for away
    pub fn indicator(&self) -> u8 {
        match self {
            Side::Home => 1,
            Side::Away => 0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "HOME"),
            Side::Away => write!(f, "AWAY"),
        }
    }
}

/// Return a copy exposing exactly one `x`/`y` pair
///
/// Tables that already carry `x` are returned unchanged, so running this
/// twice yields the same table as running it once.
pub fn normalize_coordinates(table: &EventTable) -> Result<EventTable> {
    if table.has_column(schema::X) {
        return Ok(table.clone());
    }

    if table.has_columns(&[schema::ARENA_ADJUSTED_X, schema::ARENA_ADJUSTED_Y]) {
        log::debug!("Using arena-adjusted coordinates");
        return Ok(table.renamed(&[
            (schema::ARENA_ADJUSTED_X, schema::X),
            (schema::ARENA_ADJUSTED_Y, schema::Y),
        ]));
    }

    if table.has_columns(&[schema::ADJUSTED_X, schema::ADJUSTED_Y]) {
        log::debug!("Arena-adjusted coordinates absent, using adjusted coordinates");
        return Ok(table.renamed(&[
            (schema::ADJUSTED_X, schema::X),
            (schema::ADJUSTED_Y, schema::Y),
        ]));
    }

    Err(HockeyError::UnresolvedCoordinates {
        tried: format!(
            "{}/{} and {}/{}",
            schema::ARENA_ADJUSTED_X,
            schema::ARENA_ADJUSTED_Y,
            schema::ADJUSTED_X,
            schema::ADJUSTED_Y
        ),
    })
}

/// Derive the shooting side of every event from the team-side column
///
/// Unmatched values fall back to away and are counted in a warning. Under
/// `strict`, anything other than HOME/AWAY is rejected instead.
pub fn home_indicator(table: &EventTable, strict: bool) -> Result<Vec<Side>> {
    let teams = table.require(schema::TEAM, Stage::HomeIndicator)?;

    let mut unmatched = 0usize;
    let mut sides = Vec::with_capacity(teams.len());
    for (row, value) in teams.iter().enumerate() {
        if value != schema::HOME_MARKER && value != schema::AWAY_MARKER {
            if strict {
                return Err(HockeyError::UnmatchedTeamSide {
                    row,
                    value: value.clone(),
                });
            }
            unmatched += 1;
        }
        sides.push(Side::from_team(value));
    }

    if unmatched > 0 {
        log::warn!(
            "{} of {} team-side values are neither {} nor {}; treated as away",
            unmatched,
            teams.len(),
            schema::HOME_MARKER,
            schema::AWAY_MARKER
        );
    }

    Ok(sides)
}
