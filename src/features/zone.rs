//! Offensive zone and entry-type classification

use serde::{Deserialize, Serialize};
use std::fmt;

use super::coords::Side;
use crate::data::schema;
use crate::data::table::parse_number;
use crate::data::EventTable;
use crate::{Result, Stage};

/// Which half of the rink the shot came from, relative to the shooter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffensiveZone {
    Attack,
    Defend,
}

impl OffensiveZone {
    pub const ALL: [OffensiveZone; 2] = [OffensiveZone::Attack, OffensiveZone::Defend];

    /// Home attacks toward positive x, away toward negative x
    ///
    /// A missing coordinate never satisfies either comparison, so it lands
    /// in DEFEND.
    pub fn classify(side: Side, x: Option<f64>) -> Self {
        let attacking = match (side, x) {
            (Side::Home, Some(x)) => x > 0.0,
            (Side::Away, Some(x)) => x < 0.0,
            (_, None) => false,
        };
        if attacking {
            OffensiveZone::Attack
        } else {
            OffensiveZone::Defend
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OffensiveZone::Attack => "ATTACK",
            OffensiveZone::Defend => "DEFEND",
        }
    }
}

impl fmt::Display for OffensiveZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Heuristic for how play entered the zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Controlled,
    Neutral,
    Other,
}

impl EntryType {
    pub const ALL: [EntryType; 3] = [EntryType::Controlled, EntryType::Neutral, EntryType::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Controlled => "CONTROLLED",
            EntryType::Neutral => "NEUTRAL",
            EntryType::Other => "OTHER",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inputs the entry rules look at for one event
#[derive(Debug, Clone, Copy)]
pub struct EntryContext<'a> {
    pub shot_rush: bool,
    pub location: &'a str,
}

/// A labelled predicate in the entry-type priority list
pub struct EntryRule {
    pub label: EntryType,
    pub applies: fn(&EntryContext<'_>) -> bool,
}

fn is_rush(ctx: &EntryContext<'_>) -> bool {
    ctx.shot_rush
}

fn is_neutral_location(ctx: &EntryContext<'_>) -> bool {
    ctx.location.starts_with(schema::NEUTRAL_PREFIX)
}

/// Entry rules in evaluation order; a later matching rule overrides an
/// earlier one, so NEUTRAL beats CONTROLLED.
pub const ENTRY_RULES: [EntryRule; 2] = [
    EntryRule {
        label: EntryType::Controlled,
        applies: is_rush,
    },
    EntryRule {
        label: EntryType::Neutral,
        applies: is_neutral_location,
    },
];

impl EntryType {
    /// Apply the rule list to one event, starting from OTHER
    pub fn classify(ctx: &EntryContext<'_>) -> Self {
        Self::classify_with(&ENTRY_RULES, ctx)
    }

    pub fn classify_with(rules: &[EntryRule], ctx: &EntryContext<'_>) -> Self {
        rules.iter().fold(EntryType::Other, |label, rule| {
            if (rule.applies)(ctx) {
                rule.label
            } else {
                label
            }
        })
    }
}

/// The shot-rush flag is set only when the cell reads as the number 1
fn parse_flag(cell: &str) -> bool {
    parse_number(cell) == Some(1.0)
}

/// Classify every event's offensive zone and entry type
pub fn zone_and_entry(
    table: &EventTable,
    sides: &[Side],
) -> Result<(Vec<OffensiveZone>, Vec<EntryType>)> {
    let xs = table.require(schema::X, Stage::ZoneAndEntry)?;
    let rush = table.require(schema::SHOT_RUSH, Stage::ZoneAndEntry)?;
    let locations = table.require(schema::LOCATION, Stage::ZoneAndEntry)?;

    let zones = sides
        .iter()
        .zip(xs)
        .map(|(&side, x)| OffensiveZone::classify(side, parse_number(x)))
        .collect();

    let entries = rush
        .iter()
        .zip(locations)
        .map(|(rush, location)| {
            EntryType::classify(&EntryContext {
                shot_rush: parse_flag(rush),
                location: location.as_str(),
            })
        })
        .collect();

    Ok((zones, entries))
}
