//! Manpower situation from skater counts

use serde::{Deserialize, Serialize};
use std::fmt;

use super::coords::Side;
use crate::data::schema;
use crate::data::table::parse_integer;
use crate::data::EventTable;
use crate::{Result, Stage};

/// Skater advantage of the shooting side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManpowerSituation {
    #[serde(rename = "EV")]
    EvenStrength,
    #[serde(rename = "PP")]
    PowerPlay,
    #[serde(rename = "SH")]
    ShortHanded,
    #[serde(rename = "OTHER")]
    Other,
}

impl ManpowerSituation {
    pub const ALL: [ManpowerSituation; 4] = [
        ManpowerSituation::EvenStrength,
        ManpowerSituation::PowerPlay,
        ManpowerSituation::ShortHanded,
        ManpowerSituation::Other,
    ];

    /// Map shooters minus defenders; two-man advantages and unknown counts are OTHER
    pub fn from_difference(difference: Option<i64>) -> Self {
        match difference {
            Some(0) => ManpowerSituation::EvenStrength,
            Some(1) => ManpowerSituation::PowerPlay,
            Some(-1) => ManpowerSituation::ShortHanded,
            _ => ManpowerSituation::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ManpowerSituation::EvenStrength => "EV",
            ManpowerSituation::PowerPlay => "PP",
            ManpowerSituation::ShortHanded => "SH",
            ManpowerSituation::Other => "OTHER",
        }
    }
}

impl fmt::Display for ManpowerSituation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shooting-side skaters minus defending-side skaters
pub fn skater_difference(side: Side, home: Option<i64>, away: Option<i64>) -> Option<i64> {
    let (shooters, defenders) = match side {
        Side::Home => (home?, away?),
        Side::Away => (away?, home?),
    };
    shooters.checked_sub(defenders)
}

/// Classify every event; unparseable counts resolve to OTHER
pub fn classify_manpower(table: &EventTable, sides: &[Side]) -> Result<Vec<ManpowerSituation>> {
    let home = table.require(schema::HOME_SKATERS, Stage::Manpower)?;
    let away = table.require(schema::AWAY_SKATERS, Stage::Manpower)?;

    Ok(sides
        .iter()
        .zip(home.iter().zip(away))
        .map(|(&side, (h, a))| {
            ManpowerSituation::from_difference(skater_difference(
                side,
                parse_integer(h),
                parse_integer(a),
            ))
        })
        .collect())
}
