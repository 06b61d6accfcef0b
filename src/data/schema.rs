//! Column names and literals of the season shot file

/// Canonical coordinate columns produced by normalization
pub const X: &str = "x";
pub const Y: &str = "y";

/// Preferred coordinate pair, adjusted for arena recording bias
pub const ARENA_ADJUSTED_X: &str = "arenaAdjustedXCord";
pub const ARENA_ADJUSTED_Y: &str = "arenaAdjustedYCord";

/// Fallback coordinate pair
pub const ADJUSTED_X: &str = "xCordAdjusted";
pub const ADJUSTED_Y: &str = "yCordAdjusted";

/// Shooting team side, "HOME" or "AWAY"
pub const TEAM: &str = "team";
pub const HOME_MARKER: &str = "HOME";
pub const AWAY_MARKER: &str = "AWAY";

pub const SHOT_RUSH: &str = "shotRush";
pub const LOCATION: &str = "location";
/// Case-sensitive prefix of neutral-zone location descriptors
pub const NEUTRAL_PREFIX: &str = "Neu";

pub const HOME_SKATERS: &str = "homeSkatersOnIce";
pub const AWAY_SKATERS: &str = "awaySkatersOnIce";
pub const X_GOAL: &str = "xGoal";
pub const GAME_ID: &str = "game_id";
pub const TIME: &str = "time";

pub const SHOT_DISTANCE: &str = "shotDistance";
pub const SHOT_ANGLE: &str = "shotAngleAdjusted";
pub const PERIOD: &str = "period";

/// Derived columns
pub const IS_HOME: &str = "isHomeTeam";
pub const OFFENSIVE_ZONE: &str = "offensive_zone";
pub const ENTRY_TYPE: &str = "entry_type";
pub const MANPOWER: &str = "manpower_situation";
pub const XGD_EVENT: &str = "xGD_event";
pub const XGD_SHIFT: &str = "xGD_shift";

/// Categorical model inputs, in encoder order
pub const CATEGORICAL_FEATURES: [&str; 3] = [ENTRY_TYPE, MANPOWER, OFFENSIVE_ZONE];

/// Numeric model inputs passed through unchanged
pub const NUMERIC_FEATURES: [&str; 4] = [SHOT_DISTANCE, SHOT_ANGLE, PERIOD, TIME];

/// Regression target
pub const TARGET: &str = XGD_SHIFT;
