//! Feature frame assembly
//!
//! Runs the derivation stages in order on a raw event table and keeps the
//! results as typed columns next to the normalized source table.
//!
//! Row alignment: with [`RowOrder::Input`] row `i` of the frame is row `i`
//! of the input, and the rolling value computed in game-time order is
//! written back to that row. With [`RowOrder::GameTime`] the whole frame is
//! sorted by game then time; [`FeatureFrame::source_rows`] maps every row
//! back to its input position in either case.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::coords::{home_indicator, normalize_coordinates, Side};
use super::manpower::{classify_manpower, ManpowerSituation};
use super::xgd::{expected_goal_differential, GameKey};
use super::zone::{zone_and_entry, EntryType, OffensiveZone};
use crate::data::schema;
use crate::data::table::strings;
use crate::data::EventTable;
use crate::{FeatureConfig, Result};

/// Row order of the frame handed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Same order as the input table
    #[default]
    Input,
    /// Sorted by game identifier then time
    GameTime,
}

/// Source table plus derived per-event features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    table: EventTable,
    source_rows: Vec<usize>,
    sides: Vec<Side>,
    offensive_zone: Vec<OffensiveZone>,
    entry_type: Vec<EntryType>,
    manpower: Vec<ManpowerSituation>,
    xgd_event: Vec<f64>,
    xgd_shift: Vec<f64>,
    row_order: RowOrder,
}

/// Category counts of a built frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSummary {
    pub rows: usize,
    pub games: usize,
    pub home_events: usize,
    pub offensive_zone: BTreeMap<String, usize>,
    pub entry_type: BTreeMap<String, usize>,
    pub manpower_situation: BTreeMap<String, usize>,
    pub mean_xgd_shift: f64,
}

fn counts<T: ToString>(values: &[T]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value.to_string()).or_insert(0) += 1;
    }
    counts
}

fn permute<T: Clone>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|&i| values[i].clone()).collect()
}

impl FeatureFrame {
    pub fn n_rows(&self) -> usize {
        self.table.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Normalized source table, in frame row order
    pub fn table(&self) -> &EventTable {
        &self.table
    }

    /// Input row index of every frame row
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn row_order(&self) -> RowOrder {
        self.row_order
    }

    pub fn sides(&self) -> &[Side] {
        &self.sides
    }

    pub fn offensive_zone(&self) -> &[OffensiveZone] {
        &self.offensive_zone
    }

    pub fn entry_type(&self) -> &[EntryType] {
        &self.entry_type
    }

    pub fn manpower(&self) -> &[ManpowerSituation] {
        &self.manpower
    }

    pub fn xgd_event(&self) -> &[f64] {
        &self.xgd_event
    }

    pub fn xgd_shift(&self) -> &[f64] {
        &self.xgd_shift
    }

    /// Labels of a derived categorical column, looked up by column name
    pub fn categorical(&self, column: &str) -> Option<Vec<&'static str>> {
        match column {
            schema::OFFENSIVE_ZONE => Some(self.offensive_zone.iter().map(|z| z.as_str()).collect()),
            schema::ENTRY_TYPE => Some(self.entry_type.iter().map(|e| e.as_str()).collect()),
            schema::MANPOWER => Some(self.manpower.iter().map(|m| m.as_str()).collect()),
            _ => None,
        }
    }

    /// Original columns followed by the derived ones, as a plain table
    pub fn to_table(&self) -> Result<EventTable> {
        let mut table = self.table.clone();
        let indicators: Vec<u8> = self.sides.iter().map(Side::indicator).collect();
        table.insert_column(schema::IS_HOME, strings(&indicators))?;
        table.insert_column(schema::OFFENSIVE_ZONE, strings(&self.offensive_zone))?;
        table.insert_column(schema::ENTRY_TYPE, strings(&self.entry_type))?;
        table.insert_column(schema::MANPOWER, strings(&self.manpower))?;
        table.insert_column(schema::XGD_EVENT, strings(&self.xgd_event))?;
        table.insert_column(schema::XGD_SHIFT, strings(&self.xgd_shift))?;
        Ok(table)
    }

    pub fn summary(&self) -> FeatureSummary {
        // Same grouping as the rolling window
        let games: BTreeSet<GameKey> = self
            .table
            .column(schema::GAME_ID)
            .map(|ids| ids.iter().map(|id| GameKey::parse(id)).collect())
            .unwrap_or_default();
        let mean_xgd_shift = if self.xgd_shift.is_empty() {
            0.0
        } else {
            self.xgd_shift.iter().sum::<f64>() / self.xgd_shift.len() as f64
        };

        FeatureSummary {
            rows: self.n_rows(),
            games: games.len(),
            home_events: self.sides.iter().filter(|s| s.is_home()).count(),
            offensive_zone: counts(&self.offensive_zone),
            entry_type: counts(&self.entry_type),
            manpower_situation: counts(&self.manpower),
            mean_xgd_shift,
        }
    }

    fn reordered(self, order: &[usize]) -> Self {
        FeatureFrame {
            table: self.table.take_rows(order),
            source_rows: permute(&self.source_rows, order),
            sides: permute(&self.sides, order),
            offensive_zone: permute(&self.offensive_zone, order),
            entry_type: permute(&self.entry_type, order),
            manpower: permute(&self.manpower, order),
            xgd_event: permute(&self.xgd_event, order),
            xgd_shift: permute(&self.xgd_shift, order),
            row_order: RowOrder::GameTime,
        }
    }
}

/// Derive every per-event feature from a raw event table
///
/// The input is never modified. Schema errors abort at the first stage
/// that misses a column.
pub fn build_feature_frame(raw: &EventTable, config: &FeatureConfig) -> Result<FeatureFrame> {
    let table = normalize_coordinates(raw)?;
    let sides = home_indicator(&table, config.strict_team_side)?;
    let (offensive_zone, entry_type) = zone_and_entry(&table, &sides)?;
    let manpower = classify_manpower(&table, &sides)?;
    let xgd = expected_goal_differential(&table, &sides, config.rolling_window)?;

    let mut frame = FeatureFrame {
        source_rows: (0..table.n_rows()).collect(),
        table,
        sides,
        offensive_zone,
        entry_type,
        manpower,
        xgd_event: xgd.event,
        xgd_shift: xgd.shift,
        row_order: RowOrder::Input,
    };
    if config.row_order == RowOrder::GameTime {
        frame = frame.reordered(&xgd.order);
    }

    let summary = frame.summary();
    log::info!(
        "Built features for {} events across {} games (window {}, {:?} order)",
        summary.rows,
        summary.games,
        config.rolling_window,
        frame.row_order
    );
    log::debug!("Offensive zone: {:?}", summary.offensive_zone);
    log::debug!("Entry type: {:?}", summary.entry_type);
    log::debug!("Manpower: {:?}", summary.manpower_situation);

    Ok(frame)
}
