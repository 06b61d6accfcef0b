//! Expected-goal differential per event and rolling per game
//!
//! Rolling values depend on event order, so events are put in
//! (game, time) order before the trailing window is summed. The result is
//! written back to each event's original position.

use std::cmp::Ordering;

use super::coords::Side;
use crate::data::schema;
use crate::data::EventTable;
use crate::{HockeyError, Result, Stage};

/// Sort key for game identifiers
///
/// Numeric ids compare as numbers; anything else sorts after them as text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameKey {
    Numeric(i64),
    Text(String),
}

impl GameKey {
    pub fn parse(cell: &str) -> Self {
        let trimmed = cell.trim();
        match trimmed.parse::<i64>() {
            Ok(id) => GameKey::Numeric(id),
            Err(_) => GameKey::Text(trimmed.to_string()),
        }
    }
}

/// Expected-goal value oriented home-minus-away
pub fn signed_contribution(side: Side, x_goal: f64) -> f64 {
    match side {
        Side::Home => x_goal,
        Side::Away => -x_goal,
    }
}

/// Event indices sorted by game then time; equal keys keep input order
pub fn game_time_order(games: &[GameKey], times: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..games.len()).collect();
    order.sort_by(|&a, &b| match games[a].cmp(&games[b]) {
        Ordering::Equal => times[a].total_cmp(&times[b]),
        other => other,
    });
    order
}

/// Trailing sum of up to `window` events within the same game
///
/// `order` must be a game-then-time ordering of the events. The returned
/// values are indexed like `values`, not like `order`. Early events in a
/// game sum over however many events exist so far.
pub fn rolling_game_sum(
    values: &[f64],
    games: &[GameKey],
    order: &[usize],
    window: usize,
) -> Vec<f64> {
    let mut sums = vec![0.0; values.len()];
    let mut game_start = 0;

    for (pos, &idx) in order.iter().enumerate() {
        if pos > 0 && games[idx] != games[order[pos - 1]] {
            game_start = pos;
        }
        let from = game_start.max((pos + 1).saturating_sub(window));
        sums[idx] = order[from..=pos].iter().map(|&i| values[i]).sum();
    }

    sums
}

/// Per-event and rolling expected-goal differential
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedGoalDiff {
    /// Signed contribution of each event, in input order
    pub event: Vec<f64>,
    /// Rolling per-game sum of `event`, in input order
    pub shift: Vec<f64>,
    /// Game-then-time ordering used for the rolling window
    pub order: Vec<usize>,
}

/// Compute the signed contribution and its per-game rolling sum
pub fn expected_goal_differential(
    table: &EventTable,
    sides: &[Side],
    window: usize,
) -> Result<ExpectedGoalDiff> {
    if window == 0 {
        return Err(HockeyError::Config(
            "rolling window must be at least 1 event".to_string(),
        ));
    }

    let x_goal = table.numeric_column(schema::X_GOAL, Stage::ExpectedGoals)?;
    let times = table.numeric_column(schema::TIME, Stage::ExpectedGoals)?;
    let games: Vec<GameKey> = table
        .require(schema::GAME_ID, Stage::ExpectedGoals)?
        .iter()
        .map(|cell| GameKey::parse(cell))
        .collect();

    let event: Vec<f64> = sides
        .iter()
        .zip(&x_goal)
        .map(|(&side, &xg)| signed_contribution(side, xg))
        .collect();

    let order = game_time_order(&games, &times);
    let shift = rolling_game_sum(&event, &games, &order, window);

    Ok(ExpectedGoalDiff {
        event,
        shift,
        order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(ids: &[i64]) -> Vec<GameKey> {
        ids.iter().map(|&id| GameKey::Numeric(id)).collect()
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!((a - e).abs() < 1e-12, "index {}: {} != {}", i, a, e);
        }
    }

    #[test]
    fn test_signed_contribution() {
        assert_eq!(signed_contribution(Side::Home, 0.3), 0.3);
        assert_eq!(signed_contribution(Side::Away, 0.3), -0.3);
    }

    #[test]
    fn test_game_key_ordering() {
        assert!(GameKey::parse("9") < GameKey::parse("10"));
        assert!(GameKey::parse("2023020001") < GameKey::parse("2023020002"));
        assert!(GameKey::parse("10") < GameKey::parse("abc"));
        assert_eq!(GameKey::parse(" 7 "), GameKey::Numeric(7));
    }

    #[test]
    fn test_float_spelled_game_ids_stay_distinct() {
        let a = GameKey::parse("1e19");
        let b = GameKey::parse("2e19");
        assert_eq!(a, GameKey::Text("1e19".to_string()));
        assert_ne!(a, b);
        assert_eq!(GameKey::parse("5.0"), GameKey::Text("5.0".to_string()));
    }

    #[test]
    fn test_order_sorts_by_game_then_time() {
        let games = keys(&[2, 1, 2, 1]);
        let times = [5.0, 30.0, 1.0, 10.0];
        assert_eq!(game_time_order(&games, &times), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_order_is_stable_for_equal_keys() {
        let games = keys(&[1, 1, 1]);
        let times = [4.0, 4.0, 1.0];
        assert_eq!(game_time_order(&games, &times), vec![2, 0, 1]);
    }

    #[test]
    fn test_rolling_window_truncates() {
        let games = keys(&[1, 1, 1, 1]);
        let values = [1.0, 2.0, 3.0, 4.0];
        let order = vec![0, 1, 2, 3];
        let sums = rolling_game_sum(&values, &games, &order, 2);
        assert_close(&sums, &[1.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_rolling_resets_at_game_boundary() {
        let games = keys(&[1, 1, 2, 2]);
        let values = [1.0, 2.0, 10.0, 20.0];
        let order = vec![0, 1, 2, 3];
        let sums = rolling_game_sum(&values, &games, &order, 25);
        // First event of game 2 only sees itself
        assert_close(&sums, &[1.0, 3.0, 10.0, 30.0]);
    }

    #[test]
    fn test_rolling_written_back_to_input_positions() {
        let games = keys(&[1, 1, 1]);
        let times = [30.0, 10.0, 20.0];
        let values = [0.5, 0.1, 0.2];
        let order = game_time_order(&games, &times);
        let sums = rolling_game_sum(&values, &games, &order, 25);
        assert_close(&sums, &[0.8, 0.1, 0.30000000000000004]);
    }

    #[test]
    fn test_shuffled_games_give_identical_values() {
        let games = keys(&[7, 7, 7, 7, 8, 8]);
        let times = [1.0, 2.0, 3.0, 4.0, 1.0, 2.0];
        let values = [0.1, -0.2, 0.05, 0.3, -0.4, 0.15];
        let order = game_time_order(&games, &times);
        let baseline = rolling_game_sum(&values, &games, &order, 3);

        let permutation = [5, 2, 0, 4, 3, 1];
        let shuffled_games: Vec<GameKey> = permutation.iter().map(|&i| games[i].clone()).collect();
        let shuffled_times: Vec<f64> = permutation.iter().map(|&i| times[i]).collect();
        let shuffled_values: Vec<f64> = permutation.iter().map(|&i| values[i]).collect();
        let shuffled_order = game_time_order(&shuffled_games, &shuffled_times);
        let shuffled = rolling_game_sum(&shuffled_values, &shuffled_games, &shuffled_order, 3);

        for (pos, &original) in permutation.iter().enumerate() {
            assert_eq!(shuffled[pos].to_bits(), baseline[original].to_bits());
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let table = EventTable::default();
        assert!(matches!(
            expected_goal_differential(&table, &[], 0),
            Err(HockeyError::Config(_))
        ));
    }
}
