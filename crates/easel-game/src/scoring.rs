//! Point computation for guessers and drawers.
//!
//! All formulas are driven by [`PointsConfig`] so operators can rebalance
//! without a rebuild. Each bonus is floored to an integer on its own,
//! then the difficulty multiplier is applied to the subtotal and floored
//! again — the order matters for exact parity with published score
//! tables.

use easel_protocol::Difficulty;
use serde::{Deserialize, Serialize};

/// Scoring constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    /// Flat award for any correct guess.
    pub base_guess_points: u32,
    /// Ceiling of the earlier-guessers-earn-more bonus.
    pub max_order_bonus: u32,
    /// Ceiling of the fewer-correct-guessers-earn-more bonus.
    pub max_difficulty_bonus: u32,
    /// Ceiling of the faster-guesses-earn-more bonus.
    pub max_time_bonus: u32,
    /// Flat award for the drawer at round end.
    pub drawer_base_points: u32,
    /// Drawer award per player who guessed correctly.
    pub drawer_bonus_per_guesser: u32,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            base_guess_points: 100,
            max_order_bonus: 50,
            max_difficulty_bonus: 100,
            max_time_bonus: 25,
            drawer_base_points: 20,
            drawer_bonus_per_guesser: 15,
        }
    }
}

/// Breakdown of a correct guess's award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessScore {
    pub base: u32,
    pub order_bonus: u32,
    pub difficulty_bonus: u32,
    pub time_bonus: u32,
    /// Subtotal with the difficulty multiplier applied.
    pub total: u32,
}

/// The difficulty multiplier applied to a guess's subtotal.
pub fn difficulty_multiplier(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 1.0,
        Difficulty::Medium => 1.25,
        Difficulty::Hard => 1.5,
    }
}

/// Scores a correct guess.
///
/// - `guess_order` — 1-based position among correct guessers.
/// - `total_correct` — correct guessers so far, including this one.
/// - `guess_seconds` — seconds from round start to this guess.
/// - `total_players` — everyone in the room, drawer included.
pub fn score_guess(
    config: &PointsConfig,
    guess_order: u32,
    total_correct: u32,
    guess_seconds: u64,
    round_seconds: u64,
    total_players: u32,
    difficulty: Difficulty,
) -> GuessScore {
    let players = f64::from(total_players.max(1));
    let round_len = round_seconds.max(1) as f64;

    let order_bonus = (f64::from(config.max_order_bonus)
        * (1.0 - f64::from(guess_order.saturating_sub(1)) / players))
        .max(0.0) as u32;

    let difficulty_bonus = (f64::from(config.max_difficulty_bonus)
        * (1.0 - f64::from(total_correct) / players))
        .max(0.0) as u32;

    let time_bonus = (f64::from(config.max_time_bonus)
        * (1.0 - guess_seconds as f64 / round_len))
        .max(0.0) as u32;

    let subtotal = config.base_guess_points + order_bonus + difficulty_bonus + time_bonus;
    let total = (f64::from(subtotal) * difficulty_multiplier(difficulty)) as u32;

    GuessScore {
        base: config.base_guess_points,
        order_bonus,
        difficulty_bonus,
        time_bonus,
        total,
    }
}

/// Scores the drawer's round.
pub fn drawer_points(config: &PointsConfig, correct_guessers: u32) -> u32 {
    config.drawer_base_points + config.drawer_bonus_per_guesser * correct_guessers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_guess_ten_seconds_in_two_player_easy() {
        // The canonical worked example: 60-second round, two players,
        // first correct guess at t=10 with the default table.
        let score = score_guess(&PointsConfig::default(), 1, 1, 10, 60, 2, Difficulty::Easy);
        assert_eq!(score.base, 100);
        assert_eq!(score.order_bonus, 50); // 50 * (1 - 0/2)
        assert_eq!(score.difficulty_bonus, 50); // 100 * (1 - 1/2)
        assert_eq!(score.time_bonus, 20); // 25 * (1 - 10/60), floored
        assert_eq!(score.total, 220);
    }

    #[test]
    fn test_later_guessers_earn_less() {
        let config = PointsConfig::default();
        let first = score_guess(&config, 1, 1, 10, 60, 4, Difficulty::Easy);
        let second = score_guess(&config, 2, 2, 10, 60, 4, Difficulty::Easy);
        let third = score_guess(&config, 3, 3, 10, 60, 4, Difficulty::Easy);
        assert!(first.total > second.total);
        assert!(second.total > third.total);
    }

    #[test]
    fn test_slower_guesses_earn_less() {
        let config = PointsConfig::default();
        let fast = score_guess(&config, 1, 1, 5, 60, 4, Difficulty::Easy);
        let slow = score_guess(&config, 1, 1, 55, 60, 4, Difficulty::Easy);
        assert!(fast.time_bonus > slow.time_bonus);
    }

    #[test]
    fn test_difficulty_multiplier_applies_to_subtotal() {
        let config = PointsConfig::default();
        let easy = score_guess(&config, 1, 1, 0, 60, 2, Difficulty::Easy);
        let medium = score_guess(&config, 1, 1, 0, 60, 2, Difficulty::Medium);
        let hard = score_guess(&config, 1, 1, 0, 60, 2, Difficulty::Hard);

        // Subtotal is 100 + 50 + 50 + 25 = 225.
        assert_eq!(easy.total, 225);
        assert_eq!(medium.total, 281); // floor(225 * 1.25)
        assert_eq!(hard.total, 337); // floor(225 * 1.5)
    }

    #[test]
    fn test_time_bonus_never_goes_negative() {
        // A guess processed just after the clock hits zero.
        let score = score_guess(&PointsConfig::default(), 1, 1, 61, 60, 2, Difficulty::Easy);
        assert_eq!(score.time_bonus, 0);
    }

    #[test]
    fn test_drawer_points_scale_with_guessers() {
        let config = PointsConfig::default();
        assert_eq!(drawer_points(&config, 0), 20, "timer expiry with no guesses");
        assert_eq!(drawer_points(&config, 1), 35);
        assert_eq!(drawer_points(&config, 3), 65);
    }

    #[test]
    fn test_points_config_default_table() {
        let config = PointsConfig::default();
        assert_eq!(config.base_guess_points, 100);
        assert_eq!(config.max_order_bonus, 50);
        assert_eq!(config.max_difficulty_bonus, 100);
        assert_eq!(config.max_time_bonus, 25);
        assert_eq!(config.drawer_base_points, 20);
        assert_eq!(config.drawer_bonus_per_guesser, 15);
    }
}
