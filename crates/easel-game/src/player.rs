//! Player state and its public projection.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use easel_protocol::{ident, PublicPlayer, UserId};
use rand::Rng;
use tokio::sync::RwLock;

/// A player, shared between the connection that owns it and the room it
/// currently sits in.
///
/// All mutation goes through the write half of the lock; the session
/// handler and the round driver are the only writers. Critical sections
/// are short and never span I/O.
pub type SharedPlayer = Arc<RwLock<Player>>;

const GUEST_ADJECTIVES: &[&str] = &[
    "Cool", "Happy", "Clever", "Swift", "Brave", "Lucky", "Smart", "Quick",
];
const GUEST_NOUNS: &[&str] = &[
    "Artist", "Player", "Gamer", "Drawer", "Master", "Pro", "Star", "Ace",
];
const GUEST_AVATARS: &[&str] = &[
    "🎨", "🖌️", "✏️", "🖊️", "🖍️", "✨", "🌟", "⭐", "🎭", "🎪", "🦄", "🌈",
];

/// A player in the game.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: UserId,
    pub username: String,
    pub avatar: String,
    pub score: u32,
    pub is_ready: bool,
    pub is_connected: bool,
    /// Still on the auto-generated guest identity (no `connect` yet).
    pub guest: bool,
    pub joined_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,

    // Per-round flags, reset at the start of every round.
    pub has_guessed_this_round: bool,
    pub guess_time: Option<DateTime<Utc>>,
    pub guess_order: Option<u32>,
    /// Points awarded to this player in the current round.
    pub round_points: u32,

    // Aggregate statistics for the current game.
    pub rounds_won: u32,
    pub total_guesses: u32,
    pub correct_guesses: u32,
    pub times_drawer: u32,
}

impl Player {
    /// Creates a player with an explicit identity.
    pub fn new(username: impl Into<String>, avatar: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ident::generate_user_id(),
            username: username.into(),
            avatar: avatar.into(),
            score: 0,
            is_ready: false,
            is_connected: true,
            guest: false,
            joined_at: now,
            last_activity: now,
            has_guessed_this_round: false,
            guess_time: None,
            guess_order: None,
            round_points: 0,
            rounds_won: 0,
            total_guesses: 0,
            correct_guesses: 0,
            times_drawer: 0,
        }
    }

    /// Creates a guest player with a generated name and avatar.
    ///
    /// Every connection starts as a guest; a `connect` message may later
    /// upgrade the username and avatar.
    pub fn guest() -> Self {
        let mut rng = rand::rng();
        let adjective = GUEST_ADJECTIVES[rng.random_range(0..GUEST_ADJECTIVES.len())];
        let noun = GUEST_NOUNS[rng.random_range(0..GUEST_NOUNS.len())];
        let number: u16 = rng.random_range(0..1000);
        let avatar = GUEST_AVATARS[rng.random_range(0..GUEST_AVATARS.len())];

        let mut player = Self::new(format!("{adjective}{noun}{number}"), avatar);
        player.guest = true;
        player
    }

    /// Wraps a player for sharing between a connection and a room.
    pub fn shared(self) -> SharedPlayer {
        Arc::new(RwLock::new(self))
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn add_score(&mut self, points: u32) {
        self.score += points;
        self.round_points += points;
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.is_ready = ready;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.is_connected = connected;
        if connected {
            self.touch();
        }
    }

    /// Records a guess attempt. Order is assigned only to correct guesses.
    pub fn record_guess(&mut self, correct: bool, order: Option<u32>) {
        self.has_guessed_this_round = true;
        self.guess_time = Some(Utc::now());
        self.total_guesses += 1;
        if correct {
            self.correct_guesses += 1;
            self.guess_order = order;
        }
    }

    pub fn record_drawer_turn(&mut self) {
        self.times_drawer += 1;
    }

    /// Resets the flags that only live for one round. Readiness is also
    /// cleared: the lobby after a game starts from scratch.
    pub fn reset_round_data(&mut self) {
        self.has_guessed_this_round = false;
        self.guess_time = None;
        self.guess_order = None;
        self.round_points = 0;
        self.is_ready = false;
    }

    /// Resets score and aggregate statistics for a fresh game.
    pub fn reset_game_data(&mut self) {
        self.score = 0;
        self.rounds_won = 0;
        self.total_guesses = 0;
        self.correct_guesses = 0;
        self.times_drawer = 0;
        self.reset_round_data();
    }

    /// Correct guesses as a percentage of total guesses.
    pub fn accuracy(&self) -> f64 {
        if self.total_guesses == 0 {
            return 0.0;
        }
        f64::from(self.correct_guesses) / f64::from(self.total_guesses) * 100.0
    }

    /// The sanitized projection shown to other players.
    pub fn to_public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
            score: self.score,
            is_ready: self.is_ready,
            is_connected: self.is_connected,
            has_guessed_this_round: self.has_guessed_this_round,
            rounds_won: self.rounds_won,
            accuracy: self.accuracy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_has_generated_identity() {
        let player = Player::guest();
        assert!(player.guest);
        assert!(!player.username.is_empty());
        assert!(!player.avatar.is_empty());
        assert!(player.id.as_str().starts_with("user_"));
    }

    #[test]
    fn test_add_score_accumulates_round_points() {
        let mut player = Player::new("Alice", "🎨");
        player.add_score(100);
        player.add_score(25);
        assert_eq!(player.score, 125);
        assert_eq!(player.round_points, 125);

        player.reset_round_data();
        assert_eq!(player.round_points, 0);
        assert_eq!(player.score, 125, "total score survives round reset");
    }

    #[test]
    fn test_record_guess_tracks_stats() {
        let mut player = Player::new("Alice", "🎨");
        player.record_guess(false, None);
        player.record_guess(true, Some(1));

        assert_eq!(player.total_guesses, 2);
        assert_eq!(player.correct_guesses, 1);
        assert_eq!(player.guess_order, Some(1));
        assert!(player.has_guessed_this_round);
        assert!((player.accuracy() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accuracy_with_no_guesses_is_zero() {
        let player = Player::new("Alice", "🎨");
        assert_eq!(player.accuracy(), 0.0);
    }

    #[test]
    fn test_reset_round_data_clears_ready() {
        let mut player = Player::new("Alice", "🎨");
        player.set_ready(true);
        player.record_guess(true, Some(1));
        player.reset_round_data();

        assert!(!player.is_ready);
        assert!(!player.has_guessed_this_round);
        assert!(player.guess_time.is_none());
        assert!(player.guess_order.is_none());
    }

    #[test]
    fn test_reset_game_data_clears_score_and_stats() {
        let mut player = Player::new("Alice", "🎨");
        player.add_score(250);
        player.record_guess(true, Some(1));
        player.record_drawer_turn();
        player.reset_game_data();

        assert_eq!(player.score, 0);
        assert_eq!(player.correct_guesses, 0);
        assert_eq!(player.times_drawer, 0);
    }

    #[test]
    fn test_public_projection_carries_no_secrets() {
        let mut player = Player::new("Alice", "🎨");
        player.add_score(42);
        let public = player.to_public();
        assert_eq!(public.username, "Alice");
        assert_eq!(public.score, 42);
    }
}
