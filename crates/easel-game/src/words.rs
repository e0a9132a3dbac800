//! Word selection and hint synthesis.
//!
//! The bank keeps one pool per difficulty plus a used-word set so players
//! don't see the same word twice until a pool is exhausted. Rooms with a
//! custom word list get those words merged into *their* picks only — the
//! shared pools are never mutated by room settings.

use std::collections::HashSet;
use std::path::Path;

use easel_protocol::Difficulty;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::GameError;

const BUILTIN_EASY: &[&str] = &[
    "cat", "dog", "sun", "tree", "fish", "house", "star", "ball", "cake",
    "bird", "car", "moon", "apple", "chair", "cloud", "heart",
];
const BUILTIN_MEDIUM: &[&str] = &[
    "guitar", "rocket", "castle", "dragon", "island", "bridge", "camera",
    "pirate", "wizard", "tractor", "volcano", "penguin", "rainbow", "anchor",
];
const BUILTIN_HARD: &[&str] = &[
    "telescope", "labyrinth", "avalanche", "metronome", "lighthouse",
    "stalactite", "periscope", "chandelier", "tourniquet", "observatory",
];

const ANIMAL_WORDS: &[&str] = &[
    "cat", "dog", "bird", "fish", "penguin", "dragon", "horse", "rabbit",
];

/// On-disk word list. Any subset of the three pools may be present.
#[derive(Debug, Default, Deserialize)]
struct WordFile {
    #[serde(default)]
    easy: Vec<String>,
    #[serde(default)]
    medium: Vec<String>,
    #[serde(default)]
    hard: Vec<String>,
}

/// Word source for all rooms.
pub struct WordBank {
    easy: Vec<String>,
    medium: Vec<String>,
    hard: Vec<String>,
    used: Mutex<HashSet<String>>,
}

impl WordBank {
    /// A bank seeded with the built-in word lists.
    pub fn builtin() -> Self {
        Self {
            easy: BUILTIN_EASY.iter().map(|w| (*w).to_owned()).collect(),
            medium: BUILTIN_MEDIUM.iter().map(|w| (*w).to_owned()).collect(),
            hard: BUILTIN_HARD.iter().map(|w| (*w).to_owned()).collect(),
            used: Mutex::new(HashSet::new()),
        }
    }

    /// Loads and merges word files. Each file may carry any of the three
    /// difficulty arrays.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, GameError> {
        let mut easy = Vec::new();
        let mut medium = Vec::new();
        let mut hard = Vec::new();

        for path in paths {
            let data = std::fs::read(path.as_ref()).map_err(|e| {
                GameError::WordBank(format!(
                    "reading {}: {e}",
                    path.as_ref().display()
                ))
            })?;
            let file: WordFile = serde_json::from_slice(&data).map_err(|e| {
                GameError::WordBank(format!(
                    "parsing {}: {e}",
                    path.as_ref().display()
                ))
            })?;
            easy.extend(file.easy);
            medium.extend(file.medium);
            hard.extend(file.hard);
        }

        if easy.is_empty() && medium.is_empty() && hard.is_empty() {
            return Err(GameError::WordBank("word files contain no words".into()));
        }

        tracing::info!(
            easy = easy.len(),
            medium = medium.len(),
            hard = hard.len(),
            "word bank loaded"
        );

        Ok(Self {
            easy,
            medium,
            hard,
            used: Mutex::new(HashSet::new()),
        })
    }

    /// Picks a word for the given difficulty and returns `(word, hint)`.
    ///
    /// `custom` is the requesting room's own word list; it widens the
    /// candidate set for this pick without touching the shared pools.
    pub async fn pick(&self, difficulty: Difficulty, custom: &[String]) -> (String, String) {
        let pool = self.pool(difficulty);
        let candidates: Vec<&str> = pool
            .iter()
            .map(String::as_str)
            .chain(custom.iter().map(String::as_str))
            .filter(|w| !w.is_empty())
            .collect();

        if candidates.is_empty() {
            tracing::warn!(%difficulty, "no words available, using fallback");
            let word = "easel".to_owned();
            let hint = hint_for(&word, difficulty);
            return (word, hint);
        }

        let mut used = self.used.lock().await;
        let mut fresh: Vec<&str> = candidates
            .iter()
            .copied()
            .filter(|w| !used.contains(*w))
            .collect();

        // Pool exhausted: forget this pool's history and start over.
        if fresh.is_empty() {
            for word in &candidates {
                used.remove(*word);
            }
            fresh = candidates;
        }

        let word = fresh[rand::rng().random_range(0..fresh.len())].to_owned();
        used.insert(word.clone());

        let hint = hint_for(&word, difficulty);
        (word, hint)
    }

    fn pool(&self, difficulty: Difficulty) -> &[String] {
        let pool = match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
        };
        if pool.is_empty() {
            // A missing pool falls back to easy rather than stalling games.
            &self.easy
        } else {
            pool
        }
    }
}

/// Builds the hint shown to guessers.
///
/// Easy: every letter blanked. Medium: first and last letter revealed.
/// Hard: a coarse category tag instead of letters. Hints are opaque
/// strings to the rest of the system.
pub(crate) fn hint_for(word: &str, difficulty: Difficulty) -> String {
    match difficulty {
        Difficulty::Easy => blank_hint(word),
        Difficulty::Medium => {
            let chars: Vec<char> = word.chars().collect();
            if chars.len() <= 2 {
                return blank_hint(word);
            }
            let last = chars.len() - 1;
            chars
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    if i == 0 || i == last {
                        c.to_string()
                    } else {
                        "_".to_owned()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        Difficulty::Hard => {
            if ANIMAL_WORDS.contains(&word) {
                "Animal".to_owned()
            } else {
                "Object".to_owned()
            }
        }
    }
}

fn blank_hint(word: &str) -> String {
    word.chars()
        .map(|_| "_")
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_easy_hint_blanks_every_letter() {
        assert_eq!(hint_for("cat", Difficulty::Easy), "_ _ _");
        assert_eq!(hint_for("house", Difficulty::Easy), "_ _ _ _ _");
    }

    #[test]
    fn test_medium_hint_reveals_first_and_last() {
        assert_eq!(hint_for("cat", Difficulty::Medium), "c _ t");
        assert_eq!(hint_for("guitar", Difficulty::Medium), "g _ _ _ _ r");
        // Too short to reveal anything.
        assert_eq!(hint_for("ox", Difficulty::Medium), "_ _");
    }

    #[test]
    fn test_hard_hint_is_a_category() {
        assert_eq!(hint_for("cat", Difficulty::Hard), "Animal");
        assert_eq!(hint_for("telescope", Difficulty::Hard), "Object");
    }

    #[tokio::test]
    async fn test_pick_returns_word_from_pool() {
        let bank = WordBank::builtin();
        let (word, hint) = bank.pick(Difficulty::Easy, &[]).await;
        assert!(BUILTIN_EASY.contains(&word.as_str()));
        assert!(!hint.is_empty());
    }

    #[tokio::test]
    async fn test_pick_avoids_repeats_until_exhausted() {
        let bank = WordBank {
            easy: vec!["cat".into(), "dog".into()],
            medium: vec![],
            hard: vec![],
            used: Mutex::new(HashSet::new()),
        };

        let (first, _) = bank.pick(Difficulty::Easy, &[]).await;
        let (second, _) = bank.pick(Difficulty::Easy, &[]).await;
        assert_ne!(first, second, "both words issued before any repeat");

        // Pool exhausted — the cycle restarts instead of stalling.
        let (third, _) = bank.pick(Difficulty::Easy, &[]).await;
        assert!(["cat", "dog"].contains(&third.as_str()));
    }

    #[tokio::test]
    async fn test_custom_words_do_not_leak_into_shared_pool() {
        let bank = WordBank {
            easy: vec!["cat".into()],
            medium: vec![],
            hard: vec![],
            used: Mutex::new(HashSet::new()),
        };

        let custom = vec!["xylophone".into()];
        // Drain the room's candidate set; both words must show up.
        let mut seen = HashSet::new();
        for _ in 0..2 {
            let (word, _) = bank.pick(Difficulty::Easy, &custom).await;
            seen.insert(word);
        }
        assert!(seen.contains("cat"));
        assert!(seen.contains("xylophone"));

        // A room without the custom list can never draw it.
        for _ in 0..10 {
            let (word, _) = bank.pick(Difficulty::Easy, &[]).await;
            assert_eq!(word, "cat");
        }
    }

    #[tokio::test]
    async fn test_missing_pool_falls_back_to_easy() {
        let bank = WordBank {
            easy: vec!["cat".into()],
            medium: vec![],
            hard: vec![],
            used: Mutex::new(HashSet::new()),
        };
        let (word, _) = bank.pick(Difficulty::Medium, &[]).await;
        assert_eq!(word, "cat");
    }

    #[test]
    fn test_from_files_rejects_empty_banks() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("easel-words-empty-{}.json", std::process::id()));
        std::fs::write(&path, b"{}").unwrap();
        let result = WordBank::from_files(&[&path]);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_files_merges_pools() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("easel-words-{}.json", std::process::id()));
        std::fs::write(
            &path,
            br#"{"easy": ["cat"], "medium": ["guitar"], "hard": ["telescope"]}"#,
        )
        .unwrap();
        let bank = WordBank::from_files(&[&path]).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(bank.easy, vec!["cat"]);
        assert_eq!(bank.medium, vec!["guitar"]);
        assert_eq!(bank.hard, vec!["telescope"]);
    }
}
