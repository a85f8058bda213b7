use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Words that steer the puzzle loop instead of answering the puzzle.
pub const CONTROL_WORDS: [&str; 4] = ["hint", "help", "quit", "skip"];

/// A single riddle presented to the user.
///
/// Puzzles are owned by the record store and never change during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub question: String,
    #[serde(alias = "image_url")]
    pub image_ref: String,
    pub solution_keywords: BTreeSet<String>,
}

impl Puzzle {
    /// Checks whether `word` is one of the accepted answers, ignoring case.
    pub fn is_solution(&self, word: &str) -> bool {
        let word = word.trim().to_lowercase();
        self.solution_keywords
            .iter()
            .any(|k| k.to_lowercase() == word)
    }

    /// The words the recognizer should accept while this puzzle is open:
    /// the control words followed by the solution keywords.
    pub fn vocabulary(&self) -> Vec<String> {
        let mut vocabulary: Vec<String> = CONTROL_WORDS.iter().map(|w| w.to_string()).collect();
        for keyword in &self.solution_keywords {
            if !vocabulary.iter().any(|w| w.eq_ignore_ascii_case(keyword)) {
                vocabulary.push(keyword.clone());
            }
        }
        vocabulary
    }
}
