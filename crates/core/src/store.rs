//! Record Store
//!
//! The session controller reads users and puzzles through the two contracts
//! defined here. `RecordStore` is the bundled implementation: both record
//! sets are loaded from JSON files at startup and served from memory.

use crate::{puzzle::Puzzle, user::User};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Looks up users by the credentials they present at login.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the user when `username` exists and `secret` matches its
    /// credential hash, `None` otherwise.
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait PuzzleStore: Send + Sync {
    async fn get_puzzle(&self, id: &str) -> Result<Option<Puzzle>, StoreError>;
}

/// In-memory users and puzzles, keyed by username and puzzle id.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    users: HashMap<String, User>,
    puzzles: HashMap<String, Puzzle>,
}

impl RecordStore {
    pub fn new(users: Vec<User>, puzzles: Vec<Puzzle>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|u| (u.username.to_lowercase(), u))
                .collect(),
            puzzles: puzzles.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Loads a store from a users file and a puzzles file, each a JSON array.
    pub fn load(users_path: &Path, puzzles_path: &Path) -> Result<Self, StoreError> {
        let users: Vec<User> = read_json(users_path)?;
        let puzzles: Vec<Puzzle> = read_json(puzzles_path)?;
        if users.is_empty() {
            warn!(path = %users_path.display(), "Users file is empty; nobody will be able to log in.");
        }
        info!(
            users = users.len(),
            puzzles = puzzles.len(),
            "Record store loaded."
        );
        Ok(Self::new(users, puzzles))
    }

    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.values().map(|u| u.username.clone()).collect();
        names.sort();
        names
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl CredentialStore for RecordStore {
    async fn authenticate(&self, username: &str, secret: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .get(&username.to_lowercase())
            .filter(|u| u.verify_secret(secret))
            .cloned())
    }
}

#[async_trait]
impl PuzzleStore for RecordStore {
    async fn get_puzzle(&self, id: &str) -> Result<Option<Puzzle>, StoreError> {
        Ok(self.puzzles.get(id).cloned())
    }
}
