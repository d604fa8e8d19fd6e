use std::{collections::HashMap, fs, path::Path};

use log::info;
use parlor_core::GameItem;
use thiserror::Error;

const DEFAULT_CATALOG: &str = include_str!("../catalog.ron");

/// The static list of games members can start in a room
#[derive(Debug, Clone)]
pub struct GameCatalog {
    games: Vec<GameItem>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Catalog is malformed: {0}")]
    Parse(#[from] ron::Error),
    #[error("Game id {0} is listed more than once")]
    DuplicateId(String),
}

impl GameCatalog {
    /// Parses a catalog from a RON list of games
    pub fn from_ron(source: &str) -> Result<Self, CatalogError> {
        let games: Vec<GameItem> = ron::from_str(source)?;
        Self::from_games(games)
    }

    /// Reads a catalog from a RON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let source = fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_ron(&source)?;

        info!(
            "Loaded {} games from {}",
            catalog.games.len(),
            path.as_ref().display()
        );

        Ok(catalog)
    }

    pub fn from_games(games: Vec<GameItem>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(games.len());

        for (i, game) in games.iter().enumerate() {
            if index.insert(game.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateId(game.id.clone()));
            }
        }

        Ok(Self { games, index })
    }

    /// The catalog that ships with parlor
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_ron(DEFAULT_CATALOG)
    }

    pub fn get(&self, game_id: &str) -> Option<&GameItem> {
        self.index.get(game_id).map(|&i| &self.games[i])
    }

    pub fn all(&self) -> &[GameItem] {
        &self.games
    }
}
