mod catalog;
mod config;
mod db;
mod events;
mod rooms;

use std::sync::Arc;

use dashmap::DashMap;
use parlor_core::ConnectionId;

pub use catalog::*;
pub use config::*;
pub use db::*;
pub use events::*;
pub use rooms::*;

/// The parlor collab system, facilitating rooms, presence, calls, and chat.
pub struct Collab {
    context: CollabContext,

    pub rooms: RoomManager,
}

/// A type passed to various components of the collab system, to access state and deliver events.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Config,
    pub database: SharedDatabase,
    pub catalog: Arc<GameCatalog>,
    pub channel: Arc<dyn SignalChannel>,

    pub rooms: Arc<DashMap<RoomId, Arc<Room>>>,
    /// Which room each connection is in
    pub connections: Arc<DashMap<ConnectionId, RoomId>>,
}

impl Collab {
    pub fn new(
        config: Config,
        database: SharedDatabase,
        catalog: GameCatalog,
        channel: Arc<dyn SignalChannel>,
    ) -> Self {
        let context = CollabContext {
            config,
            database,
            catalog: Arc::new(catalog),
            channel,

            rooms: Default::default(),
            connections: Default::default(),
        };

        let room_manager = RoomManager::new(&context);

        Self {
            context,
            rooms: room_manager,
        }
    }

    pub fn catalog(&self) -> &GameCatalog {
        &self.context.catalog
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }
}
