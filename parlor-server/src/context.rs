use std::sync::Arc;

use axum::extract::FromRef;
use parlor_collab::Collab;

use crate::{config::ServerConfig, gateway::Gateway};

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub collab: Arc<Collab>,
    pub gateway: Arc<Gateway>,
    pub config: Arc<ServerConfig>,
}
