// State management module
// Holds the shared application state and the active research session

pub mod app_state;

pub use app_state::{AppState, ServiceBuilder};

use std::sync::Arc;
use tokio::sync::RwLock;

/// State handle shared by the HTTP handlers
pub type SharedState = Arc<RwLock<AppState>>;
