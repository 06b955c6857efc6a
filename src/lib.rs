pub mod app;
pub mod config;
pub mod countdown;
pub mod errors;
pub mod handlers;
pub mod layout;
pub mod models;
pub mod room;
pub mod state;
pub mod stats;
pub mod storage;
pub mod tiles;
pub mod tracker;
pub mod ui;

pub use app::router;
pub use config::Settings;
pub use layout::solve;
pub use state::AppState;
pub use tracker::{TileListener, TileStateTracker};
