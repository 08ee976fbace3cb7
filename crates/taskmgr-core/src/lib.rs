pub mod actions;
pub mod config;
pub mod draft;
pub mod error;
pub mod history;
pub mod ids;
pub mod persistence;
pub mod reducer;
pub mod session;
pub mod state;
pub mod theme;

pub use actions::*;
pub use reducer::*;
pub use state::*;

pub use config::Config;
pub use draft::TaskDraft;
pub use error::StorageError;
pub use error::TaskError;
pub use history::History;
pub use ids::Clock;
pub use ids::IdGenerator;
pub use ids::SystemClock;
pub use ids::TimestampIds;
pub use persistence::*;
pub use session::Notice;
pub use session::NoticeLevel;
pub use session::Session;
pub use theme::Theme;
