pub mod diff;
pub mod entity;
pub mod error;
pub mod ids;
pub mod live_state;
pub mod version;

pub use diff::{Diff, DiffSummary, diff};
pub use entity::*;
pub use error::CoreError;
pub use ids::*;
pub use live_state::LiveState;
pub use version::{Version, VersionState};
