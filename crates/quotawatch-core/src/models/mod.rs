//! Data models for quotawatch

mod observation;
mod state;
mod transition;

pub use observation::*;
pub use state::*;
pub use transition::*;
