// Canonical response models (what the rendering layer consumes)

mod process;
mod resources;

pub use process::{ProcessEntry, ProcessOrigin, TopProcesses};
pub use resources::{ResourceSnapshot, ServerIdentity, StatsResponse, Usage};
