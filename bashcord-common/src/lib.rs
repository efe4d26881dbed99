// bashcord-common/src/lib.rs
pub mod cache;
pub mod config;
pub mod error;
pub mod model;

// Re-export key types
pub use cache::Cache;
pub use config::Config;
pub use error::{BashcordError, Result};
pub use model::{Branch, Installation, PatchState, ReleaseArtifact, ReleaseKind};
