// bashcord-core/src/lib.rs
//! Install discovery, the patch engine and the update pipeline.

pub mod asar;
pub mod classify;
pub mod engine;
pub mod inject;
pub mod locate;
pub mod patch;
pub mod secondary;
pub mod update;

pub use bashcord_common::{
    error::{BashcordError, Result},
    model::{Branch, Installation, PatchState},
    Config,
};
pub use classify::{classify, read_patch_state};
pub use engine::Engine;
pub use locate::{Candidate, InstallLocator, SearchRoot};
pub use update::{PayloadUpdateOutcome, SelfUpdateOutcome, UpdateStatus};
