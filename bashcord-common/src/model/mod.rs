// bashcord-common/src/model/mod.rs
pub mod install;
pub mod release;

pub use self::install::{Branch, Installation, PatchState};
pub use self::release::{LocalState, ReleaseArtifact, ReleaseAsset, ReleaseKind};
