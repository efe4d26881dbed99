// bashcord/src/ui.rs
//! Small terminal helpers shared by the subcommands.

use std::time::Duration;

use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::{Installation, PatchState};
use bashcord_core::Engine;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Runs a synchronous engine call off the async runtime.
pub async fn blocking<T, F>(engine: &Engine, f: F) -> Result<T>
where
    F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| BashcordError::Generic(format!("Engine task failed: {e}")))?
}

pub fn state_label(inst: &Installation) -> ColoredString {
    let state = inst.display_state();
    let label = state.to_string();
    match state {
        PatchState::Patched | PatchState::SecondaryModPatched => label.green(),
        PatchState::Unpatched => label.yellow(),
        PatchState::Scuffed => label.red().bold(),
    }
}

pub fn describe(inst: &Installation) -> String {
    format!(
        "{} {} ({})",
        inst.branch.to_string().bold(),
        inst.path.display(),
        state_label(inst)
    )
}
