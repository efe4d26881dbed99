//! Contains the logic for the `update` command.
use bashcord_common::error::Result;
use bashcord_core::{Engine, PayloadUpdateOutcome};
use colored::Colorize;

use crate::ui;

#[derive(clap::Args, Debug)]
pub struct Update;

impl Update {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        tracing::debug!("Running payload update");
        let pb = ui::spinner("Downloading the latest Vencord build");
        let outcome = engine.apply_payload_update().await;
        pb.finish_and_clear();

        match outcome? {
            PayloadUpdateOutcome::Updated { commit_hash } => {
                println!("{} Vencord updated to {}", "✓".green().bold(), commit_hash.bold());
                println!("Patched installs keep their current build until you patch them again.");
            }
            PayloadUpdateOutcome::UpToDate => println!("Vencord is already up to date."),
            PayloadUpdateOutcome::DevInstall => println!(
                "Vencord is loaded from {}; nothing to update.",
                engine.config().payload_dir().display()
            ),
        }
        Ok(())
    }
}
