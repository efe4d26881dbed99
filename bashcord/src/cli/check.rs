// bashcord/src/cli/check.rs
use bashcord_common::error::{BashcordError, Result};
use bashcord_core::update::running_tag;
use bashcord_core::Engine;
use clap::Args;
use colored::Colorize;

use crate::ui;

#[derive(Args, Debug)]
pub struct Check;

impl Check {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        let pb = ui::spinner("Checking for updates");
        let rx = engine.spawn_update_check();
        let status = rx.await;
        pb.finish_and_clear();
        let status = status
            .map_err(|_| BashcordError::Generic("Update check was cancelled".to_string()))?;

        let installed = status.installed_hash.as_deref().unwrap_or("none");
        match &status.payload {
            Some(latest) if engine.config().is_dev_install() => println!(
                "Vencord: using {} (latest {})",
                engine.config().payload_dir().display(),
                latest.commit_hash
            ),
            Some(latest) if status.payload_stale => println!(
                "Vencord: {} -> {}  {}",
                installed,
                latest.commit_hash.bold(),
                "update available".yellow()
            ),
            Some(latest) => println!("Vencord: {} {}", latest.commit_hash, "up to date".green()),
            None => println!("Vencord: {} {}", installed, "(release feed unavailable)".dimmed()),
        }

        match &status.installer {
            Some(latest) if status.installer_stale => println!(
                "Installer: {} -> {}  {}",
                running_tag(),
                latest.tag.bold(),
                "update available".yellow()
            ),
            Some(_) => println!("Installer: {} {}", running_tag(), "up to date".green()),
            None => println!(
                "Installer: {} {}",
                running_tag(),
                "(release feed unavailable)".dimmed()
            ),
        }

        for (kind, e) in &status.errors {
            tracing::warn!("{} release feed: {}", kind, e);
        }
        if status.is_offline() {
            println!("{}", "The release feed is unreachable; patching still works offline.".dimmed());
        }
        Ok(())
    }
}
