// bashcord/src/cli/patch.rs
use bashcord_common::error::Result;
use bashcord_core::patch::PAYLOAD_ENTRY;
use bashcord_core::{Engine, PayloadUpdateOutcome};
use clap::Args;
use colored::Colorize;
use tracing::debug;

use crate::cli::target::TargetArgs;
use crate::ui;

#[derive(Args, Debug)]
pub struct Patch {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl Patch {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        ensure_payload(engine).await?;

        let inst = self.target.resolve(engine).await?;
        println!("{} Patching {}", "==>".bold().blue(), ui::describe(&inst));

        let patched = ui::blocking(engine, move |e| e.patch(&inst)).await?;
        println!(
            "{} {} is now {}",
            "✓".green().bold(),
            patched.path.display(),
            ui::state_label(&patched)
        );
        println!("Restart Discord to load Vencord.");
        Ok(())
    }
}

/// Downloads the payload when nothing has been downloaded yet.
async fn ensure_payload(engine: &Engine) -> Result<()> {
    let payload_dir = engine.config().payload_dir();
    if payload_dir.join(PAYLOAD_ENTRY).is_file() {
        debug!("Using payload in {}", payload_dir.display());
        return Ok(());
    }
    if engine.config().is_dev_install() {
        // Let the engine report the missing file.
        return Ok(());
    }

    let pb = ui::spinner("Downloading Vencord");
    let outcome = engine.apply_payload_update().await;
    pb.finish_and_clear();
    match outcome? {
        PayloadUpdateOutcome::Updated { commit_hash } => {
            println!("{} Downloaded Vencord {}", "✓".green().bold(), commit_hash);
        }
        PayloadUpdateOutcome::UpToDate | PayloadUpdateOutcome::DevInstall => {}
    }
    Ok(())
}
