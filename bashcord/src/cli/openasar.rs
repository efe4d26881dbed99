// bashcord/src/cli/openasar.rs
use bashcord_common::error::{BashcordError, Result};
use bashcord_core::Engine;
use clap::Args;
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

use crate::cli::target::TargetArgs;
use crate::ui;

const DISCLAIMER: &str = "OpenAsar is a separate project that replaces parts of Discord's \
     desktop code. It is not made by the Vencord team, and issues it causes should be \
     reported to OpenAsar, not Vencord.";

#[derive(Args, Debug)]
pub struct OpenAsar {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Install without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl OpenAsar {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        let inst = self.target.resolve(engine).await?;

        if inst.secondary_mod {
            println!("{} Removing OpenAsar from {}", "==>".bold().blue(), ui::describe(&inst));
        } else {
            if !self.yes && !confirm_install()? {
                println!("Nothing changed.");
                return Ok(());
            }
            println!("{} Installing OpenAsar into {}", "==>".bold().blue(), ui::describe(&inst));
        }

        let pb = ui::spinner("Working");
        let result = engine.toggle_secondary_mod(&inst).await;
        pb.finish_and_clear();
        let updated = result?;

        let verb = if updated.secondary_mod { "installed" } else { "removed" };
        println!("{} OpenAsar {} ({})", "✓".green().bold(), verb, ui::state_label(&updated));
        if updated.secondary_mod && !updated.is_patched() {
            println!("OpenAsar loads once the install is patched.");
        }
        Ok(())
    }
}

fn confirm_install() -> Result<bool> {
    println!("{}", DISCLAIMER.yellow());
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Install OpenAsar?")
        .default(false)
        .interact()
        .map_err(|e| {
            BashcordError::Generic(format!("Could not ask for confirmation ({e}). Pass --yes."))
        })
}
