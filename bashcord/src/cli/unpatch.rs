// bashcord/src/cli/unpatch.rs
use bashcord_common::error::Result;
use bashcord_core::Engine;
use clap::Args;
use colored::Colorize;

use crate::cli::target::TargetArgs;
use crate::ui;

#[derive(Args, Debug)]
pub struct Unpatch {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl Unpatch {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        let inst = self.target.resolve(engine).await?;
        println!("{} Unpatching {}", "==>".bold().blue(), ui::describe(&inst));

        let restored = ui::blocking(engine, move |e| e.unpatch(&inst)).await?;
        println!(
            "{} {} is now {}",
            "✓".green().bold(),
            restored.path.display(),
            ui::state_label(&restored)
        );
        Ok(())
    }
}
