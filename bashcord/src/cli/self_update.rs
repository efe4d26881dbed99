// bashcord/src/cli/self_update.rs
use std::process;

use bashcord_common::error::Result;
use bashcord_core::update::installer::is_relaunched;
use bashcord_core::update::running_tag;
use bashcord_core::{Engine, SelfUpdateOutcome};
use clap::Args;
use colored::Colorize;

use crate::ui;

#[derive(Args, Debug)]
pub struct SelfUpdate {
    /// Do not start the new build once it is in place
    #[arg(long)]
    pub no_relaunch: bool,
}

impl SelfUpdate {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        let pb = ui::spinner("Updating the installer");
        let outcome = engine.apply_installer_update().await;
        pb.finish_and_clear();

        match outcome? {
            SelfUpdateOutcome::UpToDate => {
                println!("Installer {} is up to date.", running_tag());
            }
            SelfUpdateOutcome::OpenedInBrowser(url) => {
                println!(
                    "This platform cannot update a running installer. Download the new build from {}",
                    url.underline()
                );
            }
            SelfUpdateOutcome::Replaced(path) => {
                println!("{} Installed the new build at {}", "✓".green().bold(), path.display());
                if !self.no_relaunch && !is_relaunched() {
                    engine.relaunch(&path)?;
                    process::exit(0);
                }
            }
        }
        Ok(())
    }
}
