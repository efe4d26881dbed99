// bashcord/src/cli/target.rs
//! Picks the install a command acts on.

use std::path::PathBuf;

use bashcord_common::error::{BashcordError, Result};
use bashcord_common::model::{Branch, Installation};
use bashcord_core::Engine;
use clap::Args;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use tracing::debug;

use crate::ui;

fn parse_branch(s: &str) -> std::result::Result<Branch, String> {
    Branch::from_channel(s).ok_or_else(|| {
        format!("unknown branch '{s}' (expected stable, ptb, canary or development)")
    })
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Only consider installs of this branch
    #[arg(long, value_parser = parse_branch)]
    pub branch: Option<Branch>,

    /// Use the install at this path instead of searching for one
    #[arg(long, value_name = "PATH", conflicts_with = "branch")]
    pub location: Option<PathBuf>,
}

impl TargetArgs {
    /// The selected install, asking the user when several match.
    pub async fn resolve(&self, engine: &Engine) -> Result<Installation> {
        if let Some(location) = self.location.clone() {
            let shown = location.display().to_string();
            return ui::blocking(engine, move |e| Ok(e.classify_custom_path(&location)))
                .await?
                .ok_or_else(|| {
                    BashcordError::Generic(format!("{shown} is not a Discord install"))
                });
        }

        let branch = self.branch;
        let mut installs: Vec<Installation> = ui::blocking(engine, |e| Ok(e.list_installs()))
            .await?
            .into_iter()
            .filter(|inst| branch.is_none_or(|b| inst.branch == b))
            .collect();
        debug!("{} install(s) match the selection", installs.len());

        match installs.len() {
            0 => Err(BashcordError::Generic(match branch {
                Some(b) => format!("No {b} install found. Pass --location to point at one."),
                None => "No Discord install found. Pass --location to point at one.".to_string(),
            })),
            1 => Ok(installs.remove(0)),
            _ => {
                let items: Vec<String> = installs.iter().map(ui::describe).collect();
                let choice = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Which install?")
                    .items(&items)
                    .default(0)
                    .interact()
                    .map_err(|e| {
                        BashcordError::Generic(format!(
                            "Several installs match and none was chosen ({e}). Use --branch or --location."
                        ))
                    })?;
                Ok(installs.swap_remove(choice))
            }
        }
    }
}
