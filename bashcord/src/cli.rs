// bashcord/src/cli.rs
//! Defines the command-line argument structure using clap.

use bashcord_common::error::Result;
use bashcord_core::Engine;
use clap::{ArgAction, Parser, Subcommand};

pub mod check;
pub mod list;
pub mod openasar;
pub mod patch;
pub mod self_update;
pub mod target;
pub mod unpatch;
pub mod update;

use crate::cli::check::Check;
use crate::cli::list::List;
use crate::cli::openasar::OpenAsar;
use crate::cli::patch::Patch;
use crate::cli::self_update::SelfUpdate;
use crate::cli::unpatch::Unpatch;
use crate::cli::update::Update;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "bashcord", bin_name = "bashcord")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List Discord installs and their patch state
    List(List),
    /// Inject Vencord into a Discord install
    Patch(Patch),
    /// Restore a Discord install to its original state
    Unpatch(Unpatch),
    /// Install or remove OpenAsar
    #[command(name = "openasar")]
    OpenAsar(OpenAsar),
    /// Check for newer Vencord and installer builds
    Check(Check),
    /// Download the latest Vencord build
    Update(Update),
    /// Replace this installer with the latest release
    SelfUpdate(SelfUpdate),
}

impl Command {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        match self {
            Self::List(command) => command.run(engine).await,
            Self::Patch(command) => command.run(engine).await,
            Self::Unpatch(command) => command.run(engine).await,
            Self::OpenAsar(command) => command.run(engine).await,
            Self::Check(command) => command.run(engine).await,
            Self::Update(command) => command.run(engine).await,
            Self::SelfUpdate(command) => command.run(engine).await,
        }
    }

    /// Commands that already talk to the release feed skip the background check.
    pub fn wants_update_check(&self) -> bool {
        matches!(self, Self::List(_) | Self::Patch(_) | Self::Unpatch(_))
    }
}
