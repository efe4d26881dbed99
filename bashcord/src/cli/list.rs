use bashcord_common::error::Result;
use bashcord_core::Engine;
use clap::Args;
use colored::Colorize;
use prettytable::{format, Cell, Row, Table};

use crate::ui;

#[derive(Args, Debug)]
pub struct List;

impl List {
    pub async fn run(&self, engine: &Engine) -> Result<()> {
        let mut installs = ui::blocking(engine, |e| Ok(e.list_installs())).await?;
        if installs.is_empty() {
            println!("{}", "No Discord installs found".yellow());
            return Ok(());
        }
        installs.sort_by(|a, b| a.branch.as_str().cmp(b.branch.as_str()).then(a.path.cmp(&b.path)));

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("Branch").style_spec("b"),
            Cell::new("Version").style_spec("b"),
            Cell::new("State").style_spec("b"),
            Cell::new("OpenAsar").style_spec("b"),
            Cell::new("Location").style_spec("b"),
        ]));
        for inst in &installs {
            let location = if inst.is_flatpak {
                format!("{} (flatpak)", inst.path.display())
            } else {
                inst.path.display().to_string()
            };
            table.add_row(Row::new(vec![
                Cell::new(inst.branch.as_str()).style_spec("Fb"),
                Cell::new(inst.version.as_deref().unwrap_or("-")),
                Cell::new(&ui::state_label(inst).to_string()),
                Cell::new(if inst.secondary_mod { "✔" } else { "" }),
                Cell::new(&location),
            ]));
        }
        table.printstd();

        if installs.iter().any(|i| i.scuffed) {
            println!(
                "{} Scuffed installs cannot be patched until Discord is reinstalled.",
                "Warning:".yellow().bold()
            );
        }
        Ok(())
    }
}
