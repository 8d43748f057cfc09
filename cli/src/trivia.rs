use anyhow::{anyhow, Result};
use clap::Args;
use std::path::PathBuf;

use catalog::{Catalog, FileCatalog};

/// Lists catalog files, the titles in one file, or the items of one title.
#[derive(Debug, Args)]
pub struct Command {
    #[arg(long, env = "TRIVIA_DIR", default_value = "trivia")]
    trivia: PathBuf,
    #[arg(long)]
    title: Option<String>,
    file: Option<String>,
}

pub fn execute_command(cmd: &Command) -> Result<()> {
    let catalog = FileCatalog::new(&cmd.trivia);

    let lines = match (&cmd.title, &cmd.file) {
        (Some(title), _) => catalog
            .lookup(title)?
            .ok_or_else(|| anyhow!("no such title: {}", title))?,
        (None, Some(file)) => catalog.titles(file),
        (None, None) => catalog.files(),
    };

    for line in lines {
        println!("{}", line);
    }

    Ok(())
}
