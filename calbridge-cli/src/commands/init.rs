use std::path::Path;

use anyhow::Result;
use calbridge_core::Config;
use owo_colors::OwoColorize;

pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {}\n\nUse --force to overwrite it.",
            path.display()
        );
    }

    Config::create_default(path)?;

    println!("{} {}", "Created".green(), path.display());
    println!("Edit the [source] and [sink] sections, then run:\n  calbridge sync");
    Ok(())
}
