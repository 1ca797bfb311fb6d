//! Clean command - remove build outputs

use anyhow::{Context, Result};
use metabuild_build::Builder;
use std::path::Path;

pub fn run(meta: &Path, quiet: bool) -> Result<()> {
    let removed = Builder::new(meta)
        .clean()
        .with_context(|| format!("Failed to clean project {}", meta.display()))?;

    if !quiet {
        for path in &removed {
            println!("Removed {}", path.display());
        }
        if removed.is_empty() {
            println!("Nothing to clean.");
        }
    }

    Ok(())
}
