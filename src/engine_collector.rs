use std::{fs, io::Write, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tracing::{info, instrument, warn};

use crate::engine::Engine;

/// Collect every executable file of `directory` as an [`Engine`], sorted by name.
#[instrument]
pub fn collect_engines(
    directory: impl AsRef<Path> + std::fmt::Debug,
    verbose: bool,
) -> anyhow::Result<Vec<Arc<Engine>>> {
    let directory = directory.as_ref();

    if !Path::is_dir(directory) {
        bail!("'{directory:?}' is not a valid directory");
    }

    const RED: &str = "\x1b[31m";
    const GREEN: &str = "\x1b[32m";
    const RESET: &str = "\x1b[0m";

    let mut entries = fs::read_dir(directory)
        .with_context(|| format!("could not read '{}'", directory.display()))?
        .filter_map(|item| item.ok().map(|item| item.path()))
        .collect::<Vec<_>>();
    entries.sort();
    info!(engine_candidates=?entries);

    let longest_name = entries
        .iter()
        .filter_map(|p| p.file_name())
        .fold(0, |acu, name| acu.max(name.len()))
        + 3; // at least 3 dots

    if verbose {
        println!("Collecting engines...");
    }

    let mut engines = Vec::new();
    for path in entries {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if verbose {
            print!("Collecting {name:·<longest_name$} ");
            let _ = std::io::stdout().flush();
        }

        if let Err(e) = check_executable(&path) {
            warn!("skipping '{name}': {e}");
            if verbose {
                println!("{RED}{e}{RESET}");
            }
            continue;
        }

        let engine = Engine::from_path(&path);
        if verbose {
            println!("{GREEN}Ok{RESET} ({})", engine.family);
        }
        engines.push(Arc::new(engine));
    }

    Ok(engines)
}

fn check_executable(path: &Path) -> anyhow::Result<()> {
    let metadata = path.metadata().context("unreadable entry")?;
    if !metadata.is_file() {
        bail!("not a file");
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            bail!("not executable");
        }
    }
    Ok(())
}
