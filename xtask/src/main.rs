// xtask - Build automation for tamarin
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::env;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

const USAGE: &str = "\
Usage: cargo xtask <install|uninstall> [--prefix <PATH>]

Builds the release binary and copies it into PREFIX/bin
(default: ~/.cargo/bin). `uninstall` removes it again.";

enum Task {
    Install,
    Uninstall,
}

fn main() {
    let mut args = env::args().skip(1);

    let task = match args.next().as_deref() {
        Some("install") => Task::Install,
        Some("uninstall") => Task::Uninstall,
        Some("help") | Some("-h") | Some("--help") | None => {
            println!("{}", USAGE);
            return;
        }
        Some(other) => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    };

    let prefix = match (args.next().as_deref(), args.next()) {
        (Some("--prefix"), Some(path)) => Some(PathBuf::from(path)),
        (Some("--prefix"), None) => {
            eprintln!("--prefix requires a path argument");
            std::process::exit(2);
        }
        (None, _) => None,
        (Some(other), _) => {
            eprintln!("Unknown option: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(task, prefix) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run(task: Task, prefix: Option<PathBuf>) -> Result<(), String> {
    let bin = bin_dir(prefix)?.join("tamarin");

    match task {
        Task::Install => install(&bin),
        Task::Uninstall => {
            if bin.exists() {
                fs::remove_file(&bin).map_err(|e| format!("removing {}: {}", bin.display(), e))?;
                println!("Removed {}", bin.display());
            } else {
                println!("Nothing installed at {}", bin.display());
            }
            Ok(())
        }
    }
}

fn install(dest: &Path) -> Result<(), String> {
    // The workspace root is one level up from this crate.
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or("xtask has no parent directory")?
        .to_path_buf();

    println!("Building release...");
    let status = Command::new("cargo")
        .args(["build", "--release"])
        .current_dir(&root)
        .status()
        .map_err(|e| format!("running cargo build: {}", e))?;
    if !status.success() {
        return Err("Build failed".to_string());
    }

    let built = root.join("target/release/tamarin");
    if let Some(dir) = dest.parent() {
        fs::create_dir_all(dir).map_err(|e| format!("creating {}: {}", dir.display(), e))?;
    }
    fs::copy(&built, dest)
        .map_err(|e| format!("copying {} to {}: {}", built.display(), dest.display(), e))?;
    fs::set_permissions(dest, fs::Permissions::from_mode(0o755))
        .map_err(|e| format!("marking {} executable: {}", dest.display(), e))?;

    println!("Installed {}", dest.display());
    println!("Make sure its directory is on your PATH");
    Ok(())
}

/// PREFIX/bin, defaulting the prefix to ~/.cargo.
fn bin_dir(prefix: Option<PathBuf>) -> Result<PathBuf, String> {
    let prefix = match prefix {
        Some(path) => path,
        None => {
            let home = env::var("HOME").map_err(|_| "could not determine home directory")?;
            PathBuf::from(home).join(".cargo")
        }
    };
    Ok(prefix.join("bin"))
}
