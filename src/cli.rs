// File: ./src/cli.rs
//! Command-line parsing and help text for the `tada` binary.
use anyhow::{Result, anyhow};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan { vault: Option<PathBuf> },
    Select { file_id: String, index: usize },
    Deselect { file_id: String, index: usize },
    Fold { file_id: String },
    Export,
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub root: Option<PathBuf>,
    pub command: Command,
}

fn parse_index(raw: Option<&String>) -> Result<usize> {
    let raw = raw.ok_or_else(|| anyhow!("Missing item number"))?;
    match raw.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(anyhow!("Item number must be a positive integer, got '{}'", raw)),
    }
}

fn require_file(raw: Option<&String>) -> Result<String> {
    raw.cloned().ok_or_else(|| anyhow!("Missing document name"))
}

/// Parses arguments without the program name.
pub fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut root = None;
    let mut rest = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-r" | "--root" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--root requires a path"))?;
                root = Some(PathBuf::from(path));
            }
            "-h" | "--help" | "help" => {
                return Ok(CliArgs {
                    root,
                    command: Command::Help,
                });
            }
            _ => rest.push(arg.clone()),
        }
    }

    let command = match rest.first().map(String::as_str) {
        None | Some("scan") => Command::Scan {
            vault: rest.get(1).map(PathBuf::from),
        },
        Some("select") => Command::Select {
            file_id: require_file(rest.get(1))?,
            index: parse_index(rest.get(2))?,
        },
        Some("deselect") => Command::Deselect {
            file_id: require_file(rest.get(1))?,
            index: parse_index(rest.get(2))?,
        },
        Some("fold") => Command::Fold {
            file_id: require_file(rest.get(1))?,
        },
        Some("export") => Command::Export,
        Some(other) => return Err(anyhow!("Unknown command '{}'", other)),
    };

    Ok(CliArgs { root, command })
}

pub fn print_help(binary_name: &str) {
    println!(
        "Tada v{} - checklists collected from #tada tagged notes",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("USAGE:");
    println!("    {} [--root <path>] [scan] [<vault>]", binary_name);
    println!("    {} [--root <path>] select <document> <n>", binary_name);
    println!("    {} [--root <path>] deselect <document> <n>", binary_name);
    println!("    {} [--root <path>] fold <document>", binary_name);
    println!("    {} [--root <path>] export", binary_name);
    println!("    {} --help", binary_name);
    println!();
    println!("OPTIONS:");
    println!("    -r, --root <path>     Use a different directory for config and data.");
    println!("    -h, --help            Show this help message.");
    println!();
    println!("COMMANDS:");
    println!("    scan [<vault>]        Re-read every note and print the checklist panel.");
    println!("                          The vault defaults to `vault_root` from config.toml,");
    println!("                          then the current directory.");
    println!("    select <doc> <n>      Pin the n-th item of a document (as numbered by scan).");
    println!("    deselect <doc> <n>    Unpin it again.");
    println!("    fold <doc>            Fold or unfold a document in the pinned list.");
    println!("    export                Print the saved state as JSON.");
    println!();
    println!("NOTE FORMAT:");
    println!("    Items are the `- [ ]` / `- [x]` lines directly below a line containing #tada.");
    println!("    The first line that is not an item ends the list.");
}
