//! CLI argument parsing for Architectum
//!
//! Defines the Command enum and parse_args() function for all CLI commands.

use anyhow::Result;
use architectum::{DetailLevel, DetailLevelConfig};
use std::path::PathBuf;

pub fn print_usage() {
    eprintln!("Architectum - code relationship graph and JSON content mirror");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  architectum <command> [arguments]");
    eprintln!("  architectum --help");
    eprintln!();
    eprintln!("  architectum sync [--root <DIR>] [--recursive] [--force] [PATH]...");
    eprintln!("  architectum blueprint file [--root <DIR>] <PATH>... [blueprint options]");
    eprintln!("  architectum blueprint path [--root <DIR>] <DIR> [--depth <N>] [blueprint options]");
    eprintln!("  architectum blueprint method [--root <DIR>] <FILE> <NAME>... [blueprint options]");
    eprintln!("  architectum blueprint show [--root <DIR>] <NAME> [--version <N>]");
    eprintln!("  architectum blueprint diff [--root <DIR>] <NAME> --from <N> --to <N>");
    eprintln!("  architectum status [--root <DIR>]");
    eprintln!("  architectum verify [--root <DIR>]");
    eprintln!("  architectum export [--root <DIR>] [--output <PATH>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  sync       Bring the graph and mirror in line with the given paths");
    eprintln!("  blueprint  Assemble, show or diff blueprints");
    eprintln!("  status     Show store statistics");
    eprintln!("  verify     Cross-check graph, mirror and ledger");
    eprintln!("  export     Export the graph as JSON");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --root <DIR>        Project root (default: current directory)");
    eprintln!();
    eprintln!("Sync arguments:");
    eprintln!("  --recursive, -r     Descend into subdirectories");
    eprintln!("  --force             Re-parse files even when unchanged");
    eprintln!("  PATH                Files or directories (default: the root)");
    eprintln!();
    eprintln!("Blueprint options:");
    eprintln!("  --detail <LEVEL>          minimal, standard or detailed for both stores");
    eprintln!("  --graph-detail <LEVEL>    Detail level for nodes and relationships");
    eprintln!("  --mirror-detail <LEVEL>   Detail level for file content");
    eprintln!("  --cross-file              Follow calls, imports and inheritance into other files");
    eprintln!("  --cross-file-depth <N>    Hops for --cross-file (default from config)");
    eprintln!("  --durable                 Save as a new version under --name");
    eprintln!("  --name <NAME>             Blueprint name");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ARCHITECTUM_LOG                 Log filter (falls back to RUST_LOG)");
    eprintln!("  ARCHITECTUM_PARSE_TIMEOUT_MS    Parser timeout");
    eprintln!("  ARCHITECTUM_CROSS_FILE_DEPTH    Default cross-file hops");
    eprintln!("  ARCHITECTUM_RESPECT_GITIGNORE   Honor .gitignore (true/false)");
}

/// Which blueprint to build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlueprintTarget {
    Files(Vec<PathBuf>),
    Path { dir: PathBuf, depth: usize },
    Method { file: PathBuf, names: Vec<String> },
}

/// Options shared by every blueprint selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlueprintArgs {
    pub detail: DetailLevelConfig,
    /// `Some(None)`: expand with the configured depth.
    pub cross_file: Option<Option<usize>>,
    pub durable: bool,
    pub name: Option<String>,
}

impl Default for BlueprintArgs {
    fn default() -> Self {
        Self {
            detail: DetailLevelConfig::default(),
            cross_file: None,
            durable: false,
            name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Sync {
        root: PathBuf,
        paths: Vec<PathBuf>,
        recursive: bool,
        force: bool,
    },
    Blueprint {
        root: PathBuf,
        target: BlueprintTarget,
        args: BlueprintArgs,
    },
    BlueprintShow {
        root: PathBuf,
        name: String,
        version: Option<u32>,
    },
    BlueprintDiff {
        root: PathBuf,
        name: String,
        from: u32,
        to: u32,
    },
    Status {
        root: PathBuf,
    },
    Verify {
        root: PathBuf,
    },
    Export {
        root: PathBuf,
        output: Option<PathBuf>,
    },
}

/// Parse CLI arguments into a Command
///
/// For the --version and -V flags, it prints the version and exits.
/// For the --help and -h flags, it prints usage and exits.
pub fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if let Some(first) = args.get(1) {
        if first == "--version" || first == "-V" {
            println!("architectum {}", env!("CARGO_PKG_VERSION"));
            std::process::exit(0);
        }
        if first == "--help" || first == "-h" {
            print_usage();
            std::process::exit(0);
        }
    }
    parse_args_from(&args)
}

/// Parse a full argv (program name first).
pub fn parse_args_from(args: &[String]) -> Result<Command> {
    if args.len() < 2 {
        return Err(anyhow::anyhow!("Missing command"));
    }

    match args[1].as_str() {
        "sync" => parse_sync(&args[2..]),
        "blueprint" => parse_blueprint(&args[2..]),
        "status" => {
            let mut root = PathBuf::from(".");
            let mut i = 0;
            let rest = &args[2..];
            while i < rest.len() {
                i = parse_root(rest, i, &mut root)?
                    .ok_or_else(|| anyhow::anyhow!("Unknown argument: {}", rest[i]))?;
            }
            Ok(Command::Status { root })
        }
        "verify" => {
            let mut root = PathBuf::from(".");
            let mut i = 0;
            let rest = &args[2..];
            while i < rest.len() {
                i = parse_root(rest, i, &mut root)?
                    .ok_or_else(|| anyhow::anyhow!("Unknown argument: {}", rest[i]))?;
            }
            Ok(Command::Verify { root })
        }
        "export" => {
            let mut root = PathBuf::from(".");
            let mut output = None;
            let rest = &args[2..];
            let mut i = 0;
            while i < rest.len() {
                if let Some(next) = parse_root(rest, i, &mut root)? {
                    i = next;
                    continue;
                }
                match rest[i].as_str() {
                    "--output" => {
                        output = Some(PathBuf::from(value_of(rest, i)?));
                        i += 2;
                    }
                    other => return Err(anyhow::anyhow!("Unknown argument: {}", other)),
                }
            }
            Ok(Command::Export { root, output })
        }
        other => Err(anyhow::anyhow!("Unknown command: {}", other)),
    }
}

/// Value following the flag at `i`.
fn value_of(args: &[String], i: usize) -> Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{} requires an argument", args[i]))
}

/// Consume `--root <DIR>` at `i`; returns the next index when it matched.
fn parse_root(args: &[String], i: usize, root: &mut PathBuf) -> Result<Option<usize>> {
    if args[i] == "--root" {
        *root = PathBuf::from(value_of(args, i)?);
        return Ok(Some(i + 2));
    }
    Ok(None)
}

fn parse_sync(args: &[String]) -> Result<Command> {
    let mut root = PathBuf::from(".");
    let mut paths = Vec::new();
    let mut recursive = false;
    let mut force = false;

    let mut i = 0;
    while i < args.len() {
        if let Some(next) = parse_root(args, i, &mut root)? {
            i = next;
            continue;
        }
        match args[i].as_str() {
            "--recursive" | "-r" => {
                recursive = true;
                i += 1;
            }
            "--force" => {
                force = true;
                i += 1;
            }
            flag if flag.starts_with("--") => {
                return Err(anyhow::anyhow!("Unknown argument: {}", flag));
            }
            path => {
                paths.push(PathBuf::from(path));
                i += 1;
            }
        }
    }

    Ok(Command::Sync {
        root,
        paths,
        recursive,
        force,
    })
}

fn parse_level(raw: &str) -> Result<DetailLevel> {
    raw.parse::<DetailLevel>().map_err(anyhow::Error::from)
}

fn parse_blueprint(args: &[String]) -> Result<Command> {
    let Some(kind) = args.first() else {
        return Err(anyhow::anyhow!("blueprint requires one of: file, path, method, show, diff"));
    };

    let mut root = PathBuf::from(".");
    let mut positional: Vec<String> = Vec::new();
    let mut bp = BlueprintArgs::default();
    let mut depth: usize = 1;
    let mut version: Option<u32> = None;
    let mut from: Option<u32> = None;
    let mut to: Option<u32> = None;

    let rest = &args[1..];
    let mut i = 0;
    while i < rest.len() {
        if let Some(next) = parse_root(rest, i, &mut root)? {
            i = next;
            continue;
        }
        match rest[i].as_str() {
            "--depth" => {
                depth = value_of(rest, i)?.parse()?;
                i += 2;
            }
            "--detail" => {
                bp.detail = DetailLevelConfig::uniform(parse_level(value_of(rest, i)?)?);
                i += 2;
            }
            "--graph-detail" => {
                bp.detail.relationship_map = parse_level(value_of(rest, i)?)?;
                i += 2;
            }
            "--mirror-detail" => {
                bp.detail.json_mirrors = parse_level(value_of(rest, i)?)?;
                i += 2;
            }
            "--cross-file" => {
                if bp.cross_file.is_none() {
                    bp.cross_file = Some(None);
                }
                i += 1;
            }
            "--cross-file-depth" => {
                bp.cross_file = Some(Some(value_of(rest, i)?.parse()?));
                i += 2;
            }
            "--durable" => {
                bp.durable = true;
                i += 1;
            }
            "--name" => {
                bp.name = Some(value_of(rest, i)?.to_string());
                i += 2;
            }
            "--version" => {
                version = Some(value_of(rest, i)?.parse()?);
                i += 2;
            }
            "--from" => {
                from = Some(value_of(rest, i)?.parse()?);
                i += 2;
            }
            "--to" => {
                to = Some(value_of(rest, i)?.parse()?);
                i += 2;
            }
            flag if flag.starts_with("--") => {
                return Err(anyhow::anyhow!("Unknown argument: {}", flag));
            }
            value => {
                positional.push(value.to_string());
                i += 1;
            }
        }
    }

    let target = match kind.as_str() {
        "file" => {
            if positional.is_empty() {
                return Err(anyhow::anyhow!("blueprint file requires at least one <PATH>"));
            }
            BlueprintTarget::Files(positional.into_iter().map(PathBuf::from).collect())
        }
        "path" => {
            let dir = match positional.as_slice() {
                [] => PathBuf::from("."),
                [dir] => PathBuf::from(dir),
                _ => return Err(anyhow::anyhow!("blueprint path takes a single <DIR>")),
            };
            BlueprintTarget::Path { dir, depth }
        }
        "method" => {
            let mut iter = positional.into_iter();
            let file = iter
                .next()
                .ok_or_else(|| anyhow::anyhow!("blueprint method requires <FILE> <NAME>..."))?;
            let names: Vec<String> = iter.collect();
            if names.is_empty() {
                return Err(anyhow::anyhow!("blueprint method requires at least one <NAME>"));
            }
            BlueprintTarget::Method {
                file: PathBuf::from(file),
                names,
            }
        }
        "show" => {
            let [name] = positional.as_slice() else {
                return Err(anyhow::anyhow!("blueprint show requires a single <NAME>"));
            };
            return Ok(Command::BlueprintShow {
                root,
                name: name.clone(),
                version,
            });
        }
        "diff" => {
            let [name] = positional.as_slice() else {
                return Err(anyhow::anyhow!("blueprint diff requires a single <NAME>"));
            };
            let (Some(from), Some(to)) = (from, to) else {
                return Err(anyhow::anyhow!("blueprint diff requires --from and --to"));
            };
            return Ok(Command::BlueprintDiff {
                root,
                name: name.clone(),
                from,
                to,
            });
        }
        other => return Err(anyhow::anyhow!("Unknown blueprint kind: {}", other)),
    };

    if bp.durable && bp.name.is_none() {
        return Err(anyhow::anyhow!("--durable requires --name"));
    }
    Ok(Command::Blueprint {
        root,
        target,
        args: bp,
    })
}
