//! Blueprint command implementations

use anyhow::{Context, Result};
use architectum::output::{generate_execution_id, output_json, JsonResponse};
use architectum::{Architectum, BlueprintOptions, CrossFileConfig, Persistence};
use std::path::{Path, PathBuf};

use crate::cli::{BlueprintArgs, BlueprintTarget};

fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

pub fn run_blueprint(root: PathBuf, target: BlueprintTarget, args: BlueprintArgs) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let cwd = std::env::current_dir().context("reading the current directory")?;

    let options = BlueprintOptions {
        name: args.name,
        detail: args.detail,
        cross_file: args.cross_file.map(|depth| CrossFileConfig {
            depth: depth.unwrap_or(workspace.config().cross_file_depth),
        }),
        persistence: if args.durable {
            Persistence::Durable
        } else {
            Persistence::Ephemeral
        },
    };

    let blueprint = match target {
        BlueprintTarget::Files(paths) => {
            let paths: Vec<PathBuf> = paths.into_iter().map(|p| absolute(&cwd, p)).collect();
            workspace.create_file_blueprint(&paths, &options)?
        }
        BlueprintTarget::Path { dir, depth } => {
            workspace.create_path_blueprint(&absolute(&cwd, dir), depth, &options)?
        }
        BlueprintTarget::Method { file, names } => {
            workspace.create_method_blueprint(&absolute(&cwd, file), &names, &options)?
        }
    };

    for warning in &blueprint.warnings {
        eprintln!("Warning: {}", warning);
    }
    let partial = !blueprint.missing.is_empty();
    output_json(&JsonResponse::new(blueprint, &generate_execution_id()).with_partial(partial))
}

pub fn run_blueprint_show(root: PathBuf, name: String, version: Option<u32>) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let blueprint = workspace.blueprint_store().load(&name, version)?;
    output_json(&JsonResponse::new(blueprint, &generate_execution_id()))
}

pub fn run_blueprint_diff(root: PathBuf, name: String, from: u32, to: u32) -> Result<()> {
    let workspace = Architectum::open(&root)?;
    let diff = workspace.blueprint_store().diff(&name, from, to)?;
    output_json(&JsonResponse::new(diff, &generate_execution_id()))
}
