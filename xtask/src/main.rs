//! Build automation tasks for playframe
//!
//! Usage:
//!   cargo xtask build-player                    # Build the wasm player into dist/runtime
//!   cargo xtask export game.json [-o out.html]  # Pack a project into one HTML file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;

use playframe::asset::FileSource;
use playframe::export::{build_standalone_bundle, bundle_file_name, RuntimeBundle};
use playframe::project::Project;

/// macroquad release whose JS loader matches the player build
const MQ_JS_BUNDLE_URL: &str = "https://raw.githubusercontent.com/not-fl3/macroquad/v0.4.14/js/mq_js_bundle.js";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for playframe")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the wasm player and fetch the macroquad JS loader
    BuildPlayer,
    /// Export a project as a standalone HTML document
    Export {
        /// Project JSON file
        project: PathBuf,
        /// Output file (default: <project name>.html next to the project)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory holding mq_js_bundle.js and playframe.wasm
        #[arg(long)]
        runtime: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::BuildPlayer => build_player().map(|_| ()),
        Commands::Export { project, output, runtime } => export(&project, output, runtime),
    }
}

/// Get the project root directory
fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn runtime_dir() -> PathBuf {
    project_root().join("dist/runtime")
}

/// Run a command and check for success
fn run_cmd(cmd: &mut Command) -> Result<()> {
    let status = cmd.status().context("Failed to execute command")?;
    if !status.success() {
        anyhow::bail!("Command failed with status: {}", status);
    }
    Ok(())
}

/// Download a file from URL to destination
fn download_file(url: &str, dest: &Path) -> Result<()> {
    println!("Downloading {}...", url);
    run_cmd(Command::new("curl").args(["-L", "-f", "-o"]).arg(dest).arg(url))
}

/// Build the wasm player into dist/runtime
fn build_player() -> Result<PathBuf> {
    let root = project_root();
    let dist = runtime_dir();

    println!("Building wasm player...");
    run_cmd(
        Command::new("cargo")
            .current_dir(&root)
            .args(["build", "--release", "--bin", "playframe", "--target", "wasm32-unknown-unknown"]),
    )?;

    std::fs::create_dir_all(&dist)?;
    std::fs::copy(
        root.join("target/wasm32-unknown-unknown/release/playframe.wasm"),
        dist.join(RuntimeBundle::WASM_FILE),
    )
    .context("Failed to copy playframe.wasm")?;

    let loader = dist.join(RuntimeBundle::LOADER_FILE);
    if !loader.exists() {
        download_file(MQ_JS_BUNDLE_URL, &loader)?;
    }

    println!("Player build complete: {}", dist.display());
    Ok(dist)
}

/// Pack a project file into one HTML document
fn export(project_path: &Path, output: Option<PathBuf>, runtime: Option<PathBuf>) -> Result<()> {
    let json = std::fs::read_to_string(project_path)
        .with_context(|| format!("Failed to read {}", project_path.display()))?;
    let project = Project::from_json(&json).with_context(|| format!("Invalid project {}", project_path.display()))?;

    let runtime_dir = match runtime {
        Some(dir) => dir,
        None if runtime_dir().join(RuntimeBundle::WASM_FILE).exists() => runtime_dir(),
        None => build_player()?,
    };
    let bundle = RuntimeBundle::from_dir(&runtime_dir).context("Player runtime missing; run `cargo xtask build-player`")?;

    let assets_root = project_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let html = build_standalone_bundle(&project, &bundle, &FileSource::new(assets_root))?;

    let output = output.unwrap_or_else(|| {
        project_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(bundle_file_name(&project))
    });
    std::fs::write(&output, &html).with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Exported '{}' to {} ({} KB)", project.name, output.display(), html.len() / 1024);
    Ok(())
}
