//! playframe player
//!
//! Native: `playframe [project.json]`, or pick the file in a dialog. Assets
//! with relative paths resolve next to the project file, and an optional
//! `playframe.ron` in the working directory tunes the runtime.
//!
//! Web: the project comes from the page hosting an exported document.

use macroquad::prelude::*;

use playframe::asset::AssetSource;
use playframe::config::RuntimeConfig;
use playframe::player;
use playframe::project::Project;
use playframe::VERSION;

fn window_conf() -> Conf {
    Conf {
        window_title: format!("playframe v{}", VERSION),
        window_width: 960,
        window_height: 540,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    // Initialize crash logging FIRST (before any other code)
    #[cfg(not(target_arch = "wasm32"))]
    {
        crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let config = load_config();
    let (project, source) = match load_project() {
        Ok(Some(loaded)) => loaded,
        Ok(None) => return,
        Err(message) => {
            log::error!("{}", message);
            player::show_error(&message).await;
            return;
        }
    };

    if let Err(e) = player::play(project, source, config).await {
        log::error!("{}", e);
        player::show_error(&e.to_string()).await;
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn load_config() -> RuntimeConfig {
    let path = std::path::Path::new("playframe.ron");
    if !path.exists() {
        return RuntimeConfig::default();
    }
    match RuntimeConfig::load(path) {
        Ok(config) => {
            log::info!("using {}", path.display());
            config
        }
        Err(e) => {
            log::warn!("ignoring {}: {}", path.display(), e);
            RuntimeConfig::default()
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn load_config() -> RuntimeConfig {
    RuntimeConfig::default()
}

type Loaded = (Project, Box<dyn AssetSource>);

/// The project to play; Ok(None) when the user cancelled the dialog
#[cfg(not(target_arch = "wasm32"))]
fn load_project() -> Result<Option<Loaded>, String> {
    use playframe::asset::FileSource;

    let path = match std::env::args().nth(1) {
        Some(arg) => std::path::PathBuf::from(arg),
        None => match rfd::FileDialog::new().add_filter("Project JSON", &["json"]).pick_file() {
            Some(path) => path,
            None => return Ok(None),
        },
    };
    let json = std::fs::read_to_string(&path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    let project = Project::from_json(&json).map_err(|e| format!("{}: {}", path.display(), e))?;
    let root = path.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    Ok(Some((project, Box::new(FileSource::new(root)))))
}

#[cfg(target_arch = "wasm32")]
fn load_project() -> Result<Option<Loaded>, String> {
    use playframe::asset::DataUriSource;

    let json = player::web::embedded_project().ok_or_else(|| "no project embedded in this page".to_string())?;
    let project = Project::from_json(&json).map_err(|e| e.to_string())?;
    Ok(Some((project, Box::new(DataUriSource))))
}
