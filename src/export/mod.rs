//! Standalone Export
//!
//! Packs a project and the compiled wasm player into one HTML file that
//! plays offline. Nothing in the document points outside of it:
//!
//! - every asset is inlined into the project JSON as a data URI
//! - the project JSON sits in a `<script type="application/json">` block
//! - the macroquad JS loader is inlined
//! - the wasm player is embedded as base64 and loaded from a blob URL
//!
//! The player reads the project back through three host functions that the
//! bootstrap registers as a miniquad plugin (`playframe_project_len`,
//! `playframe_project_copy`, `playframe_message`).

use std::path::{Path, PathBuf};

use base64::Engine;
use thiserror::Error;

use crate::asset::{sniff_mime, to_data_uri, AssetLoadError, AssetSource};
use crate::project::{Project, ProjectError};

/// `id` of the script element holding the project JSON
pub const PROJECT_ELEMENT_ID: &str = "playframe-project";

pub const HTML_MIME: &str = "text/html";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("failed to serialize project: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset '{id}' could not be inlined: {source}")]
    Asset {
        id: String,
        #[source]
        source: AssetLoadError,
    },
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document has no embedded project")]
    MissingProject,
}

/// The player runtime embedded into every export
#[derive(Debug, Clone)]
pub struct RuntimeBundle {
    /// macroquad's `mq_js_bundle.js`
    pub loader_js: String,
    /// The player compiled for wasm32-unknown-unknown
    pub wasm: Vec<u8>,
}

impl RuntimeBundle {
    pub const LOADER_FILE: &'static str = "mq_js_bundle.js";
    pub const WASM_FILE: &'static str = "playframe.wasm";

    pub fn new(loader_js: impl Into<String>, wasm: Vec<u8>) -> Self {
        Self { loader_js: loader_js.into(), wasm }
    }

    /// Load `mq_js_bundle.js` and `playframe.wasm` from a build directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, ExportError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read(&path).map_err(|source| ExportError::Io { path, source })
        };
        let loader = read(Self::LOADER_FILE)?;
        let wasm = read(Self::WASM_FILE)?;
        Ok(Self {
            loader_js: String::from_utf8_lossy(&loader).into_owned(),
            wasm,
        })
    }
}

/// Copy of `project` with every non-inline asset replaced by a data URI.
pub fn inline_assets(project: &Project, source: &dyn AssetSource) -> Result<Project, ExportError> {
    let mut inlined = project.clone();
    for asset in &mut inlined.assets {
        if asset.src.starts_with("data:") {
            continue;
        }
        let bytes = source.read(&asset.src).map_err(|source| ExportError::Asset {
            id: asset.id.clone(),
            source,
        })?;
        let mime = sniff_mime(&bytes, &asset.src);
        log::debug!("inlining asset '{}' ({} bytes, {})", asset.id, bytes.len(), mime);
        asset.src = to_data_uri(mime, &bytes);
    }
    Ok(inlined)
}

/// Build the standalone HTML document for `project`.
pub fn build_standalone_bundle(
    project: &Project,
    runtime: &RuntimeBundle,
    source: &dyn AssetSource,
) -> Result<String, ExportError> {
    project.validate()?;
    let project = inline_assets(project, source)?;
    let start = project.start_scene_index().ok_or(ProjectError::NoScenes)?;
    let scene = &project.scenes[start];

    let json = escape_json_for_html(&serde_json::to_string(&project)?);
    let loader = runtime.loader_js.replace("</script", "<\\/script");
    let wasm = base64::engine::general_purpose::STANDARD.encode(&runtime.wasm);
    let width = scene.width.to_string();
    let height = scene.height.to_string();
    let title = escape_html(&project.name);

    let html = fill(
        DOCUMENT_TEMPLATE,
        &[
            ("TITLE", &title),
            ("WIDTH", &width),
            ("HEIGHT", &height),
            ("PROJECT_ID", PROJECT_ELEMENT_ID),
            ("PROJECT", &json),
            ("LOADER", &loader),
            ("WASM", &wasm),
        ],
    );
    log::info!("exported '{}': {} bytes", project.name, html.len());
    Ok(html)
}

/// Read the project embedded in an exported document.
pub fn extract_project(document: &str) -> Result<Project, ExportError> {
    let marker = format!("id=\"{}\">", PROJECT_ELEMENT_ID);
    let start = document.find(&marker).ok_or(ExportError::MissingProject)? + marker.len();
    let len = document[start..].find("</script>").ok_or(ExportError::MissingProject)?;
    // `<\/` parses back to `</` as a JSON string escape
    Ok(Project::from_json(&document[start..start + len])?)
}

/// `<project name>.html` with characters unsafe in file names replaced
pub fn bundle_file_name(project: &Project) -> String {
    let name: String = project
        .name
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim_matches(|c| c == '_' || c == '.');
    if name.is_empty() {
        "project.html".to_string()
    } else {
        format!("{}.html", name)
    }
}

fn escape_json_for_html(json: &str) -> String {
    json.replace("</", "<\\/").replace("<!--", "<\\u0021--")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Substitute `{{KEY}}` placeholders in one pass, so inserted values are
/// never scanned for further placeholders.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let value = after.find("}}").and_then(|close| {
            let key = &after[..close];
            values.iter().find(|(k, _)| *k == key).map(|(_, v)| (close, *v))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

const DOCUMENT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{{TITLE}}</title>
<style>
html, body { margin: 0; height: 100%; background: #000; overflow: hidden; }
body { display: flex; align-items: center; justify-content: center; }
#glcanvas { width: {{WIDTH}}px; height: {{HEIGHT}}px; max-width: 100vw; max-height: 100vh; outline: none; }
</style>
</head>
<body>
<canvas id="glcanvas" tabindex="1" width="{{WIDTH}}" height="{{HEIGHT}}"></canvas>
<script type="application/json" id="{{PROJECT_ID}}">{{PROJECT}}</script>
<script>{{LOADER}}</script>
<script>
(function () {
    var project = new TextEncoder().encode(document.getElementById("{{PROJECT_ID}}").textContent);
    miniquad_add_plugin({
        name: "playframe",
        version: 1,
        register_plugin: function (importObject) {
            importObject.env.playframe_project_len = function () {
                return project.length;
            };
            importObject.env.playframe_project_copy = function (ptr, len) {
                new Uint8Array(wasm_memory.buffer, ptr, len).set(project.subarray(0, len));
            };
            importObject.env.playframe_message = function (ptr, len) {
                var text = new TextDecoder().decode(new Uint8Array(wasm_memory.buffer, ptr, len));
                console.log("[playframe] " + text);
            };
        }
    });
    var binary = atob("{{WASM}}");
    var bytes = new Uint8Array(binary.length);
    for (var i = 0; i < binary.length; i++) {
        bytes[i] = binary.charCodeAt(i);
    }
    load(URL.createObjectURL(new Blob([bytes], { type: "application/wasm" })));
    document.getElementById("glcanvas").focus();
})();
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{image_asset, png_bytes, DataUriSource, FileSource};
    use crate::project::{Asset, AssetKind, Scene, SceneEntity, Script};

    fn runtime() -> RuntimeBundle {
        RuntimeBundle::new("function load(p) { document.write('</script>'); }", vec![0, 97, 115, 109])
    }

    fn sample() -> Project {
        let mut project = Project::new("p1", "My Game");
        let mut scene = Scene::new("scene-1", 400, 300);
        let mut entity = SceneEntity::new("e1", "Player </script> <!-- tricky");
        entity.components.script = Some(Script {
            code: r#"fn onUpdate(e, p, api) { api.message("</script><script>alert(1)</script>"); }"#.into(),
        });
        scene.entities.push(entity);
        project.scenes.push(scene);
        project.scenes.push(Scene::new("scene-2", 800, 600));
        project.start_scene_id = Some("scene-2".into());
        project.assets.push(image_asset("hero", 2, 2));
        project
    }

    #[test]
    fn test_round_trip_equals_project() {
        let project = sample();
        let html = build_standalone_bundle(&project, &runtime(), &DataUriSource).unwrap();
        let back = extract_project(&html).unwrap();
        assert_eq!(back, project);
    }

    #[test]
    fn test_document_is_self_contained() {
        let html = build_standalone_bundle(&sample(), &runtime(), &DataUriSource).unwrap();
        // Project JSON, loader and bootstrap each close exactly once
        assert_eq!(html.matches("</script>").count(), 3);
        assert!(!html.contains("src=\"http"));
        assert!(!html.contains("{{"));
        assert!(html.contains("width=\"800\" height=\"600\""));
        assert!(html.contains("AGFzbQ=="));
        assert!(html.contains("<title>My Game</title>"));
    }

    #[test]
    fn test_file_assets_are_inlined() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hero.png"), png_bytes(3, 3)).unwrap();
        let mut project = sample();
        project.assets = vec![Asset {
            id: "hero".into(),
            name: "Hero".into(),
            kind: AssetKind::Image,
            src: "hero.png".into(),
        }];

        let source = FileSource::new(dir.path());
        let html = build_standalone_bundle(&project, &runtime(), &source).unwrap();
        let back = extract_project(&html).unwrap();
        assert!(back.assets[0].src.starts_with("data:image/png;base64,"));
        assert_eq!(back, inline_assets(&project, &source).unwrap());
        assert_eq!(source.read(&back.assets[0].src).unwrap(), png_bytes(3, 3));
    }

    #[test]
    fn test_remote_and_missing_assets_fail() {
        let mut project = sample();
        project.assets[0].src = "https://example.com/hero.png".into();
        let err = build_standalone_bundle(&project, &runtime(), &DataUriSource).unwrap_err();
        assert!(matches!(err, ExportError::Asset { ref id, .. } if id == "hero"));

        let dir = tempfile::tempdir().unwrap();
        project.assets[0].src = "missing.png".into();
        let err = build_standalone_bundle(&project, &runtime(), &FileSource::new(dir.path())).unwrap_err();
        assert!(matches!(err, ExportError::Asset { .. }));
    }

    #[test]
    fn test_invalid_project_not_exported() {
        let empty = Project::new("p", "Empty");
        let err = build_standalone_bundle(&empty, &runtime(), &DataUriSource).unwrap_err();
        assert!(matches!(err, ExportError::Project(ProjectError::NoScenes)));
    }

    #[test]
    fn test_extract_without_project() {
        assert!(matches!(extract_project("<html></html>"), Err(ExportError::MissingProject)));
    }

    #[test]
    fn test_bundle_file_name() {
        let mut project = Project::new("p", "My Game: Part 2");
        assert_eq!(bundle_file_name(&project), "My_Game__Part_2.html");
        project.name = "  ../  ".into();
        assert_eq!(bundle_file_name(&project), "project.html");
    }

    #[test]
    fn test_runtime_bundle_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(RuntimeBundle::from_dir(dir.path()), Err(ExportError::Io { .. })));
        std::fs::write(dir.path().join(RuntimeBundle::LOADER_FILE), "var x = 1;").unwrap();
        std::fs::write(dir.path().join(RuntimeBundle::WASM_FILE), [0u8, 97, 115, 109]).unwrap();
        let bundle = RuntimeBundle::from_dir(dir.path()).unwrap();
        assert_eq!(bundle.loader_js, "var x = 1;");
        assert_eq!(bundle.wasm, vec![0, 97, 115, 109]);
    }
}
