use std::fs;
use std::path::Path;

use publisher_logging::publish_debug;

/// File written by the build pipeline with the build's identifier.
pub const ARTIFACT_ID_FILE: &str = "GUID.txt";
/// File written by the build pipeline with the editor version that produced it.
pub const VERSION_FILE: &str = "ProjectVersion.txt";

pub trait ArtifactValidator: Send + Sync {
    fn is_valid(&self, dir: &Path) -> bool;
    fn artifact_size(&self, dir: &Path) -> u64;
}

/// Checks the layout of a web player build against its editor version.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebBuildValidator;

impl ArtifactValidator for WebBuildValidator {
    fn is_valid(&self, dir: &Path) -> bool {
        if dir.as_os_str().is_empty() || !dir.is_dir() {
            return false;
        }
        let Some(version) = build_version(dir) else {
            publish_debug!("No usable {} in {:?}", VERSION_FILE, dir);
            return false;
        };
        let Some(name) = dir.file_name().and_then(|name| name.to_str()) else {
            return false;
        };
        match version.as_str() {
            "2019.3" => has_2019_3_layout(dir, name),
            "2020.2" => has_2020_2_layout(dir, name),
            // Unknown layouts are accepted as is.
            _ => true,
        }
    }

    fn artifact_size(&self, dir: &Path) -> u64 {
        folder_size(dir)
    }
}

/// Editor version (`YYYY.N`) recorded in the build, if readable.
///
/// The first line looks like `m_EditorVersion: 2019.3.4f1`.
pub fn build_version(dir: &Path) -> Option<String> {
    let content = fs::read_to_string(dir.join(VERSION_FILE)).ok()?;
    let first_line = content.lines().next()?;
    let full = first_line.split_whitespace().nth(1)?;
    let version = full.get(..6)?;
    is_short_version(version).then(|| version.to_string())
}

fn is_short_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 6
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'.'
        && bytes[5].is_ascii_digit()
}

fn has_2019_3_layout(dir: &Path, name: &str) -> bool {
    let build = dir.join("Build");
    [
        format!("{name}.data.unityweb"),
        format!("{name}.wasm.code.unityweb"),
        format!("{name}.wasm.framework.unityweb"),
        format!("{name}.json"),
        "UnityLoader.js".to_string(),
    ]
    .iter()
    .all(|file| build.join(file).is_file())
}

fn has_2020_2_layout(dir: &Path, name: &str) -> bool {
    let build = dir.join("Build");
    let prefixes = [
        format!("{name}.data."),
        format!("{name}.framework.js."),
        format!("{name}.wasm."),
    ];
    prefixes.iter().all(|prefix| has_file_with_prefix(&build, prefix))
        && build.join(format!("{name}.loader.js")).is_file()
}

fn has_file_with_prefix(dir: &Path, prefix: &str) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry.path().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|file| file.starts_with(prefix))
    })
}

/// Total size of all files below `dir`, in bytes.
pub fn folder_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                folder_size(&path)
            } else {
                entry.metadata().map(|meta| meta.len()).unwrap_or(0)
            }
        })
        .sum()
}

/// Identifier stored next to the build, if present and non-blank.
pub fn read_artifact_id(dir: &Path) -> Option<String> {
    let raw = fs::read_to_string(dir.join(ARTIFACT_ID_FILE)).ok()?;
    let id = raw.trim();
    (!id.is_empty()).then(|| id.to_string())
}
