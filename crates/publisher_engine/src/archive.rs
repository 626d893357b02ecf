use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use publisher_core::format_bytes;
use tempfile::NamedTempFile;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("build directory not found: {0}")]
    MissingSource(PathBuf),
    #[error("archive exceeds the maximum size of {}", format_bytes(*limit))]
    TooLarge { limit: u64, actual: u64 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Compress `source` into a single zip file at `dest`.
///
/// Any previous archive at `dest` is deleted first. The file only appears at
/// `dest` once it is complete. An archive larger than `max_bytes` is an error.
/// `dest` may lie inside `source`; neither it nor the file being written is
/// packed.
pub fn create_archive(source: &Path, dest: &Path, max_bytes: u64) -> Result<ArchiveInfo, ArchiveError> {
    if !source.is_dir() {
        return Err(ArchiveError::MissingSource(source.to_path_buf()));
    }
    let source = std::path::absolute(source)?;
    let dest = std::path::absolute(dest)?;
    let dest = dest.as_path();

    match fs::remove_file(dest) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let parent = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let tmp = NamedTempFile::new_in(&parent)?;
    {
        let mut writer = ZipWriter::new(tmp.as_file());
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        let skip = [dest, tmp.path()];
        add_directory(&mut writer, &source, &source, &skip, options)?;
        writer.finish()?;
    }
    let bytes = tmp.as_file().metadata()?.len();

    tmp.persist(dest).map_err(|err| ArchiveError::Io(err.error))?;

    if bytes > max_bytes {
        return Err(ArchiveError::TooLarge {
            limit: max_bytes,
            actual: bytes,
        });
    }

    Ok(ArchiveInfo {
        path: dest.to_path_buf(),
        bytes,
    })
}

fn add_directory(
    writer: &mut ZipWriter<&File>,
    root: &Path,
    dir: &Path,
    skip: &[&Path],
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if skip.contains(&path.as_path()) {
            continue;
        }
        let name = entry_name(root, &path);
        if path.is_dir() {
            writer.add_directory(format!("{name}/"), options)?;
            add_directory(writer, root, &path, skip, options)?;
        } else {
            writer.start_file(name, options)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, writer)?;
        }
    }
    Ok(())
}

/// Forward-slash path of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_use_forward_slashes() {
        let root = Path::new("/builds/demo");
        assert_eq!(
            entry_name(root, &root.join("Build").join("demo.wasm")),
            "Build/demo.wasm"
        );
        assert_eq!(entry_name(root, &root.join("index.html")), "index.html");
    }
}
