//! Zip archive helpers for program, reference, submission and output bundles.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::ArchiveError;

/// Unpack every member of the archive in `bytes` below `dest`.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<(), ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    fs::create_dir_all(dest)?;
    archive.extract(dest)?;
    Ok(())
}

/// Read a single member of the archive in `bytes`.
pub fn read_member(bytes: &[u8], member: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = match archive.by_name(member) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => {
            return Err(ArchiveError::MissingMember {
                member: member.to_string(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    Ok(contents)
}

/// Pack the contents of `dir` into a zip archive; member names are relative
/// to `dir` and use `/` separators.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut files = walk_files(dir)?;
    files.sort();

    for path in files {
        let relative = path.strip_prefix(dir).unwrap_or(&path);
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, file_options(&path)?)?;
        writer.write_all(&fs::read(&path)?)?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Build an archive in memory from `(name, contents)` pairs.
pub fn build_archive<'a, I>(entries: I) -> Result<Vec<u8>, ArchiveError>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    for (name, contents) in entries {
        writer.start_file(name, options)?;
        writer.write_all(contents)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[cfg(unix)]
fn file_options(path: &Path) -> Result<SimpleFileOptions, ArchiveError> {
    use std::os::unix::fs::PermissionsExt;
    let mode = fs::metadata(path)?.permissions().mode();
    Ok(SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(mode & 0o777))
}

#[cfg(not(unix))]
fn file_options(_path: &Path) -> Result<SimpleFileOptions, ArchiveError> {
    Ok(SimpleFileOptions::default().compression_method(CompressionMethod::Deflated))
}

fn walk_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            files.extend(walk_files(&path)?);
        } else {
            files.push(path);
        }
    }
    Ok(files)
}
