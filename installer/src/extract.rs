//! Archive extraction for downloaded artifacts.
//!
//! Zip is the default format. Tarballs compressed with gzip or zstd are
//! recognized by their file name. Directory entries keep their recorded
//! permission bits on Unix, while file permission bits are not restored.

use log::debug;
use std::fs::{DirBuilder, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Permission bits for the extraction target directory.
const TARGET_DIR_MODE: u32 = 0o700;

/// Permission bits for directories created implicitly for file entries.
const IMPLICIT_DIR_MODE: u32 = 0o777;

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// The zip archive is malformed or an entry cannot be read.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The archive format is recognized but not supported.
    #[error("unsupported archive format for {path}")]
    UnsupportedFormat {
        /// The archive path.
        path: String,
    },

    /// A path in the archive attempts to escape the target directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: String,
    },
}

/// Archive container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// A zip archive; also the fallback for unrecognized names.
    Zip,
    /// A gzip-compressed tarball.
    TarGz,
    /// A zstd-compressed tarball.
    TarZst,
}

impl ArchiveFormat {
    /// Choose a format from the archive's file name.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnsupportedFormat`] for container formats
    /// that are recognized but cannot be unpacked, such as `.7z` or `.rar`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pantry_installer::extract::ArchiveFormat;
    /// use std::path::Path;
    ///
    /// let detect = |name: &str| ArchiveFormat::detect(Path::new(name)).unwrap();
    /// assert_eq!(detect("ABCD.zip"), ArchiveFormat::Zip);
    /// assert_eq!(detect("ABCD.tgz"), ArchiveFormat::TarGz);
    /// assert_eq!(detect("ABCD.tar.zst"), ArchiveFormat::TarZst);
    /// assert_eq!(detect("ABCD"), ArchiveFormat::Zip);
    /// ```
    pub fn detect(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "gz" | "tgz" => Ok(Self::TarGz),
            "zst" | "tzst" => Ok(Self::TarZst),
            "7z" | "rar" | "cab" => Err(ExtractionError::UnsupportedFormat {
                path: path.display().to_string(),
            }),
            _ => Ok(Self::Zip),
        }
    }
}

/// Trait for unpacking archives, enabling test mocking.
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive` into `target`, creating `target`
    /// as needed.
    ///
    /// Returns the paths of the files written, in archive order. Output
    /// written before a failure is left in place.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Zip`] for malformed zip archives,
    /// [`ExtractionError::PathTraversal`] for entries that would escape
    /// `target`, and [`ExtractionError::Io`] on I/O failures.
    fn extract(&self, archive: &Path, target: &Path) -> Result<Vec<PathBuf>, ExtractionError>;
}

/// Extractor that picks the format from the archive's file name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExtractor;

impl ArchiveExtractor for DefaultExtractor {
    fn extract(&self, archive: &Path, target: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
        let format = ArchiveFormat::detect(archive)?;
        debug!("extracting {} as {format:?} into {}", archive.display(), target.display());
        create_dir_with_mode(target, TARGET_DIR_MODE)?;
        let file = File::open(archive)?;
        match format {
            ArchiveFormat::Zip => extract_zip(file, target),
            ArchiveFormat::TarGz => extract_tar(flate2::read::GzDecoder::new(file), target),
            ArchiveFormat::TarZst => extract_tar(zstd::Decoder::new(file)?, target),
        }
    }
}

fn extract_zip(file: File, target: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file)?;
    let mut written = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let entry_path = PathBuf::from(entry.name());
        validate_entry_path(&entry_path)?;
        let dest = target.join(&entry_path);
        if entry.is_dir() {
            let mode = entry.unix_mode().map_or(IMPLICIT_DIR_MODE, |mode| mode & 0o7777);
            create_dir_with_mode(&dest, mode)?;
        } else {
            write_entry(&mut entry, &dest)?;
            written.push(dest);
        }
    }
    Ok(written)
}

fn extract_tar(reader: impl Read, target: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut archive = tar::Archive::new(reader);
    let mut written = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        validate_entry_path(&entry_path)?;
        let dest = target.join(&entry_path);
        let kind = entry.header().entry_type();
        if kind.is_dir() {
            let mode = entry.header().mode()? & 0o7777;
            create_dir_with_mode(&dest, mode)?;
        } else if kind.is_file() {
            write_entry(&mut entry, &dest)?;
            written.push(dest);
        } else {
            debug!("skipping {kind:?} entry {}", entry_path.display());
        }
    }
    Ok(written)
}

fn write_entry(entry: &mut impl Read, dest: &Path) -> Result<(), ExtractionError> {
    if let Some(parent) = dest.parent() {
        create_dir_with_mode(parent, IMPLICIT_DIR_MODE)?;
    }
    let mut file = File::create(dest)?;
    io::copy(entry, &mut file)?;
    Ok(())
}

fn create_dir_with_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(path)
}

/// Validate that an entry path does not escape the target directory via
/// `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
