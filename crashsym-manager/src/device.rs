//! Access to crash files copied off a device.
//!
//! The transport that materializes the device's crash-report directory is
//! out of scope; this module only defines the capability the rest of the
//! toolkit needs, plus an implementation over a local directory (a mount
//! point, or files pulled by an external tool). Device files are treated
//! identically to local ones once read.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::Error;

/// One crash file in the device's crash-report directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashFileEntry {
    /// File name, e.g. `MyApp-2024-01-02-030405.ips`.
    pub name: String,
    /// Path relative to the crash-report directory, e.g.
    /// `Retired/MyApp-2024-01-02-030405.ips`.
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Narrow capability interface for reading a device's crash files. Test
/// doubles substitute fixture directories.
pub trait DeviceFileAccess: Send + Sync {
    /// Lists crash files, newest first, optionally filtered to the files of
    /// one process. Directories and dot entries are excluded; the `Retired`
    /// subdirectory is included.
    fn list_crash_files(&self, process: Option<&str>) -> Result<Vec<CrashFileEntry>, Error>;

    /// Reads one listed file, addressed by its relative path.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, Error>;
}

/// [`DeviceFileAccess`] over a locally visible crash-report directory.
pub struct DirDeviceFileAccess {
    root: PathBuf,
}

impl DirDeviceFileAccess {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirDeviceFileAccess { root: root.into() }
    }

    fn list_dir(
        &self,
        subdir: Option<&str>,
        process: Option<&str>,
        out: &mut Vec<CrashFileEntry>,
    ) -> Result<(), Error> {
        let dir = match subdir {
            Some(subdir) => self.root.join(subdir),
            None => self.root.clone(),
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            // A device without retired crash files has no `Retired` dir.
            Err(_) if subdir.is_some() => return Ok(()),
            Err(err) => return Err(Error::Io(dir, err)),
        };
        for entry in entries.flatten() {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if metadata.is_dir() {
                continue;
            }
            if let Some(process) = process {
                if !matches_process(&name, process) {
                    continue;
                }
            }
            let path = match subdir {
                Some(subdir) => Path::new(subdir).join(&name),
                None => PathBuf::from(&name),
            };
            out.push(CrashFileEntry {
                path,
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                name,
            });
        }
        Ok(())
    }
}

impl DeviceFileAccess for DirDeviceFileAccess {
    fn list_crash_files(&self, process: Option<&str>) -> Result<Vec<CrashFileEntry>, Error> {
        let mut entries = Vec::new();
        self.list_dir(None, process, &mut entries)?;
        self.list_dir(Some("Retired"), process, &mut entries)?;
        entries.sort_by(listing_order);
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, Error> {
        let full_path = self.root.join(path);
        fs::read(&full_path).map_err(|err| Error::Io(full_path, err))
    }
}

/// Listings are newest first; ties sort by name for a stable order.
pub fn listing_order(a: &CrashFileEntry, b: &CrashFileEntry) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| a.name.cmp(&b.name))
}

/// Whether `name` is a crash file of `process`, i.e. starts with
/// `process-YYYY-MM-DD-HHMMSS`.
fn matches_process(name: &str, process: &str) -> bool {
    let rest = match name
        .strip_prefix(process)
        .and_then(|rest| rest.strip_prefix('-'))
    {
        Some(rest) => rest.as_bytes(),
        None => return false,
    };
    const DATE_STAMP: &[usize] = &[4, 2, 2, 6];
    let mut pos = 0;
    for (i, &run) in DATE_STAMP.iter().enumerate() {
        if i > 0 {
            if rest.get(pos) != Some(&b'-') {
                return false;
            }
            pos += 1;
        }
        match rest.get(pos..pos + run) {
            Some(digits) if digits.iter().all(u8::is_ascii_digit) => pos += run,
            _ => return false,
        }
    }
    true
}
