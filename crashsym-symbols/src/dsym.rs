//! Reading debug-symbol bundles (dSYM directories and bare Mach-O files).

use std::fs;
use std::path::{Path, PathBuf};

use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::read::FileKind;
use object::{Architecture, File, Object};
use uuid::Uuid;

use crate::error::Error;
use crate::table::SymbolTable;

/// A build UUID found in a symbol file, with the architecture it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUuid {
    pub uuid: Uuid,
    pub arch: Option<String>,
}

/// A debug-symbol bundle on disk.
///
/// Either a `.dSYM` directory tree, whose single machine-code image lives
/// under `Contents/Resources/DWARF/`, or a bare Mach-O file.
#[derive(Debug, Clone)]
pub struct DsymBundle {
    bundle_path: PathBuf,
    dwarf_path: PathBuf,
}

impl DsymBundle {
    pub fn open(path: &Path) -> Result<DsymBundle, Error> {
        let metadata =
            fs::metadata(path).map_err(|_| Error::NotADsymBundle(path.to_owned()))?;
        let dwarf_path = if metadata.is_dir() {
            dwarf_image_in_bundle(path)?
        } else {
            path.to_owned()
        };
        Ok(DsymBundle {
            bundle_path: path.to_owned(),
            dwarf_path,
        })
    }

    pub fn bundle_path(&self) -> &Path {
        &self.bundle_path
    }

    pub fn dwarf_path(&self) -> &Path {
        &self.dwarf_path
    }

    /// The build UUIDs embedded in this bundle's image, one per architecture
    /// for fat binaries. Reads load commands only; no symbol table is built.
    pub fn uuids(&self) -> Result<Vec<ImageUuid>, Error> {
        uuids_in_file(&self.dwarf_path)
    }

    pub fn contains_uuid(&self, uuid: Uuid) -> Result<bool, Error> {
        Ok(self.uuids()?.iter().any(|image| image.uuid == uuid))
    }

    /// Build the symbol table for the image matching `wanted`, or for the
    /// only image when `wanted` is `None`.
    ///
    /// Fails with [`Error::UnmatchedUuid`] (thin file) or
    /// [`Error::NoMatchMultiArch`] (fat file) when `wanted` matches no member.
    pub fn load_symbol_table(&self, wanted: Option<Uuid>) -> Result<SymbolTable, Error> {
        let mmap = mmap_file(&self.dwarf_path)?;
        let data = &mmap[..];

        for (start, size) in fat_member_ranges(data)?.unwrap_or_else(|| vec![(0, data.len() as u64)])
        {
            let member = member_data(data, start, size)?;
            let file = File::parse(member).map_err(Error::MachOHeaderParseError)?;
            let uuid = match file.mach_uuid().map_err(Error::MachOHeaderParseError)? {
                Some(bytes) => Uuid::from_bytes(bytes),
                None => continue,
            };
            if wanted.is_none() || wanted == Some(uuid) {
                let arch = arch_name(file.architecture()).map(str::to_string);
                return Ok(SymbolTable::from_object(&file, uuid, arch));
            }
        }

        let available = uuids_in_file(&self.dwarf_path)?;
        match (wanted, available.as_slice()) {
            (Some(wanted), [only]) => Err(Error::UnmatchedUuid(wanted, only.uuid)),
            (Some(_), _) => Err(Error::NoMatchMultiArch(
                available.into_iter().map(|image| image.uuid).collect(),
            )),
            (None, _) => Err(Error::MissingUuid(self.dwarf_path.clone())),
        }
    }
}

/// Locates the machine-code image inside a dSYM bundle directory.
///
/// There must be exactly one file in `Contents/Resources/DWARF`; anything
/// else disqualifies the bundle.
pub fn dwarf_image_in_bundle(bundle_path: &Path) -> Result<PathBuf, Error> {
    let dwarf_dir = bundle_path.join("Contents/Resources/DWARF");
    let mut dir_iter =
        fs::read_dir(&dwarf_dir).map_err(|_| Error::NotADsymBundle(bundle_path.to_owned()))?;

    let first = dir_iter
        .next()
        .ok_or_else(|| Error::NotADsymBundle(bundle_path.to_owned()))?
        .map_err(|e| Error::FileReadError(dwarf_dir.clone(), e))?;

    if dir_iter.next().is_some() {
        return Err(Error::AmbiguousDwarfDir(dwarf_dir));
    }

    Ok(first.path())
}

/// Extracts the build UUID(s) from a Mach-O or fat file by reading load
/// commands only.
pub fn uuids_in_file(path: &Path) -> Result<Vec<ImageUuid>, Error> {
    let mmap = mmap_file(path)?;
    let data = &mmap[..];

    let ranges =
        fat_member_ranges(data)?.unwrap_or_else(|| vec![(0, data.len() as u64)]);
    let mut uuids = Vec::with_capacity(ranges.len());
    for (start, size) in ranges {
        let member = member_data(data, start, size)?;
        let file = File::parse(member).map_err(Error::MachOHeaderParseError)?;
        if let Some(bytes) = file.mach_uuid().map_err(Error::MachOHeaderParseError)? {
            uuids.push(ImageUuid {
                uuid: Uuid::from_bytes(bytes),
                arch: arch_name(file.architecture()).map(str::to_string),
            });
        }
    }
    if uuids.is_empty() {
        return Err(Error::MissingUuid(path.to_owned()));
    }
    Ok(uuids)
}

fn mmap_file(path: &Path) -> Result<memmap2::Mmap, Error> {
    let file =
        fs::File::open(path).map_err(|e| Error::FileReadError(path.to_owned(), e))?;
    let mmap = unsafe { memmap2::Mmap::map(&file) }
        .map_err(|e| Error::FileReadError(path.to_owned(), e))?;
    Ok(mmap)
}

/// Returns the (offset, size) ranges of the members of a fat archive, or
/// `None` for thin files.
fn fat_member_ranges(data: &[u8]) -> Result<Option<Vec<(u64, u64)>>, Error> {
    match FileKind::parse(data).map_err(Error::MachOHeaderParseError)? {
        kind @ FileKind::MachOFat32 => {
            let fat_file =
                MachOFatFile32::parse(data).map_err(|e| Error::ObjectParseError(kind, e))?;
            Ok(Some(
                fat_file.arches().iter().map(|arch| arch.file_range()).collect(),
            ))
        }
        kind @ FileKind::MachOFat64 => {
            let fat_file =
                MachOFatFile64::parse(data).map_err(|e| Error::ObjectParseError(kind, e))?;
            Ok(Some(
                fat_file.arches().iter().map(|arch| arch.file_range()).collect(),
            ))
        }
        _ => Ok(None),
    }
}

fn member_data(data: &[u8], start: u64, size: u64) -> Result<&[u8], Error> {
    let start = usize::try_from(start).map_err(|_| Error::FatMemberOutOfBounds)?;
    let size = usize::try_from(size).map_err(|_| Error::FatMemberOutOfBounds)?;
    data.get(start..start.saturating_add(size))
        .ok_or(Error::FatMemberOutOfBounds)
}

fn arch_name(arch: Architecture) -> Option<&'static str> {
    match arch {
        Architecture::Aarch64 => Some("arm64"),
        Architecture::Arm => Some("armv7"),
        Architecture::X86_64 => Some("x86_64"),
        Architecture::I386 => Some("i386"),
        _ => None,
    }
}
