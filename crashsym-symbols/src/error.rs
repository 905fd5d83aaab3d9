use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("No binary image with a UUID was found in the crash report")]
    NoUuid,

    #[error("Unmatched UUID: expected {0}, but the symbol file has {1}")]
    UnmatchedUuid(Uuid, Uuid),

    #[error("No match in multi-arch symbol file, available UUIDs: {}", .0.iter().map(|u| u.to_string()).collect::<Vec<String>>().join(", "))]
    NoMatchMultiArch(Vec<Uuid>),

    #[error("No loaded symbol table matches image {0} with UUID {1}")]
    UnmatchedImage(String, Uuid),

    #[error("The symbol file at {0} contains no LC_UUID load command")]
    MissingUuid(PathBuf),

    #[error("The path {0} is neither a dSYM bundle nor a Mach-O file")]
    NotADsymBundle(PathBuf),

    #[error("Expected exactly one Mach-O file in {0}")]
    AmbiguousDwarfDir(PathBuf),

    #[error("Object could not parse the file as {0:?}: {1}")]
    ObjectParseError(object::read::FileKind, #[source] object::read::Error),

    #[error("Fat archive member range is out of bounds")]
    FatMemberOutOfBounds,

    #[error("MachOHeader parsing error: {0}")]
    MachOHeaderParseError(#[source] object::read::Error),

    #[error("Could not read {0}: {1}")]
    FileReadError(PathBuf, #[source] std::io::Error),
}

impl Error {
    pub fn enum_as_string(&self) -> &'static str {
        match self {
            Error::NoUuid => "NoUuid",
            Error::UnmatchedUuid(_, _) => "UnmatchedUuid",
            Error::NoMatchMultiArch(_) => "NoMatchMultiArch",
            Error::UnmatchedImage(_, _) => "UnmatchedImage",
            Error::MissingUuid(_) => "MissingUuid",
            Error::NotADsymBundle(_) => "NotADsymBundle",
            Error::AmbiguousDwarfDir(_) => "AmbiguousDwarfDir",
            Error::ObjectParseError(_, _) => "ObjectParseError",
            Error::FatMemberOutOfBounds => "FatMemberOutOfBounds",
            Error::MachOHeaderParseError(_) => "MachOHeaderParseError",
            Error::FileReadError(_, _) => "FileReadError",
        }
    }
}
