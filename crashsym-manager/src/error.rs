use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Symbols(#[from] crashsym_symbols::Error),

    #[error("Could not read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("The background task was aborted before it completed")]
    TaskAborted,

    #[error("No crash report is loaded")]
    NoCrashReport,

    #[error("No dSYM bundle has been accepted for the current crash report")]
    NoDsym,
}

impl Error {
    pub fn enum_as_string(&self) -> &'static str {
        match self {
            Error::Symbols(_) => "Symbols",
            Error::Io(_, _) => "Io",
            Error::TaskAborted => "TaskAborted",
            Error::NoCrashReport => "NoCrashReport",
            Error::NoDsym => "NoDsym",
        }
    }
}
