//! This crate resolves the raw stack-frame addresses in Apple-style crash
//! reports to symbol strings, and, if available, file name + line number
//! information, using the debug-symbol (dSYM) bundle matching the crashed
//! binary's build UUID.
//!
//! # Design constraints
//!
//! This crate operates under the following design constraints:
//!
//!  - Diffable output: a symbolicated report must line up with its input.
//!    Lines the parser does not recognize are preserved verbatim and in
//!    order; only recognized frame lines are rewritten.
//!  - "Best effort" basis: a symbol table that matches only some of the
//!    report's binary images still resolves the frames of those images. A
//!    UUID mismatch on one image never fails the whole report.
//!  - Determinism: identical inputs produce byte-identical output, so
//!    results can be cached and compared.
//!  - No async runtime: all functions here are synchronous. Background
//!    scheduling, caching and cancellation live one layer up, in
//!    `crashsym-manager`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crashsym_symbols::{
//!     symbolicate, CrashReport, SingleTableProvider, SymbolTable,
//! };
//! use crashsym_symbols::uuid::Uuid;
//!
//! # fn run() -> Result<(), crashsym_symbols::Error> {
//! let text = std::fs::read_to_string("MyApp.crash")
//!     .map_err(|e| crashsym_symbols::Error::FileReadError("MyApp.crash".into(), e))?;
//! let report = CrashReport::parse(&text)?;
//!
//! let table = SymbolTable::new(
//!     report.primary_image().uuid,
//!     Some("arm64".to_string()),
//!     vec![(0x0, "main".to_string())],
//! );
//! let outcome = symbolicate(&report, &SingleTableProvider(Arc::new(table)));
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod demangle;
mod dsym;
mod error;
mod report;
mod symbolicate;
mod table;

pub use dsym::{dwarf_image_in_bundle, uuids_in_file, DsymBundle, ImageUuid};
pub use error::Error;
pub use report::{BinaryImage, CrashReport, Frame, ReportLine};
pub use symbolicate::{symbolicate, SingleTableProvider, SymbolProvider, SymbolicationOutcome};
pub use table::{ResolvedSymbol, SourceLocation, SymbolTable};

/// Re-export of the `object` crate, so that callers inspecting Mach-O files
/// themselves use the same version.
pub use object;

/// Re-export of the `uuid` crate.
pub use uuid;
