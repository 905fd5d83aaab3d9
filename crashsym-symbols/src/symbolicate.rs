//! The resolution engine: turns a parsed crash report plus loaded symbol
//! tables back into annotated text.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::Error;
use crate::report::{CrashReport, ReportLine};
use crate::table::SymbolTable;

/// The capability the engine needs from its caller: symbol tables by build
/// UUID. Stores implement this; tests substitute fixture providers.
pub trait SymbolProvider {
    fn table_for_uuid(&self, uuid: Uuid) -> Option<Arc<SymbolTable>>;
}

/// A provider holding a single table, for the one-crash-one-dSYM workflow.
pub struct SingleTableProvider(pub Arc<SymbolTable>);

impl SymbolProvider for SingleTableProvider {
    fn table_for_uuid(&self, uuid: Uuid) -> Option<Arc<SymbolTable>> {
        (self.0.uuid() == uuid).then(|| self.0.clone())
    }
}

/// The annotated output plus bookkeeping about what could not be resolved.
#[derive(Debug)]
pub struct SymbolicationOutcome {
    pub text: String,
    pub resolved_count: usize,
    pub unresolved_count: usize,
    /// Non-fatal per-image failures, one [`Error::UnmatchedImage`] for each
    /// image that had frames but no matching symbol table.
    pub warnings: Vec<Error>,
}

/// Resolves every frame of `report` against `provider`.
///
/// Frames of images the provider has no table for render as `<unknown>`;
/// frames of other images still resolve (partial success, never
/// all-or-nothing). Output preserves the input's line order, and identical
/// inputs produce byte-identical output.
pub fn symbolicate(report: &CrashReport, provider: &dyn SymbolProvider) -> SymbolicationOutcome {
    // One provider lookup per image, not per frame.
    let mut tables: HashMap<&str, Option<Arc<SymbolTable>>> = HashMap::new();
    for image in report.images() {
        tables.insert(image.name.as_str(), provider.table_for_uuid(image.uuid));
    }

    let mut text = String::new();
    let mut resolved_count = 0;
    let mut unresolved_count = 0;
    let mut images_with_missing_symbols: Vec<&str> = Vec::new();

    for line in report.lines() {
        match line {
            ReportLine::Context(context) => text.push_str(context),
            ReportLine::Frame(frame) => {
                text.push_str(&frame.line_prefix);
                match report.image_for_frame(frame) {
                    Some(image) => {
                        let offset = frame.address.wrapping_sub(image.load_address);
                        let table = tables.get(image.name.as_str()).and_then(Option::as_ref);
                        match table.and_then(|table| table.lookup(offset)) {
                            Some(resolved) => {
                                resolved_count += 1;
                                let _ = write!(
                                    text,
                                    "{} + 0x{:x}",
                                    resolved.name, resolved.offset_from_symbol
                                );
                                if let Some(source) = resolved.source {
                                    let _ = write!(text, " ({}:{})", source.file, source.line);
                                }
                            }
                            None => {
                                unresolved_count += 1;
                                if table.is_none()
                                    && !images_with_missing_symbols.contains(&image.name.as_str())
                                {
                                    images_with_missing_symbols.push(&image.name);
                                }
                                let _ = write!(text, "<unknown> + 0x{offset:x}");
                            }
                        }
                    }
                    None => {
                        // No image record to compute an in-binary offset
                        // against.
                        unresolved_count += 1;
                        text.push_str("<unknown>");
                    }
                }
            }
        }
        text.push('\n');
    }

    if !report.ends_with_newline() {
        text.pop();
    }

    let warnings = images_with_missing_symbols
        .into_iter()
        .map(|name| {
            let uuid = report
                .images()
                .iter()
                .find(|image| image.name == name)
                .map(|image| image.uuid)
                .unwrap_or_else(Uuid::nil);
            Error::UnmatchedImage(name.to_string(), uuid)
        })
        .collect();

    SymbolicationOutcome {
        text,
        resolved_count,
        unresolved_count,
        warnings,
    }
}
