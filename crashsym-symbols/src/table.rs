//! Symbol tables with nearest-preceding-address lookup.

use object::{Object, ObjectSegment, ObjectSymbol, SymbolKind};
use uuid::Uuid;

use crate::demangle;

/// Source file and line for a symbol, when the symbol data carries it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
struct TableEntry {
    offset: u64,
    name: String,
    source: Option<SourceLocation>,
}

/// The result of looking up an address in a [`SymbolTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol<'a> {
    pub name: &'a str,
    /// Distance from the symbol's start address to the looked-up address.
    pub offset_from_symbol: u64,
    pub source: Option<&'a SourceLocation>,
}

/// An immutable address-to-name index for one binary image.
///
/// Entries are keyed by image-relative offsets (relative to the image's load
/// address, i.e. to the `__TEXT` segment's vmaddr for Mach-O images). Lookup
/// uses nearest-preceding-symbol semantics: addresses commonly fall in the
/// middle of a function, so the entry with the greatest start offset that is
/// less than or equal to the queried offset wins.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    uuid: Uuid,
    arch: Option<String>,
    entries: Vec<TableEntry>,
}

impl SymbolTable {
    /// Build a table from explicit `(offset, name)` pairs. The input does not
    /// have to be sorted; duplicate offsets keep the first name given.
    pub fn new(uuid: Uuid, arch: Option<String>, symbols: Vec<(u64, String)>) -> Self {
        Self::with_source_info(
            uuid,
            arch,
            symbols
                .into_iter()
                .map(|(offset, name)| (offset, name, None))
                .collect(),
        )
    }

    pub fn with_source_info(
        uuid: Uuid,
        arch: Option<String>,
        symbols: Vec<(u64, String, Option<SourceLocation>)>,
    ) -> Self {
        let mut entries: Vec<TableEntry> = symbols
            .into_iter()
            .map(|(offset, name, source)| TableEntry {
                offset,
                name,
                source,
            })
            .collect();
        entries.sort_by(|a, b| a.offset.cmp(&b.offset));
        entries.dedup_by(|b, a| a.offset == b.offset);
        SymbolTable {
            uuid,
            arch,
            entries,
        }
    }

    /// Build a table from a parsed Mach-O object, typically the DWARF image
    /// inside a dSYM bundle. Symbol addresses are rebased to the `__TEXT`
    /// segment and names are demangled.
    pub fn from_object<'data>(
        object_file: &impl Object<'data>,
        uuid: Uuid,
        arch: Option<String>,
    ) -> Self {
        let base_address = text_segment_base(object_file);
        let mut symbols = Vec::new();
        for symbol in object_file.symbols() {
            if symbol.address() == 0 || !symbol.is_definition() {
                continue;
            }
            match symbol.kind() {
                SymbolKind::Text | SymbolKind::Unknown => {}
                SymbolKind::Label if symbol.size() != 0 => {}
                _ => continue,
            }
            let name = match symbol.name() {
                Ok(name) if !name.is_empty() => name,
                _ => continue,
            };
            let offset = match symbol.address().checked_sub(base_address) {
                Some(offset) => offset,
                None => continue,
            };
            symbols.push((offset, demangle::demangle_any(name), None));
        }
        Self::with_source_info(uuid, arch, symbols)
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn arch(&self) -> Option<&str> {
        self.arch.as_deref()
    }

    pub fn symbol_count(&self) -> usize {
        self.entries.len()
    }

    pub fn iter_symbols(&self) -> impl Iterator<Item = (u64, &str)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.offset, entry.name.as_str()))
    }

    /// Look up the nearest symbol at or preceding `offset`. Offsets below the
    /// first entry have no preceding symbol and resolve to `None`.
    pub fn lookup(&self, offset: u64) -> Option<ResolvedSymbol<'_>> {
        let index = self.entries.partition_point(|entry| entry.offset <= offset);
        let entry = &self.entries[index.checked_sub(1)?];
        Some(ResolvedSymbol {
            name: &entry.name,
            offset_from_symbol: offset - entry.offset,
            source: entry.source.as_ref(),
        })
    }
}

/// The base that image-relative offsets are relative to. For Mach-O this is
/// the vmaddr of the `__TEXT` segment.
fn text_segment_base<'data>(object_file: &impl Object<'data>) -> u64 {
    if let Some(text_segment) = object_file
        .segments()
        .find(|s| s.name() == Ok(Some("__TEXT")))
    {
        return text_segment.address();
    }
    object_file.relative_address_base()
}
