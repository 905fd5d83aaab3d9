/// Demangles a symbol name from a Mach-O symbol table.
///
/// Tries Rust mangling first, then Itanium C++. Plain C symbols get their
/// leading underscore stripped, which is how they appear in nlist entries.
pub fn demangle_any(name: &str) -> String {
    if let Ok(demangled_symbol) = rustc_demangle::try_demangle(name) {
        return format!("{demangled_symbol:#}");
    }

    if name.starts_with('_') {
        let options = cpp_demangle::DemangleOptions::default().no_return_type();
        if let Ok(symbol) = cpp_demangle::Symbol::new(name) {
            if let Ok(demangled_string) = symbol.demangle_with_options(&options) {
                return demangled_string;
            }
        }
    }

    if let Some(stripped) = name.strip_prefix('_') {
        return stripped.to_owned();
    }

    name.to_owned()
}
