//! Orchestration on top of `crashsym-symbols`: a per-UUID symbol-table
//! cache, a cancellable background search for dSYM bundles, the session
//! state machine that ties the crash-file workflow together, and access to
//! crash files pulled off a device.
//!
//! Everything here runs on a tokio runtime. Result delivery happens through
//! plain async channels, so callers decide which task (typically a UI
//! thread's dispatcher) consumes them. The core crate stays runtime-free;
//! this crate is where blocking filesystem work gets moved onto the
//! blocking pool and where cancellation tokens live.

mod device;
mod error;
mod locator;
mod session;
mod store;

pub use device::{listing_order, CrashFileEntry, DeviceFileAccess, DirDeviceFileAccess};
pub use error::Error;
pub use locator::{DsymSearch, DsymSearchEvent, DsymSearchHandle, SearchOutcome};
pub use session::{
    MemoryPrefs, Session, SessionConfig, SessionPrefs, LAST_SELECTED_APP_PREF,
};
pub use store::SymbolStore;

/// Re-export of the core crate.
pub use crashsym_symbols;
