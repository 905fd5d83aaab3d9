//! Explicit session state for the crash-file workflow: load a report, search
//! for its dSYM, accept a match, symbolicate.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crashsym_symbols::{CrashReport, DsymBundle, SymbolicationOutcome};

use crate::error::Error;
use crate::locator::{DsymSearch, DsymSearchEvent, DsymSearchHandle};
use crate::store::SymbolStore;

/// Key-value persistence boundary for session settings. The GUI-less default
/// is [`MemoryPrefs`]; embedders plug in their own backing store.
pub trait SessionPrefs: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// The bundle identifier of the app whose crash files were listed last.
pub const LAST_SELECTED_APP_PREF: &str = "last.selected.app";

#[derive(Default)]
pub struct MemoryPrefs(Mutex<HashMap<String, String>>);

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionPrefs for MemoryPrefs {
    fn get(&self, key: &str) -> Option<String> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.0.lock().unwrap().insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub(crate) search_roots: Vec<PathBuf>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to search for dSYM bundles, in addition to the
    /// directory of the crash file itself.
    pub fn search_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_roots.push(path.into());
        self
    }
}

/// Owns the current crash report, the symbol-table cache and the in-flight
/// dSYM search.
///
/// Loading a new crash report bumps the session generation, cancels the
/// previous search and discards the cache's working set. Search results are
/// tagged with the generation that produced them, and
/// [`accept_dsym`](Session::accept_dsym) rejects stale tags, so a result
/// from an old search can never overwrite a newer selection.
pub struct Session {
    config: SessionConfig,
    prefs: Box<dyn SessionPrefs>,
    store: SymbolStore,
    generation: u64,
    report: Option<CrashReport>,
    dsym: Option<DsymBundle>,
    search: Option<(u64, DsymSearchHandle)>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_prefs(config, Box::new(MemoryPrefs::new()))
    }

    pub fn with_prefs(config: SessionConfig, prefs: Box<dyn SessionPrefs>) -> Self {
        Session {
            config,
            prefs,
            store: SymbolStore::new(),
            generation: 0,
            report: None,
            dsym: None,
            search: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn report(&self) -> Option<&CrashReport> {
        self.report.as_ref()
    }

    pub fn dsym(&self) -> Option<&DsymBundle> {
        self.dsym.as_ref()
    }

    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn prefs(&self) -> &dyn SessionPrefs {
        self.prefs.as_ref()
    }

    /// Parses `text` and installs it as the current crash report. See
    /// [`set_crash_report`](Session::set_crash_report).
    pub fn load_crash_text(
        &mut self,
        text: &str,
        crash_dir: Option<PathBuf>,
    ) -> Result<u64, Error> {
        let report = CrashReport::parse(text)?;
        Ok(self.set_crash_report(report, crash_dir))
    }

    /// Installs a new crash report and starts the dSYM search for its
    /// primary image. Cancels any search still running for the previous
    /// report and clears the symbol-table working set. Returns the new
    /// generation.
    pub fn set_crash_report(&mut self, report: CrashReport, crash_dir: Option<PathBuf>) -> u64 {
        self.generation += 1;
        if let Some((_, search)) = self.search.take() {
            search.cancel();
        }
        self.store.clear();
        self.dsym = None;

        let uuid = report.primary_image().uuid;
        let mut roots = Vec::new();
        if let Some(dir) = crash_dir {
            roots.push(dir);
        }
        roots.extend(self.config.search_roots.iter().cloned());
        if !roots.is_empty() {
            log::info!("searching for dSYM with UUID {uuid}");
            self.search = Some((self.generation, DsymSearch::spawn(uuid, roots)));
        }
        self.report = Some(report);
        self.generation
    }

    /// The next event from the current search, tagged with its generation.
    /// `None` when no search is running or the stream has ended.
    pub async fn next_search_event(&mut self) -> Option<(u64, DsymSearchEvent)> {
        let (generation, search) = self.search.as_mut()?;
        let generation = *generation;
        let event = search.next_event().await?;
        Some((generation, event))
    }

    /// Accepts a found dSYM for the given generation. Returns `Ok(false)`
    /// and changes nothing if `generation` is stale. On success the running
    /// search is stopped.
    pub fn accept_dsym(&mut self, generation: u64, path: &Path) -> Result<bool, Error> {
        if generation != self.generation {
            log::info!(
                "ignoring stale dSYM result {} for generation {generation} (current: {})",
                path.display(),
                self.generation
            );
            return Ok(false);
        }
        let bundle = DsymBundle::open(path).map_err(Error::Symbols)?;
        if let Some((_, search)) = self.search.take() {
            search.cancel();
        }
        self.dsym = Some(bundle);
        Ok(true)
    }

    /// Accepts a dSYM the user supplied directly, outside any search.
    pub fn set_dsym(&mut self, path: &Path) -> Result<(), Error> {
        self.accept_dsym(self.generation, path).map(|_| ())
    }

    /// Loads symbol tables for every report image covered by the accepted
    /// dSYM, then resolves the report. Images the bundle does not cover stay
    /// unresolved and are reported in the outcome's warnings.
    pub async fn symbolicate(&self) -> Result<SymbolicationOutcome, Error> {
        let report = self.report.as_ref().ok_or(Error::NoCrashReport)?;
        let dsym = self.dsym.as_ref().ok_or(Error::NoDsym)?;

        let probe = dsym.clone();
        let available = tokio::task::spawn_blocking(move || probe.uuids())
            .await
            .map_err(|_| Error::TaskAborted)??;

        for image in report.images() {
            if available.iter().any(|found| found.uuid == image.uuid) {
                self.store.get_or_load(image.uuid, dsym).await?;
            }
        }
        Ok(crashsym_symbols::symbolicate(report, &self.store))
    }

    pub fn remember_selected_app(&self, bundle_id: &str) {
        self.prefs.set(LAST_SELECTED_APP_PREF, bundle_id);
    }

    pub fn last_selected_app(&self) -> Option<String> {
        self.prefs.get(LAST_SELECTED_APP_PREF)
    }
}
