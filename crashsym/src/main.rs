mod cli;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use crashsym_manager::{
    DeviceFileAccess, DirDeviceFileAccess, DsymSearch, DsymSearchEvent, SearchOutcome, Session,
    SessionConfig,
};

use cli::{Action, DeviceAction, DeviceListArgs, DevicePullArgs, FindDsymArgs, Opt, SymbolicateArgs};

fn main() {
    env_logger::init();
    let opt = Opt::parse();
    match opt.action {
        Action::Symbolicate(args) => run_symbolicate(args),
        Action::FindDsym(args) => run_find_dsym(args),
        Action::Device(DeviceAction::List(args)) => run_device_list(args),
        Action::Device(DeviceAction::Pull(args)) => run_device_pull(args),
    }
}

#[tokio::main]
async fn run_symbolicate(args: SymbolicateArgs) {
    let text = match std::fs::read_to_string(&args.crash) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("Could not read crash file {:?}: {}", args.crash, err);
            std::process::exit(1)
        }
    };

    let mut config = SessionConfig::new();
    let crash_dir = if args.dsym.is_none() {
        for root in &args.search_root {
            config = config.search_root(root.clone());
        }
        args.crash.parent().map(Path::to_path_buf)
    } else {
        None
    };

    let mut session = Session::new(config);
    let generation = match session.load_crash_text(&text, crash_dir) {
        Ok(generation) => generation,
        Err(err) => {
            eprintln!("Could not parse crash file {:?}: {}", args.crash, err);
            std::process::exit(1)
        }
    };

    log::debug!("crash report loaded as generation {generation}");
    if let Some(dsym) = &args.dsym {
        if let Err(err) = session.set_dsym(dsym) {
            eprintln!("Could not open dSYM {dsym:?}: {err}");
            std::process::exit(1)
        }
    } else {
        wait_for_dsym(&mut session).await;
    }

    let outcome = match session.symbolicate().await {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("Symbolication failed: {err}");
            std::process::exit(1)
        }
    };
    for warning in &outcome.warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "resolved {} frames, {} unresolved",
        outcome.resolved_count,
        outcome.unresolved_count
    );

    match output_path(&args) {
        Some(path) => {
            if let Err(err) = write_text(&path, &outcome.text) {
                eprintln!("Could not write {path:?}: {err}");
                std::process::exit(1)
            }
            eprintln!("Saved symbolicated report to {}", path.display());
        }
        None => print!("{}", outcome.text),
    }
}

/// Accepts the first dSYM candidate the session's search delivers, or exits
/// when the search ends without one.
async fn wait_for_dsym(session: &mut Session) {
    loop {
        match session.next_search_event().await {
            Some((event_generation, DsymSearchEvent::Candidate(path))) => {
                log::info!("found dSYM at {}", path.display());
                match session.accept_dsym(event_generation, &path) {
                    Ok(true) => return,
                    Ok(false) => continue,
                    Err(err) => {
                        log::warn!("could not open found dSYM {}: {}", path.display(), err);
                        continue;
                    }
                }
            }
            Some((_, DsymSearchEvent::Done(SearchOutcome::Failed(message)))) => {
                eprintln!("dSYM search failed: {message}");
                std::process::exit(1)
            }
            Some((_, DsymSearchEvent::Done(_))) | None => {
                eprintln!("No matching dSYM found; pass one with --dsym.");
                std::process::exit(1)
            }
        }
    }
}

fn output_path(args: &SymbolicateArgs) -> Option<PathBuf> {
    match &args.output {
        None => None,
        Some(Some(path)) => Some(path.clone()),
        Some(None) => {
            let stem = args
                .crash
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "crash".to_string());
            let file_name = format!("{stem}-symbolicated.crash");
            Some(match args.crash.parent() {
                Some(parent) => parent.join(file_name),
                None => PathBuf::from(file_name),
            })
        }
    }
}

fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(text.as_bytes())?;
    writer.flush()
}

#[tokio::main]
async fn run_find_dsym(args: FindDsymArgs) {
    let mut handle = DsymSearch::spawn(args.uuid, args.root);
    let mut found = false;
    while let Some(event) = handle.next_event().await {
        match event {
            DsymSearchEvent::Candidate(path) => {
                found = true;
                println!("{}", path.display());
            }
            DsymSearchEvent::Done(SearchOutcome::Failed(message)) => {
                eprintln!("Search failed: {message}");
                std::process::exit(1)
            }
            DsymSearchEvent::Done(_) => {}
        }
    }
    if !found {
        std::process::exit(1)
    }
}

fn run_device_list(args: DeviceListArgs) {
    let access = DirDeviceFileAccess::new(&args.mount);
    let entries = match access.list_crash_files(args.process.as_deref()) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("Could not list crash files: {err}");
            std::process::exit(1)
        }
    };
    if entries.is_empty() {
        eprintln!("No crash files found.");
        return;
    }
    for entry in entries {
        println!(
            "{:>10}  {}  {}",
            entry.size,
            humantime::format_rfc3339_seconds(entry.modified),
            entry.path.display()
        );
    }
}

fn run_device_pull(args: DevicePullArgs) {
    let access = DirDeviceFileAccess::new(&args.mount);
    let data = match access.read_file(Path::new(&args.name)) {
        Ok(data) => data,
        Err(err) => {
            eprintln!("Could not read crash file {}: {}", args.name, err);
            std::process::exit(1)
        }
    };
    let output = args.output.clone().unwrap_or_else(|| {
        Path::new(&args.name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("crash.ips"))
    });
    if let Err(err) = std::fs::write(&output, &data) {
        eprintln!("Could not write {output:?}: {err}");
        std::process::exit(1)
    }
    eprintln!("Saved {} ({} bytes)", output.display(), data.len());
}
