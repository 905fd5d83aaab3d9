use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crashsym_manager::crashsym_symbols::uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "crashsym",
    version,
    about = r#"
crashsym symbolicates Apple-style crash reports.
Give it a crash log and a matching dSYM bundle, and it resolves the raw
stack-frame addresses to function names.

EXAMPLES:
    # Symbolicate with a known dSYM:
    crashsym symbolicate -c MyApp.crash -d MyApp.app.dSYM

    # Let crashsym search for the dSYM next to the crash file:
    crashsym symbolicate -c MyApp.crash --search-root ~/Library/Developer/Xcode/Archives

    # Find every dSYM for a build UUID:
    crashsym find-dsym --uuid 8A5E7BF7-A619-4D7A-A85F-0A32F8F9EF3C ~/Library/Developer

    # Work with crash files copied off a device:
    crashsym device list --mount /Volumes/CrashReports --process MyApp
    crashsym device pull --mount /Volumes/CrashReports MyApp-2024-01-02-030405.ips
"#
)]
pub struct Opt {
    #[command(subcommand)]
    pub action: Action,
}

#[derive(Debug, Subcommand)]
pub enum Action {
    /// Symbolicate a crash report and print or save the annotated text.
    Symbolicate(SymbolicateArgs),

    /// Search directories for dSYM bundles matching a build UUID.
    FindDsym(FindDsymArgs),

    /// List or pull crash files from a mounted device crash directory.
    #[command(subcommand)]
    Device(DeviceAction),
}

#[derive(Debug, Args)]
pub struct SymbolicateArgs {
    /// Path to the crash report (.crash, .txt, .ips).
    #[arg(short, long)]
    pub crash: PathBuf,

    /// Path to the matching dSYM bundle or bare Mach-O symbol file. When
    /// omitted, the crash file's directory and the search roots are
    /// searched for a bundle with the right UUID.
    #[arg(short, long)]
    pub dsym: Option<PathBuf>,

    /// Additional directory to search for dSYM bundles (can be specified
    /// multiple times).
    #[arg(long)]
    pub search_root: Vec<PathBuf>,

    /// Write the annotated report to a file instead of stdout. Without a
    /// value, writes to `<crash-stem>-symbolicated.crash` next to the input.
    #[arg(short, long, num_args = 0..=1)]
    pub output: Option<Option<PathBuf>>,
}

#[derive(Debug, Args)]
pub struct FindDsymArgs {
    /// The build UUID to look for, with or without hyphens.
    #[arg(long)]
    pub uuid: Uuid,

    /// Directories to search.
    #[arg(required = true)]
    pub root: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum DeviceAction {
    /// List crash files, newest first.
    List(DeviceListArgs),

    /// Copy one crash file to the local disk.
    Pull(DevicePullArgs),
}

#[derive(Debug, Args)]
pub struct DeviceListArgs {
    /// The device's crash-report directory, as locally mounted or copied.
    #[arg(long)]
    pub mount: PathBuf,

    /// Only list crash files of this process.
    #[arg(long)]
    pub process: Option<String>,
}

#[derive(Debug, Args)]
pub struct DevicePullArgs {
    /// The device's crash-report directory, as locally mounted or copied.
    #[arg(long)]
    pub mount: PathBuf,

    /// Name (or `Retired/`-relative path) of the crash file to pull.
    pub name: String,

    /// Output filename. Defaults to the crash file's own name.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
