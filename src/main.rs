//! zpipe - compress or decompress stdin to stdout
//!
//! Exits with 0 on success, 1 on a usage error, and otherwise with the
//! pump's result code (zlib numbering, reported modulo 256).

use clap::Parser;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;
use zpipe::{Arena, Pump, PumpReport, Quality, ResultCode, Sandbox};

const USAGE: &str = "zpipe usage: zpipe [-q [1-9]] [-d] < source > dest";

/// Compress or decompress stdin to stdout with zlib
#[derive(Parser)]
#[command(name = "zpipe", disable_version_flag = true)]
struct Cli {
    /// Decompress instead of compress
    #[arg(short = 'd')]
    decompress: bool,

    /// Compression quality, 1 (fastest) to 9 (smallest)
    #[arg(
        short = 'q',
        value_name = "N",
        default_value_t = 9,
        value_parser = clap::value_parser!(u32).range(1..=9)
    )]
    quality: u32,

    /// Log pump progress to stderr
    #[arg(short = 'v')]
    verbose: bool,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => usage(Some(&e)),
    };
    let quality = match Quality::new(cli.quality) {
        Ok(q) => q,
        Err(_) => usage(None),
    };

    init_tracing(cli.verbose);

    // The arena is sized once, before the sandbox closes off allocation syscalls.
    let arena = Arena::default();
    let result = run(&cli, quality, &arena, sandbox());

    if let Err(e) = &result {
        eprintln!("zpipe: {}", e);
    }
    process::exit(ResultCode::from(&result).code());
}

fn run(cli: &Cli, quality: Quality, arena: &Arena, sandbox: &dyn Sandbox) -> zpipe::Result<PumpReport> {
    let pump = if cli.decompress {
        Pump::decompress(arena)
    } else {
        Pump::compress(quality, arena)
    };
    pump.with_sandbox(sandbox)
        .run(io::stdin().lock(), io::stdout().lock())
}

fn usage(err: Option<&clap::Error>) -> ! {
    if let Some(e) = err {
        eprint!("{}", e);
    }
    eprintln!("{}", USAGE);
    process::exit(1);
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "zpipe=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("ZPIPE_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[cfg(all(
    feature = "seccomp",
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
fn sandbox() -> &'static dyn Sandbox {
    &zpipe::SyscallFilter
}

#[cfg(not(all(
    feature = "seccomp",
    target_os = "linux",
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
fn sandbox() -> &'static dyn Sandbox {
    &zpipe::Unconfined
}
