//! Command-line front-end for the SQLCipher driver.
//!
//! Run with: `cipherbridge <command>`
//!
//! This is a CLI tool, so `println!` and `eprintln!` are used for
//! user-facing output; diagnostics go through `tracing` (set `RUST_LOG`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use cipherbridge_sqlcipher::{classify, driver, register_default, DRIVER_NAME};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    init_tracing();
    register_default();

    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str);

    let result = match command {
        Some("drivers") => run_drivers(),
        Some("detect") => run_detect(&args[1..]),
        Some("check") => run_check(&args[1..]),
        Some("help") | Some("--help") | Some("-h") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown command: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow!("Unknown command"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn print_help() {
    println!("cipherbridge");
    println!();
    println!("USAGE:");
    println!("    cipherbridge <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("    drivers           List registered driver names");
    println!("    detect <PATH>...  Classify database files (no-file, empty, plaintext, encrypted)");
    println!("    check <DSN>       Open a connection string and run the validation query");
    println!("    help              Show this help message");
}

/// List registered drivers
fn run_drivers() -> anyhow::Result<()> {
    for name in driver::drivers() {
        println!("{name}");
    }
    Ok(())
}

/// Classify each path, one line per file
fn run_detect(paths: &[String]) -> anyhow::Result<()> {
    if paths.is_empty() {
        anyhow::bail!("detect needs at least one path");
    }

    let mut failures = 0usize;
    for path in paths {
        match classify(path) {
            Ok(classification) => println!("{path}: {classification}"),
            Err(e) => {
                eprintln!("{path}: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} paths could not be classified", paths.len());
    }
    Ok(())
}

/// Open a connection string through the default driver
fn run_check(args: &[String]) -> anyhow::Result<()> {
    let [dsn] = args else {
        anyhow::bail!("check takes exactly one connection string");
    };

    let conn = driver::open(DRIVER_NAME, dsn).context("connection check failed")?;
    let tables: i64 = conn
        .query_row("SELECT count(*) FROM sqlite_master WHERE type = 'table'", [], |row| row.get(0))
        .context("failed to count tables")?;
    let state = if conn.is_encrypted() { "encrypted" } else { "plaintext" };
    println!("{}: ok ({state}, {tables} tables)", conn.path());

    conn.close().context("failed to close connection")?;
    Ok(())
}
