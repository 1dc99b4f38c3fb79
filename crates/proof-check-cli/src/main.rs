//! `proof-check` - check one candidate proof from the command line.
//!
//! ```bash
//! proof-check <workspace> <relative-file> <theorem-name> [proof-file]
//! ```
//!
//! The candidate is everything that replaces the theorem body after its signature, for example
//! ` := by simp`. It is read from `proof-file`, or from stdin when no file is given. The verdict
//! is printed to stdout as JSON.
//!
//! Exit status is 0 when the proof succeeds, 1 when the checker rejects it and 2 when the check
//! could not be run. `PROOF_CHECK_LAKE` and `PROOF_CHECK_LEAN` override the checker executables,
//! and `RUST_LOG` controls log output on stderr.

use proof_check_harness::{HarnessOptions, ProofHarness, Verdict};
use proof_check_lsp::ClientOptions;
use simple_logger::SimpleLogger;
use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

struct Args {
    workspace: PathBuf,
    rel_file: PathBuf,
    theorem: String,
    proof_file: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let mut args = env::args_os().skip(1);
    let workspace = PathBuf::from(args.next()?);
    let rel_file = PathBuf::from(args.next()?);
    let theorem = args.next()?.into_string().ok()?;
    let proof_file = args.next().map(PathBuf::from);
    if args.next().is_some() {
        return None;
    }
    Some(Args {
        workspace,
        rel_file,
        theorem,
        proof_file,
    })
}

fn read_candidate(proof_file: Option<&PathBuf>) -> io::Result<String> {
    match proof_file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut candidate = String::new();
            io::stdin().read_to_string(&mut candidate)?;
            Ok(candidate)
        }
    }
}

fn run(args: Args) -> Result<Verdict, Box<dyn Error>> {
    let candidate = read_candidate(args.proof_file.as_ref())?;
    let options = HarnessOptions {
        client: ClientOptions::default().with_env_overrides(),
        ..HarnessOptions::default()
    };

    let mut harness = ProofHarness::start(&args.workspace, &args.rel_file, &args.theorem, options)?;
    log::info!("checking `{}`", harness.full_theorem_signature());
    let verdict = harness.check_proof(&candidate);
    harness.close();
    Ok(verdict?)
}

fn main() {
    if let Err(err) = SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
    {
        eprintln!("cannot install logger: {err}");
    }

    let Some(args) = parse_args() else {
        let program = env::args().next().unwrap_or_else(|| "proof-check".to_string());
        eprintln!("usage: {program} <workspace> <relative-file> <theorem-name> [proof-file]");
        process::exit(2);
    };

    match run(args) {
        Ok(verdict) => {
            match serde_json::to_string_pretty(&verdict) {
                Ok(json) => println!("{json}"),
                Err(err) => {
                    eprintln!("error: {err}");
                    process::exit(2);
                }
            }
            process::exit(if verdict.is_success() { 0 } else { 1 });
        }
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    }
}
