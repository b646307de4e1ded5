//! # weave
//!
//! This binary is the command-line front end for the weave bootstrap
//! compiler. It wires the CLI's flags onto `weave_core`'s include
//! resolution, compilation, and backend collaborator.
mod cli;

use std::{fs, path::PathBuf};

use anyhow::{anyhow, Context};
use cli::Cli;
use log::{error, info};
use weave_core::{
    backend::{Backend, OptLevel, ProcessBackend},
    CompileOptions, TestModeOptions,
};

fn main() {
    let args = Cli::init();
    simple_logger::init_with_level(args.verbosity.into()).unwrap();

    match run(args) {
        Ok(()) => std::process::exit(0),
        Err(Failure::Usage(message)) => {
            error!("{message}");
            std::process::exit(2);
        }
        Err(Failure::Internal(err)) => {
            error!("{err:#}");
            std::process::exit(1);
        }
    }
}

enum Failure {
    Usage(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::Internal(err)
    }
}

fn run(args: Cli) -> Result<(), Failure> {
    let input = args
        .input
        .clone()
        .ok_or_else(|| Failure::Usage("no input file given (pass a path or --input PATH)".to_string()))?;

    if args.list_tests {
        let options = TestModeOptions {
            names: args.test_names.clone(),
            tags: args.test_tags.clone(),
        };
        let names = weave_core::list_tests(&input, &args.include_dirs, &options)
            .map_err(|e| {
                e.report();
                anyhow!("failed to list tests")
            })?;
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let test_mode = args.run_tests.then(|| TestModeOptions {
        names: args.test_names.clone(),
        tags: args.test_tags.clone(),
    });

    let options = CompileOptions {
        include_dirs: args.include_dirs.clone(),
        test_mode,
    };

    info!("compiling '{}'", input.display());
    let module = weave_core::compile(&input, &options).map_err(|e| {
        e.report();
        anyhow!("compilation failed")
    })?;

    if args.emit_llvm {
        fs::write(&args.output, &module.ir)
            .with_context(|| format!("failed to write {}", args.output.display()))?;
        return Ok(());
    }

    let opt_level = if args.optimize { OptLevel::O2 } else { OptLevel::O0 };
    // An object-only build links nothing, so the runtime library (whether
    // from `--runtime` or `WEAVE_RUNTIME`, already folded in by clap) is
    // irrelevant to it.
    let runtime = if args.object_only { None } else { args.runtime.clone() };
    let backend = ProcessBackend::new(args.object_only, args.static_link, runtime);
    backend
        .assemble(&module.ir, &args.output, opt_level)
        .map_err(|e| anyhow!("{e}"))?;

    Ok(())
}
