//! This module contains everything needed for parsing the CLI arguments for weave.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Struct containing the CLI configuration for weave.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The path to the source file to compile. May also be given positionally.
    #[arg(index = 1, long = "input")]
    pub input: Option<PathBuf>,

    /// The path to the output file. Defaults to `a.out`.
    #[arg(short, long, default_value = "a.out")]
    pub output: PathBuf,

    /// Emit LLVM IR text instead of assembling or linking.
    #[arg(short = 'S', long = "emit-llvm")]
    pub emit_llvm: bool,

    /// Emit an object file instead of a linked executable.
    #[arg(short = 'c')]
    pub object_only: bool,

    /// Enable backend optimization.
    #[arg(short = 'O', long = "optimize", alias = "O2")]
    pub optimize: bool,

    /// Request a static link.
    #[arg(long = "static")]
    pub static_link: bool,

    /// Path to the C runtime library to link against.
    #[arg(long, env = "WEAVE_RUNTIME")]
    pub runtime: Option<PathBuf>,

    /// Adds a directory to search for `(include "...")` targets. Repeatable;
    /// first match wins.
    #[arg(short = 'I')]
    pub include_dirs: Vec<PathBuf>,

    /// Switches to test-generation mode: compiles a synthetic `main` that
    /// runs the selected tests instead of the program's own `entry`.
    #[arg(long = "run-tests")]
    pub run_tests: bool,

    /// Restricts test-mode to tests with this name. Repeatable.
    #[arg(long = "test")]
    pub test_names: Vec<String>,

    /// Restricts test-mode to tests carrying this tag. Repeatable.
    #[arg(long = "tag")]
    pub test_tags: Vec<String>,

    /// Prints the names of every eligible test and exits, without compiling.
    #[arg(long = "list-tests")]
    pub list_tests: bool,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,
}

impl Cli {
    pub fn init() -> Self {
        Cli::parse()
    }
}

/// Enum for specifying the log level of weave.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    /// The default log level. Only critical errors will be logged.
    #[default]
    #[value(alias("0"))]
    Error,

    /// A log level where warnings (like an `addr-of` type mismatch) are logged too.
    #[value(alias("1"))]
    Warn,

    /// Also log information about the general state of the compiler, e.g. which
    /// files are included, which backend commands are run, etc.
    #[value(alias("2"))]
    Info,

    /// Log everything which happens internally in the compiler.
    #[value(alias("3"))]
    Debug,

    /// Log extra information, down to individual emitted IR lines.
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}
