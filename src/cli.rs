use clap::{App, Arg, ArgMatches};
use log::LevelFilter;
use simplelog::{Config, SimpleLogger};

use crate::compiler::{symtab::DumpDetail, FatalError};

// Exit Codes for different types of errors
pub const ERR_LOAD_ERROR: i32 = 1;
pub const ERR_TYPE_CHECK: i32 = 2;
pub const ERR_LIMIT_EXCEEDED: i32 = 3;
pub const ERR_INTERNAL_ERROR: i32 = 4;
pub const ERR_IO_ERROR: i32 = 5;

pub fn print_errs(errs: &[String]) {
    for e in errs {
        println!("{}", e);
    }
}

/// The exit code for an error which stopped the compilation.
pub fn fatal_exit_code(err: &FatalError) -> i32 {
    match err {
        FatalError::Limit(_) => ERR_LIMIT_EXCEEDED,
        FatalError::Internal(_) => ERR_INTERNAL_ERROR,
        FatalError::Io(_) => ERR_IO_ERROR,
    }
}

pub fn configure_cli() -> clap::App<'static, 'static> {
    let app = App::new("Ember Compiler")
        .version("0.3.0")
        .author("Erich Ess")
        .about("Compiles Ember units into x86-64 assembly")
        .arg(
            Arg::with_name("input")
                .short("i")
                .long("input")
                .takes_value(true)
                .required(true)
                .help("The unit to compile: a YAML file, or a JSON file if its extension is .json"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .required(true)
                .help("Name the output file that the assembly will be written to"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("A YAML file setting the limits of the compiler. Values which are not set keep their defaults."),
        )
        .arg(
            Arg::with_name("trace")
                .long("trace")
                .help("Interleave the assembly with comments naming each prologue, quadruple and epilogue")
        )
        .arg(
            Arg::with_name("log-level")
                .long("log-level")
                .possible_values(&["error", "warn", "info", "debug", "trace"])
                .takes_value(true)
                .help("Log the steps of the compiler at this level and above to stdout")
        )
        .arg(
            Arg::with_name("dump-symtab")
                .long("dump-symtab")
                .possible_values(&["summary", "pool", "hash", "long", "json"])
                .takes_value(true)
                .help("After compiling, print the symbol table to stdout at the given level of detail")
        );
    app
}

pub fn get_log_level(args: &ArgMatches) -> Option<LevelFilter> {
    match args.value_of("log-level") {
        Some("error") => Some(LevelFilter::Error),
        Some("warn") => Some(LevelFilter::Warn),
        Some("info") => Some(LevelFilter::Info),
        Some("debug") => Some(LevelFilter::Debug),
        Some("trace") => Some(LevelFilter::Trace),
        _ => None,
    }
}

pub fn configure_logging(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    SimpleLogger::init(level, Config::default())
}

pub fn get_dump_detail(args: &ArgMatches) -> Option<DumpDetail> {
    args.value_of("dump-symtab").and_then(|d| d.parse().ok())
}

pub fn enable_tracing(args: &ArgMatches) -> bool {
    args.is_present("trace")
}
