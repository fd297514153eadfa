extern crate log;
extern crate simplelog;

use std::{fs::File, io::Write, path::Path, process::exit};

use log::info;

use ember::*;

fn main() {
    let args = configure_cli().get_matches();

    if let Some(level) = get_log_level(&args) {
        if let Err(e) = configure_logging(level) {
            println!("Failed to configure logger: {}", e);
        }
    }

    if let Err(code) = run(&args) {
        exit(code)
    }
}

fn run(args: &clap::ArgMatches) -> Result<(), i32> {
    let mut config = match args.value_of("config") {
        Some(path) => read_config(Path::new(path))?,
        None => CompilerConfig::default(),
    };
    if enable_tracing(args) {
        config.assembler_trace = true;
    }

    // clap requires both of these
    let input = args.value_of("input").unwrap_or_default();
    let output = args.value_of("output").unwrap_or_default();

    let unit = read_unit(Path::new(input)).map_err(|msg| {
        println!("{}", msg);
        ERR_LOAD_ERROR
    })?;

    let mut comp = Compilation::new(config).map_err(|e| fatal(&e))?;
    let compiled = compile_unit(&unit, &mut comp);

    if let Some(detail) = get_dump_detail(args) {
        if let Err(e) = comp.symtab().print(detail, &mut std::io::stdout()) {
            println!("Could not print the symbol table: {}", e);
            return Err(ERR_IO_ERROR);
        }
    }

    // Nothing is written unless the whole unit compiled
    let asm = match compiled {
        Ok(Some(asm)) => asm,
        Ok(None) => {
            let errs: Vec<_> = comp.errors().errors().iter().map(|e| e.to_string()).collect();
            print_errs(&errs);
            return Err(ERR_TYPE_CHECK);
        }
        Err(LoadError::Unit(errs)) => {
            print_errs(&errs);
            return Err(ERR_LOAD_ERROR);
        }
        Err(LoadError::Fatal(e)) => return Err(fatal(&e)),
    };

    File::create(output)
        .and_then(|mut out| out.write_all(&asm))
        .map_err(|e| {
            println!("Could not write {}: {}", output, e);
            ERR_IO_ERROR
        })?;

    info!("Wrote {} to {}", unit.name, output);
    Ok(())
}

fn read_config(path: &Path) -> Result<CompilerConfig, i32> {
    let file = File::open(path).map_err(|e| {
        println!("Could not open {}: {}", path.display(), e);
        ERR_IO_ERROR
    })?;
    CompilerConfig::read(file).map_err(|e| {
        println!("{}: {}", path.display(), e);
        ERR_LOAD_ERROR
    })
}

fn fatal(err: &FatalError) -> i32 {
    println!("{}", err);
    fatal_exit_code(err)
}
