mod cli_options;

use clap::Parser;
use cli_options::CliOptions;
use polyback_compiler::{
    compile,
    compiler::common::{decl::CompilationUnit, error::PolybackError},
    emit::{EmissionTarget, Listing},
};
use std::fs;

fn run(options: &CliOptions) -> Result<(), PolybackError> {
    let path = options.file_path.display();

    let source = fs::read_to_string(&options.file_path)
        .map_err(|e| PolybackError::Sys(format!("couldn't read '{}': {}", path, e)))?;
    let unit: CompilationUnit = serde_json::from_str(&source)
        .map_err(|e| PolybackError::Sys(format!("invalid compilation unit '{}': {}", path, e)))?;

    let module = compile(&unit, &options.compile_options())?;

    if options.dump_symbols {
        module.scopes.iter().for_each(|table| eprintln!("{}", table));
    }

    let listing = Listing { frames: options.frames }
        .finalize(&module)
        .map_err(|e| PolybackError::Comp(vec![e]))?;

    match &options.output_path {
        Some(output) => fs::write(output, listing + "\n").map_err(|e| {
            PolybackError::Sys(format!("couldn't write '{}': {}", output.display(), e))
        }),
        None => {
            println!("{}", listing);
            Ok(())
        }
    }
}

fn main() {
    let options = CliOptions::parse();
    options.enable_log();

    if let Err(e) = run(&options) {
        e.print(&options.file_path.display().to_string(), options.no_color);
        std::process::exit(1);
    }
}
