use clap::Parser;
use polyback_compiler::{compiler::optimizer::PassOptions, CompileOptions};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "polyback",
    version,
    about = "Compiles a checked Fortran or Comal compilation unit into a stack-machine listing"
)]
pub struct CliOptions {
    /// The JSON compilation unit produced by a front-end
    pub file_path: PathBuf,

    /// Writes the listing to <FILE> instead of stdout
    #[arg(short, long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Prints the symbol tables of every scope
    #[arg(long)]
    pub dump_symbols: bool,

    /// Prints the slot table of every routine in the listing
    #[arg(long)]
    pub frames: bool,

    /// Errors are printed without color
    #[arg(long)]
    pub no_color: bool,

    /// Optimization level, 0 disables every pass
    #[arg(short = 'O', value_name = "LEVEL", default_value_t = 1)]
    pub opt_level: u8,

    #[arg(long)]
    pub no_lifetime: bool,

    #[arg(long)]
    pub no_cse: bool,

    #[arg(long)]
    pub no_peephole: bool,

    /// Treats identifiers as case-sensitive regardless of the language
    #[arg(long, conflicts_with = "case_insensitive")]
    pub case_sensitive: bool,

    /// Treats identifiers as case-insensitive regardless of the language
    #[arg(long)]
    pub case_insensitive: bool,

    /// Verbose mode (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CliOptions {
    pub fn compile_options(&self) -> CompileOptions {
        let passes = if self.opt_level == 0 {
            PassOptions::none()
        } else {
            PassOptions {
                lifetime: !self.no_lifetime,
                cse: !self.no_cse,
                peephole: !self.no_peephole,
            }
        };
        let case_sensitive = match (self.case_sensitive, self.case_insensitive) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        CompileOptions { passes, case_sensitive }
    }

    /// Installs the global logger, `RUST_LOG` applies unless `-v` is given
    pub fn enable_log(&self) {
        let mut builder = env_logger::Builder::from_default_env();
        match self.verbose {
            0 => (),
            1 => {
                builder.filter_level(log::LevelFilter::Info);
            }
            2 => {
                builder.filter_level(log::LevelFilter::Debug);
            }
            _ => {
                builder.filter_level(log::LevelFilter::Trace);
            }
        }
        builder.init();
    }
}
