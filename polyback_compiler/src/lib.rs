pub mod compiler;
pub mod emit;

use compiler::{
    codegen::*,
    common::{decl::*, environment::ScopeManager, error::*},
    optimizer::*,
    typechecker::intrinsics::Intrinsics,
};
use emit::{EmissionTarget, Listing};
use log::info;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub passes: PassOptions,
    /// Overrides the case-sensitivity of the unit's language
    pub case_sensitive: Option<bool>,
}

pub fn compile(unit: &CompilationUnit, options: &CompileOptions) -> Result<Module, Vec<Error>> {
    let case_sensitive = options.case_sensitive.unwrap_or(unit.language.case_sensitive());
    let scopes = ScopeManager::new(&unit.name, case_sensitive, unit.language.scoping());
    let intrinsics = Intrinsics::for_language(unit.language);

    // Check types and turn the tree into LIR
    let mut module = Compiler::new(unit.language, scopes, &intrinsics).translate(unit)?;

    info!(
        "translated {} unit '{}' into {} routines",
        unit.language,
        unit.name,
        module.routines.len()
    );

    // Run the enabled optimizer passes over every routine
    optimize(&mut module, &options.passes);

    Ok(module)
}

/// Compiles the unit into a text listing
pub fn compile_listing(unit: &CompilationUnit, options: &CompileOptions) -> Result<String, Vec<Error>> {
    let module = compile(unit, options)?;

    Listing::default().finalize(&module).map_err(|e| vec![e])
}
