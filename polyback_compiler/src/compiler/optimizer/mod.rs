//! Passes over the generated [LIR](crate::compiler::codegen::lir), run per routine in the
//! order lifetime reduction, common-subexpression elimination, peephole

pub mod cse;
pub mod lifetime;
pub mod peephole;

use crate::compiler::codegen::{Module, RoutineCode};
use log::debug;

/// Which passes to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOptions {
    pub lifetime: bool,
    pub cse: bool,
    pub peephole: bool,
}

impl Default for PassOptions {
    fn default() -> Self {
        PassOptions { lifetime: true, cse: true, peephole: true }
    }
}
impl PassOptions {
    pub fn none() -> Self {
        PassOptions { lifetime: false, cse: false, peephole: false }
    }
}

pub fn optimize(module: &mut Module, options: &PassOptions) {
    for routine in module.routines.iter_mut() {
        optimize_routine(routine, options);
    }
}

pub fn optimize_routine(routine: &mut RoutineCode, options: &PassOptions) {
    if options.lifetime {
        let saved = lifetime::reduce(routine);
        debug!("{}: lifetime reduction saved {} slots", routine.name, saved);
    }
    if options.cse {
        let replaced = cse::eliminate(routine);
        debug!("{}: {} common subexpressions replaced", routine.name, replaced);
    }
    if options.peephole {
        let before = routine.code.len();
        let rewrites = peephole::simplify(&mut routine.code);
        debug!(
            "{}: {} peephole rewrites, {} -> {} instructions",
            routine.name,
            rewrites,
            before,
            routine.code.len()
        );
    }
}
