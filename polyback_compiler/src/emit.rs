//! Targets consuming a finished [Module]

use crate::compiler::codegen::{lir::*, Module};
use crate::compiler::common::error::*;

/// Turns a module into whatever the back-end produces
pub trait EmissionTarget {
    type Artifact;

    fn finalize(&mut self, module: &Module) -> Result<Self::Artifact, Error>;
}

/// Assembly-like text listing of every routine
#[derive(Debug, Default)]
pub struct Listing {
    /// Prints the slot table of every routine
    pub frames: bool,
}

impl EmissionTarget for Listing {
    type Artifact = String;

    fn finalize(&mut self, module: &Module) -> Result<String, Error> {
        check_call_targets(module)?;

        let mut lines = vec![format!("; {} ({})", module.name, module.language)];

        for (name, type_decl) in &module.globals {
            lines.push(format!("@{}: {}", name, type_decl));
        }

        for (index, routine) in module.routines.iter().enumerate() {
            lines.push(String::new());
            lines.push(format!(
                "{}: ; {}{} params, returns {}, {} slots",
                routine.name,
                if index == module.main { "main, " } else { "" },
                routine.params,
                routine.returns,
                routine.frame.len()
            ));
            if self.frames {
                lines.extend(routine.frame.iter().map(|slot| format!("\t; {}", slot)));
            }
            lines.extend(routine.code.iter().map(|instr| instr.to_string()));
        }

        Ok(lines.join("\n"))
    }
}

// every call into the module has to have an entry point
fn check_call_targets(module: &Module) -> Result<(), Error> {
    module
        .routines
        .iter()
        .flat_map(|routine| routine.code.iter())
        .find_map(|instr| match instr {
            Lir::Call(CallTarget::Routine(name), ..) if !module.entry_points.contains_key(name) => {
                Some(Error::internal(ErrorKind::UnresolvedSymbol(name.clone())))
            }
            _ => None,
        })
        .map_or(Ok(()), Err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::codegen::RoutineCode;
    use crate::compiler::common::{decl::Language, expr::Literal, types::*};
    use indexmap::IndexMap;

    fn module(code: Vec<Lir>) -> Module {
        Module {
            name: "demo".to_string(),
            language: Language::Fortran,
            globals: vec![("X".to_string(), TypeDescriptor::scalar(BaseType::Integer))],
            routines: vec![RoutineCode {
                name: "DEMO".to_string(),
                params: 0,
                returns: BaseType::Void,
                frame: vec![],
                code,
            }],
            entry_points: IndexMap::from([("DEMO".to_string(), 0)]),
            main: 0,
            scopes: vec![],
        }
    }

    #[test]
    fn renders_listing() {
        let module = module(vec![
            Lir::LoadConst(Literal::Integer(1)),
            Lir::StoreGlobal("X".to_string()),
            Lir::Return(false),
        ]);

        assert_eq!(
            Listing::default().finalize(&module).unwrap(),
            "; demo (Fortran)\n\
             @X: INTEGER\n\
             \n\
             DEMO: ; main, 0 params, returns VOID, 0 slots\n\
             \tldc     1\n\
             \tst      @X\n\
             \tret"
        );
    }

    #[test]
    fn unknown_call_target() {
        let module = module(vec![
            Lir::Call(CallTarget::Routine("MISSING".to_string()), 0, false),
            Lir::Return(false),
        ]);

        let error = Listing::default().finalize(&module).unwrap_err();
        assert_eq!(error.kind, ErrorKind::UnresolvedSymbol("MISSING".to_string()));
        assert_eq!(error.line_index, -1);
    }
}
