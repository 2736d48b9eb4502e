//! Built-in functions of both languages, resolved after user declarations

use crate::compiler::common::{decl::Language, symbol_table::*, types::*};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Intrinsic {
    pub name: &'static str,
    pub params: &'static [BaseType],
    pub returns: BaseType,
    /// Run-time routine implementing the intrinsic
    pub runtime: &'static str,
}

impl Intrinsic {
    /// Routine symbol with the intrinsic's signature, used to check calls against it
    pub fn symbol(&self, line: i32) -> Symbol {
        Symbol::new(self.name, self.returns, SymbolClass::Function, vec![], line)
            .with_params(self.params.iter().map(|base| TypeDescriptor::scalar(*base)).collect())
            .with_entry(self.runtime.to_string())
    }
}

use BaseType::*;

static COMAL: &[Intrinsic] = &[
    Intrinsic { name: "ABS", params: &[Double], returns: Double, runtime: "rt.abs" },
    Intrinsic { name: "SQR", params: &[Double], returns: Double, runtime: "rt.sqrt" },
    Intrinsic { name: "INT", params: &[Double], returns: Integer, runtime: "rt.floor" },
    Intrinsic { name: "LEN", params: &[Char], returns: Integer, runtime: "rt.len" },
    Intrinsic { name: "CHR$", params: &[Integer], returns: Char, runtime: "rt.chr" },
    Intrinsic { name: "ORD", params: &[Char], returns: Integer, runtime: "rt.ord" },
    Intrinsic { name: "RND", params: &[], returns: Double, runtime: "rt.rnd" },
];

static FORTRAN: &[Intrinsic] = &[
    Intrinsic { name: "ABS", params: &[Double], returns: Double, runtime: "rt.abs" },
    Intrinsic { name: "SQRT", params: &[Double], returns: Double, runtime: "rt.sqrt" },
    Intrinsic { name: "INT", params: &[Double], returns: Integer, runtime: "rt.trunc" },
    Intrinsic { name: "MOD", params: &[Integer, Integer], returns: Integer, runtime: "rt.mod" },
    Intrinsic { name: "LEN", params: &[Char], returns: Integer, runtime: "rt.len" },
    Intrinsic { name: "CHAR", params: &[Integer], returns: Char, runtime: "rt.chr" },
    Intrinsic { name: "ICHAR", params: &[Char], returns: Integer, runtime: "rt.ord" },
];

/// Intrinsics of a single language. Built once per compilation and only read afterwards.
/// Keywords are case-insensitive in both languages, so are intrinsic names.
#[derive(Debug)]
pub struct Intrinsics {
    table: HashMap<&'static str, &'static Intrinsic>,
}

impl Intrinsics {
    pub fn for_language(language: Language) -> Self {
        let defs = match language {
            Language::Comal => COMAL,
            Language::Fortran => FORTRAN,
        };
        Intrinsics {
            table: defs.iter().map(|intrinsic| (intrinsic.name, intrinsic)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&'static Intrinsic> {
        self.table.get(name.to_uppercase().as_str()).copied()
    }
}
