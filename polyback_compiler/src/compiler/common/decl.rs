use crate::compiler::common::{
    environment::{Discipline, Scoping},
    error::Location,
    expr::*,
    stmt::*,
    symbol_table::*,
    types::*,
};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Fortran,
    Comal,
}
impl Language {
    /// Comal distinguishes `a` from `A`, Fortran does not
    pub fn case_sensitive(&self) -> bool {
        match self {
            Language::Fortran => false,
            Language::Comal => true,
        }
    }
    pub fn scoping(&self) -> Scoping {
        match self {
            Language::Fortran => Scoping::Flat,
            Language::Comal => Scoping::Nested,
        }
    }
}
impl Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Fortran => write!(f, "Fortran"),
            Language::Comal => write!(f, "Comal"),
        }
    }
}

/// A declaration of a variable, array or named constant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub base: BaseType,
    #[serde(default)]
    pub class: SymbolClass,
    #[serde(default)]
    pub dimensions: Vec<Extent>,
    /// Value of a named constant
    #[serde(default)]
    pub value: Option<Literal>,
    /// Run-time size of every `Dynamic` extent, in order
    #[serde(default)]
    pub extents: Vec<Expr>,
    #[serde(default = "no_line")]
    pub line: i32,
}
impl Declaration {
    pub fn variable(name: &str, base: BaseType, line: i32) -> Self {
        Declaration {
            name: name.to_string(),
            base,
            class: SymbolClass::Variable,
            dimensions: vec![],
            value: None,
            extents: vec![],
            line,
        }
    }
    pub fn array(name: &str, base: BaseType, dimensions: Vec<Extent>, line: i32) -> Self {
        Declaration { dimensions, ..Declaration::variable(name, base, line) }
    }
    pub fn constant(name: &str, base: BaseType, value: Literal, line: i32) -> Self {
        Declaration {
            class: SymbolClass::Constant,
            value: Some(value),
            ..Declaration::variable(name, base, line)
        }
    }
    pub fn with_extents(mut self, extents: Vec<Expr>) -> Self {
        self.extents = extents;
        self
    }

    pub fn type_decl(&self) -> TypeDescriptor {
        TypeDescriptor::array(self.base, self.dimensions.clone())
    }

    pub fn symbol(&self) -> Symbol {
        let symbol = Symbol::new(&self.name, self.base, self.class, self.dimensions.clone(), self.line);
        match &self.value {
            Some(value) => symbol.with_value(value.clone()),
            None => symbol,
        }
    }
}
impl Location for Declaration {
    fn line_index(&self) -> i32 {
        self.line
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub base: BaseType,
    /// Array parameters are passed by reference
    #[serde(default)]
    pub dimensions: Vec<Extent>,
    #[serde(default = "no_line")]
    pub line: i32,
}
impl Param {
    pub fn new(name: &str, base: BaseType, line: i32) -> Self {
        Param { name: name.to_string(), base, dimensions: vec![], line }
    }
    pub fn type_decl(&self) -> TypeDescriptor {
        TypeDescriptor::array(self.base, self.dimensions.clone())
    }
    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.name, self.base, SymbolClass::Parameter, self.dimensions.clone(), self.line)
    }
}
impl Location for Param {
    fn line_index(&self) -> i32 {
        self.line
    }
}

/// A function or procedure, procedures return `VOID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Routine {
    pub name: String,
    #[serde(default)]
    pub discipline: Discipline,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "void")]
    pub return_type: BaseType,
    pub body: Vec<Stmt>,
    /// Routines local to this one, only Comal allows these
    #[serde(default)]
    pub routines: Vec<Routine>,
    #[serde(default = "no_line")]
    pub line: i32,
}
fn void() -> BaseType {
    BaseType::Void
}

impl Routine {
    pub fn new(name: &str, params: Vec<Param>, return_type: BaseType, body: Vec<Stmt>, line: i32) -> Self {
        Routine {
            name: name.to_string(),
            discipline: Discipline::Open,
            params,
            return_type,
            body,
            routines: vec![],
            line,
        }
    }
    pub fn closed(mut self) -> Self {
        self.discipline = Discipline::Closed;
        self
    }
    pub fn with_routines(mut self, routines: Vec<Routine>) -> Self {
        self.routines = routines;
        self
    }

    pub fn symbol(&self) -> Symbol {
        Symbol::new(&self.name, self.return_type, SymbolClass::Function, vec![], self.line)
            .with_params(self.params.iter().map(Param::type_decl).collect())
    }
}
impl Location for Routine {
    fn line_index(&self) -> i32 {
        self.line
    }
}

/// Everything a front-end hands over for one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub name: String,
    pub language: Language,
    #[serde(default)]
    pub globals: Vec<Declaration>,
    /// Statements of the main program
    #[serde(default)]
    pub main: Vec<Stmt>,
    #[serde(default)]
    pub routines: Vec<Routine>,
}
impl CompilationUnit {
    pub fn new(name: &str, language: Language) -> Self {
        CompilationUnit {
            name: name.to_string(),
            language,
            globals: vec![],
            main: vec![],
            routines: vec![],
        }
    }
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_unit_with_defaults() {
        let unit = CompilationUnit::from_json(
            r#"{
                "name": "AREA",
                "language": "Comal",
                "globals": [{"name": "r", "base": "Double", "line": 1}],
                "main": [{"kind": "Stop", "line": 2}],
                "routines": [{
                    "name": "square",
                    "discipline": "Closed",
                    "params": [{"name": "x", "base": "Double"}],
                    "return_type": "Double",
                    "body": [{"kind": {"Return": {"kind": {"Ident": "x"}}}}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(unit.globals[0], Declaration::variable("r", BaseType::Double, 1));
        assert_eq!(unit.main, vec![Stmt::new(StmtKind::Stop, 2)]);

        let square = &unit.routines[0];
        assert_eq!(square.discipline, Discipline::Closed);
        assert_eq!(square.symbol().params, vec![TypeDescriptor::scalar(BaseType::Double)]);
        assert_eq!(square.symbol().type_decl, TypeDescriptor::scalar(BaseType::Double));
        assert!(square.routines.is_empty());
    }

    #[test]
    fn language_defaults() {
        assert!(!Language::Fortran.case_sensitive());
        assert_eq!(Language::Fortran.scoping(), Scoping::Flat);
        assert!(Language::Comal.case_sensitive());
        assert_eq!(Language::Comal.scoping(), Scoping::Nested);
    }
}
