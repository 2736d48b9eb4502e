//! Named collections of symbols, one per lexical scope

use crate::compiler::common::{error::*, expr::Literal, types::*};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SymbolClass {
    #[default]
    Variable,
    Constant,
    /// Functions and procedures, procedures have a `VOID` return type
    Function,
    Parameter,
    Label,
}
impl Display for SymbolClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SymbolClass::Variable => "variable",
                SymbolClass::Constant => "constant",
                SymbolClass::Function => "routine",
                SymbolClass::Parameter => "parameter",
                SymbolClass::Label => "label",
            }
        )
    }
}

/// Symbols are shared between the table that owns them and every frame that imports them,
/// so a reference updated through one is visible through all.
pub type SymbolRef = Rc<RefCell<Symbol>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    /// Name as spelled at the declaration
    pub name: String,
    /// Key under which the owning table stores the symbol
    pub normalized: String,
    /// For routines this is the return type
    pub type_decl: TypeDescriptor,
    pub class: SymbolClass,
    pub dimensions: Vec<Extent>,
    /// Line of the declaration, moved forward by every later reference
    pub line: i32,

    /// Formal parameter types of functions and procedures
    pub params: Vec<TypeDescriptor>,
    /// Value of a constant
    pub value: Option<Literal>,
    /// Name of the emitted routine, set once a routine symbol is declared
    pub entry: Option<String>,
}

impl Symbol {
    pub fn new(
        name: &str,
        base: BaseType,
        class: SymbolClass,
        dimensions: Vec<Extent>,
        line: i32,
    ) -> Self {
        Symbol {
            name: name.to_string(),
            normalized: name.to_string(),
            type_decl: TypeDescriptor::array(base, dimensions.clone()),
            class,
            dimensions,
            line,
            params: Vec::new(),
            value: None,
            entry: None,
        }
    }
    pub fn with_params(mut self, params: Vec<TypeDescriptor>) -> Self {
        self.params = params;
        self
    }
    pub fn with_value(mut self, value: Literal) -> Self {
        self.value = Some(value);
        self
    }
    pub fn with_entry(mut self, entry: String) -> Self {
        self.entry = Some(entry);
        self
    }

    pub fn is_routine(&self) -> bool {
        self.class == SymbolClass::Function
    }
    pub fn is_array(&self) -> bool {
        !self.dimensions.is_empty()
    }
    /// Variables and parameters occupy storage, every other class is resolved at compile time
    pub fn has_storage(&self) -> bool {
        matches!(self.class, SymbolClass::Variable | SymbolClass::Parameter)
    }

    /// Records a reference to the symbol
    pub fn touch(&mut self, line: i32) {
        if line != -1 {
            self.line = line;
        }
    }
}
impl Location for Symbol {
    fn line_index(&self) -> i32 {
        self.line
    }
}

/// Normalizes a name to the key used for lookups
pub fn normalize(name: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        name.to_string()
    } else {
        name.to_uppercase()
    }
}

/// Symbols of a single scope, enumerated in declaration order
#[derive(Debug, Clone)]
pub struct SymbolTable {
    name: String,
    case_sensitive: bool,
    entries: IndexMap<String, SymbolRef>,
}

impl SymbolTable {
    pub fn new(name: &str, case_sensitive: bool) -> Self {
        SymbolTable {
            name: name.to_string(),
            case_sensitive,
            entries: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
    pub fn normalize(&self, name: &str) -> String {
        normalize(name, self.case_sensitive)
    }

    pub fn declare(&mut self, mut symbol: Symbol) -> Result<SymbolRef, Error> {
        let key = self.normalize(&symbol.name);

        if self.entries.contains_key(&key) {
            return Err(Error::new(
                &symbol,
                ErrorKind::DuplicateSymbol(symbol.name.clone(), self.name.clone()),
            ));
        }
        symbol.normalized = key.clone();

        let symbol = Rc::new(RefCell::new(symbol));
        self.entries.insert(key, Rc::clone(&symbol));

        Ok(symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolRef> {
        self.entries.get(&self.normalize(name)).map(Rc::clone)
    }

    /// Removes the symbol with the same name, keeping the order of all remaining entries
    pub fn remove(&mut self, symbol: &Symbol) -> Option<SymbolRef> {
        let key = self.normalize(&symbol.name);
        self.entries.shift_remove(&key)
    }

    pub fn enumerate(&self) -> impl Iterator<Item = SymbolRef> + '_ {
        self.entries.values().map(Rc::clone)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "scope {}", self.name)?;
        for symbol in self.entries.values() {
            let symbol = symbol.borrow();
            write!(
                f,
                "  {:<16} {:<10} {:<16} line {}",
                symbol.name,
                symbol.class.to_string(),
                symbol.type_decl.to_string(),
                symbol.line
            )?;
            if let Some(value) = &symbol.value {
                write!(f, " = {}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
