//! The stack of symbol tables making up the scopes of a compilation unit

use crate::compiler::common::{error::*, symbol_table::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a routine's frame sees the names of its enclosing frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Discipline {
    /// Every enclosing name is visible
    #[default]
    Open,
    /// Only names listed in an `IMPORT` are visible
    Closed,
}

/// Fortran has a single level of routines below the global scope, Comal nests arbitrarily
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scoping {
    Flat,
    Nested,
}

/// Identifies a pushed frame, has to be handed back when popping it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeHandle {
    depth: usize,
    id: usize,
}
impl ScopeHandle {
    pub fn depth(&self) -> usize {
        self.depth
    }
}

#[derive(Debug)]
struct Frame {
    id: usize,
    table: SymbolTable,
    discipline: Discipline,
    imported: HashSet<String>,
}

/// The stack of frames, the bottom one being the global frame which is never popped
#[derive(Debug)]
pub struct ScopeManager {
    frames: Vec<Frame>,
    scoping: Scoping,
    next_id: usize,
}

impl ScopeManager {
    pub fn new(global_name: &str, case_sensitive: bool, scoping: Scoping) -> Self {
        ScopeManager {
            frames: vec![Frame {
                id: 0,
                table: SymbolTable::new(global_name, case_sensitive),
                discipline: Discipline::Open,
                imported: HashSet::new(),
            }],
            scoping,
            next_id: 1,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }
    pub fn is_global(&self) -> bool {
        self.frames.len() == 1
    }
    pub fn is_case_sensitive(&self) -> bool {
        self.global().is_case_sensitive()
    }
    pub fn normalize(&self, name: &str) -> String {
        self.global().normalize(name)
    }

    pub fn global(&self) -> &SymbolTable {
        &self.frames[0].table
    }
    pub fn current(&self) -> &SymbolTable {
        &self.top().table
    }
    pub fn discipline(&self) -> Discipline {
        self.top().discipline
    }

    fn top(&self) -> &Frame {
        let top = self.frames.len() - 1;
        &self.frames[top]
    }
    fn top_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    pub fn push_scope(&mut self, name: &str, discipline: Discipline) -> Result<ScopeHandle, Error> {
        let discipline = match self.scoping {
            Scoping::Flat if !self.is_global() => {
                return Err(Error::internal(ErrorKind::UnsupportedConstruct(format!(
                    "routine '{}' cannot be nested inside '{}'",
                    name,
                    self.current().name()
                ))))
            }
            // a flat routine sees every global
            Scoping::Flat => Discipline::Open,
            Scoping::Nested => discipline,
        };

        let handle = ScopeHandle { depth: self.frames.len(), id: self.next_id };
        self.next_id += 1;

        self.frames.push(Frame {
            id: handle.id,
            table: SymbolTable::new(name, self.is_case_sensitive()),
            discipline,
            imported: HashSet::new(),
        });

        Ok(handle)
    }

    /// Pops the innermost frame returning its symbol table, `handle` has to belong to it
    pub fn pop_scope(&mut self, handle: ScopeHandle) -> Result<SymbolTable, Error> {
        if self.is_global() {
            return Err(Error::internal(ErrorKind::ScopeMismatch(
                "cannot pop the global scope".to_string(),
            )));
        }
        let top = self.top();
        if handle.depth != self.depth() || handle.id != top.id {
            return Err(Error::internal(ErrorKind::ScopeMismatch(format!(
                "closing a scope at depth {} while '{}' at depth {} is innermost",
                handle.depth,
                top.table.name(),
                self.depth()
            ))));
        }

        let frame = self.frames.pop().expect("checked that a non-global frame exists");
        Ok(frame.table)
    }

    pub fn declare(&mut self, symbol: Symbol) -> Result<SymbolRef, Error> {
        self.top_mut().table.declare(symbol)
    }
    pub fn declare_global(&mut self, symbol: Symbol) -> Result<SymbolRef, Error> {
        self.frames[0].table.declare(symbol)
    }
    pub fn remove(&mut self, symbol: &Symbol) -> Option<SymbolRef> {
        self.top_mut().table.remove(symbol)
    }

    /// Makes `name` of an enclosing frame visible in the innermost frame
    pub fn import_name(&mut self, name: &str, line: i32) -> Result<SymbolRef, Error> {
        let key = self.normalize(name);
        let undefined = || Error::at(line, ErrorKind::UndefinedImport(name.to_string()));

        if self.is_global() {
            return Err(undefined());
        }
        let (symbol, _) = self.resolve_from(self.depth() - 1, &key).ok_or_else(undefined)?;

        self.top_mut().imported.insert(key);
        Ok(symbol)
    }

    pub fn resolve(&self, name: &str) -> Option<SymbolRef> {
        self.resolve_with_depth(name).map(|(symbol, _)| symbol)
    }

    /// Also returns the depth of the frame the symbol was declared in
    pub fn resolve_with_depth(&self, name: &str) -> Option<(SymbolRef, usize)> {
        self.resolve_from(self.depth(), &self.normalize(name))
    }

    fn resolve_from(&self, depth: usize, key: &str) -> Option<(SymbolRef, usize)> {
        for (depth, frame) in self.frames[..=depth].iter().enumerate().rev() {
            if let Some(symbol) = frame.table.lookup(key) {
                return Some((symbol, depth));
            }
            // closed frames only look further out for imported names
            if frame.discipline == Discipline::Closed && !frame.imported.contains(key) {
                return None;
            }
        }
        None
    }

    /// Resolves a call target. Routines stay callable from inside closed frames without
    /// importing them, so a closed procedure can call its siblings and itself.
    pub fn resolve_routine(&self, name: &str) -> Option<(SymbolRef, usize)> {
        if let Some(found) = self.resolve_with_depth(name) {
            return Some(found);
        }
        let key = self.normalize(name);
        self.frames.iter().enumerate().rev().find_map(|(depth, frame)| {
            frame
                .table
                .lookup(&key)
                .filter(|symbol| symbol.borrow().is_routine())
                .map(|symbol| (symbol, depth))
        })
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use crate::compiler::common::types::*;

    macro_rules! symbol {
        ($name:expr,$base:expr) => {
            Symbol::new($name, $base, SymbolClass::Variable, vec![], 1)
        };
        ($name:expr,$base:expr,$class:expr) => {
            Symbol::new($name, $base, $class, vec![], 1)
        };
    }

    fn base_of(scopes: &ScopeManager, name: &str) -> Option<BaseType> {
        scopes.resolve(name).map(|s| s.borrow().type_decl.base)
    }

    #[test]
    fn open_frames_see_enclosing_names() {
        // 10 DIM n, x
        // 20 PROC p
        // 30   DIM n#
        // 40 ENDPROC p
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        scopes.declare(symbol!("n", BaseType::Double)).unwrap();
        scopes.declare(symbol!("x", BaseType::Double)).unwrap();

        let p = scopes.push_scope("p", Discipline::Open).unwrap();
        scopes.declare(symbol!("n", BaseType::Integer)).unwrap();

        // innermost wins
        assert_eq!(base_of(&scopes, "n"), Some(BaseType::Integer));
        assert_eq!(base_of(&scopes, "x"), Some(BaseType::Double));
        assert_eq!(scopes.resolve_with_depth("x").map(|(_, d)| d), Some(0));
        assert_eq!(scopes.resolve_with_depth("n").map(|(_, d)| d), Some(1));

        let table = scopes.pop_scope(p).unwrap();
        assert_eq!(table.name(), "p");
        assert_eq!(base_of(&scopes, "n"), Some(BaseType::Double));
    }

    #[test]
    fn closed_frames_need_imports() {
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        scopes.declare(symbol!("total", BaseType::Double)).unwrap();
        scopes.declare(symbol!("count", BaseType::Integer)).unwrap();

        let p = scopes.push_scope("p", Discipline::Closed).unwrap();
        scopes.declare(symbol!("local", BaseType::Char)).unwrap();
        assert!(scopes.resolve("total").is_none());
        assert!(scopes.resolve("local").is_some());

        let imported = scopes.import_name("total", 5).unwrap();
        assert_eq!(imported.borrow().type_decl.base, BaseType::Double);
        assert_eq!(base_of(&scopes, "total"), Some(BaseType::Double));
        assert!(scopes.resolve("count").is_none());

        assert_eq!(
            scopes.import_name("missing", 6).unwrap_err(),
            Error::at(6, ErrorKind::UndefinedImport("missing".to_string()))
        );

        scopes.pop_scope(p).unwrap();
        assert!(scopes.resolve("count").is_some());
    }

    #[test]
    fn imports_through_nested_frames() {
        // an open frame inside a closed one only sees what the closed one imported
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        scopes.declare(symbol!("a", BaseType::Integer)).unwrap();
        scopes.declare(symbol!("b", BaseType::Integer)).unwrap();

        let outer = scopes.push_scope("outer", Discipline::Closed).unwrap();
        scopes.import_name("a", 2).unwrap();

        let inner = scopes.push_scope("inner", Discipline::Open).unwrap();
        assert!(scopes.resolve("a").is_some());
        assert!(scopes.resolve("b").is_none());
        assert!(scopes.import_name("b", 3).is_err());

        scopes.pop_scope(inner).unwrap();
        scopes.pop_scope(outer).unwrap();
    }

    #[test]
    fn routines_callable_from_closed_frames() {
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        scopes.declare(symbol!("fib", BaseType::Integer, SymbolClass::Function)).unwrap();
        scopes.declare(symbol!("n", BaseType::Integer)).unwrap();

        let _ = scopes.push_scope("fib", Discipline::Closed).unwrap();
        assert!(scopes.resolve("fib").is_none());
        assert_eq!(scopes.resolve_routine("fib").map(|(_, d)| d), Some(0));
        // only routines are found this way
        assert!(scopes.resolve_routine("n").is_none());
    }

    #[test]
    fn case_insensitive_resolution() {
        let mut scopes = ScopeManager::new("MAIN", false, Scoping::Flat);
        scopes.declare(symbol!("Total", BaseType::Double)).unwrap();

        let _ = scopes.push_scope("AVG", Discipline::Closed).unwrap();
        // flat scoping ignores the requested discipline
        assert_eq!(scopes.discipline(), Discipline::Open);
        assert!(scopes.resolve("TOTAL").is_some());
        assert!(scopes.resolve("total").is_some());
    }

    #[test]
    fn flat_scoping_rejects_nesting() {
        let mut scopes = ScopeManager::new("MAIN", false, Scoping::Flat);
        let _ = scopes.push_scope("F", Discipline::Open).unwrap();

        assert!(matches!(
            scopes.push_scope("G", Discipline::Open),
            Err(Error { kind: ErrorKind::UnsupportedConstruct(_), .. })
        ));
    }

    #[test]
    fn mismatched_pops() {
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        let outer = scopes.push_scope("outer", Discipline::Open).unwrap();
        let inner = scopes.push_scope("inner", Discipline::Open).unwrap();

        assert!(matches!(
            scopes.pop_scope(outer),
            Err(Error { kind: ErrorKind::ScopeMismatch(_), .. })
        ));
        scopes.pop_scope(inner).unwrap();
        scopes.pop_scope(outer).unwrap();

        // handles are not reusable after their frame is gone
        let again = scopes.push_scope("again", Discipline::Open).unwrap();
        assert_eq!(again.depth(), outer.depth());
        assert!(scopes.pop_scope(outer).is_err());
        scopes.pop_scope(again).unwrap();

        assert!(matches!(
            scopes.pop_scope(again),
            Err(Error { kind: ErrorKind::ScopeMismatch(_), .. })
        ));
        assert!(scopes.is_global());
    }

    #[test]
    fn duplicates_only_within_a_frame() {
        let mut scopes = ScopeManager::new("MAIN", true, Scoping::Nested);
        scopes.declare(symbol!("x", BaseType::Double)).unwrap();
        assert!(scopes.declare(symbol!("x", BaseType::Integer)).is_err());

        let p = scopes.push_scope("p", Discipline::Open).unwrap();
        assert!(scopes.declare(symbol!("x", BaseType::Integer)).is_ok());
        scopes.pop_scope(p).unwrap();

        let removed = scopes.resolve("x").unwrap();
        assert!(scopes.remove(&removed.borrow()).is_some());
        assert!(scopes.resolve("x").is_none());
    }
}
