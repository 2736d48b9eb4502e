//! The errors emitted throughout the back-end

use crate::compiler::common::{symbol_table::SymbolClass, types::*};
use colored::{Color, Colorize};

/// The high-level error type, which is used by both lib.rs and main.rs
#[derive(Debug, thiserror::Error)]
pub enum PolybackError {
    /// Errors produced while checking and generating code for a compilation unit
    #[error("{} error{} generated.", .0.len(), plural(&.0.len()))]
    Comp(Vec<Error>),
    /// Error when doing system operations (reading the unit, writing the listing)
    #[error("{0}")]
    Sys(String),
}
impl PolybackError {
    pub fn print(self, filename: &str, no_color: bool) {
        match &self {
            PolybackError::Comp(errors) => {
                for e in errors {
                    e.print_error(filename, no_color);
                }
                eprintln!("{}", self);
            }
            PolybackError::Sys(error) => {
                eprintln!("polyback: {}", error);
            }
        }
    }
}
impl From<Vec<Error>> for PolybackError {
    fn from(compiler_errors: Vec<Error>) -> PolybackError {
        PolybackError::Comp(compiler_errors)
    }
}

/// All error-kinds the back-end can report
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ErrorKind {
    // symbol-table and scope errors
    #[error("redefinition of '{0}' in scope '{1}'")]
    DuplicateSymbol(String, String),
    #[error("cannot import '{0}', it is not declared in any enclosing scope")]
    UndefinedImport(String),
    #[error("scope mismatch: {0}")]
    ScopeMismatch(String),
    #[error("undeclared symbol '{0}'")]
    UnresolvedSymbol(String),

    // type errors
    #[error("mismatched types: expected '{0}', found '{1}'")]
    TypeMismatch(TypeDescriptor, TypeDescriptor),
    #[error("invalid operands to '{0}': '{1}' and '{2}'")]
    InvalidOperands(&'static str, TypeDescriptor, TypeDescriptor),
    #[error("invalid operand to '{0}': '{1}'")]
    InvalidOperand(&'static str, TypeDescriptor),
    #[error("routine '{0}' expects {1} argument{s}, found {2}", s = plural(.1))]
    Arity(String, usize, usize),
    #[error("{n} argument of '{1}' has to be '{2}', found '{3}'", n = num_to_ord(.0))]
    ArgumentType(usize, String, TypeDescriptor, TypeDescriptor),
    #[error("cannot assign to {1} '{0}'")]
    NotAssignable(String, SymbolClass),
    #[error("{1} '{0}' cannot be called")]
    NotCallable(String, SymbolClass),
    #[error("{1} '{0}' cannot be used as a value")]
    NotAValue(String, SymbolClass),
    #[error("procedure '{0}' does not return a value")]
    VoidValue(String),

    // array errors
    #[error("{0}")]
    ArrayDimension(String),

    // code generation errors
    #[error("unsupported construct: {0}")]
    UnsupportedConstruct(String),
    #[error("branch to undefined label {0} in routine '{1}'")]
    UndefinedLabel(usize, String),
}

impl ErrorKind {
    /// Fatal errors leave the code generator in a state it cannot recover from,
    /// all other errors are recorded and translation continues with the next statement
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::ScopeMismatch(_) | ErrorKind::UndefinedLabel(..)
        )
    }
}

fn plural(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

fn num_to_ord(n: &usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, r) if r != 11 => "st",
        (2, r) if r != 12 => "nd",
        (3, r) if r != 13 => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[derive(Debug, PartialEq, Clone)]
pub struct Error {
    /// Source line the error belongs to, -1 if it has none
    pub line_index: i32,
    pub kind: ErrorKind,
}
impl Error {
    pub fn new(object: &impl Location, kind: ErrorKind) -> Self {
        Error { line_index: object.line_index(), kind }
    }
    pub fn at(line_index: i32, kind: ErrorKind) -> Self {
        Error { line_index, kind }
    }
    /// Error without any source location, used for internal consistency checks
    pub fn internal(kind: ErrorKind) -> Self {
        Error { line_index: -1, kind }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }

    /// Prints the error to `stderr` together with its location.<br>
    /// If `no_color` is specified then only prints without any highlighting.
    pub fn print_error(&self, filename: &str, no_color: bool) {
        eprintln!(
            "{}: {}",
            color_text("error", Color::Red, true, no_color),
            color_text(&self.kind.to_string(), Color::White, true, no_color),
        );

        if self.line_index != -1 {
            eprintln!(
                "{}  {} in {}:{}",
                color_text("|", Color::Blue, false, no_color),
                color_text("-->", Color::Blue, false, no_color),
                color_text(filename, Color::White, false, no_color),
                self.line_index,
            );
        }
    }
}
impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line_index != -1 {
            write!(f, "line {}: {}", self.line_index, self.kind)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

/// Anything with a source line an error can be attached to
pub trait Location {
    fn line_index(&self) -> i32;
}

fn color_text(text: &str, color: Color, bold: bool, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else if bold {
        text.color(color).bold().to_string()
    } else {
        text.color(color).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let kind = ErrorKind::ArgumentType(
            2,
            "F".to_string(),
            TypeDescriptor::scalar(BaseType::Integer),
            TypeDescriptor::scalar(BaseType::Char),
        );
        assert_eq!(kind.to_string(), "2nd argument of 'F' has to be 'INTEGER', found 'CHAR'");

        let kind = ErrorKind::Arity("F".to_string(), 1, 3);
        assert_eq!(kind.to_string(), "routine 'F' expects 1 argument, found 3");

        let error = Error::at(45, ErrorKind::UnresolvedSymbol("x".to_string()));
        assert_eq!(error.to_string(), "line 45: undeclared symbol 'x'");

        let comp = PolybackError::Comp(vec![error.clone(), error]);
        assert_eq!(comp.to_string(), "2 errors generated.");
    }

    #[test]
    fn fatal_kinds() {
        assert!(ErrorKind::ScopeMismatch(String::new()).is_fatal());
        assert!(ErrorKind::UndefinedLabel(3, "MAIN".to_string()).is_fatal());
        assert!(!ErrorKind::UnsupportedConstruct(String::new()).is_fatal());
        assert!(!ErrorKind::TypeMismatch(TypeDescriptor::void(), TypeDescriptor::void()).is_fatal());
    }

    #[test]
    fn ordinals() {
        assert_eq!(num_to_ord(&1), "1st");
        assert_eq!(num_to_ord(&11), "11th");
        assert_eq!(num_to_ord(&22), "22nd");
        assert_eq!(num_to_ord(&103), "103rd");
    }
}
