pub mod decl;
pub mod environment;
pub mod error;
pub mod expr;
pub mod stmt;
pub mod symbol_table;
pub mod types;
