//! [Typechecker](typechecker) -> [Codegen](codegen) -> [Optimizer](optimizer), sharing the
//! symbol tables and scope disciplines in [common]

pub mod codegen;
pub mod common;
pub mod optimizer;
pub mod typechecker;
