pub mod ast;
pub mod diagnostics;
pub mod logger;
pub mod mips;
pub mod symbols;
pub mod tac;
