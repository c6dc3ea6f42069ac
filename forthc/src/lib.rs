//! Translator for a small Forth-like language targeting the stack machine
//! in `stackarch-core`. Produces an addressed JSON program image.

pub mod compiler;
pub mod error;
pub mod preamble;
pub mod section;
pub mod token;

pub use compiler::translate;
pub use error::CompileError;
pub use token::Token;
