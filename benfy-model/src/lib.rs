//! # benfy-model
//!
//! Shared logic for reading and checking benfy grammars. Code generators and the
//! `grammar!` macro build on it.
//!
//! ## Pipeline
//!
//! 1. **[lint]**: Scan the raw text for mistakes the parser cannot explain well.
//! 2. **[parser]**: Parse the text into the [ast] with the bootstrap parser, itself
//!    an instance of the [engine].
//! 3. **[validator]**: Check references, reachability and hard cycles.

pub mod ast;
pub mod diagnostic;
pub mod engine;
pub mod lint;
pub mod parser;
pub mod validator;

pub use ast::Grammar;
pub use diagnostic::{Diagnostic, MessageType, Report, Severity};
pub use engine::{EngineError, LogEntry, ParseError, SyntaxError};
pub use parser::GrammarParser;
pub use validator::ValidatedGrammar;
