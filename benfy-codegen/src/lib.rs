//! # benfy-codegen
//!
//! Turns a [`ValidatedGrammar`] into the Rust source of a standalone parser.
//!
//! Generation happens in two steps: [`ir::lower`] decides which node types and parse
//! steps exist, and [`render`](render::render) writes them as tokens next to the emitted
//! runtime module `rt`. The output only depends on the `regex` crate.

pub mod ir;
pub mod render;
pub mod runtime;

use benfy_model::ValidatedGrammar;
use proc_macro2::TokenStream;
use thiserror::Error;
use tracing::{debug, instrument};

/// Generation failed for a grammar that passed validation. This is a generator defect.
#[derive(Debug, Clone, Error)]
pub enum CodegenError {
    #[error("grammar has no rules")]
    NoRules,
    #[error("unresolved reference {from} -> {to}")]
    UnresolvedReference { from: String, to: String },
    #[error("generated code is not valid Rust: {message}")]
    InvalidOutput { message: String },
}

/// Generates the parser module body for `grammar`.
#[instrument(skip_all)]
pub fn generate(grammar: &ValidatedGrammar) -> Result<TokenStream, CodegenError> {
    let module = ir::lower(grammar.grammar())?;
    debug!(
        nodes = module.nodes.len(),
        patterns = module.patterns.len(),
        "grammar lowered"
    );
    let tokens = render::render(&module);
    syn::parse2::<syn::File>(tokens.clone()).map_err(|e| CodegenError::InvalidOutput {
        message: e.to_string(),
    })?;
    Ok(tokens)
}

/// Generates the parser as source text, ready to be written to a `.rs` file and
/// declared as a module.
pub fn generate_source(grammar: &ValidatedGrammar, label: &str) -> Result<String, CodegenError> {
    let tokens = generate(grammar)?;
    Ok(to_source(&tokens, label))
}

/// Prefixes generated tokens with the "do not edit" header.
pub fn to_source(tokens: &TokenStream, label: &str) -> String {
    format!("// Generated by benfy from {label}. Do not edit.\n{tokens}\n")
}
