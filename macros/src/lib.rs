extern crate proc_macro;

use benfy_model::{lint, validator, GrammarParser};
use derive_syn_parse::Parse;
use itertools::Itertools;
use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use std::path::PathBuf;
use syn::{parse_macro_input, Ident, LitStr, Token};

/// `name, "literal"` with an optional trailing comma.
#[derive(Parse)]
struct GrammarInput {
    name: Ident,
    _comma: Token![,],
    text: LitStr,
    _trailing: Option<Token![,]>,
}

/// Compiles an inline grammar into a parser module.
///
/// The first rule is the root. The expansion is `pub mod <name>` with one type per rule,
/// plus `parse`, `parse_with` and `ROOT_RULE`. The generated code uses the `regex` crate,
/// so the calling crate must depend on it.
///
/// # Example
///
/// ```rust,ignore
/// benfy::grammar!(digits, "number: /[0-9]+/\n");
///
/// let n = digits::parse("42").unwrap();
/// assert_eq!(n.value, "42");
/// ```
#[proc_macro]
pub fn grammar(input: TokenStream) -> TokenStream {
    let GrammarInput { name, text, .. } = parse_macro_input!(input as GrammarInput);
    let label = format!("grammar!({name})");
    expand(&name, &text.value(), &label, text.span())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Like [`grammar!`], reading the grammar from a file relative to `CARGO_MANIFEST_DIR`.
#[proc_macro]
pub fn include_grammar(input: TokenStream) -> TokenStream {
    let GrammarInput { name, text: path, .. } = parse_macro_input!(input as GrammarInput);
    let span = path.span();
    let file = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir).join(path.value()),
        Err(_) => PathBuf::from(path.value()),
    };
    let text = match std::fs::read_to_string(&file) {
        Ok(text) => text,
        Err(e) => {
            let message = format!("cannot read grammar file {}: {e}", file.display());
            return syn::Error::new(span, message).to_compile_error().into();
        }
    };
    let label = path.value();
    let tracked = file.display().to_string();
    match expand(&name, &text, &label, span) {
        Ok(module) => quote! {
            #module
            // Rebuild when the grammar file changes.
            const _: &str = include_str!(#tracked);
        }
        .into(),
        Err(e) => e.to_compile_error().into(),
    }
}

/// Runs text checks, parsing, validation and generation. Every blocking finding
/// becomes its own compile error.
fn expand(
    name: &Ident,
    text: &str,
    label: &str,
    span: Span,
) -> syn::Result<proc_macro2::TokenStream> {
    let findings = lint::check_text(text, label);
    let blocking = lint::blocking(&findings).map(ToString::to_string).collect_vec();
    if !blocking.is_empty() {
        return Err(combined(span, blocking));
    }

    let grammar = GrammarParser::new(label)
        .parse(text)
        .map_err(|e| syn::Error::new(span, e.to_string()))?;

    let validated = validator::check(grammar, label)
        .map_err(|report| combined(span, report.errors.iter().map(ToString::to_string)))?;

    let body = benfy_codegen::generate(&validated).map_err(|e| syn::Error::new(span, e.to_string()))?;

    Ok(quote! {
        pub mod #name {
            #![allow(dead_code, unused_variables, clippy::all)]
            #body
        }
    })
}

fn combined(span: Span, messages: impl IntoIterator<Item = String>) -> syn::Error {
    messages
        .into_iter()
        .map(|message| syn::Error::new(span, message))
        .reduce(|mut all, next| {
            all.combine(next);
            all
        })
        .unwrap_or_else(|| syn::Error::new(span, "grammar rejected"))
}
