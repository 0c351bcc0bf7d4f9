use crate::ir::*;
use crate::runtime;
use proc_macro2::{Ident, Span, TokenStream};
use quote::{format_ident, quote};
use std::collections::{HashMap, HashSet};

/// `snake_case` rule name to an `UpperCamel` type name.
pub fn camel_case(rule: &str) -> String {
    rule.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Field identifier for a rule name; keywords become raw identifiers.
pub fn field_ident(name: &str) -> Ident {
    // We rely on syn::parse_str::<syn::Ident> to reject reserved keywords.
    if syn::parse_str::<syn::Ident>(name).is_ok() {
        format_ident!("{}", name)
    } else if matches!(name, "self" | "super" | "crate") {
        format_ident!("{}_", name)
    } else {
        Ident::new_raw(name, Span::call_site())
    }
}

struct Renderer<'m> {
    module: &'m Module,
    types: HashMap<&'m str, Ident>,
}

impl<'m> Renderer<'m> {
    fn new(module: &'m Module) -> Self {
        let mut taken = HashSet::new();
        let mut types = HashMap::new();
        for node in &module.nodes {
            let mut name = camel_case(&node.rule);
            if syn::parse_str::<syn::Ident>(&name).is_err() {
                name.push('_');
            }
            let base = name.clone();
            let mut n = 2;
            while !taken.insert(name.clone()) {
                name = format!("{base}{n}");
                n += 1;
            }
            types.insert(node.rule.as_str(), format_ident!("{}", name));
        }
        Self { module, types }
    }

    fn type_of(&self, rule: &str) -> Ident {
        match self.types.get(rule) {
            Some(ident) => ident.clone(),
            None => format_ident!("{}", camel_case(rule)),
        }
    }

    /// Type of a single inline value of `child` stored in `owner`.
    fn inline_type(&self, owner: &str, child: &str) -> TokenStream {
        let ty = self.type_of(child);
        if self.module.needs_box(owner, child) {
            quote! { ::std::boxed::Box<#ty> }
        } else {
            quote! { #ty }
        }
    }

    fn parse_inline(&self, owner: &str, child: &str) -> TokenStream {
        let ty = self.type_of(child);
        if self.module.needs_box(owner, child) {
            quote! { ::std::boxed::Box::new(<#ty as rt::Node>::parse(e)?) }
        } else {
            quote! { <#ty as rt::Node>::parse(e)? }
        }
    }

    fn parse_optional(&self, owner: &str, child: &str) -> TokenStream {
        let ty = self.type_of(child);
        if self.module.needs_box(owner, child) {
            quote! { e.optional(<#ty as rt::Node>::parse).map(::std::boxed::Box::new) }
        } else {
            quote! { e.optional(<#ty as rt::Node>::parse) }
        }
    }

    fn node(&self, node: &NodeDecl) -> TokenStream {
        let ty = self.type_of(&node.rule);
        let label = node.rule.as_str();
        match &node.kind {
            NodeKind::Scalar { pattern } => quote! {
                #[derive(Debug, Clone, PartialEq, Eq)]
                pub struct #ty {
                    pub value: ::std::string::String,
                }

                impl rt::Node for #ty {
                    fn parse(e: &mut rt::Engine<'_>) -> rt::PResult<Self> {
                        let value = ::std::string::String::from(e.token(#pattern, #label)?);
                        ::std::result::Result::Ok(Self { value })
                    }
                }
            },
            NodeKind::Choice { alternatives } => {
                let variants = alternatives.iter().map(|alt| {
                    let name = self.type_of(alt);
                    let inner = self.inline_type(label, alt);
                    quote! { #name(#inner) }
                });
                let attempts = alternatives.iter().map(|alt| {
                    let name = self.type_of(alt);
                    let wrap = if self.module.needs_box(label, alt) {
                        quote! { ::std::boxed::Box::new(value) }
                    } else {
                        quote! { value }
                    };
                    quote! {
                        if let ::std::option::Option::Some(value) = e.optional(<#name as rt::Node>::parse) {
                            return ::std::result::Result::Ok(Self::#name(#wrap));
                        }
                    }
                });
                quote! {
                    #[derive(Debug, Clone, PartialEq, Eq)]
                    pub enum #ty {
                        #(#variants),*
                    }

                    impl rt::Node for #ty {
                        fn parse(e: &mut rt::Engine<'_>) -> rt::PResult<Self> {
                            #(#attempts)*
                            ::std::result::Result::Err(e.fail(#label))
                        }
                    }
                }
            }
            NodeKind::List { item, min } => {
                let item_ty = self.type_of(item);
                quote! {
                    #[derive(Debug, Clone, PartialEq, Eq)]
                    pub struct #ty {
                        pub items: ::std::vec::Vec<#item_ty>,
                    }

                    impl rt::Node for #ty {
                        fn parse(e: &mut rt::Engine<'_>) -> rt::PResult<Self> {
                            let items = e.repeat(#item_ty::parse_step, #min, ::std::option::Option::None)?;
                            ::std::result::Result::Ok(Self { items })
                        }
                    }
                }
            }
            NodeKind::Item { element, join } => {
                let element_field = field_ident(&element.name);
                let element_ty = self.inline_type(label, &element.rule);
                let parse_element = self.parse_inline(label, &element.rule);
                let (join_decl, join_parse, join_init) = match join {
                    Join::Pattern(pattern) => (
                        quote! {},
                        quote! { let more = e.optional(|e| e.token(#pattern, #label)).is_some(); },
                        quote! {},
                    ),
                    Join::Rule(field) => {
                        let name = field_ident(&field.name);
                        let join_ty = self.inline_type(label, &field.rule);
                        let parse_join = self.parse_optional(label, &field.rule);
                        (
                            quote! { pub #name: ::std::option::Option<#join_ty>, },
                            quote! {
                                let v1 = #parse_join;
                                let more = v1.is_some();
                            },
                            quote! { #name: v1, },
                        )
                    }
                };
                quote! {
                    #[derive(Debug, Clone, PartialEq, Eq)]
                    pub struct #ty {
                        pub #element_field: #element_ty,
                        #join_decl
                    }

                    impl #ty {
                        /// Parses one element; `Stop` when no join follows it.
                        pub fn parse_step(e: &mut rt::Engine<'_>) -> rt::PResult<rt::Step<Self>> {
                            let v0 = #parse_element;
                            #join_parse
                            let node = Self { #element_field: v0, #join_init };
                            ::std::result::Result::Ok(if more {
                                rt::Step::Next(node)
                            } else {
                                rt::Step::Stop(node)
                            })
                        }
                    }

                    impl rt::Node for #ty {
                        fn parse(e: &mut rt::Engine<'_>) -> rt::PResult<Self> {
                            Self::parse_step(e).map(rt::Step::into_inner)
                        }
                    }
                }
            }
            NodeKind::Sequence { steps } => self.sequence(&ty, label, steps),
        }
    }

    fn sequence(&self, ty: &Ident, label: &str, steps: &[Step]) -> TokenStream {
        let mut statements = Vec::new();
        let mut fields = Vec::new();
        let mut inits = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            match step {
                Step::Match(pattern) => statements.push(quote! { e.token(#pattern, #label)?; }),
                Step::Reject(Rejected::Pattern(pattern)) => {
                    let what = format!("!/{}/", self.module.patterns[*pattern].source);
                    statements.push(quote! {
                        e.reject(#label, #what, |e| e.token(#pattern, #label))?;
                    });
                }
                Step::Reject(Rejected::Rule(rule)) => {
                    let what = format!("!{rule}");
                    let rule_ty = self.type_of(rule);
                    statements.push(quote! {
                        e.reject(#label, #what, <#rule_ty as rt::Node>::parse)?;
                    });
                }
                Step::Field(field) => {
                    let var = format_ident!("v{}", i);
                    let name = field_ident(&field.name);
                    let (field_ty, parse) = match field.arity {
                        Arity::One => (
                            self.inline_type(label, &field.rule),
                            self.parse_inline(label, &field.rule),
                        ),
                        Arity::Optional => {
                            let inner = self.inline_type(label, &field.rule);
                            (
                                quote! { ::std::option::Option<#inner> },
                                self.parse_optional(label, &field.rule),
                            )
                        }
                        Arity::Repeat { min, max } => {
                            let item_ty = self.type_of(&field.rule);
                            let max = match max {
                                Some(max) => quote! { ::std::option::Option::Some(#max) },
                                None => quote! { ::std::option::Option::None },
                            };
                            (
                                quote! { ::std::vec::Vec<#item_ty> },
                                quote! { e.many(<#item_ty as rt::Node>::parse, #min, #max)? },
                            )
                        }
                    };
                    statements.push(quote! { let #var = #parse; });
                    fields.push(quote! { pub #name: #field_ty });
                    inits.push(quote! { #name: #var });
                }
            }
        }
        quote! {
            #[derive(Debug, Clone, PartialEq, Eq)]
            pub struct #ty {
                #(#fields),*
            }

            impl rt::Node for #ty {
                fn parse(e: &mut rt::Engine<'_>) -> rt::PResult<Self> {
                    #(#statements)*
                    ::std::result::Result::Ok(Self { #(#inits),* })
                }
            }
        }
    }
}

/// Renders the whole parser module body.
pub fn render(module: &Module) -> TokenStream {
    let renderer = Renderer::new(module);
    let runtime = runtime::tokens();
    let patterns = module.patterns.iter().map(|pattern| {
        let Pattern {
            source,
            skip_space,
            ignore_case,
            multiline,
        } = pattern;
        quote! {
            rt::PatternSpec {
                source: #source,
                skip_space: #skip_space,
                ignore_case: #ignore_case,
                multiline: #multiline,
            }
        }
    });
    let nodes = module.nodes.iter().map(|node| renderer.node(node));
    let root_ty = renderer.type_of(&module.root);
    let root_rule = module.root.as_str();

    quote! {
        #runtime

        /// Name of the rule every document is parsed from.
        pub const ROOT_RULE: &str = #root_rule;

        static PATTERNS: &[rt::PatternSpec] = &[#(#patterns),*];

        #(#nodes)*

        /// Parses a complete document.
        pub fn parse(text: &str) -> ::std::result::Result<#root_ty, rt::ParseError> {
            parse_with(text, "", |_| {}).map(|parsed| parsed.root)
        }

        /// Parses a complete document, labelling locations with `path`.
        ///
        /// `on_failure` runs before an error is returned and receives the partially
        /// parsed root when the root rule matched but text was left over.
        pub fn parse_with<F>(
            text: &str,
            path: &str,
            on_failure: F,
        ) -> ::std::result::Result<rt::Parsed<#root_ty>, rt::ParseError>
        where
            F: ::std::ops::FnOnce(::std::option::Option<&#root_ty>),
        {
            let mut engine = rt::Engine::new(text, path, PATTERNS)?;
            let result = <#root_ty as rt::Node>::parse(&mut engine);
            engine.finish(result, on_failure).map_err(rt::ParseError::Syntax)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(camel_case("json_value"), "JsonValue");
        assert_eq!(camel_case("a__b_"), "AB");
        assert_eq!(field_ident("value").to_string(), "value");
        assert_eq!(field_ident("type").to_string(), "r#type");
        assert_eq!(field_ident("self").to_string(), "self_");
    }

    #[test]
    fn colliding_type_names_get_suffixes() {
        let module = Module {
            root: "a_b".into(),
            patterns: vec![],
            nodes: vec![
                NodeDecl { rule: "a_b".into(), kind: NodeKind::Scalar { pattern: 0 } },
                NodeDecl { rule: "a__b".into(), kind: NodeKind::Scalar { pattern: 0 } },
                NodeDecl { rule: "self".into(), kind: NodeKind::Scalar { pattern: 0 } },
            ],
        };
        let renderer = Renderer::new(&module);
        assert_eq!(renderer.type_of("a_b").to_string(), "AB");
        assert_eq!(renderer.type_of("a__b").to_string(), "AB2");
        assert_eq!(renderer.type_of("self").to_string(), "Self_");
    }
}
