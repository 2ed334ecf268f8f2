//! Extension sections
//!
//! `###Diagram` and `###Route` contribute packageable elements of their own
//! whose references are ordinary slots, so binding, usage tracking and
//! invalidation treat them like any core element.

use pest::iterators::Pair;
use pest::Parser;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ParserError;
use crate::model::{Annotations, ElementKind, ExtensionDecl, ExtensionRef, SlotKind};

use super::grammar::{string_value, syntax_error, GrammarParser, Rule};
use super::{import_package, ElementBuilder, SectionParser, SectionText, UnboundElement};

/// Parse an extension section: imports followed by definitions of one rule.
fn parse_definitions<F>(section: &SectionText<'_>, rule: Rule, mut definition: F) -> Result<Vec<UnboundElement>, ParserError>
where
    F: FnMut(Pair<'_, Rule>, &Arc<Vec<String>>) -> Result<UnboundElement, ParserError>,
{
    let mut pairs = GrammarParser::parse(rule, section.body()).map_err(|e| syntax_error(section, e))?;
    let root = pairs.next().ok_or_else(|| section.error("empty section", 0))?;

    let mut imports = Vec::new();
    let mut definitions = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::import_stmt => imports.push(import_package(&pair)),
            Rule::EOI => {}
            _ => definitions.push(pair),
        }
    }

    let imports = Arc::new(imports);
    definitions.into_iter().map(|pair| definition(pair, &imports)).collect()
}

/// `Diagram a::D { class a::A; association a::L; }`
pub struct DiagramParser;

impl SectionParser for DiagramParser {
    fn section(&self) -> &'static str {
        "Diagram"
    }

    fn parse(&self, section: &SectionText<'_>) -> Result<Vec<UnboundElement>, ParserError> {
        parse_definitions(section, Rule::diagram_section, |pair, imports| {
            let span = section.span_of(&pair);
            let text = pair.as_str();
            let mut builder = ElementBuilder::new();
            let mut path = "";
            let mut name_span = span;
            let mut references = Vec::new();

            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::qualified_name => {
                        path = inner.as_str();
                        name_span = section.span_of(&inner);
                    }
                    Rule::diagram_entry => {
                        let mut parts = inner.into_inner();
                        let (Some(role), Some(target)) = (parts.next(), parts.next()) else {
                            return Err(section.error("malformed diagram entry", 0));
                        };
                        let slot = builder.reference(SlotKind::Element, target.as_str(), section.span_of(&target));
                        references.push(ExtensionRef { role: role.as_str().to_string(), slot });
                    }
                    _ => {}
                }
            }

            let kind = ElementKind::Extension(ExtensionDecl {
                section: "Diagram".to_string(),
                kind: "Diagram".to_string(),
                attributes: BTreeMap::new(),
                references,
            });
            Ok(builder.finish(section, path, kind, Annotations::default(), span, name_span, text, imports))
        })
    }
}

/// `Route a::r { function: a::f; path: '/people/{id}'; }`
pub struct RouteParser;

impl SectionParser for RouteParser {
    fn section(&self) -> &'static str {
        "Route"
    }

    fn parse(&self, section: &SectionText<'_>) -> Result<Vec<UnboundElement>, ParserError> {
        parse_definitions(section, Rule::route_section, |pair, imports| {
            let span = section.span_of(&pair);
            let text = pair.as_str();
            let mut builder = ElementBuilder::new();
            let mut path = "";
            let mut name_span = span;
            let mut attributes = BTreeMap::new();
            let mut references = Vec::new();

            for inner in pair.into_inner() {
                match inner.as_rule() {
                    Rule::qualified_name => {
                        path = inner.as_str();
                        name_span = section.span_of(&inner);
                    }
                    Rule::route_field => {
                        let Some(field) = inner.into_inner().next() else { continue };
                        let field_rule = field.as_rule();
                        let Some(value) = field.into_inner().next() else { continue };
                        if field_rule == Rule::route_function {
                            if references.iter().any(|r: &ExtensionRef| r.role == "function") {
                                return Err(section.error_at(&value, "route declares more than one function"));
                            }
                            let slot = builder.reference(SlotKind::FunctionRef, value.as_str(), section.span_of(&value));
                            references.push(ExtensionRef { role: "function".to_string(), slot });
                        } else {
                            attributes.insert("path".to_string(), string_value(value));
                        }
                    }
                    _ => {}
                }
            }

            if references.is_empty() {
                return Err(section.error(format!("Route {} does not declare a function", path), 0));
            }

            let kind = ElementKind::Extension(ExtensionDecl {
                section: "Route".to_string(),
                kind: "Route".to_string(),
                attributes,
                references,
            });
            Ok(builder.finish(section, path, kind, Annotations::default(), span, name_span, text, imports))
        })
    }
}

/// Names of the `{param}` placeholders in a route path.
pub fn route_path_params(path: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else { break };
        params.push(&rest[open + 1..open + close]);
        rest = &rest[open + close + 1..];
    }
    params
}
