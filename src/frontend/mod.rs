//! Grammar parser layer
//!
//! A source text is split on lines starting with `###<Section>`; each section
//! is handed to the parser registered for that name. Text before the first
//! marker belongs to `###Pure`. Parsers produce [`UnboundElement`]s that
//! declare their references as slots, so the compiler can bind and index
//! any element kind the same way.

pub mod cli;
pub mod config;
pub mod extensions;
pub(crate) mod grammar;
pub mod pure;

use pest::iterators::Pair;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

use crate::core::{LineIndex, SlotId, Span};
use crate::errors::ParserError;
use crate::incremental::ContentHash;
use crate::model::{
    qualify, split_path, Annotations, ElementKind, PackageableElement, ReferenceSlot, SlotKind,
};

pub use config::{CompilerConfig, CompilerOptions, RepositoryConfig};
pub use extensions::{DiagramParser, RouteParser};
pub use pure::PureParser;

use grammar::Rule;

/// A parsed element that has not been bound into the model graph yet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnboundElement {
    pub path: String,
    pub name: String,
    pub package: String,
    pub kind: ElementKind,
    pub annotations: Annotations,
    pub slots: Vec<ReferenceSlot>,
    pub span: Span,
    pub name_span: Span,
    pub imports: Arc<Vec<String>>,
    /// Hash of the element's text with insignificant whitespace removed,
    /// plus its imports. Equal fingerprints mean an unchanged declaration.
    pub fingerprint: ContentHash,
}

impl UnboundElement {
    pub fn into_element(self, source: &str) -> PackageableElement {
        PackageableElement {
            path: self.path,
            name: self.name,
            package: self.package,
            kind: self.kind,
            annotations: self.annotations,
            slots: self.slots,
            access: None,
            access_declarations: Vec::new(),
            source: source.to_string(),
            span: self.span,
            name_span: self.name_span,
            imports: self.imports,
            fingerprint: self.fingerprint,
        }
    }
}

/// One `###` section of a source, with positions mapped back to the whole
/// source text.
pub struct SectionText<'a> {
    pub source_id: &'a str,
    pub name: &'a str,
    text: &'a str,
    start: usize,
    end: usize,
    lines: &'a LineIndex<'a>,
}

impl<'a> SectionText<'a> {
    pub fn body(&self) -> &'a str {
        &self.text[self.start..self.end]
    }

    /// Span of a body-relative byte range.
    pub fn span(&self, start: usize, end: usize) -> Span {
        self.lines.span(self.start + start, self.start + end)
    }

    pub(crate) fn span_of(&self, pair: &Pair<'_, Rule>) -> Span {
        let span = pair.as_span();
        self.span(span.start(), span.end())
    }

    /// Error at a body-relative byte offset.
    pub fn error(&self, message: impl Into<String>, offset: usize) -> ParserError {
        let (line, col) = self.lines.position(self.start + offset);
        ParserError::new(message, self.source_id, line, col)
    }

    pub(crate) fn error_at(&self, pair: &Pair<'_, Rule>, message: impl Into<String>) -> ParserError {
        self.error(message, pair.as_span().start())
    }
}

pub trait SectionParser: Send + Sync {
    /// Section name as written after `###`.
    fn section(&self) -> &'static str;

    fn parse(&self, section: &SectionText<'_>) -> Result<Vec<UnboundElement>, ParserError>;
}

/// Collects the reference slots of one element while it is being parsed.
/// Section parsers outside this crate build their elements with it too.
#[derive(Default)]
pub struct ElementBuilder {
    slots: Vec<ReferenceSlot>,
    type_params: Vec<String>,
}

impl ElementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_type_params(&mut self, type_params: &[String]) {
        self.type_params = type_params.to_vec();
    }

    /// Declare a reference to be resolved at bind time.
    pub fn reference(&mut self, kind: SlotKind, text: &str, span: Span) -> SlotId {
        self.slots.push(ReferenceSlot { kind, text: text.to_string(), span, resolved: None });
        self.slots.len() - 1
    }

    pub(crate) fn is_type_param(&self, name: &str) -> bool {
        self.type_params.iter().any(|p| p == name)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn finish(
        self,
        section: &SectionText<'_>,
        path: &str,
        kind: ElementKind,
        annotations: Annotations,
        span: Span,
        name_span: Span,
        text: &str,
        imports: &Arc<Vec<String>>,
    ) -> UnboundElement {
        let (package, name) = split_path(path);
        let normalized = normalize(text);
        let fingerprint = ContentHash::from_parts(
            [section.name, kind.tag(), normalized.as_str()]
                .into_iter()
                .chain(imports.iter().map(String::as_str)),
        );
        let name = match kind.function() {
            Some(function) => function_signature_id(&function.function_name, &self.slots, function),
            None => name.to_string(),
        };
        UnboundElement {
            path: qualify(package, &name),
            name,
            package: package.to_string(),
            kind,
            annotations,
            slots: self.slots,
            span,
            name_span,
            imports: imports.clone(),
            fingerprint,
        }
    }
}

/// `name_P1_m1_P2_m2__R_m_`, the element name of a function.
fn function_signature_id(name: &str, slots: &[ReferenceSlot], function: &crate::model::FunctionDecl) -> String {
    use crate::core::TypeExpr;

    fn type_token(slots: &[ReferenceSlot], ty: &TypeExpr) -> String {
        match ty {
            TypeExpr::Named { slot, .. } => slots.get(*slot).map_or("Any", |s| s.simple_name()).to_string(),
            TypeExpr::Param { name, .. } => name.clone(),
            TypeExpr::Function { .. } => "Function".to_string(),
        }
    }

    let ret = format!(
        "{}_{}",
        type_token(slots, &function.return_type),
        function.return_multiplicity.signature_token()
    );
    if function.parameters.is_empty() {
        return format!("{}__{}_", name, ret);
    }
    let params: Vec<String> = function
        .parameters
        .iter()
        .map(|p| format!("{}_{}", type_token(slots, &p.ty), p.multiplicity.signature_token()))
        .collect();
    format!("{}_{}__{}_", name, params.join("__"), ret)
}

/// Collapse whitespace runs and drop comments outside string literals.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '\'' {
                in_string = false;
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'/') {
            while chars.next_if(|&n| n != '\n').is_some() {}
            pending_space = !out.is_empty();
            continue;
        }
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut previous = '\0';
            for n in chars.by_ref() {
                if previous == '*' && n == '/' {
                    break;
                }
                previous = n;
            }
            pending_space = !out.is_empty();
            continue;
        }
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        if c == '\'' {
            in_string = true;
        }
        out.push(c);
    }
    out
}

/// A section located within a source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBounds {
    pub name: String,
    /// Offset of the `###` marker, if the section has one.
    pub marker: Option<usize>,
    pub start: usize,
    pub end: usize,
}

pub fn split_sections(text: &str) -> Vec<SectionBounds> {
    let mut sections = Vec::new();
    let mut current = SectionBounds { name: "Pure".to_string(), marker: None, start: 0, end: 0 };
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if let Some(name) = line.strip_prefix("###") {
            current.end = offset;
            let finished = std::mem::replace(
                &mut current,
                SectionBounds {
                    name: name.trim().to_string(),
                    marker: Some(offset),
                    start: offset + line.len(),
                    end: 0,
                },
            );
            if finished.marker.is_some() || !text[finished.start..finished.end].trim().is_empty() {
                sections.push(finished);
            }
        }
        offset += line.len();
    }
    current.end = text.len();
    if current.marker.is_some() || !text[current.start..current.end].trim().is_empty() {
        sections.push(current);
    }
    sections
}

/// Section parsers by name.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn SectionParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self { parsers: BTreeMap::new() }
    }

    /// Registry with the `Pure`, `Diagram` and `Route` parsers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PureParser));
        registry.register(Arc::new(DiagramParser));
        registry.register(Arc::new(RouteParser));
        registry
    }

    pub fn register(&mut self, parser: Arc<dyn SectionParser>) {
        self.parsers.insert(parser.section().to_string(), parser);
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.parsers.keys().map(String::as_str)
    }

    pub fn parse(&self, source_id: &str, text: &str) -> Result<Vec<UnboundElement>, ParserError> {
        let lines = LineIndex::new(text);
        let mut elements = Vec::new();

        for bounds in split_sections(text) {
            let Some(parser) = self.parsers.get(&bounds.name) else {
                let (line, col) = lines.position(bounds.marker.unwrap_or(0));
                let known: Vec<_> = self.sections().collect();
                return Err(ParserError::new(
                    format!("Unknown section '{}'; known sections are: {}", bounds.name, known.join(", ")),
                    source_id,
                    line,
                    col,
                ));
            };
            let section = SectionText {
                source_id,
                name: parser.section(),
                text,
                start: bounds.start,
                end: bounds.end,
                lines: &lines,
            };
            let parsed = parser.parse(&section)?;
            trace!(source = source_id, section = %bounds.name, elements = parsed.len(), "parsed section");
            elements.extend(parsed);
        }

        Ok(elements)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Imports declared at the top of a section, as package paths.
pub(crate) fn import_package(pair: &Pair<'_, Rule>) -> String {
    pair.clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::import_path)
        .map(|p| p.as_str().trim_end_matches("::*").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sections() {
        let text = "Class a::A {}\n###Diagram\nDiagram a::D {}\n###Route\n";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].name, "Pure");
        assert_eq!(&text[sections[0].start..sections[0].end], "Class a::A {}\n");
        assert_eq!(sections[1].name, "Diagram");
        assert_eq!(&text[sections[1].start..sections[1].end], "Diagram a::D {}\n");
        assert_eq!(sections[2].name, "Route");
        assert_eq!(sections[2].start, sections[2].end);
    }

    #[test]
    fn test_leading_blank_text_is_not_a_section() {
        let sections = split_sections("\n\n###Pure\nClass a::A {}\n");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].marker, Some(2));
    }

    #[test]
    fn test_unknown_section_is_a_parser_error() {
        let registry = ParserRegistry::with_defaults();
        let error = registry.parse("/a.pure", "###Pure\n\n###Mapping\nx").unwrap_err();
        assert_eq!(error.line, 3);
        assert_eq!(error.col, 1);
        assert!(error.message.contains("Unknown section 'Mapping'"));
    }

    #[test]
    fn test_normalize_keeps_string_contents() {
        assert_eq!(normalize("Class  a::A\n{\n  x : String[1];\n}"), "Class a::A { x : String[1]; }");
        assert_eq!(normalize("f('a  b')"), "f('a  b')");
        assert_eq!(normalize("f('it\\'s  x')  "), "f('it\\'s  x')");
    }

    #[test]
    fn test_normalize_drops_comments() {
        assert_eq!(normalize("x: String[1]; // note\n  y: Integer[1];"), "x: String[1]; y: Integer[1];");
        assert_eq!(normalize("x: String[1]; // note y: Integer[1];"), "x: String[1];");
        assert_eq!(normalize("a /* b\n c */ d"), "a d");
        assert_eq!(normalize("f('// kept')"), "f('// kept')");
    }

    #[test]
    fn test_positions_survive_section_offsets() {
        let registry = ParserRegistry::with_defaults();
        let text = "###Pure\nClass a::A {}\n###Pure\n\nClass a::B {}\n";
        let elements = registry.parse("/a.pure", text).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1].path, "a::B");
        assert_eq!(elements[1].span.start_line, 5);
        assert_eq!(elements[1].name_span, Span::new(5, 7, 5, 10));
    }
}
