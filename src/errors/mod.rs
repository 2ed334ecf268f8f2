use std::fmt;
use thiserror::Error;

use crate::core::Span;

/// Where an error occurred: the source id plus an inclusive span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceLocation {
    pub source: String,
    pub line: u32,
    pub col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceLocation {
    pub fn new(source: impl Into<String>, span: Span) -> Self {
        Self {
            source: source.into(),
            line: span.start_line,
            col: span.start_col,
            end_line: span.end_line,
            end_col: span.end_col,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.col, self.end_line, self.end_col)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.col)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    TypeMismatch { found: String, expected: String },
    Type { message: String },
    Multiplicity { found: String, expected: String },
    TypeArgumentMismatch { declared: String, expected: usize, found: usize, reference: String },
    GeneralizationCycle { message: String },
    DiamondInheritance { found: String, conflicting: String, class: String, ancestor: String },
    Visibility { message: String },
    AccessLevel { message: String },
    NameConflict { message: String },
    ReferenceNotFound { name: String },
    PropertyNotFound { property: String, owner: String },
    MissingRequiredProperty { property: String, multiplicity: String, owner: String },
    ChainedProperty { path: String },
    ParameterType { message: String },
    NoMatchingFunction { call: String },
    ReturnType { function: String, found: String, expected: String },
    ReturnMultiplicity { function: String, found: String, expected: String },
}

impl ErrorKind {
    /// Short category name used in logs and the CLI summary.
    pub fn category(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } | Self::Type { .. } | Self::ReturnType { .. } => "TypeError",
            Self::Multiplicity { .. } | Self::ReturnMultiplicity { .. } => "MultiplicityError",
            Self::TypeArgumentMismatch { .. } => "TypeArgumentMismatch",
            Self::GeneralizationCycle { .. } => "GeneralizationCycleError",
            Self::DiamondInheritance { .. } => "DiamondInheritanceError",
            Self::Visibility { .. } => "VisibilityError",
            Self::AccessLevel { .. } => "AccessLevelError",
            Self::NameConflict { .. } => "NameConflictError",
            Self::ReferenceNotFound { .. } | Self::NoMatchingFunction { .. } => "ReferenceNotFoundError",
            Self::PropertyNotFound { .. } => "PropertyNotFoundError",
            Self::MissingRequiredProperty { .. } => "MissingRequiredProperty",
            Self::ChainedProperty { .. } => "ChainedPropertyError",
            Self::ParameterType { .. } => "ParameterTypeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { found, expected } => {
                write!(f, "Type Error: {} not a subtype of {}", found, expected)
            }
            Self::Multiplicity { found, expected } => {
                write!(f, "Multiplicity Error: {} is not compatible with {}", found, expected)
            }
            Self::TypeArgumentMismatch { declared, expected, found, reference } => {
                write!(
                    f,
                    "Type argument mismatch for {} (expected {}, got {}): {}",
                    declared, expected, found, reference
                )
            }
            Self::DiamondInheritance { found, conflicting, class, ancestor } => {
                write!(
                    f,
                    "Diamond inheritance error! '{}' is not compatible with '{}' going from '{}' to '{}'",
                    found, conflicting, class, ancestor
                )
            }
            Self::ReferenceNotFound { name } => write!(f, "{} has not been defined!", name),
            Self::PropertyNotFound { property, owner } => {
                write!(
                    f,
                    "The property '{}' can't be found in the type '{}' or in its hierarchy.",
                    property, owner
                )
            }
            Self::MissingRequiredProperty { property, multiplicity, owner } => {
                write!(
                    f,
                    "Missing value(s) for required property '{}' which has a multiplicity of {} for type {}",
                    property, multiplicity, owner
                )
            }
            Self::ChainedProperty { path } => {
                write!(f, "Chained properties are not supported in instance creation: '{}'", path)
            }
            Self::NoMatchingFunction { call } => {
                write!(f, "The system can't find a match for the function: {}", call)
            }
            Self::ReturnType { function, found, expected } => {
                write!(f, "Return type error in function '{}'; found: {}; expected: {}", function, found, expected)
            }
            Self::ReturnMultiplicity { function, found, expected } => {
                write!(f, "Return multiplicity error in function '{}'; found: {}; expected: {}", function, found, expected)
            }
            Self::Type { message }
            | Self::GeneralizationCycle { message }
            | Self::Visibility { message }
            | Self::AccessLevel { message }
            | Self::NameConflict { message }
            | Self::ParameterType { message } => f.write_str(message),
        }
    }
}

/// A validation failure with its exact source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationError {
    pub kind: ErrorKind,
    pub location: SourceLocation,
    pub suggestions: Vec<String>,
}

impl CompilationError {
    pub fn new(kind: ErrorKind, location: SourceLocation) -> Self {
        Self { kind, location, suggestions: Vec::new() }
    }

    pub fn at(kind: ErrorKind, source: &str, span: Span) -> Self {
        Self::new(kind, SourceLocation::new(source, span))
    }

    pub fn with_suggestion(mut self, suggestion: String) -> Self {
        self.suggestions.push(suggestion);
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn reference_not_found(name: &str, source: &str, span: Span, similar: Vec<String>) -> Self {
        let mut error = Self::at(ErrorKind::ReferenceNotFound { name: name.to_string() }, source, span);

        if !similar.is_empty() {
            let suggestions = similar.iter()
                .take(3)
                .map(|s| format!("Did you mean '{}'?", s))
                .collect();
            error = error.with_suggestions(suggestions);
        }

        error
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    pub fn span(&self) -> Span {
        self.location.span()
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.kind)?;

        for suggestion in &self.suggestions {
            write!(f, "\n  hint: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompilationError {}

/// Malformed source text. Raised before any graph mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{source_id}:{line}:{col}: Parser error: {message}")]
pub struct ParserError {
    pub message: String,
    pub source_id: String,
    pub line: u32,
    pub col: u32,
}

impl ParserError {
    pub fn new(message: impl Into<String>, source_id: &str, line: u32, col: u32) -> Self {
        Self { message: message.into(), source_id: source_id.to_string(), line, col }
    }
}

#[derive(Debug, Error)]
pub enum PureError {
    #[error(transparent)]
    Parser(#[from] ParserError),

    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error("Source '{id}': {message}")]
    Source { id: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PureError {
    pub fn source_error(id: &str, message: impl Into<String>) -> Self {
        Self::Source { id: id.to_string(), message: message.into() }
    }

    /// The compilation error, if this is one.
    pub fn as_compilation(&self) -> Option<&CompilationError> {
        match self {
            Self::Compilation(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T, E = PureError> = std::result::Result<T, E>;

/// Compute Levenshtein distance for "did you mean" suggestions
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() { return b_chars.len(); }
    if b_chars.is_empty() { return a_chars.len(); }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Find similar names for "did you mean" suggestions
pub fn find_similar_names<'a>(target: &str, candidates: impl IntoIterator<Item = &'a str>, max_distance: usize) -> Vec<String> {
    let mut results: Vec<(&str, usize)> = candidates
        .into_iter()
        .map(|c| (c, levenshtein_distance(target, c)))
        .filter(|(_, dist)| *dist <= max_distance && *dist > 0)
        .collect();

    results.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    results.dedup();
    results.into_iter().map(|(name, _)| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("Person", "Persn"), 1);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_names() {
        let names = ["Person", "Firm", "Persona", "Address"];
        let similar = find_similar_names("Persn", names.iter().copied(), 2);
        assert_eq!(similar, vec!["Person".to_string(), "Persona".to_string()]);
    }

    #[test]
    fn test_messages() {
        let kind = ErrorKind::Multiplicity { found: "[4]".into(), expected: "[1]".into() };
        assert_eq!(kind.to_string(), "Multiplicity Error: [4] is not compatible with [1]");

        let kind = ErrorKind::ReferenceNotFound { name: "a::B".into() };
        assert_eq!(kind.to_string(), "a::B has not been defined!");
        assert_eq!(kind.category(), "ReferenceNotFoundError");
    }

    #[test]
    fn test_display_includes_hints() {
        let error = CompilationError::reference_not_found(
            "Persn",
            "/model/a.pure",
            Span::new(3, 9, 3, 13),
            vec!["Person".into()],
        );
        let rendered = error.to_string();
        assert!(rendered.starts_with("/model/a.pure:3:9: Persn has not been defined!"));
        assert!(rendered.contains("hint: Did you mean 'Person'?"));
    }
}
