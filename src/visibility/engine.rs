use tracing::debug;

use crate::core::{ElementId, Span};
use crate::errors::{CompilationError, ErrorKind};
use crate::model::{ElementKind, ModelGraph, PackageableElement, SlotKind};

use super::access::AccessLevel;
use super::repository::RepositorySet;

/// Enforces access levels and repository visibility for every resolved
/// reference.
pub struct VisibilityEngine<'a> {
    graph: &'a ModelGraph,
    repositories: &'a RepositorySet,
}

impl<'a> VisibilityEngine<'a> {
    pub fn new(graph: &'a ModelGraph, repositories: &'a RepositorySet) -> Self {
        Self { graph, repositories }
    }

    pub fn access_level_of(&self, element: &PackageableElement) -> AccessLevel {
        element.access.unwrap_or_default()
    }

    pub fn is_accessible(&self, element: &PackageableElement, from_package: &str) -> bool {
        self.access_level_of(element).permits(&element.package, from_package)
    }

    pub fn is_repository_visible(&self, from: Option<&str>, to: Option<&str>) -> bool {
        self.repositories.is_visible(from, to)
    }

    fn repository_name(&self, source: &str) -> Option<&'a str> {
        self.repositories.repository_of(source).map(|r| r.name.as_str())
    }

    /// Validate one reference from `owner` to `target`; errors span the
    /// reference token.
    pub fn check_reference(&self, owner: &PackageableElement, span: Span, target: ElementId) -> Result<(), CompilationError> {
        let Some(target) = self.graph.get(target) else { return Ok(()) };

        if !target.source.is_empty() && target.source != owner.source {
            let from = self.repository_name(&owner.source);
            let to = self.repository_name(&target.source);
            if !self.is_repository_visible(from, to) {
                debug!(owner = %owner.path, target = %target.path, ?from, ?to, "repository not visible");
                return Err(CompilationError::at(
                    ErrorKind::Visibility {
                        message: format!("{} is not visible in the file {}", target.path, owner.source),
                    },
                    &owner.source,
                    span,
                ));
            }
        }

        if matches!(target.kind, ElementKind::Class(_)) || target.is_function() {
            if !self.is_accessible(target, &owner.package) {
                return Err(CompilationError::at(
                    ErrorKind::Visibility {
                        message: format!("{} is not accessible in {}", target.signature(), owner.package),
                    },
                    &owner.source,
                    span,
                ));
            }
        }

        Ok(())
    }

    /// Check every resolved slot of an element except call sites, which the
    /// function body checker handles as it resolves them.
    pub fn check_element(&self, owner: &PackageableElement) -> Result<(), CompilationError> {
        for slot in &owner.slots {
            if matches!(slot.kind, SlotKind::Call { .. }) {
                continue;
            }
            if let Some(target) = slot.resolved {
                self.check_reference(owner, slot.span, target)?;
            }
        }
        Ok(())
    }

    /// Both association ends must be visible from each other's repository.
    pub fn check_association(&self, association: &PackageableElement, left: ElementId, right: ElementId) -> Result<(), CompilationError> {
        let (Some(left), Some(right)) = (self.graph.get(left), self.graph.get(right)) else {
            return Ok(());
        };
        let left_repo = self.repository_name(&left.source);
        let right_repo = self.repository_name(&right.source);

        if self.is_repository_visible(left_repo, right_repo) && self.is_repository_visible(right_repo, left_repo) {
            return Ok(());
        }

        let (own, foreign) = match self.repository_name(&association.source) {
            repo if repo == right_repo => (right, left),
            _ => (left, right),
        };
        let own_repo = self.repository_name(&own.source).unwrap_or("<none>");
        let foreign_repo = self.repository_name(&foreign.source).unwrap_or("<none>");

        Err(CompilationError::at(
            ErrorKind::Visibility {
                message: format!(
                    "Associations are not permitted between classes in different repositories, '{}' is in the repository '{}' and '{}' is in the repository '{}'",
                    left.path,
                    left_repo.unwrap_or("<none>"),
                    right.path,
                    right_repo.unwrap_or("<none>")
                ),
            },
            &association.source,
            association.name_span,
        )
        .with_suggestion(format!(
            "Create a subclass of '{}' in the repository '{}' and associate '{}' with that subclass instead",
            foreign.path, own_repo, own.path
        )))
    }

    /// Element paths must fall within their repository's package pattern.
    pub fn check_repository_pattern(&self, element: &PackageableElement) -> Result<(), CompilationError> {
        let Some(repo) = self.repositories.repository_of(&element.source) else { return Ok(()) };
        if repo.allows_path(&element.path) {
            return Ok(());
        }
        Err(CompilationError::at(
            ErrorKind::Visibility {
                message: format!(
                    "{} is not in a package of the repository '{}' (pattern '{}')",
                    element.path,
                    repo.name,
                    repo.pattern.as_str()
                ),
            },
            &element.source,
            element.name_span,
        ))
    }
}
