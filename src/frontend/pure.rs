//! `###Pure` section parser: classes, associations, enumerations, profiles,
//! primitives and functions.

use pest::iterators::Pair;
use pest::Parser;
use std::sync::Arc;

use crate::core::{Multiplicity, Span, TypeExpr};
use crate::errors::ParserError;
use crate::model::{
    Annotations, Assignment, AssociationDecl, ClassDecl, ElementKind, EnumValueDecl, EnumerationDecl, Expr,
    FunctionDecl, Literal, ParameterDecl, PrimitiveDecl, ProfileDecl, PropertyDecl, SlotKind, Statement,
    StereotypeUse, TaggedValue,
};

use super::grammar::{multiplicity, string_value, syntax_error, type_expr, GrammarParser, Rule};
use super::{import_package, ElementBuilder, SectionParser, SectionText, UnboundElement};

pub struct PureParser;

impl SectionParser for PureParser {
    fn section(&self) -> &'static str {
        "Pure"
    }

    fn parse(&self, section: &SectionText<'_>) -> Result<Vec<UnboundElement>, ParserError> {
        let mut pairs = GrammarParser::parse(Rule::pure_section, section.body())
            .map_err(|e| syntax_error(section, e))?;
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
        definitions
            .into_iter()
            .map(|pair| definition(section, pair, &imports))
            .collect()
    }
}

/// Fields shared by every definition header.
struct Header {
    builder: ElementBuilder,
    annotations: Annotations,
    path: String,
    name_span: Span,
    type_params: Vec<String>,
}

impl Header {
    fn new() -> Self {
        Self {
            builder: ElementBuilder::new(),
            annotations: Annotations::default(),
            path: String::new(),
            name_span: Span::default(),
            type_params: Vec::new(),
        }
    }

    /// Consume a header pair; returns the pair back when it is not one.
    fn accept<'i>(&mut self, section: &SectionText<'_>, pair: Pair<'i, Rule>) -> Result<Option<Pair<'i, Rule>>, ParserError> {
        match pair.as_rule() {
            Rule::stereotypes | Rule::tagged_values => {
                annotations(&mut self.builder, section, pair, &mut self.annotations)?;
            }
            Rule::qualified_name => {
                self.path = pair.as_str().to_string();
                self.name_span = section.span_of(&pair);
            }
            Rule::type_params => {
                self.type_params = pair.into_inner().map(|p| p.as_str().to_string()).collect();
                self.builder.set_type_params(&self.type_params);
            }
            rule if is_keyword(rule) => {}
            _ => return Ok(Some(pair)),
        }
        Ok(None)
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_class
            | Rule::kw_association
            | Rule::kw_enum
            | Rule::kw_profile
            | Rule::kw_primitive
            | Rule::kw_function
            | Rule::kw_native
            | Rule::kw_extends
    )
}

fn definition(section: &SectionText<'_>, pair: Pair<'_, Rule>, imports: &Arc<Vec<String>>) -> Result<UnboundElement, ParserError> {
    let span = section.span_of(&pair);
    let text = pair.as_str();
    let rule = pair.as_rule();
    let mut header = Header::new();

    let kind = match rule {
        Rule::class_def => {
            let mut generalizations = Vec::new();
            let mut properties = Vec::new();
            for inner in pair.into_inner() {
                let Some(inner) = header.accept(section, inner)? else { continue };
                match inner.as_rule() {
                    Rule::extends_clause => {
                        for general in inner.into_inner().filter(|p| p.as_rule() == Rule::generic_type) {
                            generalizations.push(type_expr(&mut header.builder, section, general)?);
                        }
                    }
                    Rule::property => properties.push(property(&mut header.builder, section, inner)?),
                    _ => {}
                }
            }
            ElementKind::Class(ClassDecl {
                type_params: header.type_params.clone(),
                generalizations,
                properties,
            })
        }
        Rule::association_def => {
            let mut properties = Vec::new();
            for inner in pair.into_inner() {
                let Some(inner) = header.accept(section, inner)? else { continue };
                if inner.as_rule() == Rule::property {
                    properties.push(property(&mut header.builder, section, inner)?);
                }
            }
            ElementKind::Association(AssociationDecl { properties })
        }
        Rule::enum_def => {
            let mut values = Vec::new();
            for inner in pair.into_inner() {
                let Some(inner) = header.accept(section, inner)? else { continue };
                if inner.as_rule() == Rule::enum_value {
                    values.push(EnumValueDecl { name: inner.as_str().to_string(), span: section.span_of(&inner) });
                }
            }
            ElementKind::Enumeration(EnumerationDecl { values })
        }
        Rule::profile_def => {
            let mut stereotypes = Vec::new();
            let mut tags = Vec::new();
            for inner in pair.into_inner() {
                let Some(entry) = header.accept(section, inner)? else { continue };
                let mut parts = entry.into_inner();
                let Some(kind) = parts.next() else { continue };
                let names = parts.map(|p| p.as_str().to_string());
                match kind.into_inner().next().map(|k| k.as_rule()) {
                    Some(Rule::kw_stereotypes) => stereotypes.extend(names),
                    _ => tags.extend(names),
                }
            }
            ElementKind::Profile(ProfileDecl { stereotypes, tags })
        }
        Rule::primitive_def => {
            let mut supertype = None;
            for inner in pair.into_inner() {
                let Some(inner) = header.accept(section, inner)? else { continue };
                if inner.as_rule() == Rule::generic_type {
                    supertype = Some(type_expr(&mut header.builder, section, inner)?);
                }
            }
            ElementKind::PrimitiveType(PrimitiveDecl { supertype })
        }
        Rule::function_def | Rule::native_function_def => {
            let function = function(&mut header, section, pair)?;
            if rule == Rule::function_def {
                ElementKind::ConcreteFunction(function)
            } else {
                ElementKind::NativeFunction(function)
            }
        }
        other => return Err(section.error(format!("unexpected definition {:?}", other), 0)),
    };

    let Header { builder, annotations, path, name_span, .. } = header;
    Ok(builder.finish(section, &path, kind, annotations, span, name_span, text, imports))
}

fn annotations(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>, into: &mut Annotations) -> Result<(), ParserError> {
    let rule = pair.as_rule();
    for entry in pair.into_inner() {
        let span = section.span_of(&entry);
        let mut parts = entry.into_inner();
        let (Some(profile), Some(name)) = (parts.next(), parts.next()) else {
            return Err(section.error("malformed annotation", 0));
        };
        let slot = builder.reference(SlotKind::Profile, profile.as_str(), section.span_of(&profile));
        if rule == Rule::stereotypes {
            into.stereotypes.push(StereotypeUse { profile: slot, value: name.as_str().to_string(), span });
        } else {
            let value = parts.next().map(string_value).unwrap_or_default();
            into.tagged_values.push(TaggedValue { profile: slot, tag: name.as_str().to_string(), value, span });
        }
    }
    Ok(())
}

fn property(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<PropertyDecl, ParserError> {
    let span = section.span_of(&pair);
    let mut annotations_out = Annotations::default();
    let mut name = None;
    let mut ty = None;
    let mut mult = None;

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::stereotypes | Rule::tagged_values => annotations(builder, section, inner, &mut annotations_out)?,
            Rule::ident => name = Some((inner.as_str().to_string(), section.span_of(&inner))),
            Rule::generic_type => ty = Some(type_expr(builder, section, inner)?),
            Rule::multiplicity => mult = Some(multiplicity(section, inner)?),
            _ => {}
        }
    }

    match (name, ty, mult) {
        (Some((name, name_span)), Some(ty), Some(multiplicity)) => Ok(PropertyDecl {
            name,
            ty,
            multiplicity,
            annotations: annotations_out,
            span,
            name_span,
        }),
        _ => Err(section.error("malformed property", 0)),
    }
}

fn function(header: &mut Header, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<FunctionDecl, ParserError> {
    let mut parameters = Vec::new();
    let mut return_type: Option<TypeExpr> = None;
    let mut return_multiplicity = Multiplicity::PURE_ONE;
    let mut body = Vec::new();

    for inner in pair.into_inner() {
        let Some(inner) = header.accept(section, inner)? else { continue };
        match inner.as_rule() {
            Rule::parameters => {
                for param in inner.into_inner() {
                    let span = section.span_of(&param);
                    let mut parts = param.into_inner();
                    let (Some(name), Some(ty), Some(mult)) = (parts.next(), parts.next(), parts.next()) else {
                        return Err(section.error("malformed parameter", 0));
                    };
                    parameters.push(ParameterDecl {
                        name: name.as_str().to_string(),
                        ty: type_expr(&mut header.builder, section, ty)?,
                        multiplicity: multiplicity(section, mult)?,
                        span,
                    });
                }
            }
            Rule::generic_type => return_type = Some(type_expr(&mut header.builder, section, inner)?),
            Rule::multiplicity => return_multiplicity = multiplicity(section, inner)?,
            Rule::code_block => {
                for statement_pair in inner.into_inner() {
                    body.push(statement(&mut header.builder, section, statement_pair)?);
                }
            }
            _ => {}
        }
    }

    let function_name = header.path.rsplit("::").next().unwrap_or_default().to_string();
    let return_type = return_type.ok_or_else(|| section.error("function without a return type", 0))?;
    Ok(FunctionDecl {
        function_name,
        type_params: header.type_params.clone(),
        parameters,
        return_type,
        return_multiplicity,
        body,
    })
}

fn statement(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<Statement, ParserError> {
    let inner = pair.into_inner().next().ok_or_else(|| section.error("empty statement", 0))?;
    match inner.as_rule() {
        Rule::let_stmt => {
            let span = section.span_of(&inner);
            let mut parts = inner.into_inner().filter(|p| p.as_rule() != Rule::kw_let);
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                return Err(section.error("malformed let statement", 0));
            };
            Ok(Statement::Let {
                name: name.as_str().to_string(),
                value: expression(builder, section, value)?,
                span,
            })
        }
        _ => Ok(Statement::Expr(expression(builder, section, inner)?)),
    }
}

fn expression(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<Expr, ParserError> {
    let span = section.span_of(&pair);
    let mut parts = pair.into_inner();
    let first = parts.next().ok_or_else(|| section.error("empty expression", 0))?;
    let mut expr = primary(builder, section, first)?;

    for postfix in parts {
        let postfix_span = section.span_of(&postfix);
        match postfix.as_rule() {
            Rule::arrow_call => {
                let mut call = postfix.into_inner();
                let name = call.next().ok_or_else(|| section.error("missing function name", 0))?;
                let mut args = vec![expr];
                if let Some(arguments) = call.next() {
                    args.extend(arguments_of(builder, section, arguments)?);
                }
                let slot = builder.reference(SlotKind::Call { arity: args.len() }, name.as_str(), section.span_of(&name));
                let whole = args[0].span().merge(postfix_span);
                expr = Expr::Call { slot, args, span: whole };
            }
            Rule::property_access => {
                let name = postfix.into_inner().next().ok_or_else(|| section.error("missing property name", 0))?;
                let whole = expr.span().merge(postfix_span);
                expr = Expr::Property { receiver: Box::new(expr), name: name.as_str().to_string(), span: whole };
            }
            _ => {}
        }
    }

    if let Expr::Call { span: call_span, .. } | Expr::Property { span: call_span, .. } = &mut expr {
        *call_span = call_span.merge(span);
    }
    Ok(expr)
}

fn arguments_of(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<Vec<Expr>, ParserError> {
    pair.into_inner().map(|arg| expression(builder, section, arg)).collect()
}

fn primary(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<Expr, ParserError> {
    let span = section.span_of(&pair);
    let literal = |value| Ok(Expr::Literal { value, span });

    match pair.as_rule() {
        Rule::string => literal(Literal::String(string_value(pair))),
        Rule::integer => {
            let value = pair
                .as_str()
                .parse::<i64>()
                .map_err(|_| section.error_at(&pair, format!("integer literal out of range: {}", pair.as_str())))?;
            literal(Literal::Integer(value))
        }
        Rule::float => {
            let value = pair
                .as_str()
                .parse::<f64>()
                .map_err(|_| section.error_at(&pair, format!("invalid float literal: {}", pair.as_str())))?;
            literal(Literal::Float(value))
        }
        Rule::boolean => literal(Literal::Boolean(pair.as_str() == "true")),
        Rule::collection => {
            let items = pair
                .into_inner()
                .map(|item| expression(builder, section, item))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Expr::Collection { items, span })
        }
        Rule::variable => {
            let name = pair.into_inner().next().map_or("", |p| p.as_str()).to_string();
            Ok(Expr::Variable { name, span })
        }
        Rule::new_instance => {
            let mut parts = pair.into_inner();
            let ty_pair = parts.next().ok_or_else(|| section.error("missing instance type", 0))?;
            let ty = type_expr(builder, section, ty_pair)?;
            let mut assignments = Vec::new();
            for assignment in parts {
                let assignment_span = section.span_of(&assignment);
                let mut fields = assignment.into_inner();
                let (Some(path), Some(value)) = (fields.next(), fields.next()) else {
                    return Err(section.error("malformed property assignment", 0));
                };
                assignments.push(Assignment {
                    path: path.as_str().split('.').map(str::to_string).collect(),
                    value: expression(builder, section, value)?,
                    span: assignment_span,
                });
            }
            Ok(Expr::New { ty, assignments, span })
        }
        Rule::function_call => {
            let mut parts = pair.into_inner();
            let name = parts.next().ok_or_else(|| section.error("missing function name", 0))?;
            let args = match parts.next() {
                Some(arguments) => arguments_of(builder, section, arguments)?,
                None => Vec::new(),
            };
            let slot = builder.reference(SlotKind::Call { arity: args.len() }, name.as_str(), section.span_of(&name));
            Ok(Expr::Call { slot, args, span })
        }
        Rule::enum_ref => {
            let mut parts = pair.into_inner();
            let (Some(enumeration), Some(value)) = (parts.next(), parts.next()) else {
                return Err(section.error("malformed enumeration reference", 0));
            };
            let slot = builder.reference(SlotKind::Type, enumeration.as_str(), section.span_of(&enumeration));
            Ok(Expr::EnumValue { slot, value: value.as_str().to_string(), span })
        }
        Rule::expression => expression(builder, section, pair),
        other => Err(section.error_at(&pair, format!("unexpected expression {:?}", other))),
    }
}
