//! pest grammar shared by the built-in section parsers

use pest::iterators::Pair;
use pest_derive::Parser;

use crate::core::{Multiplicity, TypeExpr};
use crate::errors::ParserError;
use crate::model::SlotKind;

use super::{ElementBuilder, SectionText};

#[derive(Parser)]
#[grammar = "frontend/grammar.pest"]
pub(crate) struct GrammarParser;

/// Convert a pest failure into a positioned parser error.
pub(crate) fn syntax_error(section: &SectionText<'_>, error: pest::error::Error<Rule>) -> ParserError {
    let offset = match error.location {
        pest::error::InputLocation::Pos(p) => p,
        pest::error::InputLocation::Span((start, _)) => start,
    };
    let message = match &error.variant {
        pest::error::ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let expected: Vec<String> = positives.iter().map(|r| describe_rule(*r)).collect();
            format!("expected {}", expected.join(" or "))
        }
        variant => variant.message().into_owned(),
    };
    section.error(message, offset)
}

fn describe_rule(rule: Rule) -> String {
    match rule {
        Rule::qualified_name | Rule::ident => "an identifier".to_string(),
        Rule::multiplicity => "a multiplicity".to_string(),
        Rule::generic_type => "a type".to_string(),
        Rule::string => "a string".to_string(),
        other => format!("{:?}", other).trim_start_matches("kw_").to_string(),
    }
}

/// Builds declared types, registering a slot for every named reference.
pub(crate) fn type_expr(builder: &mut ElementBuilder, section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<TypeExpr, ParserError> {
    let span = section.span_of(&pair);
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| section.error("empty type", 0))?;

    match inner.as_rule() {
        Rule::named_type => {
            let mut parts = inner.into_inner();
            let name_pair = parts.next().ok_or_else(|| section.error("missing type name", 0))?;
            let name = name_pair.as_str();
            let args = match parts.next() {
                Some(args) => args
                    .into_inner()
                    .map(|a| type_expr(builder, section, a))
                    .collect::<Result<Vec<_>, _>>()?,
                None => Vec::new(),
            };
            if args.is_empty() && builder.is_type_param(name) {
                return Ok(TypeExpr::Param { name: name.to_string(), span });
            }
            let slot = builder.reference(SlotKind::Type, name, section.span_of(&name_pair));
            Ok(TypeExpr::Named { slot, args, span })
        }
        Rule::function_type => {
            let mut typed = Vec::new();
            for entry in inner.into_inner() {
                let mut parts = entry.into_inner();
                let (Some(ty), Some(mult)) = (parts.next(), parts.next()) else {
                    return Err(section.error("malformed function type", 0));
                };
                typed.push((type_expr(builder, section, ty)?, multiplicity(section, mult)?));
            }
            let ret = typed.pop().ok_or_else(|| section.error("function type without a return type", 0))?;
            Ok(TypeExpr::Function { params: typed, ret: Box::new(ret), span })
        }
        _ => Err(section.error_at(&inner, "unexpected type syntax")),
    }
}

pub(crate) fn multiplicity(section: &SectionText<'_>, pair: Pair<'_, Rule>) -> Result<Multiplicity, ParserError> {
    let position = pair.as_span().start();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| section.error("empty multiplicity", position))?;

    let bound = |text: &str| -> Result<Option<u32>, ParserError> {
        if text == "*" {
            return Ok(None);
        }
        text.parse::<u32>()
            .map(Some)
            .map_err(|_| section.error(format!("invalid multiplicity bound '{}'", text), position))
    };

    let (lower, upper) = match inner.as_rule() {
        Rule::mult_range => {
            let mut parts = inner.into_inner();
            let lower = parts.next().map(|p| p.as_str()).unwrap_or("0");
            let upper = parts.next().map(|p| p.as_str()).unwrap_or("*");
            (bound(lower)?.unwrap_or(0), bound(upper)?)
        }
        _ => match bound(inner.as_str())? {
            Some(n) => (n, Some(n)),
            None => (0, None),
        },
    };

    Multiplicity::new(lower, upper).map_err(|message| section.error(message, position))
}

/// Text of a string literal without quotes, with `\'` and `\\` unescaped.
pub(crate) fn string_value(pair: Pair<'_, Rule>) -> String {
    let raw = pair.into_inner().next().map_or("", |p| p.as_str());
    let mut value = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => value.push('\\'),
            }
        } else {
            value.push(c);
        }
    }
    value
}
