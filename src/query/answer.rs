//! Turning result rows into the textual answer.

use crate::model::filter::parse_number;
use crate::ontology::{KnowledgeBase, Row, label_from_uri};

use super::formal::FormalQuery;

pub const NO_RESULTS: &str = "No results found.";
pub const UNRESOLVED: &str = "Your query could not be resolved";

/// Human-readable form of one bound value.
pub fn display_value(kb: &dyn KnowledgeBase, value: &str) -> String {
    if kb.kind_of(value).is_some() {
        return kb
            .labels(value)
            .into_iter()
            .next()
            .unwrap_or_else(|| label_from_uri(value));
    }
    if value.contains("://") {
        return label_from_uri(value);
    }
    value.to_string()
}

fn render_row(kb: &dyn KnowledgeBase, row: &Row, select: &[String]) -> String {
    select
        .iter()
        .filter_map(|var| row.iter().find(|(v, _)| v == var))
        .map(|(_, value)| display_value(kb, value))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_number(value: &str) -> String {
    match parse_number(value) {
        Some(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Some(n) => format!("{n:.2}"),
        None => value.to_string(),
    }
}

/// Render rows in select order, one numbered line per row.
pub fn render_answer(kb: &dyn KnowledgeBase, formal: &FormalQuery, rows: &[Row]) -> String {
    if let Some(aggregate) = &formal.aggregate {
        let value = rows
            .first()
            .and_then(|row| row.iter().find(|(v, _)| *v == aggregate.task))
            .map(|(_, value)| render_number(value));
        let Some(value) = value else {
            return NO_RESULTS.to_string();
        };
        if aggregate.property.is_empty() {
            return format!("{}: {value}", aggregate.task);
        }
        let label = display_value(kb, &aggregate.property);
        return format!("{} {label}: {value}", aggregate.task);
    }

    let lines: Vec<String> = rows
        .iter()
        .map(|row| render_row(kb, row, &formal.select))
        .filter(|line| !line.is_empty())
        .collect();
    match lines.len() {
        0 => NO_RESULTS.to_string(),
        1 => lines[0].clone(),
        _ => lines
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{}: {line}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
