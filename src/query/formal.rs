//! SPARQL synthesis from prepared query items.

use crate::error::{QueryError, QueryResult};
use crate::model::{ElementKind, QueryFilter, QueryItem, SemanticConcept};
use crate::ontology::{RDF_TYPE, RDFS_SUBCLASS_OF, XSD_NS};

/// A variable bound to datatype property values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBinding {
    pub var: String,
    pub property: String,
    /// Span of the property phrase in the question.
    pub span: (usize, usize),
}

/// Aggregate computed over a value variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub task: String,
    pub var: String,
    /// Label of the aggregated property, used when rendering the answer.
    pub property: String,
}

/// Options that are not carried by the items themselves.
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    pub namespaces: Vec<(String, String)>,
    pub max_results: usize,
    /// Task chosen for the whole question (`count`, or an aggregation
    /// not yet attached to a property).
    pub task: Option<String>,
    /// Restrictions of the question; cardinal ones become FILTER clauses.
    pub filters: Vec<QueryFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormalQuery {
    pub sparql: String,
    /// Selected variables in rendering order.
    pub select: Vec<String>,
    pub values: Vec<ValueBinding>,
    pub aggregate: Option<Aggregate>,
    /// Variable of the element the question asks for.
    pub answer_var: Option<String>,
}

#[derive(Default)]
struct Emitter {
    fragments: Vec<String>,
    select: Vec<String>,
    values: Vec<ValueBinding>,
    aggregate: Option<Aggregate>,
    order: Option<String>,
    limit_one: bool,
}

impl Emitter {
    fn select(&mut self, var: &str) {
        if !self.select.iter().any(|v| v == var) {
            self.select.push(var.to_string());
        }
    }
}

fn iri(uri: &str) -> String {
    format!("<{uri}>")
}

/// SPARQL string literal body.
fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn decimal(var: &str) -> String {
    format!("<{XSD_NS}decimal>(?{var})")
}

fn or_filter(var: &str, uris: &[String]) -> String {
    let alternatives: Vec<String> = uris.iter().map(|u| format!("?{var} = {}", iri(u))).collect();
    format!("FILTER({})", alternatives.join(" || "))
}

fn union(blocks: &[String]) -> String {
    if blocks.len() == 1 {
        return blocks[0].clone();
    }
    blocks
        .iter()
        .map(|b| format!("{{ {b} }}"))
        .collect::<Vec<_>>()
        .join(" UNION ")
}

fn class_fragment(var: &str, group: &[SemanticConcept]) -> String {
    let mut classes: Vec<String> = Vec::new();
    for sc in group.iter().filter(|sc| sc.element.is_entity()) {
        if !classes.contains(&sc.element.uri) {
            classes.push(sc.element.uri.clone());
        }
    }
    let blocks: Vec<String> = classes
        .iter()
        .map(|c| format!("?{var} {}/{}* {} .", iri(RDF_TYPE), iri(RDFS_SUBCLASS_OF), iri(c)))
        .collect();
    union(&blocks)
}

fn instance_fragment(var: &str, group: &[SemanticConcept]) -> String {
    let mut uris: Vec<String> = Vec::new();
    for sc in group {
        if let ElementKind::Instance { uris: grouped, .. } = &sc.element.kind {
            for uri in grouped {
                if !uris.contains(uri) {
                    uris.push(uri.clone());
                }
            }
        }
    }
    format!("?{var} {} ?{var}_type .\n  {}", iri(RDF_TYPE), or_filter(var, &uris))
}

impl FormalQuery {
    /// Build the query. Fails with [`QueryError::Empty`] when no item
    /// produced a graph pattern.
    pub fn from_concepts(items: &[QueryItem], options: &SynthesisOptions) -> QueryResult<Self> {
        let mut out = Emitter::default();
        let mut answer_var = None;

        for (idx, item) in items.iter().enumerate() {
            let prev = idx.checked_sub(1).and_then(|i| items.get(i));
            let next = items.get(idx + 1);
            match item {
                QueryItem::Joker { joker } => {
                    if joker.is_property() {
                        emit_property_joker(&mut out, &joker.id, prev, next);
                    }
                }
                QueryItem::Concepts { group } => {
                    let Some(first) = group.first() else { continue };
                    let var = item.var();
                    if first.element.main_subject {
                        answer_var = Some(var.clone());
                    }
                    match &first.element.kind {
                        ElementKind::Entity { .. } => {
                            out.fragments.push(class_fragment(&var, group));
                            out.select(&var);
                        }
                        ElementKind::Instance { .. } => {
                            out.fragments.push(instance_fragment(&var, group));
                            out.select(&var);
                        }
                        ElementKind::Literal { .. } => emit_literal(&mut out, &var, first, prev, next),
                        ElementKind::ObjectProperty { .. } | ElementKind::DatatypeProperty { .. } => {
                            emit_property(&mut out, &var, group, prev, next)
                        }
                        ElementKind::None => {}
                    }
                }
            }
        }

        if out.fragments.is_empty() {
            return Err(QueryError::Empty);
        }
        emit_filters(&mut out, &options.filters);

        let answer_var = answer_var
            .or_else(|| {
                items
                    .iter()
                    .find(|i| i.is_real_concept())
                    .map(QueryItem::var)
            })
            .or_else(|| out.select.first().cloned());

        match options.task.as_deref() {
            Some("count") if out.aggregate.is_none() => {
                if let Some(var) = &answer_var {
                    out.aggregate = Some(Aggregate {
                        task: "count".into(),
                        var: var.clone(),
                        property: String::new(),
                    });
                }
            }
            Some(task) if out.aggregate.is_none() && out.order.is_none() => {
                if let Some(binding) = out.values.first().cloned() {
                    apply_task(&mut out, task, &binding);
                }
            }
            _ => {}
        }

        Ok(assemble(out, options, answer_var))
    }
}

fn apply_task(out: &mut Emitter, task: &str, binding: &ValueBinding) {
    match task {
        "sum" | "avg" => {
            out.aggregate = Some(Aggregate {
                task: task.to_string(),
                var: binding.var.clone(),
                property: binding.property.clone(),
            })
        }
        "max" => {
            out.order = Some(format!("DESC({})", decimal(&binding.var)));
            out.limit_one = true;
        }
        "min" => {
            out.order = Some(format!("ASC({})", decimal(&binding.var)));
            out.limit_one = true;
        }
        other => tracing::debug!(task = other, "task has no query form"),
    }
}

fn span_gap(a: (usize, usize), b: (usize, usize)) -> usize {
    if a.1 < b.0 {
        b.0 - a.1
    } else if b.1 < a.0 {
        a.0 - b.1
    } else {
        0
    }
}

/// Bind each cardinal filter to the value variable whose property phrase lies
/// closest to it. The FILTER lands in the WHERE block, ahead of any ORDER BY,
/// LIMIT or aggregate. Filters without a value variable are dropped.
fn emit_filters(out: &mut Emitter, filters: &[QueryFilter]) {
    for filter in filters.iter().filter(|f| f.is_cardinal()) {
        let Some(binding) = out.values.iter().min_by_key(|b| span_gap(b.span, filter.span())) else {
            tracing::debug!(span = ?filter.span(), "filter without value variable dropped");
            continue;
        };
        if let Some(condition) = filter.sparql_condition(&decimal(&binding.var)) {
            out.fragments.push(format!("FILTER({condition})"));
        }
    }
}

fn concrete_var(item: Option<&QueryItem>) -> Option<String> {
    let item = item?;
    if item.is_property() {
        return None;
    }
    Some(item.var())
}

fn emit_property(
    out: &mut Emitter,
    var: &str,
    group: &[SemanticConcept],
    prev: Option<&QueryItem>,
    next: Option<&QueryItem>,
) {
    let Some(first) = group.first() else { return };
    let (Some(left), Some(right)) = (concrete_var(prev), concrete_var(next)) else {
        tracing::warn!(property = %first.element.uri, "property without neighbors dropped");
        return;
    };
    let info = first.element.property().cloned().unwrap_or_default();
    let (subject, object) = if info.reversed { (right, left) } else { (left, right) };

    let mut uris: Vec<String> = Vec::new();
    for sc in group.iter().filter(|sc| sc.element.is_property()) {
        if !uris.contains(&sc.element.uri) {
            uris.push(sc.element.uri.clone());
        }
    }
    let values = uris.iter().map(|u| iri(u)).collect::<Vec<_>>().join(" ");
    out.fragments.push(format!("VALUES ?{var} {{ {values} }}"));

    if first.element.is_datatype_property() {
        out.fragments.push(format!("?{subject} ?{var} ?{object} ."));
        let binding = ValueBinding {
            var: object.clone(),
            property: first.element.uri.clone(),
            span: first.span(),
        };
        if let Some(task) = first.task.as_deref() {
            apply_task(out, task, &binding);
        }
        out.values.push(binding);
    } else if info.domain.is_empty() && info.range.is_empty() {
        out.fragments.push(format!(
            "{{ ?{subject} ?{var} ?{object} . }} UNION {{ ?{object} ?{var} ?{subject} . }}"
        ));
    } else {
        out.fragments.push(format!("?{subject} ?{var} ?{object} ."));
    }
    out.select(&subject);
    out.select(var);
    out.select(&object);
}

fn emit_property_joker(out: &mut Emitter, var: &str, prev: Option<&QueryItem>, next: Option<&QueryItem>) {
    let (Some(left), Some(right)) = (concrete_var(prev), concrete_var(next)) else {
        return;
    };
    out.fragments.push(format!(
        "{{ ?{left} ?{var} ?{right} . }} UNION {{ ?{right} ?{var} ?{left} . }}"
    ));
    out.select(&left);
    out.select(var);
    out.select(&right);
}

fn emit_literal(
    out: &mut Emitter,
    var: &str,
    literal: &SemanticConcept,
    prev: Option<&QueryItem>,
    next: Option<&QueryItem>,
) {
    let pattern = format!("^{}$", regex::escape(&literal.element.uri));
    let adjacent_property = prev.is_some_and(QueryItem::is_property) || next.is_some_and(QueryItem::is_property);
    if !adjacent_property {
        out.fragments.push(format!("?{var}_s ?{var}_p ?{var} ."));
    }
    out.fragments.push(format!("FILTER(regex(str(?{var}), {}, \"i\"))", quoted(&pattern)));

    if let Some(QueryItem::Joker { joker }) = prev
        && joker.is_property()
    {
        let mut predicates: Vec<String> = Vec::new();
        for triple in literal.element.triples() {
            if !predicates.contains(&triple[1]) {
                predicates.push(triple[1].clone());
            }
        }
        if !predicates.is_empty() {
            out.fragments.push(or_filter(&joker.id, &predicates));
        }
    }
    out.select(var);
}

fn assemble(out: Emitter, options: &SynthesisOptions, answer_var: Option<String>) -> FormalQuery {
    let mut sparql = String::new();
    for (prefix, ns) in &options.namespaces {
        sparql.push_str(&format!("PREFIX {prefix}: <{ns}>\n"));
    }

    let (select_clause, select) = match &out.aggregate {
        Some(agg) => {
            let expr = match agg.task.as_str() {
                "count" => format!("COUNT(DISTINCT ?{})", agg.var),
                "avg" => format!("AVG({})", decimal(&agg.var)),
                _ => format!("SUM({})", decimal(&agg.var)),
            };
            (
                format!("SELECT ({expr} AS ?{})", agg.task),
                vec![agg.task.clone()],
            )
        }
        None => {
            let vars: Vec<String> = out.select.iter().map(|v| format!("?{v}")).collect();
            (format!("SELECT DISTINCT {}", vars.join(" ")), out.select.clone())
        }
    };
    sparql.push_str(&select_clause);
    sparql.push_str(" WHERE {\n");
    for fragment in &out.fragments {
        sparql.push_str("  ");
        sparql.push_str(fragment);
        sparql.push('\n');
    }
    sparql.push('}');
    if out.aggregate.is_none() {
        if let Some(order) = &out.order {
            sparql.push_str(&format!("\nORDER BY {order}"));
        }
        let limit = if out.limit_one { 1 } else { options.max_results };
        sparql.push_str(&format!("\nLIMIT {limit}"));
    }

    tracing::debug!(%sparql, "formal query synthesized");
    FormalQuery {
        sparql,
        select,
        values: out.values,
        aggregate: out.aggregate,
        answer_var,
    }
}
