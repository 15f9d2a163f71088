//! Query synthesis: from resolved overlap groups to SPARQL and back to text.

pub mod answer;
pub mod formal;
pub mod prepare;

use crate::config::EngineConfig;
use crate::error::{QueryError, QueryResult};
use crate::model::{Query, SemanticConcept};
use crate::ontology::KnowledgeBase;

pub use answer::{NO_RESULTS, UNRESOLVED, render_answer};
pub use formal::{FormalQuery, SynthesisOptions};
pub use prepare::{all_share_namespace, concepts_for_query, prepare_for_query};

/// Mark the group the question asks for.
///
/// That is the group inside the focus phrase, or failing that the group
/// closest to it in the parse tree.
pub fn mark_answer_type(query: &Query, groups: &mut [Vec<SemanticConcept>]) {
    let Some(focus) = &query.focus else {
        return;
    };
    let focus_span = focus.span();
    let inside = groups.iter().position(|g| {
        g.first().is_some_and(|sc| {
            let (start, end) = sc.span();
            sc.element.is_concept() && start >= focus_span.0 && end <= focus_span.1
        })
    });
    let chosen = inside.or_else(|| {
        groups
            .iter()
            .enumerate()
            .filter(|(_, g)| g.first().is_some_and(|sc| sc.element.is_concept()))
            .min_by_key(|(_, g)| query.distance(g[0].span(), focus_span))
            .map(|(i, _)| i)
    });
    if let Some(i) = chosen {
        for sc in &mut groups[i] {
            sc.element.main_subject = true;
        }
    }
}

/// Synthesize the formal query for a fully resolved question.
pub fn synthesize(query: &Query, kb: &dyn KnowledgeBase, config: &EngineConfig) -> QueryResult<FormalQuery> {
    let mut groups = concepts_for_query(&query.semantic_concepts);
    let namespaces = prepare::namespaces_of(&groups);
    if namespaces.len() > 1 {
        tracing::warn!(?namespaces, "resolved concepts span several namespaces");
        return Err(QueryError::MixedNamespaces { namespaces });
    }
    mark_answer_type(query, &mut groups);
    let items = prepare_for_query(groups);
    let options = SynthesisOptions {
        namespaces: kb.namespaces(),
        max_results: config.query.max_results,
        task: query.task.clone(),
        filters: query.filters.clone(),
    };
    FormalQuery::from_concepts(&items, &options)
}

/// Execute a synthesized query and render its rows.
pub fn answer(query: &Query, kb: &dyn KnowledgeBase, formal: &FormalQuery) -> QueryResult<String> {
    let rows = kb.execute(&formal.sparql).map_err(|e| QueryError::Execution {
        message: e.to_string(),
    })?;
    let text = render_answer(kb, formal, &rows);
    tracing::info!(lines = text.lines().count(), filters = query.filters.len(), "answer computed");
    Ok(text)
}
