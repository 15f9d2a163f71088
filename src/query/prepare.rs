//! Linearization of the resolved overlap groups.
//!
//! The groups arrive in document order. Datatype properties are moved next
//! to the concept they describe, a trailing property is pulled between the
//! two concepts before it, and jokers fill every role the question left
//! open, so the sequence alternates concept, property, concept.

use crate::model::{ElementKind, Joker, QueryItem, SemanticConcept, Slot};
use crate::ontology::{OWL_NS, RDF_NS, RDFS_NS, XSD_NS};

/// Groups that can take part in a formal query.
///
/// None choices are dropped. A task picked for an implicitly added element
/// moves onto the question's own interpretation of the same span, and the
/// added element goes away unless it is the only interpretation left.
/// Duplicate groups keep their first occurrence.
pub fn concepts_for_query(groups: &[Vec<SemanticConcept>]) -> Vec<Vec<SemanticConcept>> {
    let mut out: Vec<Vec<SemanticConcept>> = Vec::new();
    for group in groups {
        let mut kept: Vec<SemanticConcept> =
            group.iter().filter(|sc| !sc.is_none()).cloned().collect();
        let has_own = kept.iter().any(|sc| !sc.element.added);
        if has_own {
            let tasks: Vec<((usize, usize), String)> = kept
                .iter()
                .filter(|sc| sc.element.added)
                .filter_map(|sc| sc.task.clone().map(|t| (sc.span(), t)))
                .collect();
            kept.retain(|sc| !sc.element.added);
            for (span, task) in tasks {
                for sc in kept.iter_mut().filter(|sc| sc.span() == span && sc.task.is_none()) {
                    sc.task = Some(task.clone());
                }
            }
        }
        if kept.is_empty() {
            continue;
        }
        let duplicate = out.iter().any(|g| {
            g.len() == kept.len()
                && g.iter()
                    .zip(&kept)
                    .all(|(a, b)| a.span() == b.span() && a.element.uris() == b.element.uris())
        });
        if !duplicate {
            out.push(kept);
        }
    }
    out
}

fn is_vocabulary(uri: &str) -> bool {
    [RDF_NS, RDFS_NS, OWL_NS, XSD_NS]
        .iter()
        .any(|ns| uri.starts_with(ns))
}

/// Distinct namespaces of the groups' representatives.
///
/// Literals and the RDF/RDFS/OWL/XSD vocabularies are not counted.
pub fn namespaces_of(groups: &[Vec<SemanticConcept>]) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for sc in groups.iter().filter_map(|g| g.first()) {
        if sc.is_none() || sc.element.is_literal() || is_vocabulary(&sc.element.uri) {
            continue;
        }
        if let Some(ns) = sc.element.namespace()
            && !namespaces.iter().any(|n| n == ns)
        {
            namespaces.push(ns.to_string());
        }
    }
    namespaces
}

pub fn all_share_namespace(groups: &[Vec<SemanticConcept>]) -> bool {
    namespaces_of(groups).len() <= 1
}

/// Move a governed datatype property behind its governor.
///
/// For `[A, P, G]` where `G` is the concept `P` describes, the result is
/// `[A, G, P]`; `[G, P, B]` becomes `[P, G, B]`. Literals never move.
pub fn arrange_datatype_properties(groups: &mut [Vec<SemanticConcept>]) {
    let mut i = 1;
    while i + 1 < groups.len() {
        let governor = groups[i]
            .first()
            .filter(|sc| sc.element.is_datatype_property())
            .and_then(|sc| sc.element.governor());
        let (Some(governor), Some(prev), Some(next)) =
            (governor, groups[i - 1].first(), groups[i + 1].first())
        else {
            i += 1;
            continue;
        };
        if prev.element.is_literal() || next.element.is_literal() {
            i += 1;
            continue;
        }
        if next.span() == governor {
            groups.swap(i, i + 1);
            i += 2;
        } else if prev.span() == governor {
            groups.swap(i, i - 1);
            i += 2;
        } else {
            i += 1;
        }
    }
}

/// `[A, B, P]` becomes `[A, P, B]`.
pub fn arrange_last_property(groups: &mut [Vec<SemanticConcept>]) {
    let n = groups.len();
    if n <= 2 {
        return;
    }
    let is_property = |g: &Vec<SemanticConcept>| g.first().is_some_and(|sc| sc.element.is_property());
    let is_concept = |g: &Vec<SemanticConcept>| g.first().is_some_and(|sc| sc.element.is_concept());
    if is_property(&groups[n - 1]) && is_concept(&groups[n - 2]) && is_concept(&groups[n - 3]) {
        groups.swap(n - 1, n - 2);
    }
}

/// Interleave jokers so no two concepts or two properties touch, and tag
/// every interpretation with its positional variable.
pub fn add_jokers(groups: Vec<Vec<SemanticConcept>>) -> Vec<QueryItem> {
    fn is_property(group: &[SemanticConcept]) -> bool {
        group.first().is_some_and(|sc| sc.element.is_property())
    }
    let mut items = Vec::with_capacity(groups.len() * 2 + 1);

    if groups.first().is_some_and(|g| is_property(g)) {
        items.push(QueryItem::Joker {
            joker: Joker::new(&[Slot::Class, Slot::Instance, Slot::Literal], "first"),
        });
    }

    let mut prev_property: Option<bool> = None;
    let mut last_property = false;
    for (i, mut group) in groups.into_iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let property = is_property(&group);
        match (prev_property, property) {
            (Some(false), false) => items.push(QueryItem::Joker {
                joker: Joker::new(&[Slot::Property], format!("j{i}")),
            }),
            (Some(true), true) => items.push(QueryItem::Joker {
                joker: Joker::new(&[Slot::Class, Slot::Literal], format!("j{i}")),
            }),
            _ => {}
        }
        for sc in &mut group {
            sc.set_position(i);
        }
        items.push(QueryItem::Concepts { group });
        prev_property = Some(property);
        last_property = property;
    }

    if last_property {
        items.push(QueryItem::Joker {
            joker: Joker::new(&[Slot::Class, Slot::Instance, Slot::Literal], "last"),
        });
    }
    items
}

/// URIs a concrete neighbor offers for domain/range checks; `None` for jokers.
fn neighbor_uris(item: &QueryItem) -> Option<Vec<String>> {
    let sc = match item {
        QueryItem::Joker { .. } => return None,
        QueryItem::Concepts { group } => group.first()?,
    };
    let uris = match &sc.element.kind {
        ElementKind::Instance { uris, class_uris, .. } => {
            uris.iter().chain(class_uris).cloned().collect()
        }
        ElementKind::Entity { .. } => vec![sc.element.uri.clone()],
        _ => Vec::new(),
    };
    Some(uris)
}

/// Whether the property's subject follows it in linear order.
///
/// The left neighbor is domain-congruent unless the property has a domain,
/// the neighbor is concrete, offers none of the domain classes while the
/// right neighbor does. Range congruence mirrors that for the right side.
/// Next to a joker, the concrete side decides: a right neighbor that fits
/// the domain but not the range is the subject, and so is a left neighbor
/// that fits only the range.
pub fn is_property_reversed(
    property: &SemanticConcept,
    prev: Option<&QueryItem>,
    next: Option<&QueryItem>,
) -> bool {
    let Some(info) = property.element.property() else {
        return false;
    };
    let prev_uris = prev.and_then(neighbor_uris);
    let next_uris = next.and_then(neighbor_uris);
    let fits = |uris: &Option<Vec<String>>, classes: &[String]| {
        uris.as_ref()
            .is_some_and(|u| classes.iter().any(|c| u.contains(c)))
    };

    let domain_congruent = info.domain.is_empty()
        || prev_uris.is_none()
        || fits(&prev_uris, &info.domain)
        || !fits(&next_uris, &info.domain);
    let range_congruent = info.range.is_empty()
        || next_uris.is_none()
        || fits(&next_uris, &info.range)
        || !fits(&prev_uris, &info.range);

    let mut reversed = (!domain_congruent && !range_congruent)
        || (info.domain.is_empty() && !range_congruent)
        || (info.range.is_empty() && !domain_congruent);

    if !reversed && prev_uris.is_none() && next_uris.is_some() {
        reversed = !info.domain.is_empty()
            && fits(&next_uris, &info.domain)
            && !fits(&next_uris, &info.range);
    } else if !reversed && next_uris.is_none() && prev_uris.is_some() {
        reversed = !info.range.is_empty()
            && fits(&prev_uris, &info.range)
            && !fits(&prev_uris, &info.domain);
    }
    reversed
}

/// Set the `reversed` flag of every real property from its neighbors.
pub fn mark_reversed(items: &mut [QueryItem]) {
    let flags: Vec<Option<bool>> = (0..items.len())
        .map(|i| {
            let property = items[i].first().filter(|sc| sc.element.is_property())?;
            let prev = i.checked_sub(1).and_then(|p| items.get(p));
            Some(is_property_reversed(property, prev, items.get(i + 1)))
        })
        .collect();
    for (item, flag) in items.iter_mut().zip(flags) {
        let (Some(reversed), QueryItem::Concepts { group }) = (flag, item) else {
            continue;
        };
        for sc in group.iter_mut() {
            if let Some(info) = sc.element.property_mut() {
                info.reversed = reversed;
            }
        }
    }
}

/// Full preparation: arrange, insert jokers, infer property direction.
pub fn prepare_for_query(mut groups: Vec<Vec<SemanticConcept>>) -> Vec<QueryItem> {
    arrange_datatype_properties(&mut groups);
    arrange_last_property(&mut groups);
    let mut items = add_jokers(groups);
    mark_reversed(&mut items);
    tracing::debug!(items = items.len(), "query prepared");
    items
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Annotation, OntologyElement, PropertyInfo};
    use crate::nlp::tree::ParseTree;

    pub(crate) const GEO: &str = "http://example.org/geo#";

    fn annotation(start: usize, text: &str) -> Annotation {
        let tree = ParseTree::parse(&format!("(NN {text})")).unwrap();
        let mut a = Annotation::new(start, start, tree);
        a.text = text.to_string();
        a
    }

    pub(crate) fn instance(start: usize, name: &str, classes: &[&str]) -> Vec<SemanticConcept> {
        let classes = classes.iter().map(|c| format!("{GEO}{c}")).collect();
        let element =
            OntologyElement::instance(&annotation(start, name), &format!("{GEO}{name}"), classes, None);
        vec![SemanticConcept::new(element)]
    }

    pub(crate) fn class(start: usize, name: &str) -> Vec<SemanticConcept> {
        let element = OntologyElement::entity(&annotation(start, name), &format!("{GEO}{name}"), 1.0);
        vec![SemanticConcept::new(element)]
    }

    pub(crate) fn datatype(
        start: usize,
        name: &str,
        domain: &[&str],
        governor: Option<(usize, usize)>,
    ) -> Vec<SemanticConcept> {
        let info = PropertyInfo {
            domain: domain.iter().map(|c| format!("{GEO}{c}")).collect(),
            ..PropertyInfo::default()
        };
        let element = OntologyElement::datatype_property(
            &annotation(start, name),
            &format!("{GEO}{name}"),
            info,
            governor,
        );
        vec![SemanticConcept::new(element)]
    }

    pub(crate) fn object(start: usize, name: &str, domain: &[&str], range: &[&str]) -> Vec<SemanticConcept> {
        let info = PropertyInfo {
            domain: domain.iter().map(|c| format!("{GEO}{c}")).collect(),
            range: range.iter().map(|c| format!("{GEO}{c}")).collect(),
            ..PropertyInfo::default()
        };
        let element =
            OntologyElement::object_property(&annotation(start, name), &format!("{GEO}{name}"), info);
        vec![SemanticConcept::new(element)]
    }

    fn reversed(item: &QueryItem) -> bool {
        item.first()
            .and_then(|sc| sc.element.property())
            .is_some_and(|p| p.reversed)
    }

    #[test]
    fn trailing_property_gets_last_joker() {
        let groups = vec![
            instance(0, "Vienna", &["Capital", "City", "Place"]),
            datatype(1, "population", &["Place"], None),
        ];
        let items = prepare_for_query(groups);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].var(), "oc0");
        assert_eq!(items[1].var(), "oc1");
        let joker = items[2].joker().unwrap();
        assert_eq!(joker.id, "last");
        assert_eq!(joker.accepts, vec![Slot::Class, Slot::Instance, Slot::Literal]);
        assert!(!reversed(&items[1]));
    }

    #[test]
    fn leading_property_takes_subject_from_the_right() {
        let groups = vec![
            datatype(0, "population", &["Place"], None),
            instance(2, "Vienna", &["Capital", "City", "Place"]),
        ];
        let items = prepare_for_query(groups);
        assert_eq!(items[0].joker().unwrap().id, "first");
        assert!(reversed(&items[1]));
    }

    #[test]
    fn jokers_separate_like_neighbors() {
        let groups = vec![
            class(0, "City"),
            instance(1, "Austria", &["Country", "Place"]),
            datatype(2, "population", &["Place"], None),
            datatype(3, "length", &["River"], None),
        ];
        let items = add_jokers(groups);
        for pair in items.windows(2) {
            let both_properties = pair[0].is_real_property() && pair[1].is_real_property();
            let both_concepts = pair[0].is_real_concept() && pair[1].is_real_concept();
            assert!(!both_properties && !both_concepts, "{pair:?}");
        }
        let jokers: Vec<&Joker> = items.iter().filter_map(QueryItem::joker).collect();
        assert_eq!(jokers.len(), 3);
        assert_eq!(jokers[0].accepts, vec![Slot::Property]);
        assert_eq!(jokers[1].accepts, vec![Slot::Class, Slot::Literal]);
        assert_eq!(jokers[2].id, "last");
    }

    #[test]
    fn governed_property_moves_behind_its_governor() {
        let mut groups = vec![
            class(0, "City"),
            datatype(1, "population", &["Place"], Some((3, 3))),
            instance(3, "Vienna", &["Capital"]),
        ];
        arrange_datatype_properties(&mut groups);
        let order: Vec<&str> = groups.iter().map(|g| g[0].element.uri.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "http://example.org/geo#City",
                "http://example.org/geo#Vienna",
                "http://example.org/geo#population"
            ]
        );
    }

    #[test]
    fn trailing_property_moves_between_concepts() {
        let mut groups = vec![
            class(0, "City"),
            instance(1, "Austria", &["Country"]),
            object(2, "locatedIn", &["City"], &["Country"]),
        ];
        arrange_last_property(&mut groups);
        assert!(groups[1][0].element.is_property());
    }

    #[test]
    fn congruent_object_property_keeps_order() {
        let items = prepare_for_query(vec![
            class(0, "City"),
            object(1, "locatedIn", &["City"], &["Country"]),
            instance(2, "Austria", &["Country", "Place"]),
        ]);
        assert!(!reversed(&items[1]));

        let items = prepare_for_query(vec![
            instance(0, "Austria", &["Country", "Place"]),
            object(1, "locatedIn", &["City"], &["Country"]),
            class(2, "City"),
        ]);
        assert!(reversed(&items[1]));
    }

    #[test]
    fn none_choices_and_added_tasks() {
        let mut population = datatype(1, "population", &["Place"], None);
        let mut added = population[0].clone();
        added.element.added = true;
        added.task = Some("max".into());
        population.push(added);
        population.push(SemanticConcept::none(population[0].annotation()));

        let groups = vec![class(0, "City"), population, class(0, "City")];
        let prepared = concepts_for_query(&groups);
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[1].len(), 1);
        assert_eq!(prepared[1][0].task.as_deref(), Some("max"));
        assert!(!prepared[1][0].element.added);
    }

    #[test]
    fn vocabulary_does_not_break_namespace_agreement() {
        let mut label = datatype(1, "label", &[], None);
        label[0].element.uri = crate::ontology::RDFS_LABEL.into();
        let groups = vec![class(0, "City"), label];
        assert!(all_share_namespace(&groups));

        let mut foreign = class(2, "Thing");
        foreign[0].element.uri = "http://other.org/onto#Thing".into();
        let groups = vec![class(0, "City"), foreign];
        assert!(!all_share_namespace(&groups));
        assert_eq!(namespaces_of(&groups).len(), 2);
    }
}
