//! Element builder: grounded annotations to overlap groups of semantic concepts.
//!
//! Every annotation yields one element per resource kind it matched. Elements
//! of annotations that contain one another are clustered, then split again by
//! matched text so distinct synonym hits of one span never merge. Instances of
//! the same class set inside a group collapse into one element.

use crate::model::annotation::quick_norm;
use crate::model::{
    Annotation, ElementKind, OntologyElement, PropertyInfo, Query, ResourceKind, SemanticConcept,
};

/// For each annotation that is not contained in an earlier one, the indices
/// of the annotations it contains.
///
/// Annotations with an identical span cluster with the first of them.
/// Unrelated annotations get an empty entry so none are lost.
pub fn overlapped_annotations(annotations: &[Annotation]) -> Vec<(usize, Vec<usize>)> {
    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut added = vec![false; annotations.len()];

    for i in 0..annotations.len() {
        let first = &annotations[i];
        for j in i + 1..annotations.len() {
            let second = &annotations[j];
            let pair = if first.overlaps(second) || first.span() == second.span() {
                Some((i, j))
            } else if second.overlaps(first) {
                Some((j, i))
            } else {
                None
            };
            let Some((outer, inner)) = pair else {
                continue;
            };
            if added[inner] {
                continue;
            }
            match groups.iter_mut().find(|(o, _)| *o == outer) {
                Some((_, inners)) => inners.push(inner),
                None => groups.push((outer, vec![inner])),
            }
            added[outer] = true;
            added[inner] = true;
        }
        if !added[i] {
            groups.push((i, Vec::new()));
        }
    }
    groups
}

/// Elements for every kind an annotation matched, plus user-label literals.
pub fn annotation_to_elements(annotation: &Annotation, user_labels: &[String]) -> Vec<OntologyElement> {
    let mut elements = Vec::new();
    let extra = &annotation.extra;

    for (kind, uri) in &annotation.oc_types {
        match kind {
            ResourceKind::Class => {
                elements.push(OntologyElement::entity(annotation, uri, extra.class_specificity));
            }
            ResourceKind::Individual => {
                if extra.class_uris.is_empty() {
                    tracing::warn!(instance = %uri, "orphan instance without classes");
                }
                elements.push(OntologyElement::instance(
                    annotation,
                    uri,
                    extra.class_uris.clone(),
                    extra.direct_class_uri.clone(),
                ));
            }
            ResourceKind::ObjectProperty | ResourceKind::DatatypeProperty => {
                let property = PropertyInfo {
                    domain: extra.domain.clone(),
                    range: extra.range.clone(),
                    specificity: extra.property_specificity,
                    distance_score: extra.property_distance,
                    reversed: false,
                };
                let element = if *kind == ResourceKind::ObjectProperty {
                    OntologyElement::object_property(annotation, uri, property)
                } else {
                    OntologyElement::datatype_property(annotation, uri, property, extra.governor)
                };
                elements.push(element);
            }
            ResourceKind::Literal => {
                // one literal element per property the value occurs under
                let mut by_property: Vec<(&str, Vec<&str>)> = Vec::new();
                for [subject, property, _] in &extra.triples {
                    match by_property.iter_mut().find(|(p, _)| *p == property.as_str()) {
                        Some((_, subjects)) => subjects.push(subject.as_str()),
                        None => by_property.push((property.as_str(), vec![subject.as_str()])),
                    }
                }
                for (property, subjects) in by_property {
                    let triples = subjects
                        .into_iter()
                        .map(|s| [s.to_string(), property.to_string(), uri.clone()])
                        .collect();
                    elements.push(OntologyElement::literal(annotation, uri, triples, false));
                }
            }
        }
    }

    elements.extend(user_label_elements(annotation, user_labels));
    elements
}

/// Literal elements for session labels equal to the annotation's text.
///
/// A declared label may list alternatives separated by `;` or `,`.
pub fn user_label_elements(annotation: &Annotation, user_labels: &[String]) -> Vec<OntologyElement> {
    let text = quick_norm(&annotation.raw_text);
    if text.is_empty() {
        return Vec::new();
    }
    let mut candidates: Vec<&str> = Vec::new();
    for label in user_labels {
        candidates.push(label.as_str());
        candidates.extend(label.split([';', ',']).map(str::trim).filter(|l| !l.is_empty()));
    }
    let mut seen: Vec<&str> = Vec::new();
    let mut elements = Vec::new();
    for label in candidates {
        if quick_norm(label) == text && !seen.contains(&label) {
            seen.push(label);
            elements.push(OntologyElement::literal(annotation, label, Vec::new(), true));
        }
    }
    elements
}

/// Split each cluster by matched text, keeping first-seen order.
pub fn group_by_text(clusters: Vec<Vec<OntologyElement>>) -> Vec<Vec<OntologyElement>> {
    let mut out = Vec::new();
    for cluster in clusters {
        let mut by_text: Vec<(String, Vec<OntologyElement>)> = Vec::new();
        for element in cluster {
            let text = element.annotation.text.clone();
            match by_text.iter_mut().find(|(t, _)| *t == text) {
                Some((_, group)) => group.push(element),
                None => by_text.push((text, vec![element])),
            }
        }
        out.extend(by_text.into_iter().map(|(_, group)| group));
    }
    out
}

/// Collapse instances with an identical class set into one element per group.
pub fn group_instances_of_same_class(groups: Vec<Vec<OntologyElement>>) -> Vec<Vec<OntologyElement>> {
    groups
        .into_iter()
        .map(|group| {
            let mut grouped: Vec<OntologyElement> = Vec::new();
            for element in group {
                let ElementKind::Instance { class_uris, .. } = &element.kind else {
                    grouped.push(element);
                    continue;
                };
                let sibling = grouped.iter().position(|g| {
                    matches!(&g.kind, ElementKind::Instance { class_uris: other, .. } if other == class_uris)
                });
                match sibling {
                    Some(idx) => {
                        if let ElementKind::Instance { uris, .. } = &mut grouped[idx].kind {
                            if !uris.contains(&element.uri) {
                                uris.push(element.uri.clone());
                            }
                        }
                    }
                    None => grouped.push(element),
                }
            }
            grouped
        })
        .collect()
}

/// Append one explicit "none of these" concept to every non-empty group.
pub fn append_none_elements(groups: &mut [Vec<SemanticConcept>]) {
    for group in groups.iter_mut() {
        let has_none = group.iter().any(SemanticConcept::is_none);
        if let Some(first) = group.iter().find(|sc| !sc.is_none()) {
            if !has_none {
                let none = SemanticConcept::none(first.annotation());
                group.push(none);
            }
        }
    }
}

/// Order of overlap groups: start ascending, then end ascending.
pub fn compare_groups(a: &[SemanticConcept], b: &[SemanticConcept]) -> std::cmp::Ordering {
    match (a.first(), b.first()) {
        (Some(x), Some(y)) => x.span().cmp(&y.span()),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// Overlap groups of semantic concepts for offset-sorted annotations.
pub fn semantic_concepts(
    annotations: &[Annotation],
    user_labels: &[String],
    add_none: bool,
) -> Vec<Vec<SemanticConcept>> {
    let clusters: Vec<Vec<OntologyElement>> = overlapped_annotations(annotations)
        .into_iter()
        .map(|(outer, inners)| {
            std::iter::once(outer)
                .chain(inners)
                .flat_map(|i| annotation_to_elements(&annotations[i], user_labels))
                .collect()
        })
        .collect();

    let mut groups: Vec<Vec<SemanticConcept>> = group_instances_of_same_class(group_by_text(clusters))
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| g.into_iter().map(SemanticConcept::new).collect())
        .collect();
    groups.sort_by(|a, b| compare_groups(a, b));
    if add_none {
        append_none_elements(&mut groups);
    }
    groups
}

/// Replace the query's overlap groups with those built from its annotations.
pub fn add_semantic_concepts(query: &mut Query) {
    query.semantic_concepts = semantic_concepts(&query.annotations, &query.user_labels, false);
    tracing::debug!(groups = query.semantic_concepts.len(), "semantic concepts built");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::tree::ParseTree;

    const GEO: &str = "http://example.org/geo#";

    fn ann(start: usize, end: usize, words: &str) -> Annotation {
        let leaves: Vec<String> = words.split(' ').map(|w| format!("(NN {w})")).collect();
        let tree = ParseTree::parse(&format!("(NP {})", leaves.join(" "))).unwrap();
        Annotation::new(start, end, tree)
    }

    fn with(mut a: Annotation, kind: ResourceKind, local: &str) -> Annotation {
        a.oc_types.insert(kind, format!("{GEO}{local}"));
        a
    }

    #[test]
    fn unrelated_annotations_keep_empty_entries() {
        let anns = vec![ann(0, 0, "city"), ann(2, 2, "river")];
        assert_eq!(overlapped_annotations(&anns), vec![(0, vec![]), (1, vec![])]);
    }

    #[test]
    fn containing_annotations_collect_contained_ones() {
        let anns = vec![ann(0, 2, "the capital city"), ann(1, 1, "capital"), ann(3, 3, "river")];
        assert_eq!(overlapped_annotations(&anns), vec![(0, vec![1]), (2, vec![])]);
    }

    #[test]
    fn elements_per_kind_carry_side_info() {
        let mut a = with(ann(0, 0, "population"), ResourceKind::DatatypeProperty, "population");
        a.extra.domain = vec![format!("{GEO}Place")];
        a.extra.governor = Some((2, 2));
        let a = with(a, ResourceKind::Class, "Population");
        let elements = annotation_to_elements(&a, &[]);
        assert_eq!(elements.len(), 2);
        assert!(elements[0].is_entity());
        assert_eq!(elements[1].governor(), Some((2, 2)));
        assert_eq!(elements[1].property().unwrap().domain, vec![format!("{GEO}Place")]);
    }

    #[test]
    fn literals_split_by_property() {
        let mut a = ann(0, 0, "2850");
        a.oc_types.insert(ResourceKind::Literal, "2850".into());
        a.extra.triples = vec![
            [format!("{GEO}Danube"), format!("{GEO}length"), "2850".into()],
            [format!("{GEO}Inn"), format!("{GEO}length"), "2850".into()],
            [format!("{GEO}Tower"), format!("{GEO}height"), "2850".into()],
        ];
        let elements = annotation_to_elements(&a, &[]);
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].triples().len(), 2);
        assert_eq!(elements[1].triples()[0][1], format!("{GEO}height"));
    }

    #[test]
    fn user_labels_become_literals() {
        let a = ann(0, 1, "upper austria");
        let labels = vec!["North; Upper Austria".to_string()];
        let elements = annotation_to_elements(&a, &labels);
        assert_eq!(elements.len(), 1);
        assert!(elements[0].is_literal());
        assert_eq!(elements[0].uri, "Upper Austria");
    }

    #[test]
    fn same_span_instances_of_one_class_merge() {
        let mut paris = with(ann(0, 0, "paris"), ResourceKind::Individual, "ParisFR");
        paris.extra.class_uris = vec![format!("{GEO}City")];
        let mut other = with(ann(0, 0, "paris"), ResourceKind::Individual, "ParisTX");
        other.extra.class_uris = vec![format!("{GEO}City")];
        let groups = semantic_concepts(&[paris, other], &[], false);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 1);
        assert_eq!(groups[0][0].element.uris().len(), 2);
        assert_eq!(groups[0][0].element.print_uri(), format!("{GEO}ParisFR"));
    }

    #[test]
    fn groups_split_by_text_and_sort_by_offset() {
        let river = with(ann(3, 3, "river"), ResourceKind::Class, "River");
        let capital = with(ann(1, 1, "capital"), ResourceKind::Class, "Capital");
        let mut whole = with(ann(0, 2, "the capital city"), ResourceKind::Class, "Capital");
        whole.text = "capital city".into();
        let mut anns = vec![river, capital, whole];
        anns.sort_by(crate::model::annotation::compare_offsets);
        let groups = semantic_concepts(&anns, &[], true);
        let spans: Vec<(usize, usize)> = groups.iter().map(|g| g[0].span()).collect();
        assert_eq!(spans, vec![(0, 2), (1, 1), (3, 3)]);
        for group in &groups {
            assert_eq!(group.len(), 2);
            assert!(group.last().unwrap().is_none());
        }
    }
}
