//! Lexical synonyms used for lookup fallback and candidate ranking.
//!
//! A static table of synonym sets covers vocabulary that shows up in
//! questions about places, people and quantities. Sessions can extend it
//! with their own sets.

use std::collections::HashMap;

use crate::model::annotation::quick_norm;

/// Source of synonyms for a word or phrase.
pub trait SynonymSource {
    /// Synonyms of `text`, most common first, never including `text` itself.
    fn synonyms(&self, text: &str) -> Vec<String>;
}

/// A set of interchangeable surface forms.
pub struct SynonymSet {
    pub terms: &'static [&'static str],
}

/// The static synonym table.
pub static SYNONYM_SETS: &[SynonymSet] = &[
    // Places
    SynonymSet { terms: &["city", "town", "municipality", "metropolis"] },
    SynonymSet { terms: &["country", "nation", "state", "land"] },
    SynonymSet { terms: &["capital", "capital city", "seat of government"] },
    SynonymSet { terms: &["river", "stream", "waterway"] },
    SynonymSet { terms: &["mountain", "peak", "mount"] },
    SynonymSet { terms: &["lake", "pond", "reservoir"] },
    SynonymSet { terms: &["region", "area", "district", "province"] },
    SynonymSet { terms: &["place", "location", "site"] },
    // Quantities
    SynonymSet { terms: &["population", "inhabitants", "residents", "people"] },
    SynonymSet { terms: &["length", "extent", "distance"] },
    SynonymSet { terms: &["height", "elevation", "altitude"] },
    SynonymSet { terms: &["area", "size", "surface"] },
    SynonymSet { terms: &["number", "count", "amount", "quantity"] },
    SynonymSet { terms: &["price", "cost", "value"] },
    SynonymSet { terms: &["age", "years"] },
    // People
    SynonymSet { terms: &["person", "people", "individual", "human"] },
    SynonymSet { terms: &["man", "men", "male"] },
    SynonymSet { terms: &["woman", "women", "female"] },
    SynonymSet { terms: &["child", "children", "kid", "kids"] },
    SynonymSet { terms: &["author", "writer"] },
    SynonymSet { terms: &["founder", "creator"] },
    SynonymSet { terms: &["leader", "head", "chief"] },
    // Relations
    SynonymSet { terms: &["located in", "situated in", "lies in", "in"] },
    SynonymSet { terms: &["flows through", "runs through", "crosses"] },
    SynonymSet { terms: &["born", "birth", "birthplace"] },
    SynonymSet { terms: &["name", "label", "title"] },
    // Aggregates
    SynonymSet { terms: &["highest", "largest", "biggest", "greatest", "maximum"] },
    SynonymSet { terms: &["lowest", "smallest", "least", "minimum"] },
    SynonymSet { terms: &["average", "mean"] },
    SynonymSet { terms: &["total", "sum", "overall"] },
    // Exonyms
    SynonymSet { terms: &["vienna", "wien"] },
    SynonymSet { terms: &["munich", "münchen"] },
    SynonymSet { terms: &["danube", "donau"] },
];

/// Synonyms from [`SYNONYM_SETS`] plus session-provided sets.
#[derive(Debug, Clone, Default)]
pub struct StaticSynonyms {
    extra: HashMap<String, Vec<String>>,
}

impl StaticSynonyms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional set of interchangeable terms.
    pub fn add_set(&mut self, terms: &[&str]) {
        let normalized: Vec<String> = terms.iter().map(|t| quick_norm(t)).collect();
        for term in &normalized {
            let entry = self.extra.entry(term.clone()).or_default();
            for other in &normalized {
                if other != term && !entry.contains(other) {
                    entry.push(other.clone());
                }
            }
        }
    }
}

impl SynonymSource for StaticSynonyms {
    fn synonyms(&self, text: &str) -> Vec<String> {
        let norm = quick_norm(text);
        let mut out: Vec<String> = Vec::new();
        if let Some(extra) = self.extra.get(&norm) {
            out.extend(extra.iter().cloned());
        }
        for set in SYNONYM_SETS {
            if set.terms.contains(&norm.as_str()) {
                for term in set.terms {
                    if *term != norm && !out.iter().any(|o| o == term) {
                        out.push(term.to_string());
                    }
                }
            }
        }
        out
    }
}
