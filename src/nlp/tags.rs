//! Penn Treebank label sets and token tables used by the resolution pipeline.

/// Noun-like phrase and word labels that can carry a question focus.
pub const FOCUS_LABELS: &[&str] = &["NP", "NN", "NNP", "NNS", "NNPS", "NX", "WHNP"];

/// Noun word tags.
pub const NOUN_TAGS: &[&str] = &["NN", "NNS", "NNP", "NNPS"];

/// Plural noun tags; annotations over them are looked up in singular form first.
pub const PLURAL_TAGS: &[&str] = &["NNS", "NNPS"];

/// Adjectival material split out of mixed noun phrases.
pub const ADJECTIVE_TAGS: &[&str] = &["JJ", "VBN", "VBG", "RBS", "ADJP", "JJR", "JJS"];

/// Modifiers that make a datatype property eligible for quick aggregation votes.
pub const QUICK_MODIFIER_TAGS: &[&str] = &["JJ", "JJR", "JJS", "RBS", "RBR", "VBN", "VBG", "ADJP"];

/// Leading children stripped from POCs.
pub const USELESS_TAGS: &[&str] = &[
    "DT", "PDT", "PRP", "PRP$", "WP", "WP$", "WDT", "WRB", "EX", "IN", "TO", "CC", "POS", ".", ",",
];

/// Constituents that never become annotations on their own.
pub const CLAUSE_LABELS: &[&str] = &[
    "ROOT", "S", "SBAR", "SBARQ", "SQ", "SINV", "PP", "WHPP", "WHADVP", "WHADJP", "PRN", "FRAG",
];

/// Word tags that never become annotations on their own.
pub const FUNCTION_TAGS: &[&str] = &[
    "DT", "PDT", "PRP", "PRP$", "WP", "WP$", "WDT", "WRB", "EX", "IN", "TO", "CC", "POS", "MD",
    "UH", ".", ",", ":", "``", "''", "-LRB-", "-RRB-", "SYM",
];

/// Tokens ignored when consolidating phrases.
pub const TOKEN_IGNORE_CONSOLIDATION: &[&str] =
    &["how", "many", "what", "which", "list", "show", "give", "tell"];

/// Question openers that ask for the maximum-priority reading of the focus.
pub const MAX_PRIORITY_OPENERS: &[&str] =
    &["how", "where", "when", "since", "who", "list", "show", "tell"];

/// Focus phrases that only introduce a count or quantity.
pub const QUANTITY_PHRASES: &[&str] = &["the number", "the amount"];

/// Top labels of constituents that may hold a comparison.
pub const FILTER_TOP_LABELS: &[&str] = &["PP", "ADJP", "QP", "VP", "FRAG"];

/// Tags of comparator words ("more", "less", "over", "least").
pub const FILTER_COMPARATOR_TAGS: &[&str] = &["JJR", "RBR", "JJ", "IN", "JJS", "RBS", "RB"];

/// Tags of operand words.
pub const FILTER_OPERAND_TAGS: &[&str] = &["CD", "NNS", "NNP", "NNPS", "NN"];

pub const FILTER_CONJUNCTION_TAGS: &[&str] = &["CC"];

pub const GT_TOKENS: &[&str] = &[
    "more", "higher", "greater", "bigger", "larger", "older", "over", "exceeding", "after", "above",
];

pub const LT_TOKENS: &[&str] = &["lower", "less", "smaller", "younger", "fewer", "below", "before", "under"];

pub const EQ_TOKENS: &[&str] = &["same", "equal", "identical", "exactly"];

pub const SIM_TOKENS: &[&str] = &["approximate", "approximately", "around", "roughly", "about"];

/// "at least"
pub const GEQ_TOKENS: &[&str] = &["least"];

/// "at most"
pub const LEQ_TOKENS: &[&str] = &["most"];

pub const NEGATION_TOKENS: &[&str] = &["n't", "not", "no", "never"];

/// Irregular plurals the suffix rules cannot handle.
pub const HARD_LEMMAS: &[(&str, &str)] = &[
    ("people", "person"),
    ("men", "man"),
    ("women", "woman"),
    ("children", "child"),
    ("countries", "country"),
    ("cities", "city"),
    ("mice", "mouse"),
    ("feet", "foot"),
];

/// Whether a label belongs to a set, ignoring functional suffixes such as `NP-SBJ`.
pub fn has_label(label: &str, set: &[&str]) -> bool {
    let base = label.split(['-', '=']).next().unwrap_or(label);
    let base = if base.is_empty() { label } else { base };
    set.contains(&base)
}

/// Singular form of a plural noun.
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if let Some((_, lemma)) = HARD_LEMMAS.iter().find(|(plural, _)| *plural == lower) {
        return lemma.to_string();
    }
    if let Some(stem) = lower.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    for suffix in ["ches", "shes", "sses", "xes", "zes"] {
        if lower.ends_with(suffix) {
            return lower[..lower.len() - 2].to_string();
        }
    }
    if lower.ends_with('s') && !lower.ends_with("ss") && lower.len() > 3 {
        return lower[..lower.len() - 1].to_string();
    }
    lower
}
