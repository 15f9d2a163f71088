//! String similarity used to rank dialog candidates.
//!
//! The vote score blends four signals: Monge-Elkan similarity between phrase
//! and candidate label, Jaro-Winkler between their Soundex codes, and the
//! mean similarity of each side's synonyms to the other side.

use crate::config::DialogConfig;
use crate::model::annotation::quick_norm;
use crate::ontology::SynonymSource;

/// Jaro-Winkler similarity in `[0, 1]`.
pub fn jaro_winkler(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b)
}

/// Monge-Elkan similarity: for each token of `a`, the best Jaro-Winkler match
/// among the tokens of `b`, averaged.
pub fn monge_elkan(a: &str, b: &str) -> f64 {
    let left: Vec<&str> = a.split_whitespace().collect();
    let right: Vec<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let total: f64 = left
        .iter()
        .map(|l| {
            right
                .iter()
                .map(|r| jaro_winkler(l, r))
                .fold(0.0, f64::max)
        })
        .sum();
    total / left.len() as f64
}

/// American Soundex code (letter plus three digits) of the letters in `text`.
///
/// Empty when `text` has no ASCII letters.
pub fn soundex(text: &str) -> String {
    fn code(c: char) -> Option<char> {
        match c {
            'b' | 'f' | 'p' | 'v' => Some('1'),
            'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z' => Some('2'),
            'd' | 't' => Some('3'),
            'l' => Some('4'),
            'm' | 'n' => Some('5'),
            'r' => Some('6'),
            _ => None,
        }
    }

    let mut letters = text
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_lowercase());
    let Some(first) = letters.next() else {
        return String::new();
    };
    let mut out = String::with_capacity(4);
    out.push(first.to_ascii_uppercase());
    let mut last = code(first);
    for c in letters {
        let current = code(c);
        if current.is_some() && current != last {
            if let Some(digit) = current {
                out.push(digit);
            }
            if out.len() == 4 {
                break;
            }
        }
        // h and w do not separate letters with the same code
        if c != 'h' && c != 'w' {
            last = current;
        }
    }
    while out.len() < 4 {
        out.push('0');
    }
    out
}

/// Jaro-Winkler between Soundex codes, with scores at or below `floor` clamped to zero.
///
/// Zero-padded codes of unrelated words share trailing zeros, so weak
/// matches are discarded rather than rewarded.
pub fn phonetic_similarity(a: &str, b: &str, floor: f64) -> f64 {
    let (a, b) = (quick_norm(a), quick_norm(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let (code_a, code_b) = (soundex(&a), soundex(&b));
    if code_a.is_empty() || code_b.is_empty() {
        return 0.0;
    }
    let similarity = jaro_winkler(&code_a, &code_b);
    if similarity <= floor { 0.0 } else { similarity }
}

/// Mean Monge-Elkan similarity of each term against `target`; zero when there are no terms.
fn mean_similarity(terms: &[String], target: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    terms.iter().map(|t| monge_elkan(t, target)).sum::<f64>() / terms.len() as f64
}

/// Weighted ranking score between a phrase and a candidate label.
pub struct Scorer<'a> {
    synonyms: &'a dyn SynonymSource,
    config: &'a DialogConfig,
}

impl<'a> Scorer<'a> {
    pub fn new(synonyms: &'a dyn SynonymSource, config: &'a DialogConfig) -> Self {
        Self { synonyms, config }
    }

    fn capped_synonyms(&self, text: &str) -> Vec<String> {
        let mut synonyms = self.synonyms.synonyms(text);
        synonyms.truncate(self.config.max_synonyms);
        synonyms
    }

    pub fn score(&self, text: &str, label: &str) -> f64 {
        let (text, label) = (quick_norm(text), quick_norm(label));
        let w = &self.config.weights;
        let main = monge_elkan(&text, &label);
        let phonetic = phonetic_similarity(&text, &label, self.config.phonetic_floor);
        let label_synonyms = mean_similarity(&self.capped_synonyms(&label), &text);
        let text_synonyms = mean_similarity(&self.capped_synonyms(&text), &label);
        w.main * main
            + w.phonetic * phonetic
            + w.label_synonyms * label_synonyms
            + w.text_synonyms * text_synonyms
    }

    /// Best score over several labels of one candidate.
    pub fn best_score(&self, text: &str, labels: &[String]) -> f64 {
        labels
            .iter()
            .map(|label| self.score(text, label))
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::StaticSynonyms;

    #[test]
    fn soundex_codes() {
        assert_eq!(soundex("Robert"), "R163");
        assert_eq!(soundex("Rupert"), "R163");
        assert_eq!(soundex("Ashcraft"), "A261");
        assert_eq!(soundex("Tymczak"), "T522");
        assert_eq!(soundex("Pfister"), "P236");
        assert_eq!(soundex("Lee"), "L000");
        assert_eq!(soundex("42"), "");
    }

    #[test]
    fn identical_words_are_phonetically_identical() {
        for word in ["city", "population", "Danube", "42"] {
            assert_eq!(phonetic_similarity(word, word, 0.5), 1.0);
        }
    }

    #[test]
    fn weak_phonetic_matches_are_clamped() {
        assert_eq!(phonetic_similarity("lake", "mountain", 0.5), 0.0);
        // L000 and M000 agree only on padding, which still clears a 0.5 floor
        assert!(phonetic_similarity("lee", "mao", 0.5) > 0.5);
        assert_eq!(phonetic_similarity("lee", "mao", 0.9), 0.0);
    }

    #[test]
    fn monge_elkan_rewards_token_overlap() {
        assert_eq!(monge_elkan("city", "city"), 1.0);
        assert!(monge_elkan("capital city", "city") > monge_elkan("capital city", "river"));
        assert_eq!(monge_elkan("", "city"), 0.0);
    }

    #[test]
    fn exact_label_outranks_unrelated_label() {
        let syn = StaticSynonyms::new();
        let config = DialogConfig::default();
        let scorer = Scorer::new(&syn, &config);
        let exact = scorer.score("City", "city");
        let unrelated = scorer.score("city", "length");
        assert!(exact > 0.6);
        assert!(exact > unrelated, "{exact} <= {unrelated}");
        let best = scorer.best_score("largest", &["population".into(), "length".into()]);
        assert!(best > 0.0);
    }
}
