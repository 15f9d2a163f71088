//! Restrictions extracted from comparative phrases ("more than 50").

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;

/// Comparison operator of a cardinal filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CardinalOp {
    Eq,
    Neq,
    Gt,
    Geq,
    Lt,
    Leq,
    /// Approximately equal, within a relative tolerance.
    Sim,
}

impl CardinalOp {
    /// Logical complement, used for negated phrases.
    pub fn negated(self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Gt => Self::Leq,
            Self::Geq => Self::Lt,
            Self::Lt => Self::Geq,
            Self::Leq => Self::Gt,
            Self::Sim => Self::Sim,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Geq => ">=",
            Self::Lt => "<",
            Self::Leq => "<=",
            Self::Sim => "~",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FilterKind {
    /// Textual restriction: the value must equal one of the operands.
    Generic,
    Cardinal { op: CardinalOp, tolerance: f64 },
}

/// A restriction phrase and the operands it compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// Constituent the filter was read from.
    pub annotation: Annotation,
    /// Offsets of the comparison itself; may be narrower than the annotation.
    pub start: usize,
    pub end: usize,
    pub operands: Vec<String>,
    #[serde(default)]
    pub negate: bool,
    pub kind: FilterKind,
}

impl QueryFilter {
    pub fn cardinal(
        annotation: Annotation,
        span: (usize, usize),
        op: CardinalOp,
        operands: Vec<String>,
        tolerance: f64,
    ) -> Self {
        Self {
            annotation,
            start: span.0,
            end: span.1,
            operands,
            negate: false,
            kind: FilterKind::Cardinal { op, tolerance },
        }
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn is_cardinal(&self) -> bool {
        matches!(self.kind, FilterKind::Cardinal { .. })
    }

    fn numeric_operands(&self) -> Vec<f64> {
        self.operands
            .iter()
            .filter_map(|o| parse_number(o))
            .collect()
    }

    /// Whether a numeric value satisfies the filter.
    pub fn assert_filter(&self, value: f64) -> bool {
        let result = match &self.kind {
            FilterKind::Generic => self
                .operands
                .iter()
                .any(|o| parse_number(o).is_some_and(|n| n == value)),
            FilterKind::Cardinal { op, tolerance } => {
                let operands = self.numeric_operands();
                let Some(&first) = operands.first() else {
                    return false;
                };
                match op {
                    CardinalOp::Eq => operands.iter().any(|&o| value == o),
                    CardinalOp::Neq => operands.iter().all(|&o| value != o),
                    CardinalOp::Gt => value > first,
                    CardinalOp::Geq => value >= first,
                    CardinalOp::Lt => value < first,
                    CardinalOp::Leq => value <= first,
                    CardinalOp::Sim => operands
                        .iter()
                        .any(|&o| (value - o).abs() <= tolerance * o.abs()),
                }
            }
        };
        result != self.negate
    }

    /// SPARQL boolean expression over the numeric term `value`, matching
    /// [`assert_filter`](Self::assert_filter). `None` for generic filters.
    pub fn sparql_condition(&self, value: &str) -> Option<String> {
        let FilterKind::Cardinal { op, tolerance } = &self.kind else {
            return None;
        };
        let operands: Vec<String> = self.numeric_operands().into_iter().map(number).collect();
        let condition = match (op, operands.first()) {
            (_, None) => "false".to_string(),
            (CardinalOp::Eq, _) => joined(&operands, " || ", |o| format!("{value} = {o}")),
            (CardinalOp::Neq, _) => joined(&operands, " && ", |o| format!("{value} != {o}")),
            (CardinalOp::Sim, _) => {
                let bounds: Vec<String> = self
                    .numeric_operands()
                    .into_iter()
                    .map(|o| format!("ABS({value} - {}) <= {}", number(o), number(tolerance * o.abs())))
                    .collect();
                bounds.join(" || ")
            }
            (op, Some(first)) => format!("{value} {} {first}", op.symbol()),
        };
        Some(if self.negate {
            format!("!({condition})")
        } else {
            condition
        })
    }

    /// Whether a bound value (text or number) satisfies the filter.
    pub fn assert_value(&self, value: &str) -> bool {
        if let Some(n) = parse_number(value) {
            return self.assert_filter(n);
        }
        match self.kind {
            FilterKind::Generic => {
                let hit = self
                    .operands
                    .iter()
                    .any(|o| o.eq_ignore_ascii_case(value.trim()));
                hit != self.negate
            }
            FilterKind::Cardinal { .. } => false,
        }
    }
}

fn joined(operands: &[String], separator: &str, term: impl Fn(&String) -> String) -> String {
    operands.iter().map(term).collect::<Vec<_>>().join(separator)
}

/// SPARQL numeric literal; negative values are parenthesized.
fn number(n: f64) -> String {
    if n < 0.0 { format!("({n})") } else { format!("{n}") }
}

/// Parse a number, tolerating thousands separators.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlp::tree::ParseTree;

    fn filter(op: CardinalOp, operands: &[&str]) -> QueryFilter {
        let annotation = Annotation::new(
            2,
            4,
            ParseTree::parse("(QP (JJR more) (IN than) (CD 50))").unwrap(),
        );
        QueryFilter::cardinal(
            annotation,
            (2, 4),
            op,
            operands.iter().map(|s| s.to_string()).collect(),
            0.1,
        )
    }

    #[test]
    fn geq_includes_boundary() {
        let f = filter(CardinalOp::Geq, &["50"]);
        assert!(f.assert_filter(50.0));
        assert!(!f.assert_filter(49.9));
        assert!(f.assert_filter(1_000.0));
    }

    #[test]
    fn negation_inverts() {
        let mut f = filter(CardinalOp::Gt, &["50"]);
        f.negate = true;
        assert!(f.assert_filter(50.0));
        assert!(!f.assert_filter(51.0));
    }

    #[test]
    fn similarity_uses_relative_tolerance() {
        let f = filter(CardinalOp::Sim, &["100"]);
        assert!(f.assert_filter(95.0));
        assert!(f.assert_filter(110.0));
        assert!(!f.assert_filter(111.0));
    }

    #[test]
    fn text_values_and_separators() {
        let f = filter(CardinalOp::Lt, &["1,000"]);
        assert!(f.assert_value("999"));
        assert!(!f.assert_value("1,500"));
        assert!(!f.assert_value("Vienna"));
        assert!(!filter(CardinalOp::Eq, &["many"]).assert_filter(3.0));
    }

    #[test]
    fn sparql_conditions() {
        assert_eq!(
            filter(CardinalOp::Lt, &["300,000"]).sparql_condition("?v").as_deref(),
            Some("?v < 300000")
        );
        assert_eq!(
            filter(CardinalOp::Eq, &["1", "2"]).sparql_condition("?v").as_deref(),
            Some("?v = 1 || ?v = 2")
        );
        let mut negated = filter(CardinalOp::Geq, &["-5"]);
        negated.negate = true;
        assert_eq!(negated.sparql_condition("?v").as_deref(), Some("!(?v >= (-5))"));
        assert_eq!(filter(CardinalOp::Gt, &["many"]).sparql_condition("?v").as_deref(), Some("false"));

        let mut generic = filter(CardinalOp::Eq, &["Vienna"]);
        generic.kind = FilterKind::Generic;
        assert!(generic.sparql_condition("?v").is_none());
    }

    #[test]
    fn complement_operators() {
        assert_eq!(CardinalOp::Gt.negated(), CardinalOp::Leq);
        assert_eq!(CardinalOp::Leq.negated().negated(), CardinalOp::Leq);
    }
}
