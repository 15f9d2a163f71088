//! Immutable constituency parse trees stored as a node arena.
//!
//! Nodes are laid out in preorder and addressed by [`NodeId`]. Every node
//! records the inclusive range of leaf (token) offsets it covers, so span
//! lookups and tree-path distances need no traversal. Trees are never edited
//! in place: [`ParseTree::without_leaves`] and [`ParseTree::from_children`]
//! build new arenas from index ranges of existing ones.
//!
//! Trees serialize as Penn Treebank bracket strings:
//!
//! ```text
//! (ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN population)) (PP (IN of) (NP (NNP Vienna)))))))
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TreeError, TreeResult};

/// Index of a node within one [`ParseTree`].
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Node {
    label: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    first_leaf: usize,
    last_leaf: usize,
    depth: usize,
}

/// An immutable constituency tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseTree {
    nodes: Vec<Node>,
}

/// Recursive form used while building or rewriting arenas.
#[derive(Debug, Clone)]
enum Shape {
    Leaf(String),
    Node(String, Vec<Shape>),
}

impl ParseTree {
    /// Parse a Penn Treebank bracket string.
    pub fn parse(input: &str) -> TreeResult<Self> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return Err(TreeError::Empty);
        }
        let mut pos = 0;
        let shape = parse_shape(&tokens, &mut pos)?;
        if let Some((offset, _)) = tokens.get(pos) {
            return Err(TreeError::Malformed {
                position: *offset,
                message: "trailing input after the root constituent".into(),
            });
        }
        Ok(Self::from_shape(&shape))
    }

    /// Build a tree whose root carries `label` and whose children are copies of `children`.
    pub fn from_children(label: &str, children: &[ParseTree]) -> Self {
        let shapes = children.iter().map(|c| c.shape(c.root())).collect();
        Self::from_shape(&Shape::Node(label.to_string(), shapes))
    }

    /// A single preterminal tree `(tag word)`.
    pub fn preterminal(tag: &str, word: &str) -> Self {
        Self::from_shape(&Shape::Node(
            tag.to_string(),
            vec![Shape::Leaf(word.to_string())],
        ))
    }

    fn from_shape(shape: &Shape) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        let mut leaf_counter = 0;
        tree.push_shape(shape, None, 0, &mut leaf_counter);
        tree
    }

    fn push_shape(
        &mut self,
        shape: &Shape,
        parent: Option<NodeId>,
        depth: usize,
        leaf_counter: &mut usize,
    ) -> NodeId {
        let id = self.nodes.len();
        let label = match shape {
            Shape::Leaf(word) => word.clone(),
            Shape::Node(label, _) => label.clone(),
        };
        self.nodes.push(Node {
            label,
            children: Vec::new(),
            parent,
            first_leaf: *leaf_counter,
            last_leaf: *leaf_counter,
            depth,
        });
        match shape {
            Shape::Leaf(_) => {
                *leaf_counter += 1;
            }
            Shape::Node(_, children) => {
                for child in children {
                    let child_id = self.push_shape(child, Some(id), depth + 1, leaf_counter);
                    self.nodes[id].children.push(child_id);
                }
                let first = self.nodes[id].first_leaf;
                self.nodes[id].last_leaf = leaf_counter.saturating_sub(1).max(first);
            }
        }
        id
    }

    fn shape(&self, id: NodeId) -> Shape {
        let node = &self.nodes[id];
        if node.children.is_empty() {
            Shape::Leaf(node.label.clone())
        } else {
            Shape::Node(
                node.label.clone(),
                node.children.iter().map(|&c| self.shape(c)).collect(),
            )
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Label of the root node.
    pub fn root_label(&self) -> &str {
        self.label(self.root())
    }

    /// Phrase label for internal nodes, the token itself for leaves.
    pub fn label(&self, id: NodeId) -> &str {
        &self.nodes[id].label
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.nodes[id].depth
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id].children.is_empty()
    }

    /// A node whose only child is a token.
    pub fn is_preterminal(&self, id: NodeId) -> bool {
        let children = &self.nodes[id].children;
        children.len() == 1 && self.is_leaf(children[0])
    }

    /// A node whose children are all preterminals.
    pub fn is_prepreterminal(&self, id: NodeId) -> bool {
        let children = &self.nodes[id].children;
        !children.is_empty() && children.iter().all(|&c| self.is_preterminal(c))
    }

    /// Inclusive leaf offsets covered by a node.
    pub fn span(&self, id: NodeId) -> (usize, usize) {
        let node = &self.nodes[id];
        (node.first_leaf, node.last_leaf)
    }

    /// Height of a subtree: leaves have height 1.
    pub fn height(&self, id: NodeId) -> usize {
        1 + self.nodes[id]
            .children
            .iter()
            .map(|&c| self.height(c))
            .max()
            .unwrap_or(0)
    }

    /// All node ids below `id` (inclusive) in preorder.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n].children.iter().rev());
        }
        out
    }

    /// Tokens of the whole tree.
    pub fn leaves(&self) -> Vec<&str> {
        self.leaves_of(self.root())
    }

    pub fn leaves_of(&self, id: NodeId) -> Vec<&str> {
        self.preorder(id)
            .into_iter()
            .filter(|&n| self.is_leaf(n))
            .map(|n| self.label(n))
            .collect()
    }

    pub fn leaf_count(&self) -> usize {
        if self.nodes.is_empty() {
            0
        } else {
            self.nodes[0].last_leaf + 1
        }
    }

    /// Space-joined tokens below a node.
    pub fn text_of(&self, id: NodeId) -> String {
        self.leaves_of(id).join(" ")
    }

    pub fn text(&self) -> String {
        self.text_of(self.root())
    }

    /// Preterminal nodes below `id` in token order.
    pub fn preterminals(&self, id: NodeId) -> Vec<NodeId> {
        self.preorder(id)
            .into_iter()
            .filter(|&n| self.is_preterminal(n))
            .collect()
    }

    /// `(token, POS tag)` pairs for the whole tree.
    pub fn tagged_words(&self) -> Vec<(&str, &str)> {
        self.preterminals(self.root())
            .into_iter()
            .map(|n| (self.label(self.nodes[n].children[0]), self.label(n)))
            .collect()
    }

    /// POS tags of the whole tree in token order.
    pub fn pos_tags(&self) -> Vec<&str> {
        self.tagged_words().into_iter().map(|(_, tag)| tag).collect()
    }

    /// Whether any node below `id` carries one of the labels.
    pub fn contains_label(&self, id: NodeId, labels: &[&str]) -> bool {
        self.preorder(id)
            .into_iter()
            .any(|n| !self.is_leaf(n) && labels.contains(&self.label(n)))
    }

    /// Copy of the subtree rooted at `id`.
    pub fn subtree(&self, id: NodeId) -> TreeResult<ParseTree> {
        if id >= self.nodes.len() {
            return Err(TreeError::NodeOutOfRange {
                id,
                len: self.nodes.len(),
            });
        }
        Ok(Self::from_shape(&self.shape(id)))
    }

    /// Copies of the root's child subtrees.
    pub fn child_trees(&self) -> Vec<ParseTree> {
        self.children(self.root())
            .iter()
            .map(|&c| Self::from_shape(&self.shape(c)))
            .collect()
    }

    /// Lowest node whose span contains `[start, end]`.
    pub fn covering_node(&self, start: usize, end: usize) -> NodeId {
        let mut current = self.root();
        'descend: loop {
            for &child in &self.nodes[current].children {
                let (first, last) = self.span(child);
                if first <= start && end <= last && !self.is_leaf(child) {
                    current = child;
                    continue 'descend;
                }
            }
            return current;
        }
    }

    /// Lowest common ancestor of two nodes.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let (mut a, mut b) = (a, b);
        while self.depth(a) > self.depth(b) {
            a = self.nodes[a].parent.unwrap_or(a);
        }
        while self.depth(b) > self.depth(a) {
            b = self.nodes[b].parent.unwrap_or(b);
        }
        while a != b {
            match (self.nodes[a].parent, self.nodes[b].parent) {
                (Some(pa), Some(pb)) => {
                    a = pa;
                    b = pb;
                }
                _ => return self.root(),
            }
        }
        a
    }

    /// Number of edges on the path between two nodes.
    pub fn path_length(&self, a: NodeId, b: NodeId) -> usize {
        let lca = self.common_ancestor(a, b);
        self.depth(a) + self.depth(b) - 2 * self.depth(lca)
    }

    /// Tree-path distance between the constituents covering two token spans.
    pub fn span_distance(&self, a: (usize, usize), b: (usize, usize)) -> usize {
        if self.is_empty() {
            return 0;
        }
        let last = self.leaf_count().saturating_sub(1);
        let clamp = |(s, e): (usize, usize)| (s.min(last), e.min(last));
        let (a, b) = (clamp(a), clamp(b));
        self.path_length(self.covering_node(a.0, a.1), self.covering_node(b.0, b.1))
    }

    /// New tree with the tokens at local offsets `[start, end]` removed.
    ///
    /// Constituents left without children are pruned. Returns `None` when
    /// nothing remains.
    pub fn without_leaves(&self, start: usize, end: usize) -> Option<ParseTree> {
        let mut counter = 0;
        self.prune(self.root(), start, end, &mut counter)
            .map(|shape| Self::from_shape(&shape))
    }

    fn prune(&self, id: NodeId, start: usize, end: usize, counter: &mut usize) -> Option<Shape> {
        let node = &self.nodes[id];
        if node.children.is_empty() {
            let index = *counter;
            *counter += 1;
            return if index >= start && index <= end {
                None
            } else {
                Some(Shape::Leaf(node.label.clone()))
            };
        }
        let kept: Vec<Shape> = node
            .children
            .iter()
            .filter_map(|&c| self.prune(c, start, end, counter))
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(Shape::Node(node.label.clone(), kept))
        }
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let node = &self.nodes[id];
        if node.children.is_empty() {
            out.push_str(&node.label);
            return;
        }
        out.push('(');
        out.push_str(&node.label);
        for &child in &node.children {
            out.push(' ');
            self.write_node(child, out);
        }
        out.push(')');
    }
}

impl fmt::Display for ParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let mut out = String::new();
        self.write_node(self.root(), &mut out);
        f.write_str(&out)
    }
}

impl Serialize for ParseTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ParseTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        ParseTree::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Open,
    Close,
    Atom(String),
}

fn tokenize(input: &str) -> Vec<(usize, Tok)> {
    let mut tokens = Vec::new();
    let mut atom_start: Option<usize> = None;
    for (i, ch) in input.char_indices() {
        let boundary = ch == '(' || ch == ')' || ch.is_whitespace();
        if boundary {
            if let Some(start) = atom_start.take() {
                tokens.push((start, Tok::Atom(input[start..i].to_string())));
            }
            match ch {
                '(' => tokens.push((i, Tok::Open)),
                ')' => tokens.push((i, Tok::Close)),
                _ => {}
            }
        } else if atom_start.is_none() {
            atom_start = Some(i);
        }
    }
    if let Some(start) = atom_start {
        tokens.push((start, Tok::Atom(input[start..].to_string())));
    }
    tokens
}

fn parse_shape(tokens: &[(usize, Tok)], pos: &mut usize) -> TreeResult<Shape> {
    let (offset, tok) = tokens.get(*pos).ok_or(TreeError::Empty)?;
    if *tok != Tok::Open {
        return Err(TreeError::Malformed {
            position: *offset,
            message: "expected '('".into(),
        });
    }
    let open_at = *offset;
    *pos += 1;

    let label = match tokens.get(*pos) {
        Some((_, Tok::Atom(label))) => {
            *pos += 1;
            label.clone()
        }
        _ => String::new(),
    };

    let mut children = Vec::new();
    loop {
        match tokens.get(*pos) {
            Some((_, Tok::Open)) => children.push(parse_shape(tokens, pos)?),
            Some((_, Tok::Atom(word))) => {
                children.push(Shape::Leaf(word.clone()));
                *pos += 1;
            }
            Some((_, Tok::Close)) => {
                *pos += 1;
                break;
            }
            None => {
                return Err(TreeError::Malformed {
                    position: open_at,
                    message: "unbalanced brackets".into(),
                });
            }
        }
    }

    if children.is_empty() {
        return Err(TreeError::Malformed {
            position: open_at,
            message: format!("constituent \"{label}\" has no children"),
        });
    }
    // "( (S ...))" wraps the real root in an unlabeled node.
    if label.is_empty() && children.len() == 1 {
        if let Some(Shape::Node(..)) = children.first() {
            return Ok(children.remove(0));
        }
    }
    Ok(Shape::Node(label, children))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIENNA: &str = "(ROOT (SBARQ (WHNP (WP What)) (SQ (VBZ is) (NP (NP (DT the) (NN population)) (PP (IN of) (NP (NNP Vienna)))))))";

    #[test]
    fn parse_and_display_roundtrip() {
        let tree = ParseTree::parse(VIENNA).unwrap();
        assert_eq!(tree.to_string(), VIENNA);
        assert_eq!(tree.leaf_count(), 6);
        assert_eq!(tree.text(), "What is the population of Vienna");
    }

    #[test]
    fn tags_and_preterminals() {
        let tree = ParseTree::parse(VIENNA).unwrap();
        assert_eq!(tree.pos_tags(), vec!["WP", "VBZ", "DT", "NN", "IN", "NNP"]);
        let words: Vec<&str> = tree.tagged_words().iter().map(|(w, _)| *w).collect();
        assert_eq!(words[5], "Vienna");
    }

    #[test]
    fn spans_are_inclusive() {
        let tree = ParseTree::parse(VIENNA).unwrap();
        let np = tree
            .preorder(tree.root())
            .into_iter()
            .find(|&n| tree.label(n) == "NP")
            .unwrap();
        assert_eq!(tree.span(np), (2, 5));
        assert_eq!(tree.text_of(np), "the population of Vienna");
    }

    #[test]
    fn distance_between_spans() {
        let tree = ParseTree::parse(VIENNA).unwrap();
        // population (NP at 2..3) and Vienna (NP at 5..5)
        // NP(the population) up to the NP over both, down through PP/NP to NNP
        let d = tree.span_distance((2, 3), (5, 5));
        assert_eq!(d, 4);
        assert_eq!(tree.span_distance((5, 5), (5, 5)), 0);
        assert_eq!(tree.span_distance((2, 3), (5, 5)), tree.span_distance((5, 5), (2, 3)));
    }

    #[test]
    fn without_leaves_prunes_empty_constituents() {
        let tree = ParseTree::parse("(NP (DT the) (JJ largest) (NN city))").unwrap();
        let pruned = tree.without_leaves(0, 1).unwrap();
        assert_eq!(pruned.to_string(), "(NP (NN city))");
        assert!(tree.without_leaves(0, 2).is_none());
        // original is untouched
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn from_children_builds_new_root() {
        let tree = ParseTree::parse("(NP (JJ largest) (NN city))").unwrap();
        let kids = tree.child_trees();
        let rebuilt = ParseTree::from_children("NP", &kids[1..]);
        assert_eq!(rebuilt.to_string(), "(NP (NN city))");
    }

    #[test]
    fn unlabeled_root_is_unwrapped() {
        let tree = ParseTree::parse("( (NP (NNP Vienna)))").unwrap();
        assert_eq!(tree.root_label(), "NP");
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(matches!(
            ParseTree::parse("(NP (NN city)"),
            Err(TreeError::Malformed { .. })
        ));
        assert!(matches!(ParseTree::parse(""), Err(TreeError::Empty)));
        assert!(ParseTree::parse("(NP)").is_err());
    }

    #[test]
    fn serde_as_bracket_string() {
        let tree = ParseTree::parse("(NP (NNP Vienna))").unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(json, "\"(NP (NNP Vienna))\"");
        let back: ParseTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
