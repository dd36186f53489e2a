/// AST for a parsed EBNF grammar.
///
/// Ownership is strictly hierarchical: every node owns its children and the
/// whole tree is dropped recursively with it. An `Rhs` keeps its terms as
/// one flat ordered list; `|` separators are recorded as `Alternate` marker
/// nodes in that list (plus the `alternated` flag) rather than as a nested
/// precedence tree, which is the documented behavior of this dialect.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Rules in source order, then a trailing `Eof` leaf.
    Grammar(Vec<Node>),
    Rule {
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Lhs(String),
    Rhs {
        items: Vec<Node>,
        /// Set when at least one `|` separated the items.
        alternated: bool,
    },
    /// Wraps exactly one of: Identifier, Terminal, Grouping, Optional,
    /// Repetition.
    Term(Box<Node>),
    /// Marker between alternated terms; carries no children.
    Alternate,
    Grouping(Box<Node>),
    Optional(Box<Node>),
    Repetition(Box<Node>),
    Identifier(String),
    Terminal(String),
    Eof,
}

impl Node {
    /// Symbolic construct name used by the tree dump.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Grammar(_) => "grammar",
            Node::Rule { .. } => "rule",
            Node::Lhs(_) => "lhs",
            Node::Rhs { .. } => "rhs",
            Node::Term(_) => "term",
            Node::Alternate => "alternate",
            Node::Grouping(_) => "grouping",
            Node::Optional(_) => "optional",
            Node::Repetition(_) => "repetition",
            Node::Identifier(_) => "identifier",
            Node::Terminal(_) => "terminal",
            Node::Eof => "EOF",
        }
    }

    /// Text carried by leaf-ish nodes, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Node::Lhs(s) | Node::Identifier(s) | Node::Terminal(s) => Some(s),
            _ => None,
        }
    }

    /// Ordered child list, uniform across variants.
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Grammar(items) | Node::Rhs { items, .. } => items.iter().collect(),
            Node::Rule { lhs, rhs } => vec![lhs, rhs],
            Node::Term(inner)
            | Node::Grouping(inner)
            | Node::Optional(inner)
            | Node::Repetition(inner) => vec![inner],
            Node::Lhs(_)
            | Node::Alternate
            | Node::Identifier(_)
            | Node::Terminal(_)
            | Node::Eof => Vec::new(),
        }
    }

    /// Writes the indented tree dump: `depth` tabs, the construct name, its
    /// text if any, then the children one level deeper.
    pub fn dump_to(&self, depth: usize, out: &mut impl std::io::Write) -> std::io::Result<()> {
        for _ in 0..depth {
            write!(out, "\t")?;
        }
        match self.text() {
            Some(text) => writeln!(out, "{} {}", self.kind_name(), text)?,
            None => writeln!(out, "{}", self.kind_name())?,
        }
        for child in self.children() {
            child.dump_to(depth + 1, out)?;
        }
        Ok(())
    }

    /// The tree dump as a string.
    pub fn dump(&self) -> String {
        let mut out = Vec::new();
        // Writing into a Vec<u8> cannot fail.
        self.dump_to(0, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }
}
