use serde::{Deserialize, Serialize};

use crate::pattern::{Clause, Pattern};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub const fn zero() -> Self {
        Self { start: 0, end: 0 }
    }
}

pub type Identifier = String;
pub type Ident = Identifier;

/// Per-node metadata: a small fixed struct rather than an open map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub span: Span,
    /// Node was constructed by a pass, not by the frontend.
    pub synthetic: bool,
    /// Frontend wrapped this node in one level of redundant parentheses.
    pub parens: bool,
}

impl Meta {
    pub const fn new(span: Span) -> Self {
        Self {
            span,
            synthetic: false,
            parens: false,
        }
    }

    pub const fn synthetic() -> Self {
        Self {
            span: Span::zero(),
            synthetic: true,
            parens: false,
        }
    }
}

/// One element of the Elixir tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub meta: Meta,
}

impl Node {
    pub fn new(kind: NodeKind, meta: Meta) -> Self {
        Self { kind, meta }
    }

    pub fn synthetic(kind: NodeKind) -> Self {
        Self {
            kind,
            meta: Meta::synthetic(),
        }
    }

    /// Replace the kind while carrying this node's metadata forward.
    ///
    /// Passes that substitute a node must use this (or construct fresh
    /// synthetic metadata deliberately); dropping source positions on
    /// replacement is a defect.
    pub fn with_kind(&self, kind: NodeKind) -> Self {
        Self {
            kind,
            meta: self.meta,
        }
    }

    /// A literal leaf: no child nodes, value known at compile time.
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Int(_)
                | NodeKind::Float(_)
                | NodeKind::Bool(_)
                | NodeKind::Nil
                | NodeKind::Atom(_)
        ) || matches!(&self.kind, NodeKind::Str(s) if s.is_plain())
    }

    /// Trivial nodes are already legal in any expression slot and must
    /// never be wrapped by expression-position legalization.
    pub fn is_trivial(&self) -> bool {
        self.is_literal() || matches!(self.kind, NodeKind::Var(_))
    }
}

/// Expression node variants.
///
/// The sum is closed: passes match exhaustively, and a catch-all arm appears
/// only where "leave unchanged" is the intended behavior for every remaining
/// variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // Literals
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Atom(Ident),
    Str(StrLit),

    // Containers
    List(Vec<Node>),
    Tuple(Vec<Node>),
    Map(Vec<(Node, Node)>),
    Keywords(Vec<(Ident, Node)>),

    // References and access
    Var(Ident),
    FieldAccess {
        base: Box<Node>,
        field: Ident,
    },
    Index {
        base: Box<Node>,
        index: Box<Node>,
    },

    // Operations
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Unary {
        op: UnOp,
        operand: Box<Node>,
    },

    // Calls
    Call {
        name: Ident,
        args: Vec<Node>,
    },
    ModuleCall {
        module: Ident,
        name: Ident,
        args: Vec<Node>,
    },
    /// Application of an anonymous function value: `fun.(args)`.
    Apply {
        fun: Box<Node>,
        args: Vec<Node>,
    },

    // Functions and control flow
    Fn {
        clauses: Vec<Clause>,
    },
    If {
        cond: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    /// Pattern-match expression: `pattern = value`. Evaluates to `value`.
    Match {
        pattern: Pattern,
        value: Box<Node>,
    },
    Case {
        scrutinee: Box<Node>,
        clauses: Vec<Clause>,
    },
    /// Ordered statements; the block's value is its last statement's value.
    Block(Vec<Node>),

    // Declarations
    Module {
        name: Ident,
        body: Vec<Node>,
    },
    FunctionDef {
        name: Ident,
        clauses: Vec<Clause>,
        public: bool,
    },

    /// Opaque raw Elixir text the tree cannot model. Passes cannot see
    /// inside it; its use should stay a documented minimum.
    Raw(String),
}

/// Binary operators of the target surface.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Integer division. Folds and evaluates with floor semantics
    /// (toward negative infinity).
    Div,
    Rem,
    /// String concatenation, `<>`.
    Concat,
    /// List concatenation, `++`.
    ListConcat,
    Eq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::Concat => "<>",
            BinOp::ListConcat => "++",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    Not,
    Neg,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Not => "not",
            UnOp::Neg => "-",
        }
    }
}

/// A string literal with embedded interpolation segments:
/// `leading #{segment.expr} segment.trailing ...`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrLit {
    pub leading: String,
    pub segments: Vec<StrSegment>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrSegment {
    pub expr: Box<Node>,
    pub trailing: String,
}

impl StrLit {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            leading: text.into(),
            segments: Vec::new(),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Whether a name resolves as a module or qualifier reference rather than a
/// variable: leading uppercase (aliases like `Enum`) or dotted qualification
/// (`:math.pi` style paths arrive pre-joined). Hygiene passes must never
/// rename these.
pub fn is_qualifier(name: &str) -> bool {
    name.contains('.')
        || name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase() || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifier_detection() {
        assert!(is_qualifier("Enum"));
        assert!(is_qualifier("MyApp.Repo"));
        assert!(is_qualifier(":math"));
        assert!(!is_qualifier("todo"));
        assert!(!is_qualifier("_count"));
    }

    #[test]
    fn with_kind_carries_meta() {
        let meta = Meta {
            span: Span::new(3, 9),
            synthetic: false,
            parens: true,
        };
        let node = Node::new(NodeKind::Int(1), meta);
        let replaced = node.with_kind(NodeKind::Int(2));
        assert_eq!(replaced.meta, meta);
        assert_eq!(replaced.kind, NodeKind::Int(2));
    }

    #[test]
    fn trivial_nodes() {
        assert!(Node::synthetic(NodeKind::Var("x".into())).is_trivial());
        assert!(Node::synthetic(NodeKind::Str(StrLit::plain("hi"))).is_trivial());
        let interp = StrLit {
            leading: "a".into(),
            segments: vec![StrSegment {
                expr: Box::new(Node::synthetic(NodeKind::Var("x".into()))),
                trailing: String::new(),
            }],
        };
        assert!(!Node::synthetic(NodeKind::Str(interp)).is_trivial());
    }
}
