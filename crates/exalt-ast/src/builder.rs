//! Shorthand constructors for synthetic nodes.
//!
//! Used by passes that build replacement subtrees and by tests that assemble
//! fixtures. All nodes carry synthetic metadata; passes that replace an
//! existing node should prefer `Node::with_kind` to keep the source span.

use crate::ast::{BinOp, Ident, Node, NodeKind, StrLit, StrSegment, UnOp};
use crate::pattern::{Clause, Pattern};

pub fn int(value: i64) -> Node {
    Node::synthetic(NodeKind::Int(value))
}

pub fn boolean(value: bool) -> Node {
    Node::synthetic(NodeKind::Bool(value))
}

pub fn nil() -> Node {
    Node::synthetic(NodeKind::Nil)
}

pub fn atom(name: impl Into<Ident>) -> Node {
    Node::synthetic(NodeKind::Atom(name.into()))
}

pub fn string(text: impl Into<String>) -> Node {
    Node::synthetic(NodeKind::Str(StrLit::plain(text)))
}

/// `leading#{expr}trailing` with a single interpolation slot.
pub fn interp(leading: impl Into<String>, expr: Node, trailing: impl Into<String>) -> Node {
    Node::synthetic(NodeKind::Str(StrLit {
        leading: leading.into(),
        segments: vec![StrSegment {
            expr: Box::new(expr),
            trailing: trailing.into(),
        }],
    }))
}

pub fn var(name: impl Into<Ident>) -> Node {
    Node::synthetic(NodeKind::Var(name.into()))
}

pub fn list(items: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::List(items))
}

pub fn tuple(items: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::Tuple(items))
}

pub fn binop(op: BinOp, left: Node, right: Node) -> Node {
    Node::synthetic(NodeKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn unop(op: UnOp, operand: Node) -> Node {
    Node::synthetic(NodeKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn call(name: impl Into<Ident>, args: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::Call {
        name: name.into(),
        args,
    })
}

pub fn module_call(module: impl Into<Ident>, name: impl Into<Ident>, args: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::ModuleCall {
        module: module.into(),
        name: name.into(),
        args,
    })
}

pub fn apply(fun: Node, args: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::Apply {
        fun: Box::new(fun),
        args,
    })
}

pub fn fn_node(clauses: Vec<Clause>) -> Node {
    Node::synthetic(NodeKind::Fn { clauses })
}

pub fn if_node(cond: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
    Node::synthetic(NodeKind::If {
        cond: Box::new(cond),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn match_node(pattern: Pattern, value: Node) -> Node {
    Node::synthetic(NodeKind::Match {
        pattern,
        value: Box::new(value),
    })
}

/// `name = value`, the common whole-variable bind.
pub fn bind(name: impl Into<Ident>, value: Node) -> Node {
    match_node(Pattern::Var(name.into()), value)
}

pub fn case_node(scrutinee: Node, clauses: Vec<Clause>) -> Node {
    Node::synthetic(NodeKind::Case {
        scrutinee: Box::new(scrutinee),
        clauses,
    })
}

pub fn block(statements: Vec<Node>) -> Node {
    Node::synthetic(NodeKind::Block(statements))
}

pub fn raw(text: impl Into<String>) -> Node {
    Node::synthetic(NodeKind::Raw(text.into()))
}
