//! Generic bottom-up tree rewriting.
//!
//! `postwalk` is the one traversal primitive every pass is built on: it
//! rebuilds all structurally-contained child nodes first, then hands the
//! node (with already-transformed children) to the visitor, which returns
//! either the unchanged node or a replacement. Bottom-up order is
//! load-bearing — many passes match shapes that only exist after nested
//! rewrites have already simplified the descendants.
//!
//! Pattern slots are deliberately not visited: patterns form a distinct
//! structural category, rewritten only by the hygiene passes that need
//! binder rewriting.

use exalt_ast::{Clause, Node, NodeKind, StrLit, StrSegment};

/// Rewrite `node` bottom-up with `f`.
///
/// Every child slot of every variant is visited — clause guards and bodies,
/// call arguments, container elements, interpolation segment expressions,
/// match values. A visitor that panics propagates uncaught; the engine
/// performs no recovery.
pub fn postwalk<F>(node: Node, f: &mut F) -> Node
where
    F: FnMut(Node) -> Node,
{
    postwalk_dyn(node, f)
}

// Dynamic-dispatch core, so the recursion is not monomorphized per closure.
fn postwalk_dyn(node: Node, f: &mut dyn FnMut(Node) -> Node) -> Node {
    let Node { kind, meta } = node;
    let kind = match kind {
        // Leaves
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_)
        | NodeKind::Raw(_) => kind,

        NodeKind::Str(lit) => NodeKind::Str(walk_str(lit, f)),

        NodeKind::List(items) => NodeKind::List(walk_nodes(items, f)),
        NodeKind::Tuple(items) => NodeKind::Tuple(walk_nodes(items, f)),
        NodeKind::Map(entries) => NodeKind::Map(
            entries
                .into_iter()
                .map(|(k, v)| (postwalk_dyn(k, f), postwalk_dyn(v, f)))
                .collect(),
        ),
        NodeKind::Keywords(entries) => NodeKind::Keywords(
            entries
                .into_iter()
                .map(|(k, v)| (k, postwalk_dyn(v, f)))
                .collect(),
        ),

        NodeKind::FieldAccess { base, field } => NodeKind::FieldAccess {
            base: walk_box(base, f),
            field,
        },
        NodeKind::Index { base, index } => NodeKind::Index {
            base: walk_box(base, f),
            index: walk_box(index, f),
        },

        NodeKind::Binary { op, left, right } => NodeKind::Binary {
            op,
            left: walk_box(left, f),
            right: walk_box(right, f),
        },
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op,
            operand: walk_box(operand, f),
        },

        NodeKind::Call { name, args } => NodeKind::Call {
            name,
            args: walk_nodes(args, f),
        },
        NodeKind::ModuleCall { module, name, args } => NodeKind::ModuleCall {
            module,
            name,
            args: walk_nodes(args, f),
        },
        NodeKind::Apply { fun, args } => NodeKind::Apply {
            fun: walk_box(fun, f),
            args: walk_nodes(args, f),
        },

        NodeKind::Fn { clauses } => NodeKind::Fn {
            clauses: walk_clauses(clauses, f),
        },
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => NodeKind::If {
            cond: walk_box(cond, f),
            then_branch: walk_box(then_branch, f),
            else_branch: else_branch.map(|e| walk_box(e, f)),
        },
        NodeKind::Match { pattern, value } => NodeKind::Match {
            pattern,
            value: walk_box(value, f),
        },
        NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
            scrutinee: walk_box(scrutinee, f),
            clauses: walk_clauses(clauses, f),
        },
        NodeKind::Block(statements) => NodeKind::Block(walk_nodes(statements, f)),

        NodeKind::Module { name, body } => NodeKind::Module {
            name,
            body: walk_nodes(body, f),
        },
        NodeKind::FunctionDef {
            name,
            clauses,
            public,
        } => NodeKind::FunctionDef {
            name,
            clauses: walk_clauses(clauses, f),
            public,
        },
    };
    f(Node { kind, meta })
}

fn walk_box(node: Box<Node>, f: &mut dyn FnMut(Node) -> Node) -> Box<Node> {
    Box::new(postwalk_dyn(*node, f))
}

fn walk_nodes(nodes: Vec<Node>, f: &mut dyn FnMut(Node) -> Node) -> Vec<Node> {
    nodes.into_iter().map(|n| postwalk_dyn(n, f)).collect()
}

fn walk_clauses(clauses: Vec<Clause>, f: &mut dyn FnMut(Node) -> Node) -> Vec<Clause> {
    clauses
        .into_iter()
        .map(|clause| Clause {
            patterns: clause.patterns,
            guard: clause.guard.map(|g| postwalk_dyn(g, f)),
            body: postwalk_dyn(clause.body, f),
        })
        .collect()
}

fn walk_str(lit: StrLit, f: &mut dyn FnMut(Node) -> Node) -> StrLit {
    StrLit {
        leading: lit.leading,
        segments: lit
            .segments
            .into_iter()
            .map(|segment| StrSegment {
                expr: walk_box(segment.expr, f),
                trailing: segment.trailing,
            })
            .collect(),
    }
}

/// Whether any node in the tree (including `node` itself) satisfies `pred`.
///
/// Query-side companion to `postwalk`; visits the same child slots.
pub fn any_node(node: &Node, pred: &mut dyn FnMut(&Node) -> bool) -> bool {
    if pred(node) {
        return true;
    }
    let any_clause = |clauses: &[Clause], pred: &mut dyn FnMut(&Node) -> bool| {
        clauses.iter().any(|c| {
            c.guard.as_ref().is_some_and(|g| any_node(g, pred)) || any_node(&c.body, pred)
        })
    };
    match &node.kind {
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_)
        | NodeKind::Raw(_) => false,
        NodeKind::Str(lit) => lit.segments.iter().any(|s| any_node(&s.expr, pred)),
        NodeKind::List(items) | NodeKind::Tuple(items) | NodeKind::Block(items) => {
            items.iter().any(|n| any_node(n, pred))
        }
        NodeKind::Map(entries) => entries
            .iter()
            .any(|(k, v)| any_node(k, pred) || any_node(v, pred)),
        NodeKind::Keywords(entries) => entries.iter().any(|(_, v)| any_node(v, pred)),
        NodeKind::FieldAccess { base, .. } => any_node(base, pred),
        NodeKind::Index { base, index } => any_node(base, pred) || any_node(index, pred),
        NodeKind::Binary { left, right, .. } => any_node(left, pred) || any_node(right, pred),
        NodeKind::Unary { operand, .. } => any_node(operand, pred),
        NodeKind::Call { args, .. } | NodeKind::ModuleCall { args, .. } => {
            args.iter().any(|n| any_node(n, pred))
        }
        NodeKind::Apply { fun, args } => {
            any_node(fun, pred) || args.iter().any(|n| any_node(n, pred))
        }
        NodeKind::Fn { clauses } => any_clause(clauses, pred),
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            any_node(cond, pred)
                || any_node(then_branch, pred)
                || else_branch.as_deref().is_some_and(|e| any_node(e, pred))
        }
        NodeKind::Match { value, .. } => any_node(value, pred),
        NodeKind::Case { scrutinee, clauses } => {
            any_node(scrutinee, pred) || any_clause(clauses, pred)
        }
        NodeKind::Module { body, .. } => body.iter().any(|n| any_node(n, pred)),
        NodeKind::FunctionDef { clauses, .. } => any_clause(clauses, pred),
    }
}
