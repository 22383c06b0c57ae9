//! Expression-position legalization.
//!
//! The target grammar requires a single expression in every call-argument,
//! operator-operand, and interpolation slot, but lowering from a
//! statement-oriented source can leave a multi-statement block in any of
//! them. Each pass here detects a compound node in one slot kind and
//! replaces it with an immediately-invoked zero-parameter closure:
//!
//! ```text
//! f(a, (x = g(); x + 1))   =>   f(a, (fn -> x = g(); x + 1 end).())
//! ```
//!
//! Evaluation order and the compound's final value are preserved, and the
//! result is legal in any expression position. Trivial nodes (variables,
//! literals) are never wrapped; parenthesization is a metadata flag, so a
//! parenthesized block is detected as-is.

use exalt_ast::{Clause, Meta, Node, NodeKind, StrLit, StrSegment};

use crate::transform::postwalk;

/// A compound node cannot stand in a single-expression slot. Blocks are the
/// only compound shape: block flattening has already collapsed
/// single-statement and nested blocks, so whatever remains is genuinely
/// multi-statement.
fn is_compound(node: &Node) -> bool {
    matches!(node.kind, NodeKind::Block(_))
}

/// Wrap a compound node as `(fn -> node end).()`, carrying the original
/// span on the synthetic application.
fn wrap_iife(node: Node) -> Node {
    let meta = Meta {
        span: node.meta.span,
        synthetic: true,
        parens: false,
    };
    tracing::debug!("wrapping compound node in zero-arity closure");
    Node::new(
        NodeKind::Apply {
            fun: Box::new(Node::new(
                NodeKind::Fn {
                    clauses: vec![Clause::new(Vec::new(), node)],
                },
                meta,
            )),
            args: Vec::new(),
        },
        meta,
    )
}

fn legalize_slot(node: Node) -> Node {
    if is_compound(&node) {
        wrap_iife(node)
    } else {
        node
    }
}

/// Legalize call-argument slots: local calls, qualified calls, and
/// anonymous-function applications.
///
/// Entry: blocks flattened. Exit: no call argument is a block.
pub fn wrap_call_args(node: Node) -> Node {
    postwalk(node, &mut |node| {
        let Node { kind, meta } = node;
        let kind = match kind {
            NodeKind::Call { name, args } => NodeKind::Call {
                name,
                args: args.into_iter().map(legalize_slot).collect(),
            },
            NodeKind::ModuleCall { module, name, args } => NodeKind::ModuleCall {
                module,
                name,
                args: args.into_iter().map(legalize_slot).collect(),
            },
            NodeKind::Apply { fun, args } => NodeKind::Apply {
                fun,
                args: args.into_iter().map(legalize_slot).collect(),
            },
            other => other,
        };
        Node::new(kind, meta)
    })
}

/// Legalize operator-operand slots of binary and unary operations.
///
/// Entry: blocks flattened. Exit: no operand is a block.
pub fn wrap_operands(node: Node) -> Node {
    postwalk(node, &mut |node| {
        let Node { kind, meta } = node;
        let kind = match kind {
            NodeKind::Binary { op, left, right } => NodeKind::Binary {
                op,
                left: Box::new(legalize_slot(*left)),
                right: Box::new(legalize_slot(*right)),
            },
            NodeKind::Unary { op, operand } => NodeKind::Unary {
                op,
                operand: Box::new(legalize_slot(*operand)),
            },
            other => other,
        };
        Node::new(kind, meta)
    })
}

/// Legalize string-interpolation slots.
///
/// Entry: blocks flattened. Exit: no interpolation segment holds a block.
pub fn wrap_interpolations(node: Node) -> Node {
    postwalk(node, &mut |node| {
        let Node { kind, meta } = node;
        let kind = match kind {
            NodeKind::Str(lit) => NodeKind::Str(StrLit {
                leading: lit.leading,
                segments: lit
                    .segments
                    .into_iter()
                    .map(|segment| StrSegment {
                        expr: Box::new(legalize_slot(*segment.expr)),
                        trailing: segment.trailing,
                    })
                    .collect(),
            }),
            other => other,
        };
        Node::new(kind, meta)
    })
}
