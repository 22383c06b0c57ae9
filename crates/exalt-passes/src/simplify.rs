//! Structural simplification passes: block flattening, constant folding,
//! conditional simplification, and redundant-paren stripping.
//!
//! All of these are pure, node-local rewrites. None carries state across
//! tree positions; any shape a rewrite has no case for passes through
//! unchanged.

use exalt_ast::{BinOp, Node, NodeKind, UnOp};

use crate::transform::postwalk;

/// Flatten block structure.
///
/// A block statement that is itself a block splices inline (plain blocks do
/// not scope bindings in the target, so splicing preserves both effects and
/// visibility). A single-statement block collapses to its statement, and an
/// empty block becomes `nil`.
///
/// Entry: any tree. Exit: no block directly contains a block statement, and
/// every remaining block has at least two statements — the shape the
/// expression-position passes rely on.
pub fn flatten_blocks(node: Node) -> Node {
    postwalk(node, &mut splice_block)
}

fn splice_block(node: Node) -> Node {
    let NodeKind::Block(statements) = node.kind else {
        return node;
    };
    let mut flat = Vec::with_capacity(statements.len());
    for statement in statements {
        // Children are already flattened (bottom-up), so one level of
        // splicing suffices.
        if let NodeKind::Block(inner) = statement.kind {
            flat.extend(inner);
        } else {
            flat.push(statement);
        }
    }
    match flat.len() {
        0 => Node::new(NodeKind::Nil, node.meta),
        1 => {
            let mut only = flat.pop().unwrap();
            only.meta.parens |= node.meta.parens;
            only
        }
        _ => Node::new(NodeKind::Block(flat), node.meta),
    }
}

/// Fold operators over literal operands.
///
/// Integer division and remainder floor (round toward negative infinity).
/// Floats are never folded — float formatting belongs to the printer, and
/// refolding could change observable precision. Arithmetic that would
/// overflow or divide by a zero literal is left unchanged.
///
/// Entry: any tree. Exit: no binary/unary operator whose operands are
/// foldable literals remains.
pub fn fold_constants(node: Node) -> Node {
    postwalk(node, &mut fold_node)
}

fn fold_node(node: Node) -> Node {
    match &node.kind {
        NodeKind::Binary { op, left, right } => match fold_binary(*op, left, right) {
            Some(kind) => node.with_kind(kind),
            None => node,
        },
        NodeKind::Unary { op, operand } => match fold_unary(*op, operand) {
            Some(kind) => node.with_kind(kind),
            None => node,
        },
        _ => node,
    }
}

fn fold_binary(op: BinOp, left: &Node, right: &Node) -> Option<NodeKind> {
    use NodeKind::*;
    match (op, &left.kind, &right.kind) {
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int),
        (BinOp::Div, Int(a), Int(b)) if *b != 0 => Some(Int(floor_div(*a, *b))),
        (BinOp::Rem, Int(a), Int(b)) if *b != 0 => Some(Int(floor_rem(*a, *b))),

        (BinOp::Lt, Int(a), Int(b)) => Some(Bool(a < b)),
        (BinOp::Gt, Int(a), Int(b)) => Some(Bool(a > b)),
        (BinOp::Le, Int(a), Int(b)) => Some(Bool(a <= b)),
        (BinOp::Ge, Int(a), Int(b)) => Some(Bool(a >= b)),

        (BinOp::Eq, _, _) | (BinOp::NotEq, _, _) => {
            let equal = literal_eq(left, right)?;
            Some(Bool(if op == BinOp::Eq { equal } else { !equal }))
        }

        (BinOp::Concat, Str(a), Str(b)) if a.is_plain() && b.is_plain() => {
            let mut joined = a.leading.clone();
            joined.push_str(&b.leading);
            Some(Str(exalt_ast::StrLit::plain(joined)))
        }
        (BinOp::ListConcat, List(a), List(b)) => {
            let mut items = a.clone();
            items.extend(b.iter().cloned());
            Some(List(items))
        }

        // `and`/`or` require a boolean left operand and return the right
        // operand unevaluated-or-as-is, so a literal left side decides the
        // whole expression.
        (BinOp::And, Bool(true), _) | (BinOp::Or, Bool(false), _) => Some(right.kind.clone()),
        (BinOp::And, Bool(false), _) => Some(Bool(false)),
        (BinOp::Or, Bool(true), _) => Some(Bool(true)),

        _ => None,
    }
}

fn fold_unary(op: UnOp, operand: &Node) -> Option<NodeKind> {
    match (op, &operand.kind) {
        (UnOp::Not, NodeKind::Bool(b)) => Some(NodeKind::Bool(!b)),
        (UnOp::Neg, NodeKind::Int(n)) => n.checked_neg().map(NodeKind::Int),
        _ => None,
    }
}

/// Equality over literal leaves of the same kind. Mixed kinds are not
/// folded: the target's cross-type ordering is the printer-side runtime's
/// business, and guessing here risks a wrong constant.
fn literal_eq(left: &Node, right: &Node) -> Option<bool> {
    use NodeKind::*;
    match (&left.kind, &right.kind) {
        (Int(a), Int(b)) => Some(a == b),
        (Bool(a), Bool(b)) => Some(a == b),
        (Nil, Nil) => Some(true),
        (Atom(a), Atom(b)) => Some(a == b),
        (Str(a), Str(b)) if a.is_plain() && b.is_plain() => Some(a.leading == b.leading),
        _ => None,
    }
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn floor_rem(a: i64, b: i64) -> i64 {
    a - floor_div(a, b) * b
}

/// Reduce `if` over a literal condition to the taken branch.
///
/// Target truthiness: `nil` and `false` are falsy, every other literal is
/// truthy. Non-literal conditions (including container literals, whose
/// elements may carry effects) are left alone. A false condition with no
/// else branch reduces to `nil`.
///
/// Entry: constants already folded, so computed conditions are literal.
/// Exit: no `if` with a literal condition remains, blocks are still flat,
/// and no fold made possible by a reduction is left undone. Reducing an
/// `if` can hand its parent a block statement or a literal operand; the
/// bottom-up order lets the same walk re-splice and re-fold those parents.
pub fn simplify_conditionals(node: Node) -> Node {
    postwalk(node, &mut |node| {
        let NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } = node.kind
        else {
            return fold_node(splice_block(node));
        };
        match literal_truthiness(&cond) {
            Some(true) => *then_branch,
            Some(false) => match else_branch {
                Some(e) => *e,
                None => Node::new(NodeKind::Nil, node.meta),
            },
            None => Node::new(
                NodeKind::If {
                    cond,
                    then_branch,
                    else_branch,
                },
                node.meta,
            ),
        }
    })
}

fn literal_truthiness(node: &Node) -> Option<bool> {
    if !node.is_literal() {
        return None;
    }
    match node.kind {
        NodeKind::Bool(b) => Some(b),
        NodeKind::Nil => Some(false),
        _ => Some(true),
    }
}

/// Drop the redundant-parenthesization flag from trivial nodes.
///
/// Entry: expression-position legalization is done, so parens no longer
/// carry detection significance. Exit: no variable or literal is marked
/// parenthesized.
pub fn strip_redundant_parens(node: Node) -> Node {
    postwalk(node, &mut |mut node| {
        if node.meta.parens && node.is_trivial() {
            node.meta.parens = false;
        }
        node
    })
}
