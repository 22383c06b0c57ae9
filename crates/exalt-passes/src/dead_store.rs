//! Dead-store elimination and nested-match collapsing.
//!
//! Both passes are liveness-driven: their only non-local input is the
//! shared usage analysis. Right-hand sides are always kept — a dead store
//! is discarded, never deleted, because its value expression may carry
//! effects.

use std::collections::BTreeSet;

use exalt_ast::{Clause, Ident, Node, NodeKind, Pattern};

use crate::scope::UsageIndex;
use crate::transform::postwalk;

/// Rewrite dead single-variable bindings to a discard.
///
/// A statement `x = expr` whose `x` is unreferenced at any later statement
/// of its block (or that sits in a position with no later statements, such
/// as a clause body or an `if` branch) becomes `_ = expr`. Binders already
/// written with a leading underscore are left as they are.
///
/// Entry: blocks are flattened, binder renames are final. Exit: every
/// single-variable binding is referenced later or discarded.
pub fn eliminate_dead_stores(node: Node) -> Node {
    let empty = BTreeSet::new();
    postwalk(node, &mut |node| {
        let Node { kind, meta } = node;
        let kind = match kind {
            NodeKind::Block(statements) => {
                let usage = UsageIndex::new(&statements);
                NodeKind::Block(
                    statements
                        .into_iter()
                        .enumerate()
                        .map(|(i, stmt)| discard_if_dead(stmt, usage.used_at_or_after(i + 1)))
                        .collect(),
                )
            }
            NodeKind::Fn { clauses } => NodeKind::Fn {
                clauses: map_clause_bodies(clauses, &empty, discard_if_dead),
            },
            NodeKind::FunctionDef {
                name,
                clauses,
                public,
            } => NodeKind::FunctionDef {
                name,
                clauses: map_clause_bodies(clauses, &empty, discard_if_dead),
                public,
            },
            NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
                scrutinee,
                clauses: map_clause_bodies(clauses, &empty, discard_if_dead),
            },
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => NodeKind::If {
                cond,
                then_branch: Box::new(discard_if_dead(*then_branch, &empty)),
                else_branch: else_branch.map(|e| Box::new(discard_if_dead(*e, &empty))),
            },
            other => other,
        };
        Node::new(kind, meta)
    })
}

fn discard_if_dead(stmt: Node, used_later: &BTreeSet<Ident>) -> Node {
    let NodeKind::Match { pattern, value } = &stmt.kind else {
        return stmt;
    };
    let Some(name) = pattern.as_single_var() else {
        return stmt;
    };
    if name.starts_with('_') || used_later.contains(name) {
        return stmt;
    }
    tracing::debug!(binder = name, "discarding dead store");
    let value = value.clone();
    stmt.with_kind(NodeKind::Match {
        pattern: Pattern::Wildcard,
        value,
    })
}

/// Collapse `outer = (inner = expr)` to `outer = expr` when `inner` is
/// unreferenced later in its block. Chains collapse transitively: each
/// iteration peels one dead intermediate binder.
///
/// Entry: blocks are flattened. Exit: no match expression's value is a
/// dead intermediate match.
pub fn collapse_nested_matches(node: Node) -> Node {
    let empty = BTreeSet::new();
    postwalk(node, &mut |node| {
        let Node { kind, meta } = node;
        let kind = match kind {
            NodeKind::Block(statements) => {
                let usage = UsageIndex::new(&statements);
                NodeKind::Block(
                    statements
                        .into_iter()
                        .enumerate()
                        .map(|(i, stmt)| collapse_chain(stmt, usage.used_at_or_after(i + 1)))
                        .collect(),
                )
            }
            NodeKind::Fn { clauses } => NodeKind::Fn {
                clauses: map_clause_bodies(clauses, &empty, collapse_chain),
            },
            NodeKind::FunctionDef {
                name,
                clauses,
                public,
            } => NodeKind::FunctionDef {
                name,
                clauses: map_clause_bodies(clauses, &empty, collapse_chain),
                public,
            },
            NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
                scrutinee,
                clauses: map_clause_bodies(clauses, &empty, collapse_chain),
            },
            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => NodeKind::If {
                cond,
                then_branch: Box::new(collapse_chain(*then_branch, &empty)),
                else_branch: else_branch.map(|e| Box::new(collapse_chain(*e, &empty))),
            },
            other => other,
        };
        Node::new(kind, meta)
    })
}

fn collapse_chain(stmt: Node, used_later: &BTreeSet<Ident>) -> Node {
    let Node { kind, meta } = stmt;
    let NodeKind::Match { pattern, mut value } = kind else {
        return Node { kind, meta };
    };
    let mut outer_pins = BTreeSet::new();
    pattern.pinned_names(&mut outer_pins);
    loop {
        let inner_dead = match &value.kind {
            NodeKind::Match {
                pattern: inner_pattern,
                ..
            } => inner_pattern
                .as_single_var()
                .is_some_and(|name| !used_later.contains(name) && !outer_pins.contains(name)),
            _ => false,
        };
        if !inner_dead {
            break;
        }
        let NodeKind::Match {
            value: inner_value, ..
        } = value.kind
        else {
            unreachable!("checked above");
        };
        tracing::debug!("collapsing dead intermediate match");
        value = inner_value;
    }
    Node::new(NodeKind::Match { pattern, value }, meta)
}

fn map_clause_bodies(
    clauses: Vec<Clause>,
    used_later: &BTreeSet<Ident>,
    f: impl Fn(Node, &BTreeSet<Ident>) -> Node,
) -> Vec<Clause> {
    clauses
        .into_iter()
        .map(|clause| Clause {
            patterns: clause.patterns,
            guard: clause.guard,
            body: f(clause.body, used_later),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exalt_ast::builder::*;

    #[test]
    fn referenced_binding_is_kept() {
        let tree = block(vec![
            bind("a", call("compute", vec![])),
            bind("b", call("use", vec![var("a")])),
        ]);
        let out = eliminate_dead_stores(tree.clone());
        // `a` is referenced; only the trailing dead `b` is discarded.
        let NodeKind::Block(stmts) = &out.kind else {
            panic!("expected block");
        };
        assert_eq!(stmts[0], tree_statement(&tree, 0));
        assert!(matches!(
            &stmts[1].kind,
            NodeKind::Match {
                pattern: Pattern::Wildcard,
                ..
            }
        ));
    }

    fn tree_statement(tree: &Node, i: usize) -> Node {
        match &tree.kind {
            NodeKind::Block(stmts) => stmts[i].clone(),
            _ => panic!("expected block"),
        }
    }

    #[test]
    fn dead_store_keeps_the_call() {
        let tree = block(vec![bind("a", call("compute", vec![])), int(1)]);
        let out = eliminate_dead_stores(tree);
        let NodeKind::Block(stmts) = &out.kind else {
            panic!("expected block");
        };
        let NodeKind::Match { pattern, value } = &stmts[0].kind else {
            panic!("expected match");
        };
        assert_eq!(pattern, &Pattern::Wildcard);
        assert!(matches!(&value.kind, NodeKind::Call { name, .. } if name == "compute"));
    }

    #[test]
    fn closure_uses_keep_bindings_alive() {
        let tree = block(vec![
            bind("a", int(1)),
            fn_node(vec![Clause::new(vec![], var("a"))]),
        ]);
        let out = eliminate_dead_stores(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn colliding_case_arm_binder_does_not_kill_a_closure_use() {
        // x = 42; fn -> case 0 do x -> 1 end; x end — the closure's trailing
        // `x` reads the outer bind, not the arm binder.
        let tree = block(vec![
            bind("x", int(42)),
            fn_node(vec![Clause::new(
                vec![],
                block(vec![
                    case_node(
                        int(0),
                        vec![Clause::new(vec![Pattern::Var("x".into())], int(1))],
                    ),
                    var("x"),
                ]),
            )]),
        ]);
        let out = eliminate_dead_stores(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn underscore_binders_left_alone() {
        let tree = block(vec![bind("_hint", call("compute", vec![])), int(1)]);
        let out = eliminate_dead_stores(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn nested_match_collapses_transitively() {
        // out = (mid = (tmp = expr))
        let tree = block(vec![
            bind("out", bind("mid", bind("tmp", call("expr", vec![])))),
            var("out"),
        ]);
        let out = collapse_nested_matches(tree);
        let NodeKind::Block(stmts) = &out.kind else {
            panic!("expected block");
        };
        let NodeKind::Match { value, .. } = &stmts[0].kind else {
            panic!("expected match");
        };
        assert!(matches!(&value.kind, NodeKind::Call { name, .. } if name == "expr"));
    }

    #[test]
    fn bare_branch_match_collapses() {
        // if c do x = (y = 1) end — the branch is a match, not a block.
        let tree = if_node(var("c"), bind("x", bind("y", int(1))), None);
        let out = collapse_nested_matches(tree);
        let NodeKind::If { then_branch, .. } = &out.kind else {
            panic!("expected if");
        };
        let NodeKind::Match { value, .. } = &then_branch.kind else {
            panic!("expected match");
        };
        assert!(matches!(value.kind, NodeKind::Int(1)));
    }

    #[test]
    fn referenced_intermediate_is_not_collapsed() {
        let tree = block(vec![
            bind("out", bind("mid", call("expr", vec![]))),
            var("mid"),
        ]);
        let out = collapse_nested_matches(tree.clone());
        assert_eq!(out, tree);
    }
}
