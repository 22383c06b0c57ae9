//! Binder hygiene normalization.
//!
//! The target compiler escalates two opposite binder diagnostics to build
//! failures: a declared-but-unreferenced name must be underscore-prefixed,
//! and a referenced name must not be. Because the pipeline is a fixed,
//! non-iterating sequence, one pass can underscore a binder before a later
//! pass learns it is used, so the repair is a small family of ordered
//! passes instead of one:
//!
//! - promotion: `_x` declared, bare `x` referenced and not separately
//!   declared — rename the declaration to `x`;
//! - underscore-reference normalization: a reference differing from a
//!   clause binder only by underscores is unified onto the binder;
//! - clause-payload alignment: a tagged-tuple case arm whose body uses one
//!   otherwise-undeclared identifier gets its payload binder renamed to it;
//! - suppression: a binder referenced nowhere later is underscore-prefixed
//!   (composite patterns and clause heads; whole-variable dead binds are
//!   the dead-store pass's job).
//!
//! All four are idempotent, and none touches a module/qualifier name. A
//! binder rename and its co-scoped reference rewrites always happen in the
//! same pass invocation — a one-sided rename is a correctness defect.

use std::collections::BTreeSet;

use exalt_ast::{Clause, Ident, Lit, Node, NodeKind, Pattern, StrLit, StrSegment};

use crate::scope::{
    UsageIndex, clause_references, clause_references_ordered, declared_names,
    local_match_binders,
};
use crate::transform::postwalk;

/// Semantic-role names preferred when clause-payload alignment has several
/// undeclared identifiers to choose from.
const PAYLOAD_ROLE_NAMES: &[&str] = &["value", "result", "reason", "data", "item"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ClauseKind {
    Function,
    Anon,
    CaseArm,
}

// ---------------------------------------------------------------------------
// Scoped-clause walker
// ---------------------------------------------------------------------------

/// Rebuild every clause that opens a scope (function definitions, anonymous
/// functions, case arms), innermost first, threading the set of names
/// declared in enclosing scopes. The callback receives the clause with its
/// body already rebuilt, the enclosing declarations (without the clause's
/// own binders), and the clause's kind.
fn rewrite_scoped_clauses(
    node: &Node,
    env: &BTreeSet<Ident>,
    f: &dyn Fn(Clause, &BTreeSet<Ident>, ClauseKind) -> Clause,
) -> Node {
    let kind = match &node.kind {
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_)
        | NodeKind::Raw(_) => node.kind.clone(),
        NodeKind::Str(lit) => NodeKind::Str(StrLit {
            leading: lit.leading.clone(),
            segments: lit
                .segments
                .iter()
                .map(|s| StrSegment {
                    expr: Box::new(rewrite_scoped_clauses(&s.expr, env, f)),
                    trailing: s.trailing.clone(),
                })
                .collect(),
        }),
        NodeKind::List(items) => NodeKind::List(walk_each(items, env, f)),
        NodeKind::Tuple(items) => NodeKind::Tuple(walk_each(items, env, f)),
        NodeKind::Map(entries) => NodeKind::Map(
            entries
                .iter()
                .map(|(k, v)| {
                    (
                        rewrite_scoped_clauses(k, env, f),
                        rewrite_scoped_clauses(v, env, f),
                    )
                })
                .collect(),
        ),
        NodeKind::Keywords(entries) => NodeKind::Keywords(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), rewrite_scoped_clauses(v, env, f)))
                .collect(),
        ),
        NodeKind::FieldAccess { base, field } => NodeKind::FieldAccess {
            base: Box::new(rewrite_scoped_clauses(base, env, f)),
            field: field.clone(),
        },
        NodeKind::Index { base, index } => NodeKind::Index {
            base: Box::new(rewrite_scoped_clauses(base, env, f)),
            index: Box::new(rewrite_scoped_clauses(index, env, f)),
        },
        NodeKind::Binary { op, left, right } => NodeKind::Binary {
            op: *op,
            left: Box::new(rewrite_scoped_clauses(left, env, f)),
            right: Box::new(rewrite_scoped_clauses(right, env, f)),
        },
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op: *op,
            operand: Box::new(rewrite_scoped_clauses(operand, env, f)),
        },
        NodeKind::Call { name, args } => NodeKind::Call {
            name: name.clone(),
            args: walk_each(args, env, f),
        },
        NodeKind::ModuleCall { module, name, args } => NodeKind::ModuleCall {
            module: module.clone(),
            name: name.clone(),
            args: walk_each(args, env, f),
        },
        NodeKind::Apply { fun, args } => NodeKind::Apply {
            fun: Box::new(rewrite_scoped_clauses(fun, env, f)),
            args: walk_each(args, env, f),
        },
        NodeKind::Fn { clauses } => NodeKind::Fn {
            clauses: clauses
                .iter()
                .map(|c| rewrite_clause(c, env, ClauseKind::Anon, f))
                .collect(),
        },
        NodeKind::FunctionDef {
            name,
            clauses,
            public,
        } => NodeKind::FunctionDef {
            name: name.clone(),
            clauses: clauses
                .iter()
                .map(|c| rewrite_clause(c, env, ClauseKind::Function, f))
                .collect(),
            public: *public,
        },
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => NodeKind::If {
            cond: Box::new(rewrite_scoped_clauses(cond, env, f)),
            then_branch: Box::new(rewrite_scoped_clauses(then_branch, env, f)),
            else_branch: else_branch
                .as_ref()
                .map(|e| Box::new(rewrite_scoped_clauses(e, env, f))),
        },
        NodeKind::Match { pattern, value } => NodeKind::Match {
            pattern: pattern.clone(),
            value: Box::new(rewrite_scoped_clauses(value, env, f)),
        },
        NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
            scrutinee: Box::new(rewrite_scoped_clauses(scrutinee, env, f)),
            clauses: clauses
                .iter()
                .map(|c| rewrite_clause(c, env, ClauseKind::CaseArm, f))
                .collect(),
        },
        NodeKind::Block(statements) => {
            // Binds made by a statement are visible to the statements after
            // it; extend the environment as we go.
            let mut env = env.clone();
            let mut out = Vec::with_capacity(statements.len());
            for statement in statements {
                out.push(rewrite_scoped_clauses(statement, &env, f));
                env.extend(declared_names(statement));
            }
            NodeKind::Block(out)
        }
        NodeKind::Module { name, body } => NodeKind::Module {
            name: name.clone(),
            body: walk_each(body, env, f),
        },
    };
    node.with_kind(kind)
}

fn walk_each(
    nodes: &[Node],
    env: &BTreeSet<Ident>,
    f: &dyn Fn(Clause, &BTreeSet<Ident>, ClauseKind) -> Clause,
) -> Vec<Node> {
    nodes
        .iter()
        .map(|n| rewrite_scoped_clauses(n, env, f))
        .collect()
}

fn rewrite_clause(
    clause: &Clause,
    env: &BTreeSet<Ident>,
    kind: ClauseKind,
    f: &dyn Fn(Clause, &BTreeSet<Ident>, ClauseKind) -> Clause,
) -> Clause {
    let mut inner_env = env.clone();
    inner_env.extend(clause.bound_names());
    let rebuilt = Clause {
        patterns: clause.patterns.clone(),
        guard: clause
            .guard
            .as_ref()
            .map(|g| rewrite_scoped_clauses(g, &inner_env, f)),
        body: rewrite_scoped_clauses(&clause.body, &inner_env, f),
    };
    f(rebuilt, env, kind)
}

// ---------------------------------------------------------------------------
// Rename helpers
// ---------------------------------------------------------------------------

fn strip_underscores(name: &str) -> String {
    name.chars().filter(|c| *c != '_').collect()
}

/// Rename value references `from` -> `to` inside one scope: variables, pin
/// patterns, and identifiers inside raw-text `#{...}` slots. Clauses that
/// rebind `from` shadow it and are left untouched. Callers guarantee `from`
/// is not declared in the scope itself.
fn rename_refs(node: &Node, from: &str, to: &str) -> Node {
    let kind = match &node.kind {
        NodeKind::Var(name) if name == from => NodeKind::Var(to.to_owned()),
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_) => node.kind.clone(),
        NodeKind::Raw(text) => NodeKind::Raw(rename_in_raw(text, from, to)),
        NodeKind::Str(lit) => NodeKind::Str(StrLit {
            leading: lit.leading.clone(),
            segments: lit
                .segments
                .iter()
                .map(|s| StrSegment {
                    expr: Box::new(rename_refs(&s.expr, from, to)),
                    trailing: s.trailing.clone(),
                })
                .collect(),
        }),
        NodeKind::List(items) => NodeKind::List(rename_all(items, from, to)),
        NodeKind::Tuple(items) => NodeKind::Tuple(rename_all(items, from, to)),
        NodeKind::Map(entries) => NodeKind::Map(
            entries
                .iter()
                .map(|(k, v)| (rename_refs(k, from, to), rename_refs(v, from, to)))
                .collect(),
        ),
        NodeKind::Keywords(entries) => NodeKind::Keywords(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), rename_refs(v, from, to)))
                .collect(),
        ),
        NodeKind::FieldAccess { base, field } => NodeKind::FieldAccess {
            base: Box::new(rename_refs(base, from, to)),
            field: field.clone(),
        },
        NodeKind::Index { base, index } => NodeKind::Index {
            base: Box::new(rename_refs(base, from, to)),
            index: Box::new(rename_refs(index, from, to)),
        },
        NodeKind::Binary { op, left, right } => NodeKind::Binary {
            op: *op,
            left: Box::new(rename_refs(left, from, to)),
            right: Box::new(rename_refs(right, from, to)),
        },
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op: *op,
            operand: Box::new(rename_refs(operand, from, to)),
        },
        NodeKind::Call { name, args } => NodeKind::Call {
            name: name.clone(),
            args: rename_all(args, from, to),
        },
        NodeKind::ModuleCall { module, name, args } => NodeKind::ModuleCall {
            module: module.clone(),
            name: name.clone(),
            args: rename_all(args, from, to),
        },
        NodeKind::Apply { fun, args } => NodeKind::Apply {
            fun: Box::new(rename_refs(fun, from, to)),
            args: rename_all(args, from, to),
        },
        NodeKind::Fn { clauses } => NodeKind::Fn {
            clauses: clauses
                .iter()
                .map(|c| rename_refs_in_clause(c, from, to))
                .collect(),
        },
        NodeKind::FunctionDef {
            name,
            clauses,
            public,
        } => NodeKind::FunctionDef {
            name: name.clone(),
            clauses: clauses
                .iter()
                .map(|c| rename_refs_in_clause(c, from, to))
                .collect(),
            public: *public,
        },
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => NodeKind::If {
            cond: Box::new(rename_refs(cond, from, to)),
            then_branch: Box::new(rename_refs(then_branch, from, to)),
            else_branch: else_branch
                .as_ref()
                .map(|e| Box::new(rename_refs(e, from, to))),
        },
        NodeKind::Match { pattern, value } => NodeKind::Match {
            pattern: pattern.rename_pinned(from, to),
            value: Box::new(rename_refs(value, from, to)),
        },
        NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
            scrutinee: Box::new(rename_refs(scrutinee, from, to)),
            clauses: clauses
                .iter()
                .map(|c| rename_refs_in_clause(c, from, to))
                .collect(),
        },
        NodeKind::Block(statements) => NodeKind::Block(rename_all(statements, from, to)),
        NodeKind::Module { name, body } => NodeKind::Module {
            name: name.clone(),
            body: rename_all(body, from, to),
        },
    };
    node.with_kind(kind)
}

fn rename_all(nodes: &[Node], from: &str, to: &str) -> Vec<Node> {
    nodes.iter().map(|n| rename_refs(n, from, to)).collect()
}

fn rename_refs_in_clause(clause: &Clause, from: &str, to: &str) -> Clause {
    let patterns: Vec<Pattern> = clause
        .patterns
        .iter()
        .map(|p| p.rename_pinned(from, to))
        .collect();
    // The clause shadows `from`: references inside resolve to its own
    // binder, not the one being renamed. A local match in the body rebinds
    // the name just as a parameter does.
    let mut shadow = clause.bound_names();
    local_match_binders(&clause.body, &mut shadow);
    if shadow.contains(from) {
        return Clause {
            patterns,
            guard: clause.guard.clone(),
            body: clause.body.clone(),
        };
    }
    Clause {
        patterns,
        guard: clause.guard.as_ref().map(|g| rename_refs(g, from, to)),
        body: rename_refs(&clause.body, from, to),
    }
}

/// Token-wise rename inside the `#{...}` slots of a raw-text leaf. Text
/// outside interpolation slots is untouched.
fn rename_in_raw(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        let slot_start = start + 2;
        let Some(end) = rest[slot_start..].find('}') else {
            break;
        };
        out.push_str(&rest[..slot_start]);
        out.push_str(&rename_tokens(&rest[slot_start..slot_start + end], from, to));
        out.push('}');
        rest = &rest[slot_start + end + 1..];
    }
    out.push_str(rest);
    out
}

fn rename_tokens(slot: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(slot.len());
    let mut token = String::new();
    let flush = |token: &mut String, out: &mut String| {
        if token == from {
            out.push_str(to);
        } else {
            out.push_str(token);
        }
        token.clear();
    };
    for c in slot.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || ((c == '?' || c == '!') && !token.is_empty()) {
            token.push(c);
        } else {
            flush(&mut token, &mut out);
            out.push(c);
        }
    }
    flush(&mut token, &mut out);
    out
}

/// Rename match-pattern binders `from` -> `to` throughout one scope:
/// descends into blocks, branches, and case scrutinees but not into nested
/// closures or case-arm heads — those binders belong to other scopes.
fn rename_decl_binders(node: &Node, from: &str, to: &str) -> Node {
    let kind = match &node.kind {
        NodeKind::Match { pattern, value } => NodeKind::Match {
            pattern: pattern.rename_bound(from, to),
            value: Box::new(rename_decl_binders(value, from, to)),
        },
        NodeKind::Fn { .. } | NodeKind::FunctionDef { .. } => node.kind.clone(),
        NodeKind::Case { scrutinee, clauses } => NodeKind::Case {
            scrutinee: Box::new(rename_decl_binders(scrutinee, from, to)),
            clauses: clauses.clone(),
        },
        NodeKind::Block(statements) => NodeKind::Block(
            statements
                .iter()
                .map(|s| rename_decl_binders(s, from, to))
                .collect(),
        ),
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => NodeKind::If {
            cond: Box::new(rename_decl_binders(cond, from, to)),
            then_branch: Box::new(rename_decl_binders(then_branch, from, to)),
            else_branch: else_branch
                .as_ref()
                .map(|e| Box::new(rename_decl_binders(e, from, to))),
        },
        NodeKind::Str(lit) => NodeKind::Str(StrLit {
            leading: lit.leading.clone(),
            segments: lit
                .segments
                .iter()
                .map(|s| StrSegment {
                    expr: Box::new(rename_decl_binders(&s.expr, from, to)),
                    trailing: s.trailing.clone(),
                })
                .collect(),
        }),
        NodeKind::List(items) => NodeKind::List(
            items
                .iter()
                .map(|n| rename_decl_binders(n, from, to))
                .collect(),
        ),
        NodeKind::Tuple(items) => NodeKind::Tuple(
            items
                .iter()
                .map(|n| rename_decl_binders(n, from, to))
                .collect(),
        ),
        NodeKind::Map(entries) => NodeKind::Map(
            entries
                .iter()
                .map(|(k, v)| {
                    (
                        rename_decl_binders(k, from, to),
                        rename_decl_binders(v, from, to),
                    )
                })
                .collect(),
        ),
        NodeKind::Keywords(entries) => NodeKind::Keywords(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), rename_decl_binders(v, from, to)))
                .collect(),
        ),
        NodeKind::FieldAccess { base, field } => NodeKind::FieldAccess {
            base: Box::new(rename_decl_binders(base, from, to)),
            field: field.clone(),
        },
        NodeKind::Index { base, index } => NodeKind::Index {
            base: Box::new(rename_decl_binders(base, from, to)),
            index: Box::new(rename_decl_binders(index, from, to)),
        },
        NodeKind::Call { name, args } => NodeKind::Call {
            name: name.clone(),
            args: args
                .iter()
                .map(|n| rename_decl_binders(n, from, to))
                .collect(),
        },
        NodeKind::ModuleCall { module, name, args } => NodeKind::ModuleCall {
            module: module.clone(),
            name: name.clone(),
            args: args
                .iter()
                .map(|n| rename_decl_binders(n, from, to))
                .collect(),
        },
        NodeKind::Apply { fun, args } => NodeKind::Apply {
            fun: Box::new(rename_decl_binders(fun, from, to)),
            args: args
                .iter()
                .map(|n| rename_decl_binders(n, from, to))
                .collect(),
        },
        NodeKind::Binary { op, left, right } => NodeKind::Binary {
            op: *op,
            left: Box::new(rename_decl_binders(left, from, to)),
            right: Box::new(rename_decl_binders(right, from, to)),
        },
        NodeKind::Unary { op, operand } => NodeKind::Unary {
            op: *op,
            operand: Box::new(rename_decl_binders(operand, from, to)),
        },
        _ => node.kind.clone(),
    };
    node.with_kind(kind)
}

// ---------------------------------------------------------------------------
// Passes
// ---------------------------------------------------------------------------

/// Promotion: a declared `_x` whose bare form `x` is referenced in scope,
/// with `x` not separately declared, has its declaration renamed to `x`.
/// References already use the bare form, so only binder sites change.
///
/// Entry: any tree. Exit: no underscore-prefixed binder has its bare form
/// referenced-but-undeclared in the same scope. Idempotent.
pub fn promote_underscored_binders(node: Node) -> Node {
    rewrite_scoped_clauses(&node, &BTreeSet::new(), &|clause, env, _kind| {
        let mut candidates = clause.bound_names();
        local_match_binders(&clause.body, &mut candidates);
        let refs = clause_references(&clause);
        let mut declared = clause.bound_names();
        declared.extend(declared_names(&clause.body));

        let mut clause = clause;
        for binder in candidates {
            if !binder.starts_with('_') || binder == "_" {
                continue;
            }
            let bare = binder[1..].to_owned();
            if bare.is_empty() || bare.starts_with('_') {
                continue;
            }
            if !refs.contains(&bare) || declared.contains(&bare) || env.contains(&bare) {
                continue;
            }
            tracing::debug!(from = %binder, to = %bare, "promoting underscored binder");
            clause = Clause {
                patterns: clause
                    .patterns
                    .iter()
                    .map(|p| p.rename_bound(&binder, &bare))
                    .collect(),
                guard: clause.guard,
                body: rename_decl_binders(&clause.body, &binder, &bare),
            };
        }
        clause
    })
}

/// Underscore-reference normalization: a reference that matches no
/// declaration but differs from a (non-underscored) clause binder only by
/// underscore characters is rewritten to the binder.
///
/// Entry: promotion has run, so underscored binders with live bare
/// references are already bare. Exit: no reference differs from its
/// clause's binder only by underscores. Idempotent.
pub fn normalize_underscore_refs(node: Node) -> Node {
    rewrite_scoped_clauses(&node, &BTreeSet::new(), &|clause, env, _kind| {
        let binders = clause.bound_names();
        let mut declared = binders.clone();
        declared.extend(declared_names(&clause.body));

        let mut clause = clause;
        for reference in clause_references(&clause) {
            if declared.contains(&reference) || env.contains(&reference) {
                continue;
            }
            let stripped = strip_underscores(&reference);
            if stripped.is_empty() {
                continue;
            }
            let target = binders
                .iter()
                .find(|b| !b.starts_with('_') && **b != reference && strip_underscores(b) == stripped);
            if let Some(target) = target {
                tracing::debug!(from = %reference, to = %target, "normalizing underscore reference");
                clause = Clause {
                    patterns: clause
                        .patterns
                        .iter()
                        .map(|p| p.rename_pinned(&reference, target))
                        .collect(),
                    guard: clause.guard.as_ref().map(|g| rename_refs(g, &reference, target)),
                    body: rename_refs(&clause.body, &reference, target),
                };
            }
        }
        clause
    })
}

/// Clause-payload alignment: a case arm destructuring a tagged two-element
/// tuple `{tag, payload}` whose body references otherwise-undeclared
/// identifiers gets its payload binder renamed to the referenced one.
/// With several candidates, a short priority list of semantic-role names
/// wins, else the first in traversal order.
///
/// Entry: underscore references are normalized. Exit: aligned arms leave no
/// residual payload binder the body never mentions. Idempotent.
pub fn align_clause_payloads(node: Node) -> Node {
    rewrite_scoped_clauses(&node, &BTreeSet::new(), &|clause, env, kind| {
        if kind != ClauseKind::CaseArm || clause.patterns.len() != 1 {
            return clause;
        }
        let Pattern::Tuple(elements) = &clause.patterns[0] else {
            return clause;
        };
        let [Pattern::Literal(Lit::Atom(_)), payload_slot] = elements.as_slice() else {
            return clause;
        };
        let payload = match payload_slot {
            Pattern::Var(name) => Some(name.clone()),
            Pattern::Wildcard => None,
            _ => return clause,
        };

        let refs = clause_references_ordered(&clause);
        if let Some(name) = &payload {
            // The binder is already used; nothing to align.
            if refs.contains(name) {
                return clause;
            }
        }
        let mut declared = clause.bound_names();
        declared.extend(declared_names(&clause.body));
        let undeclared: Vec<&Ident> = refs
            .iter()
            .filter(|r| !declared.contains(*r) && !env.contains(*r))
            .collect();
        if undeclared.is_empty() {
            return clause;
        }
        let chosen = PAYLOAD_ROLE_NAMES
            .iter()
            .find_map(|role| undeclared.iter().find(|u| u.as_str() == *role))
            .unwrap_or(&undeclared[0])
            .to_string();

        tracing::debug!(binder = ?payload, to = %chosen, "aligning clause payload binder");
        let new_slot = Pattern::Var(chosen);
        let mut elements = elements.clone();
        elements[1] = new_slot;
        Clause {
            patterns: vec![Pattern::Tuple(elements)],
            guard: clause.guard,
            body: clause.body,
        }
    })
}

/// Suppression: a declared name referenced nowhere later is underscore-
/// prefixed at its declaration only. Covers binds inside composite match
/// patterns (per-block, suffix usage) and clause-head binds unused in the
/// clause; single-variable dead binds are handled by dead-store
/// elimination, which runs first.
///
/// Entry: dead stores are already discarded, renames are final. Exit: no
/// bare declared name is unreferenced in the rest of its scope. Idempotent.
pub fn suppress_unused_binders(node: Node) -> Node {
    let node = postwalk(node, &mut |node| {
        let NodeKind::Block(statements) = node.kind else {
            return node;
        };
        let usage = UsageIndex::new(&statements);
        let statements = statements
            .into_iter()
            .enumerate()
            .map(|(i, stmt)| suppress_in_statement(stmt, usage.used_at_or_after(i + 1)))
            .collect();
        Node::new(NodeKind::Block(statements), node.meta)
    });

    rewrite_scoped_clauses(&node, &BTreeSet::new(), &|clause, _env, _kind| {
        let bound = clause.bound_names();
        let refs = clause_references(&clause);
        let mut clause = clause;
        for name in bound {
            if name.starts_with('_') || refs.contains(&name) {
                continue;
            }
            let silenced = format!("_{name}");
            if clause.bound_names().contains(&silenced) {
                // `{_x, _x}` would require both positions to be equal;
                // leave the collision alone.
                continue;
            }
            tracing::debug!(binder = %name, "suppressing unused clause binder");
            clause = Clause {
                patterns: clause
                    .patterns
                    .iter()
                    .map(|p| p.rename_bound(&name, &silenced))
                    .collect(),
                guard: clause.guard,
                body: clause.body,
            };
        }
        clause
    })
}

fn suppress_in_statement(stmt: Node, used_later: &BTreeSet<Ident>) -> Node {
    let NodeKind::Match { pattern, value } = &stmt.kind else {
        return stmt;
    };
    if pattern.as_single_var().is_some() {
        return stmt;
    }
    let mut bound = BTreeSet::new();
    pattern.bound_names(&mut bound);
    let mut pattern = pattern.clone();
    for name in &bound {
        if name.starts_with('_') || used_later.contains(name) {
            continue;
        }
        let silenced = format!("_{name}");
        if bound.contains(&silenced) {
            continue;
        }
        tracing::debug!(binder = %name, "suppressing unused destructured binder");
        pattern = pattern.rename_bound(name, &silenced);
    }
    let value = value.clone();
    stmt.with_kind(NodeKind::Match { pattern, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use exalt_ast::BinOp;
    use exalt_ast::builder::*;

    fn arm(pattern: Pattern, body: Node) -> Clause {
        Clause::new(vec![pattern], body)
    }

    fn tagged(tag: &str, payload: Pattern) -> Pattern {
        Pattern::Tuple(vec![Pattern::Literal(Lit::Atom(tag.into())), payload])
    }

    fn fun_def(clauses: Vec<Clause>) -> Node {
        Node::synthetic(NodeKind::FunctionDef {
            name: "render".into(),
            clauses,
            public: true,
        })
    }

    #[test]
    fn promotion_renames_declaration() {
        // fn -> _count = size(); count + 1 end
        let tree = fun_def(vec![Clause::new(
            vec![],
            block(vec![
                bind("_count", call("size", vec![])),
                binop(BinOp::Add, var("count"), int(1)),
            ]),
        )]);
        let out = promote_underscored_binders(tree);
        let NodeKind::FunctionDef { clauses, .. } = &out.kind else {
            panic!("expected function");
        };
        let NodeKind::Block(stmts) = &clauses[0].body.kind else {
            panic!("expected block");
        };
        let NodeKind::Match { pattern, .. } = &stmts[0].kind else {
            panic!("expected match");
        };
        assert_eq!(pattern.as_single_var(), Some("count"));
    }

    #[test]
    fn promotion_skips_separately_declared_bare_form() {
        let body = block(vec![
            bind("_count", call("size", vec![])),
            bind("count", int(0)),
            var("count"),
        ]);
        let tree = fun_def(vec![Clause::new(vec![], body)]);
        let out = promote_underscored_binders(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn promotion_renames_parameters() {
        // def render(_user) do user.name end
        let tree = fun_def(vec![Clause::new(
            vec![Pattern::Var("_user".into())],
            Node::synthetic(NodeKind::FieldAccess {
                base: Box::new(var("user")),
                field: "name".into(),
            }),
        )]);
        let out = promote_underscored_binders(tree);
        let NodeKind::FunctionDef { clauses, .. } = &out.kind else {
            panic!("expected function");
        };
        assert_eq!(clauses[0].patterns[0].as_single_var(), Some("user"));
    }

    #[test]
    fn promotion_reaches_interpolation_segments() {
        // "total: #{(_count = size(); count + 1)}" — wrapping runs later,
        // so the bind still sits in the segment block here.
        let segment = block(vec![
            bind("_count", call("size", vec![])),
            binop(BinOp::Add, var("count"), int(1)),
        ]);
        let tree = fun_def(vec![Clause::new(vec![], interp("total: ", segment, ""))]);
        let out = promote_underscored_binders(tree);
        let NodeKind::FunctionDef { clauses, .. } = &out.kind else {
            panic!("expected function");
        };
        let NodeKind::Str(lit) = &clauses[0].body.kind else {
            panic!("expected string");
        };
        let NodeKind::Block(stmts) = &lit.segments[0].expr.kind else {
            panic!("expected block");
        };
        let NodeKind::Match { pattern, .. } = &stmts[0].kind else {
            panic!("expected match");
        };
        assert_eq!(pattern.as_single_var(), Some("count"));
    }

    #[test]
    fn normalization_unifies_underscore_variants() {
        // case x do {:ok, todo} -> todo_ end  — ref differs by underscore
        let tree = case_node(
            var("x"),
            vec![arm(
                tagged("ok", Pattern::Var("todo".into())),
                interp("Task: ", var("todo_"), ""),
            )],
        );
        let out = normalize_underscore_refs(tree);
        let NodeKind::Case { clauses, .. } = &out.kind else {
            panic!("expected case");
        };
        let NodeKind::Str(lit) = &clauses[0].body.kind else {
            panic!("expected string");
        };
        assert_eq!(
            lit.segments[0].expr.kind,
            NodeKind::Var("todo".to_string())
        );
    }

    #[test]
    fn normalization_skips_closures_rebinding_the_reference() {
        // def render(todo) do todo_ <> (fn -> todo_ = "x"; todo_ end).() end
        // The inner closure declares its own `todo_`; only the outer
        // reference unifies onto the binder.
        let inner = fn_node(vec![Clause::new(
            vec![],
            block(vec![bind("todo_", string("x")), var("todo_")]),
        )]);
        let tree = fun_def(vec![Clause::new(
            vec![Pattern::Var("todo".into())],
            binop(BinOp::Concat, var("todo_"), apply(inner, vec![])),
        )]);
        let out = normalize_underscore_refs(tree);
        let NodeKind::FunctionDef { clauses, .. } = &out.kind else {
            panic!("expected function");
        };
        let NodeKind::Binary { left, right, .. } = &clauses[0].body.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.kind, NodeKind::Var("todo".into()));
        let NodeKind::Apply { fun, .. } = &right.kind else {
            panic!("expected application");
        };
        let NodeKind::Fn { clauses } = &fun.kind else {
            panic!("expected closure");
        };
        let NodeKind::Block(stmts) = &clauses[0].body.kind else {
            panic!("expected block");
        };
        assert!(matches!(&stmts[1].kind, NodeKind::Var(name) if name == "todo_"));
    }

    #[test]
    fn alignment_rewrites_payload_binder() {
        // case r do {:ok, payload} -> "Task: " <> todo end
        let tree = case_node(
            var("r"),
            vec![arm(
                tagged("ok", Pattern::Var("payload".into())),
                binop(BinOp::Concat, string("Task: "), var("todo")),
            )],
        );
        let out = align_clause_payloads(tree);
        let NodeKind::Case { clauses, .. } = &out.kind else {
            panic!("expected case");
        };
        let Pattern::Tuple(elements) = &clauses[0].patterns[0] else {
            panic!("expected tuple pattern");
        };
        assert_eq!(elements[1].as_single_var(), Some("todo"));
        // No residual reference to `payload` anywhere in the clause.
        assert!(!clause_references(&clauses[0]).contains("payload"));
    }

    #[test]
    fn alignment_tiebreaks_on_role_names() {
        let tree = case_node(
            var("r"),
            vec![arm(
                tagged("error", Pattern::Wildcard),
                binop(BinOp::Concat, var("prefix"), var("reason")),
            )],
        );
        let out = align_clause_payloads(tree);
        let NodeKind::Case { clauses, .. } = &out.kind else {
            panic!("expected case");
        };
        let Pattern::Tuple(elements) = &clauses[0].patterns[0] else {
            panic!("expected tuple pattern");
        };
        assert_eq!(elements[1].as_single_var(), Some("reason"));
    }

    #[test]
    fn alignment_leaves_used_payload_alone() {
        let tree = case_node(
            var("r"),
            vec![arm(
                tagged("ok", Pattern::Var("payload".into())),
                var("payload"),
            )],
        );
        let out = align_clause_payloads(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn alignment_respects_enclosing_declarations() {
        // `todo` is bound in the enclosing block, so the arm's reference is
        // not undeclared and the payload must stay.
        let tree = block(vec![
            bind("todo", call("fetch", vec![])),
            case_node(
                var("r"),
                vec![arm(
                    tagged("ok", Pattern::Var("payload".into())),
                    var("todo"),
                )],
            ),
        ]);
        let out = align_clause_payloads(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn suppression_underscores_unused_clause_binder() {
        let tree = case_node(
            var("r"),
            vec![arm(tagged("ok", Pattern::Var("payload".into())), int(1))],
        );
        let out = suppress_unused_binders(tree);
        let NodeKind::Case { clauses, .. } = &out.kind else {
            panic!("expected case");
        };
        let Pattern::Tuple(elements) = &clauses[0].patterns[0] else {
            panic!("expected tuple pattern");
        };
        assert_eq!(elements[1].as_single_var(), Some("_payload"));
    }

    #[test]
    fn suppression_underscores_dead_destructured_bind() {
        // {a, b} = pair(); use(a)   — only `b` is dead.
        let tree = block(vec![
            match_node(
                Pattern::Tuple(vec![Pattern::Var("a".into()), Pattern::Var("b".into())]),
                call("pair", vec![]),
            ),
            call("use", vec![var("a")]),
        ]);
        let out = suppress_unused_binders(tree);
        let NodeKind::Block(stmts) = &out.kind else {
            panic!("expected block");
        };
        let NodeKind::Match { pattern, .. } = &stmts[0].kind else {
            panic!("expected match");
        };
        let Pattern::Tuple(elements) = pattern else {
            panic!("expected tuple pattern");
        };
        assert_eq!(elements[0].as_single_var(), Some("a"));
        assert_eq!(elements[1].as_single_var(), Some("_b"));
    }

    #[test]
    fn suppression_keeps_guard_referenced_binder() {
        let clause = Clause {
            patterns: vec![tagged("ok", Pattern::Var("n".into()))],
            guard: Some(binop(BinOp::Gt, var("n"), int(0))),
            body: atom("ok"),
        };
        let tree = case_node(var("r"), vec![clause]);
        let out = suppress_unused_binders(tree.clone());
        assert_eq!(out, tree);
    }

    #[test]
    fn hygiene_passes_are_idempotent() {
        let tree = case_node(
            var("r"),
            vec![arm(
                tagged("ok", Pattern::Var("payload".into())),
                binop(BinOp::Concat, string("Task: "), var("todo")),
            )],
        );
        let once = suppress_unused_binders(align_clause_payloads(tree));
        let twice = suppress_unused_binders(align_clause_payloads(once.clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn raw_interpolation_references_count_and_rename() {
        // Binder referenced only from a raw template chunk.
        let tree = case_node(
            var("r"),
            vec![arm(
                tagged("ok", Pattern::Var("todo".into())),
                raw("<li>#{todo_}</li>"),
            )],
        );
        let out = normalize_underscore_refs(tree);
        let NodeKind::Case { clauses, .. } = &out.kind else {
            panic!("expected case");
        };
        assert_eq!(clauses[0].body.kind, NodeKind::Raw("<li>#{todo}</li>".into()));
    }
}
