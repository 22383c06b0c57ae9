//! Shared scope and usage analysis.
//!
//! Computes `declared` (names bound by patterns in a scope) and `referenced`
//! (names used as a value) sets over one lexical scope — a function or
//! clause body. Both are the only non-local input the dead-store and hygiene
//! families consume.
//!
//! Reference accounting is closure-aware: a name used inside a nested `fn`
//! body counts as referenced in the enclosing scope only if it is free there
//! (not bound by the closure's own parameters or local matches). Pin
//! patterns (`^name`) are reference sites. Raw-text leaves are scanned for
//! identifiers inside `#{...}` interpolation markers, a reference site a
//! purely structural walk cannot see.
//!
//! Case-arm references are counted without subtracting the arm's own
//! binders. That over-approximates uses and can keep a shadowed binding
//! alive, which is the safe direction for every liveness consumer here.

use std::collections::BTreeSet;

use exalt_ast::{Clause, Ident, Node, NodeKind, is_qualifier};

/// Ordered set of references: first-occurrence order, no duplicates.
#[derive(Debug, Default)]
struct RefSink {
    seen: BTreeSet<Ident>,
    order: Vec<Ident>,
}

impl RefSink {
    fn add(&mut self, name: &str) {
        if self.seen.insert(name.to_owned()) {
            self.order.push(name.to_owned());
        }
    }
}

/// Names referenced as a value anywhere in `node`, in first-occurrence
/// traversal order.
pub fn referenced_names_ordered(node: &Node) -> Vec<Ident> {
    let mut sink = RefSink::default();
    collect_refs(node, &mut sink);
    sink.order
}

/// Names referenced as a value anywhere in `node`.
pub fn referenced_names(node: &Node) -> BTreeSet<Ident> {
    let mut sink = RefSink::default();
    collect_refs(node, &mut sink);
    sink.seen
}

/// References made by a clause: guard, body, and pins in its patterns.
/// Closure-aware like [`referenced_names`].
pub fn clause_references(clause: &Clause) -> BTreeSet<Ident> {
    let mut sink = RefSink::default();
    collect_clause_refs(clause, &mut sink);
    sink.seen
}

/// References made by a clause, in first-occurrence order.
pub fn clause_references_ordered(clause: &Clause) -> Vec<Ident> {
    let mut sink = RefSink::default();
    collect_clause_refs(clause, &mut sink);
    sink.order
}

fn collect_clause_refs(clause: &Clause, sink: &mut RefSink) {
    let mut pins = BTreeSet::new();
    for pattern in &clause.patterns {
        pattern.pinned_names(&mut pins);
    }
    for pin in &pins {
        sink.add(pin);
    }
    if let Some(guard) = &clause.guard {
        collect_refs(guard, sink);
    }
    collect_refs(&clause.body, sink);
}

/// Fold a nested scope (closure or function clause) into `sink`: only the
/// names free in the clause — not bound by its own patterns or local
/// matches — escape to the enclosing scope. Case-arm binders inside the
/// body stay within their arm and never shadow an enclosing name here.
fn collect_free_clause_refs(clause: &Clause, sink: &mut RefSink) {
    let mut pins = BTreeSet::new();
    for pattern in &clause.patterns {
        pattern.pinned_names(&mut pins);
    }
    for pin in &pins {
        sink.add(pin);
    }

    let mut inner = RefSink::default();
    if let Some(guard) = &clause.guard {
        collect_refs(guard, &mut inner);
    }
    collect_refs(&clause.body, &mut inner);

    let mut shadow = clause.bound_names();
    local_match_binders(&clause.body, &mut shadow);
    for name in inner.order {
        if !shadow.contains(&name) {
            sink.add(&name);
        }
    }
}

fn collect_refs(node: &Node, sink: &mut RefSink) {
    match &node.kind {
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_) => {}
        NodeKind::Var(name) => {
            if !is_qualifier(name) {
                sink.add(name);
            }
        }
        NodeKind::Raw(text) => scan_raw_interpolations(text, sink),
        NodeKind::Str(lit) => {
            for segment in &lit.segments {
                collect_refs(&segment.expr, sink);
            }
        }
        NodeKind::List(items) | NodeKind::Tuple(items) | NodeKind::Block(items) => {
            for item in items {
                collect_refs(item, sink);
            }
        }
        NodeKind::Map(entries) => {
            for (key, value) in entries {
                collect_refs(key, sink);
                collect_refs(value, sink);
            }
        }
        NodeKind::Keywords(entries) => {
            for (_, value) in entries {
                collect_refs(value, sink);
            }
        }
        NodeKind::FieldAccess { base, .. } => collect_refs(base, sink),
        NodeKind::Index { base, index } => {
            collect_refs(base, sink);
            collect_refs(index, sink);
        }
        NodeKind::Binary { left, right, .. } => {
            collect_refs(left, sink);
            collect_refs(right, sink);
        }
        NodeKind::Unary { operand, .. } => collect_refs(operand, sink),
        NodeKind::Call { args, .. } | NodeKind::ModuleCall { args, .. } => {
            for arg in args {
                collect_refs(arg, sink);
            }
        }
        NodeKind::Apply { fun, args } => {
            collect_refs(fun, sink);
            for arg in args {
                collect_refs(arg, sink);
            }
        }
        NodeKind::Fn { clauses } => {
            for clause in clauses {
                collect_free_clause_refs(clause, sink);
            }
        }
        NodeKind::FunctionDef { clauses, .. } => {
            for clause in clauses {
                collect_free_clause_refs(clause, sink);
            }
        }
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_refs(cond, sink);
            collect_refs(then_branch, sink);
            if let Some(e) = else_branch {
                collect_refs(e, sink);
            }
        }
        NodeKind::Match { pattern, value } => {
            let mut pins = BTreeSet::new();
            pattern.pinned_names(&mut pins);
            for pin in &pins {
                sink.add(pin);
            }
            collect_refs(value, sink);
        }
        NodeKind::Case { scrutinee, clauses } => {
            collect_refs(scrutinee, sink);
            for clause in clauses {
                collect_clause_refs(clause, sink);
            }
        }
        NodeKind::Module { body, .. } => {
            for item in body {
                collect_refs(item, sink);
            }
        }
    }
}

/// Names declared by match patterns and case-clause heads within one scope.
/// Does not descend into nested `fn` bodies — those declarations belong to
/// the closure's own scope.
pub fn declared_names(node: &Node) -> BTreeSet<Ident> {
    let mut out = BTreeSet::new();
    collect_decls(node, &mut out);
    out
}

fn collect_decls(node: &Node, out: &mut BTreeSet<Ident>) {
    match &node.kind {
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_)
        | NodeKind::Raw(_) => {}
        NodeKind::Str(lit) => {
            for segment in &lit.segments {
                collect_decls(&segment.expr, out);
            }
        }
        NodeKind::List(items) | NodeKind::Tuple(items) | NodeKind::Block(items) => {
            for item in items {
                collect_decls(item, out);
            }
        }
        NodeKind::Map(entries) => {
            for (key, value) in entries {
                collect_decls(key, out);
                collect_decls(value, out);
            }
        }
        NodeKind::Keywords(entries) => {
            for (_, value) in entries {
                collect_decls(value, out);
            }
        }
        NodeKind::FieldAccess { base, .. } => collect_decls(base, out),
        NodeKind::Index { base, index } => {
            collect_decls(base, out);
            collect_decls(index, out);
        }
        NodeKind::Binary { left, right, .. } => {
            collect_decls(left, out);
            collect_decls(right, out);
        }
        NodeKind::Unary { operand, .. } => collect_decls(operand, out),
        NodeKind::Call { args, .. } | NodeKind::ModuleCall { args, .. } => {
            for arg in args {
                collect_decls(arg, out);
            }
        }
        NodeKind::Apply { fun, args } => {
            collect_decls(fun, out);
            for arg in args {
                collect_decls(arg, out);
            }
        }
        // Closure and function-definition scopes keep their binds.
        NodeKind::Fn { .. } | NodeKind::FunctionDef { .. } => {}
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_decls(cond, out);
            collect_decls(then_branch, out);
            if let Some(e) = else_branch {
                collect_decls(e, out);
            }
        }
        NodeKind::Match { pattern, value } => {
            pattern.bound_names(out);
            collect_decls(value, out);
        }
        NodeKind::Case { scrutinee, clauses } => {
            collect_decls(scrutinee, out);
            for clause in clauses {
                for pattern in &clause.patterns {
                    pattern.bound_names(out);
                }
                if let Some(guard) = &clause.guard {
                    collect_decls(guard, out);
                }
                collect_decls(&clause.body, out);
            }
        }
        NodeKind::Module { body, .. } => {
            for item in body {
                collect_decls(item, out);
            }
        }
    }
}

/// Match binders declared directly in one scope — not inside nested
/// closures and not in case-arm heads, whose binders belong to the arm.
/// Narrower than [`declared_names`]; the hygiene passes use it for
/// promotion candidates and the free-reference walk for closure shadowing.
pub fn local_match_binders(node: &Node, out: &mut BTreeSet<Ident>) {
    match &node.kind {
        NodeKind::Int(_)
        | NodeKind::Float(_)
        | NodeKind::Bool(_)
        | NodeKind::Nil
        | NodeKind::Atom(_)
        | NodeKind::Var(_)
        | NodeKind::Raw(_) => {}
        NodeKind::Match { pattern, value } => {
            pattern.bound_names(out);
            local_match_binders(value, out);
        }
        NodeKind::Fn { .. } | NodeKind::FunctionDef { .. } => {}
        NodeKind::Case { scrutinee, .. } => local_match_binders(scrutinee, out),
        NodeKind::Str(lit) => {
            for segment in &lit.segments {
                local_match_binders(&segment.expr, out);
            }
        }
        NodeKind::Block(items) | NodeKind::List(items) | NodeKind::Tuple(items) => {
            for item in items {
                local_match_binders(item, out);
            }
        }
        NodeKind::Map(entries) => {
            for (key, value) in entries {
                local_match_binders(key, out);
                local_match_binders(value, out);
            }
        }
        NodeKind::Keywords(entries) => {
            for (_, value) in entries {
                local_match_binders(value, out);
            }
        }
        NodeKind::FieldAccess { base, .. } => local_match_binders(base, out),
        NodeKind::Index { base, index } => {
            local_match_binders(base, out);
            local_match_binders(index, out);
        }
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            local_match_binders(cond, out);
            local_match_binders(then_branch, out);
            if let Some(e) = else_branch {
                local_match_binders(e, out);
            }
        }
        NodeKind::Call { args, .. } | NodeKind::ModuleCall { args, .. } => {
            for arg in args {
                local_match_binders(arg, out);
            }
        }
        NodeKind::Apply { fun, args } => {
            local_match_binders(fun, out);
            for arg in args {
                local_match_binders(arg, out);
            }
        }
        NodeKind::Binary { left, right, .. } => {
            local_match_binders(left, out);
            local_match_binders(right, out);
        }
        NodeKind::Unary { operand, .. } => local_match_binders(operand, out),
        NodeKind::Module { body, .. } => {
            for item in body {
                local_match_binders(item, out);
            }
        }
    }
}

/// Scan raw Elixir text for identifier tokens inside `#{...}` interpolation
/// slots. Nested braces are not handled; the raw escape leaf is a documented
/// minimum.
fn scan_raw_interpolations(text: &str, sink: &mut RefSink) {
    let mut rest = text;
    while let Some(start) = rest.find("#{") {
        let slot = &rest[start + 2..];
        let Some(end) = slot.find('}') else {
            return;
        };
        for token in identifier_tokens(&slot[..end]) {
            sink.add(&token);
        }
        rest = &slot[end + 1..];
    }
}

fn identifier_tokens(slot: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in slot.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || ((c == '?' || c == '!') && !current.is_empty())
        {
            current.push(c);
        } else if !current.is_empty() {
            push_identifier(&mut out, std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        push_identifier(&mut out, current);
    }
    out
}

fn push_identifier(out: &mut Vec<String>, token: String) {
    let starts_like_var = token
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    if starts_like_var {
        out.push(token);
    }
}

/// Suffix-indexed usage over one block's statements: `used_at_or_after(i)`
/// is the set of names referenced by statements `i..`. Built once per block
/// so per-statement liveness checks stay linear.
#[derive(Debug)]
pub struct UsageIndex {
    suffix: Vec<BTreeSet<Ident>>,
}

impl UsageIndex {
    pub fn new(statements: &[Node]) -> Self {
        let mut suffix = vec![BTreeSet::new(); statements.len() + 1];
        for i in (0..statements.len()).rev() {
            let mut set = suffix[i + 1].clone();
            set.extend(referenced_names(&statements[i]));
            suffix[i] = set;
        }
        Self { suffix }
    }

    /// Names referenced by statements at index `i` or later. An index past
    /// the end returns the empty set.
    pub fn used_at_or_after(&self, i: usize) -> &BTreeSet<Ident> {
        let last = self.suffix.len() - 1;
        &self.suffix[i.min(last)]
    }
}
