//! Common test utilities for pipeline tests.

use exalt::{Clause, Lit, Node, NodeKind, Pattern, UnOp};

/// Render a tree in target-language surface syntax. Deterministic, used to
/// make snapshot assertions readable; not a production emitter.
#[allow(dead_code)]
pub fn render(node: &Node) -> String {
    let mut out = String::new();
    write_node(&mut out, node, 0);
    out
}

fn pad(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    if node.meta.parens {
        out.push('(');
    }
    write_kind(out, node, depth);
    if node.meta.parens {
        out.push(')');
    }
}

fn write_kind(out: &mut String, node: &Node, depth: usize) {
    match &node.kind {
        NodeKind::Int(n) => out.push_str(&n.to_string()),
        NodeKind::Float(f) => out.push_str(&f.to_string()),
        NodeKind::Bool(b) => out.push_str(&b.to_string()),
        NodeKind::Nil => out.push_str("nil"),
        NodeKind::Atom(name) => {
            out.push(':');
            out.push_str(name);
        }
        NodeKind::Str(lit) => {
            out.push('"');
            out.push_str(&lit.leading);
            for segment in &lit.segments {
                out.push_str("#{");
                write_node(out, &segment.expr, depth);
                out.push('}');
                out.push_str(&segment.trailing);
            }
            out.push('"');
        }
        NodeKind::Var(name) => out.push_str(name),
        NodeKind::List(items) => {
            out.push('[');
            write_joined(out, items, depth);
            out.push(']');
        }
        NodeKind::Tuple(items) => {
            out.push('{');
            write_joined(out, items, depth);
            out.push('}');
        }
        NodeKind::Map(entries) => {
            out.push_str("%{");
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_node(out, k, depth);
                out.push_str(" => ");
                write_node(out, v, depth);
            }
            out.push('}');
        }
        NodeKind::Keywords(entries) => {
            out.push('[');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push_str(": ");
                write_node(out, v, depth);
            }
            out.push(']');
        }
        NodeKind::FieldAccess { base, field } => {
            write_node(out, base, depth);
            out.push('.');
            out.push_str(field);
        }
        NodeKind::Index { base, index } => {
            write_node(out, base, depth);
            out.push('[');
            write_node(out, index, depth);
            out.push(']');
        }
        NodeKind::Binary { op, left, right } => {
            write_node(out, left, depth);
            out.push(' ');
            out.push_str(op.symbol());
            out.push(' ');
            write_node(out, right, depth);
        }
        NodeKind::Unary { op, operand } => {
            match op {
                UnOp::Not => out.push_str("not "),
                UnOp::Neg => out.push('-'),
            }
            write_node(out, operand, depth);
        }
        NodeKind::Call { name, args } => {
            out.push_str(name);
            out.push('(');
            write_joined(out, args, depth);
            out.push(')');
        }
        NodeKind::ModuleCall { module, name, args } => {
            out.push_str(module);
            out.push('.');
            out.push_str(name);
            out.push('(');
            write_joined(out, args, depth);
            out.push(')');
        }
        NodeKind::Apply { fun, args } => {
            let needs_parens = !matches!(fun.kind, NodeKind::Var(_));
            if needs_parens {
                out.push('(');
            }
            write_node(out, fun, depth);
            if needs_parens {
                out.push(')');
            }
            out.push_str(".(");
            write_joined(out, args, depth);
            out.push(')');
        }
        NodeKind::Fn { clauses } => {
            out.push_str("fn");
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    out.push(';');
                }
                let mut head = String::new();
                write_clause_head(&mut head, clause, depth);
                if !head.is_empty() {
                    out.push(' ');
                    out.push_str(&head);
                }
                out.push_str(" -> ");
                write_inline_body(out, &clause.body, depth);
            }
            out.push_str(" end");
        }
        NodeKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            out.push_str("if ");
            write_node(out, cond, depth);
            out.push_str(" do\n");
            write_body_lines(out, then_branch, depth + 1);
            if let Some(e) = else_branch {
                pad(out, depth);
                out.push_str("else\n");
                write_body_lines(out, e, depth + 1);
            }
            pad(out, depth);
            out.push_str("end");
        }
        NodeKind::Match { pattern, value } => {
            write_pattern(out, pattern);
            out.push_str(" = ");
            write_node(out, value, depth);
        }
        NodeKind::Case { scrutinee, clauses } => {
            out.push_str("case ");
            write_node(out, scrutinee, depth);
            out.push_str(" do\n");
            for clause in clauses {
                pad(out, depth + 1);
                write_clause_head(out, clause, depth + 1);
                out.push_str(" ->\n");
                write_body_lines(out, &clause.body, depth + 2);
            }
            pad(out, depth);
            out.push_str("end");
        }
        NodeKind::Block(statements) => {
            // Inline block position; legal trees only keep these as bodies.
            for (i, statement) in statements.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                write_node(out, statement, depth);
            }
        }
        NodeKind::Module { name, body } => {
            out.push_str("defmodule ");
            out.push_str(name);
            out.push_str(" do\n");
            for item in body {
                write_body_lines(out, item, depth + 1);
            }
            pad(out, depth);
            out.push_str("end");
        }
        NodeKind::FunctionDef {
            name,
            clauses,
            public,
        } => {
            for (i, clause) in clauses.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                    pad(out, depth);
                }
                out.push_str(if *public { "def " } else { "defp " });
                out.push_str(name);
                out.push('(');
                for (j, pattern) in clause.patterns.iter().enumerate() {
                    if j > 0 {
                        out.push_str(", ");
                    }
                    write_pattern(out, pattern);
                }
                out.push(')');
                if let Some(guard) = &clause.guard {
                    out.push_str(" when ");
                    write_node(out, guard, depth);
                }
                out.push_str(" do\n");
                write_body_lines(out, &clause.body, depth + 1);
                pad(out, depth);
                out.push_str("end");
            }
        }
        NodeKind::Raw(text) => out.push_str(text),
    }
}

fn write_joined(out: &mut String, nodes: &[Node], depth: usize) {
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_node(out, node, depth);
    }
}

fn write_clause_head(out: &mut String, clause: &Clause, depth: usize) {
    for (i, pattern) in clause.patterns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_pattern(out, pattern);
    }
    if let Some(guard) = &clause.guard {
        out.push_str(" when ");
        write_node(out, guard, depth);
    }
}

fn write_inline_body(out: &mut String, body: &Node, depth: usize) {
    match &body.kind {
        NodeKind::Block(statements) => {
            for (i, statement) in statements.iter().enumerate() {
                if i > 0 {
                    out.push_str("; ");
                }
                write_node(out, statement, depth);
            }
        }
        _ => write_node(out, body, depth),
    }
}

/// One statement per line; blocks flatten into their statements.
fn write_body_lines(out: &mut String, body: &Node, depth: usize) {
    match &body.kind {
        NodeKind::Block(statements) => {
            for statement in statements {
                pad(out, depth);
                write_node(out, statement, depth);
                out.push('\n');
            }
        }
        _ => {
            pad(out, depth);
            write_node(out, body, depth);
            out.push('\n');
        }
    }
}

fn write_pattern(out: &mut String, pattern: &Pattern) {
    match pattern {
        Pattern::Var(name) => out.push_str(name),
        Pattern::Wildcard => out.push('_'),
        Pattern::Pin(name) => {
            out.push('^');
            out.push_str(name);
        }
        Pattern::Literal(lit) => write_lit(out, lit),
        Pattern::Tuple(patterns) => {
            out.push('{');
            write_patterns(out, patterns);
            out.push('}');
        }
        Pattern::List(patterns) => {
            out.push('[');
            write_patterns(out, patterns);
            out.push(']');
        }
        Pattern::Cons(head, tail) => {
            out.push('[');
            write_pattern(out, head);
            out.push_str(" | ");
            write_pattern(out, tail);
            out.push(']');
        }
        Pattern::Map(entries) => {
            out.push_str("%{");
            for (i, (key, sub)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_lit(out, key);
                out.push_str(" => ");
                write_pattern(out, sub);
            }
            out.push('}');
        }
        Pattern::Struct { name, fields } => {
            out.push('%');
            out.push_str(name);
            out.push('{');
            for (i, (field, sub)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(field);
                out.push_str(": ");
                write_pattern(out, sub);
            }
            out.push('}');
        }
        Pattern::Alias { pattern, name } => {
            write_pattern(out, pattern);
            out.push_str(" = ");
            out.push_str(name);
        }
    }
}

fn write_patterns(out: &mut String, patterns: &[Pattern]) {
    for (i, pattern) in patterns.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_pattern(out, pattern);
    }
}

fn write_lit(out: &mut String, lit: &Lit) {
    match lit {
        Lit::Int(n) => out.push_str(&n.to_string()),
        Lit::Float(f) => out.push_str(&f.to_string()),
        Lit::Bool(b) => out.push_str(&b.to_string()),
        Lit::Nil => out.push_str("nil"),
        Lit::Atom(name) => {
            out.push(':');
            out.push_str(name);
        }
        Lit::Str(text) => {
            out.push('"');
            out.push_str(text);
            out.push('"');
        }
    }
}
