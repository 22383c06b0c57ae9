use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ast::{Ident, Node};

/// Literal values usable inside patterns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    Atom(Ident),
    Str(String),
}

/// Patterns used in match targets, case-clause heads, and parameter lists.
///
/// A separate sum from `NodeKind`: the generic rewrite engine never descends
/// into pattern slots — only passes that explicitly rewrite binders do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// Binds a name.
    Var(Ident),
    Wildcard,
    Literal(Lit),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
    /// `[head | tail]`.
    Cons(Box<Pattern>, Box<Pattern>),
    /// `%{key => pattern}`; keys are literals in generated code.
    Map(Vec<(Lit, Pattern)>),
    /// `%Name{field: pattern}`.
    Struct {
        name: Ident,
        fields: Vec<(Ident, Pattern)>,
    },
    /// `pattern = name`; binds `name` to the whole matched value.
    Alias {
        pattern: Box<Pattern>,
        name: Ident,
    },
    /// `^name`; a reference to an existing binding, not a new bind.
    Pin(Ident),
}

impl Pattern {
    /// Collect every name this pattern binds. Pins are references and are
    /// not included.
    pub fn bound_names(&self, out: &mut BTreeSet<Ident>) {
        match self {
            Pattern::Var(name) => {
                out.insert(name.clone());
            }
            Pattern::Wildcard | Pattern::Literal(_) | Pattern::Pin(_) => {}
            Pattern::Tuple(items) | Pattern::List(items) => {
                for item in items {
                    item.bound_names(out);
                }
            }
            Pattern::Cons(head, tail) => {
                head.bound_names(out);
                tail.bound_names(out);
            }
            Pattern::Map(entries) => {
                for (_, value) in entries {
                    value.bound_names(out);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, value) in fields {
                    value.bound_names(out);
                }
            }
            Pattern::Alias { pattern, name } => {
                out.insert(name.clone());
                pattern.bound_names(out);
            }
        }
    }

    /// Collect every name this pattern pins (`^name` references).
    pub fn pinned_names(&self, out: &mut BTreeSet<Ident>) {
        match self {
            Pattern::Pin(name) => {
                out.insert(name.clone());
            }
            Pattern::Var(_) | Pattern::Wildcard | Pattern::Literal(_) => {}
            Pattern::Tuple(items) | Pattern::List(items) => {
                for item in items {
                    item.pinned_names(out);
                }
            }
            Pattern::Cons(head, tail) => {
                head.pinned_names(out);
                tail.pinned_names(out);
            }
            Pattern::Map(entries) => {
                for (_, value) in entries {
                    value.pinned_names(out);
                }
            }
            Pattern::Struct { fields, .. } => {
                for (_, value) in fields {
                    value.pinned_names(out);
                }
            }
            Pattern::Alias { pattern, .. } => pattern.pinned_names(out),
        }
    }

    /// Rewrite every binder named `from` to `to`, leaving pins and literals
    /// alone. The caller is responsible for renaming co-scoped body
    /// references in the same pass; a one-sided rename is a correctness
    /// defect.
    pub fn rename_bound(&self, from: &str, to: &str) -> Pattern {
        match self {
            Pattern::Var(name) if name == from => Pattern::Var(to.to_owned()),
            Pattern::Var(_) | Pattern::Wildcard | Pattern::Literal(_) | Pattern::Pin(_) => {
                self.clone()
            }
            Pattern::Tuple(items) => {
                Pattern::Tuple(items.iter().map(|p| p.rename_bound(from, to)).collect())
            }
            Pattern::List(items) => {
                Pattern::List(items.iter().map(|p| p.rename_bound(from, to)).collect())
            }
            Pattern::Cons(head, tail) => Pattern::Cons(
                Box::new(head.rename_bound(from, to)),
                Box::new(tail.rename_bound(from, to)),
            ),
            Pattern::Map(entries) => Pattern::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_bound(from, to)))
                    .collect(),
            ),
            Pattern::Struct { name, fields } => Pattern::Struct {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_bound(from, to)))
                    .collect(),
            },
            Pattern::Alias { pattern, name } => Pattern::Alias {
                pattern: Box::new(pattern.rename_bound(from, to)),
                name: if name == from {
                    to.to_owned()
                } else {
                    name.clone()
                },
            },
        }
    }

    /// Rewrite every pin reference `^from` to `^to`, leaving binders alone.
    pub fn rename_pinned(&self, from: &str, to: &str) -> Pattern {
        match self {
            Pattern::Pin(name) if name == from => Pattern::Pin(to.to_owned()),
            Pattern::Pin(_) | Pattern::Var(_) | Pattern::Wildcard | Pattern::Literal(_) => {
                self.clone()
            }
            Pattern::Tuple(items) => {
                Pattern::Tuple(items.iter().map(|p| p.rename_pinned(from, to)).collect())
            }
            Pattern::List(items) => {
                Pattern::List(items.iter().map(|p| p.rename_pinned(from, to)).collect())
            }
            Pattern::Cons(head, tail) => Pattern::Cons(
                Box::new(head.rename_pinned(from, to)),
                Box::new(tail.rename_pinned(from, to)),
            ),
            Pattern::Map(entries) => Pattern::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_pinned(from, to)))
                    .collect(),
            ),
            Pattern::Struct { name, fields } => Pattern::Struct {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.rename_pinned(from, to)))
                    .collect(),
            },
            Pattern::Alias { pattern, name } => Pattern::Alias {
                pattern: Box::new(pattern.rename_pinned(from, to)),
                name: name.clone(),
            },
        }
    }

    /// Whether the pattern is a single variable binding the whole value.
    pub fn as_single_var(&self) -> Option<&str> {
        match self {
            Pattern::Var(name) => Some(name),
            _ => None,
        }
    }
}

/// Pattern head plus optional guard plus body, used by case expressions,
/// anonymous functions, and function definitions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub patterns: Vec<Pattern>,
    pub guard: Option<Node>,
    pub body: Node,
}

impl Clause {
    pub fn new(patterns: Vec<Pattern>, body: Node) -> Self {
        Self {
            patterns,
            guard: None,
            body,
        }
    }

    /// Names bound by every pattern in this clause's head.
    pub fn bound_names(&self) -> BTreeSet<Ident> {
        let mut out = BTreeSet::new();
        for pattern in &self.patterns {
            pattern.bound_names(&mut out);
        }
        out
    }
}
