//! Tree model for the exalt Elixir back end.
//!
//! The frontend lowers source programs into this tree; the pass pipeline in
//! `exalt-passes` rewrites it; the printer serializes it. Everything here is
//! plain owned data — a tree is built once, flows through the pipeline, and
//! is discarded after printing.

pub mod ast;
pub mod builder;
pub mod pattern;

pub use ast::{
    BinOp, Ident, Meta, Node, NodeKind, Span, StrLit, StrSegment, UnOp, is_qualifier,
};
pub use pattern::{Clause, Lit, Pattern};
