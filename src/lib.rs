//! Exalt legalization back end.
//!
//! The front end hands this crate a well-formed tree for the functional
//! target language; `legalize` rewrites it until the target compiler accepts
//! it without warnings escalated to errors. See [`exalt_passes::pipeline`]
//! for the pass sequence.

pub use exalt_ast::{
    BinOp, Clause, Ident, Lit, Meta, Node, NodeKind, Pattern, Span, StrLit, StrSegment, UnOp,
};
pub use exalt_passes::{Pass, Pipeline, UnknownPass, default_passes, legalize};
