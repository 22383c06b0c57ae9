//! Tree legalization passes for the Exalt back end.
//!
//! Takes the well-formed but not-yet-legal [`Node`](exalt_ast::Node) tree
//! produced by the front end and rewrites it until the functional target
//! language accepts it: compound expressions moved out of expression-only
//! positions, binder hygiene repaired, dead stores discarded, and constant
//! subtrees folded. Entry point: [`legalize`] or a configured [`Pipeline`].

pub mod dead_store;
pub mod expr_position;
pub mod hygiene;
pub mod pipeline;
pub mod scope;
pub mod simplify;
pub mod transform;

pub use dead_store::{collapse_nested_matches, eliminate_dead_stores};
pub use expr_position::{wrap_call_args, wrap_interpolations, wrap_operands};
pub use hygiene::{
    align_clause_payloads, normalize_underscore_refs, promote_underscored_binders,
    suppress_unused_binders,
};
pub use pipeline::{Pass, Pipeline, UnknownPass, default_passes, legalize};
pub use scope::{UsageIndex, clause_references, declared_names, referenced_names};
pub use simplify::{flatten_blocks, fold_constants, simplify_conditionals, strip_redundant_parens};
pub use transform::{any_node, postwalk};
