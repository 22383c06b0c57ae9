//! Legalization pipeline.
//!
//! Each pass is a whole-tree rewrite with an entry condition it may assume
//! and an exit condition it guarantees; the default order is chosen so that
//! every pass's entry condition is some earlier pass's exit condition.
//!
//! ```text
//! Node
//!   │
//!   ▼
//! structural cleanup ─► flatten-blocks, fold-constants,
//!   │                   simplify-conditionals, collapse-nested-matches
//!   ▼
//! binder hygiene ─────► normalize-underscore-refs, promote-underscored-binders,
//!   │                   align-clause-payloads, eliminate-dead-stores,
//!   │                   suppress-unused-binders
//!   ▼
//! expression position ► wrap-call-args, wrap-operands, wrap-interpolations
//!   │
//!   ▼
//! strip-redundant-parens ─► legal Node
//! ```
//!
//! The order is load-bearing in a few places:
//! - dead-store elimination runs after the renaming passes so that a rename
//!   never resurrects a reference to a discarded bind;
//! - suppression runs after dead-store elimination so only binds that must
//!   survive (composite patterns, clause heads) get underscored;
//! - the wrapping passes run after simplification so a branch that folds
//!   away is never wrapped;
//! - paren stripping runs last, once every pass that consults the paren
//!   flag has seen it.

use derive_more::{Display, Error};

use exalt_ast::Node;

use crate::dead_store::{collapse_nested_matches, eliminate_dead_stores};
use crate::expr_position::{wrap_call_args, wrap_interpolations, wrap_operands};
use crate::hygiene::{
    align_clause_payloads, normalize_underscore_refs, promote_underscored_binders,
    suppress_unused_binders,
};
use crate::simplify::{
    flatten_blocks, fold_constants, simplify_conditionals, strip_redundant_parens,
};

/// A single named rewrite over the whole tree.
pub struct Pass {
    /// Stable kebab-case identifier, used for enable/disable by name.
    pub name: &'static str,
    /// One-line summary of what the pass does.
    pub description: &'static str,
    /// Disabled passes stay in the sequence but are skipped at run time.
    pub enabled: bool,
    run: fn(Node) -> Node,
}

impl Pass {
    const fn new(name: &'static str, description: &'static str, run: fn(Node) -> Node) -> Self {
        Pass {
            name,
            description,
            enabled: true,
            run,
        }
    }

    /// Apply this pass regardless of its enabled flag.
    pub fn run(&self, node: Node) -> Node {
        (self.run)(node)
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Referencing a pass name the pipeline does not contain.
#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("unknown pass: {name}")]
pub struct UnknownPass {
    pub name: String,
}

/// The full pass sequence in default order.
pub fn default_passes() -> Vec<Pass> {
    vec![
        Pass::new(
            "flatten-blocks",
            "splice nested blocks into their parent",
            flatten_blocks,
        ),
        Pass::new(
            "fold-constants",
            "evaluate operators with literal operands",
            fold_constants,
        ),
        Pass::new(
            "simplify-conditionals",
            "resolve conditionals with literal conditions",
            simplify_conditionals,
        ),
        Pass::new(
            "collapse-nested-matches",
            "collapse x = (y = e) chains into one bind",
            collapse_nested_matches,
        ),
        Pass::new(
            "normalize-underscore-refs",
            "unify references onto binders differing only by underscores",
            normalize_underscore_refs,
        ),
        Pass::new(
            "promote-underscored-binders",
            "rename _x declarations whose bare form is referenced",
            promote_underscored_binders,
        ),
        Pass::new(
            "align-clause-payloads",
            "rename tagged-tuple payload binders to the name the body uses",
            align_clause_payloads,
        ),
        Pass::new(
            "eliminate-dead-stores",
            "discard whole-variable binds that are never read",
            eliminate_dead_stores,
        ),
        Pass::new(
            "suppress-unused-binders",
            "underscore-prefix declared names that are never read",
            suppress_unused_binders,
        ),
        Pass::new(
            "wrap-call-args",
            "wrap compound call arguments in immediate closures",
            wrap_call_args,
        ),
        Pass::new(
            "wrap-operands",
            "wrap compound operator operands in immediate closures",
            wrap_operands,
        ),
        Pass::new(
            "wrap-interpolations",
            "wrap compound interpolation slots in immediate closures",
            wrap_interpolations,
        ),
        Pass::new(
            "strip-redundant-parens",
            "drop paren metadata from trivial nodes",
            strip_redundant_parens,
        ),
    ]
}

/// An ordered pass sequence. Runs each enabled pass exactly once; no
/// fixed-point iteration.
#[derive(Debug)]
pub struct Pipeline {
    passes: Vec<Pass>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline {
            passes: default_passes(),
        }
    }
}

impl Pipeline {
    pub fn new(passes: Vec<Pass>) -> Self {
        Pipeline { passes }
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn enable(&mut self, name: &str) -> Result<(), UnknownPass> {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> Result<(), UnknownPass> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), UnknownPass> {
        match self.passes.iter_mut().find(|p| p.name == name) {
            Some(pass) => {
                pass.enabled = enabled;
                Ok(())
            }
            None => Err(UnknownPass {
                name: name.to_owned(),
            }),
        }
    }

    /// Run every enabled pass in order.
    pub fn run(&self, node: Node) -> Node {
        let mut node = node;
        for pass in &self.passes {
            if !pass.enabled {
                tracing::debug!(pass = pass.name, "skipping disabled pass");
                continue;
            }
            tracing::debug!(pass = pass.name, "running pass");
            node = pass.run(node);
        }
        node
    }
}

/// Run the default pipeline.
pub fn legalize(node: Node) -> Node {
    Pipeline::default().run(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exalt_ast::builder::*;
    use exalt_ast::{BinOp, NodeKind};

    #[test]
    fn default_order_is_stable() {
        let names: Vec<&str> = default_passes().iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            [
                "flatten-blocks",
                "fold-constants",
                "simplify-conditionals",
                "collapse-nested-matches",
                "normalize-underscore-refs",
                "promote-underscored-binders",
                "align-clause-payloads",
                "eliminate-dead-stores",
                "suppress-unused-binders",
                "wrap-call-args",
                "wrap-operands",
                "wrap-interpolations",
                "strip-redundant-parens",
            ]
        );
    }

    #[test]
    fn disable_unknown_pass_errors() {
        let mut pipeline = Pipeline::default();
        let err = pipeline.disable("fuse-loops").unwrap_err();
        assert_eq!(err.to_string(), "unknown pass: fuse-loops");
    }

    #[test]
    fn disabled_pass_is_skipped() {
        let mut pipeline = Pipeline::default();
        pipeline.disable("wrap-call-args").unwrap();
        let out = pipeline.run(call("emit", vec![block(vec![int(1), int(2)])]));
        let NodeKind::Call { args, .. } = &out.kind else {
            panic!("expected call");
        };
        assert!(matches!(args[0].kind, NodeKind::Block(_)));
    }

    #[test]
    fn legalize_folds_and_cleans() {
        let out = legalize(binop(BinOp::Add, int(2), int(3)));
        assert_eq!(out.kind, NodeKind::Int(5));
    }

    #[test]
    fn legalize_is_idempotent() {
        let tree = block(vec![
            bind("x", binop(BinOp::Add, int(2), int(3))),
            call("emit", vec![var("x"), block(vec![int(1), int(2)])]),
        ]);
        let once = legalize(tree);
        let twice = legalize(once.clone());
        assert_eq!(once, twice);
    }
}
