//! Role-based authorization over org/workspace scopes.
//!
//! # Overview
//!
//! - **[`RoleBindingStore`]**: Immutable index of role bindings, built once from config
//! - **[`Authorizer`]**: Maps a command to its capability and checks the principal's bindings
//! - **[`AuthorizationTrace`]**: The allow/deny outcome with an actionable reason
//!
//! # Default Behavior
//!
//! Everything is **denied** unless a binding grants it. An unmapped command,
//! a principal without bindings in the scope, and a binding whose roles lack
//! the capability are three distinct denials with distinct reasons.
//!
//! # Binding Scopes
//!
//! | Binding | Matches |
//! |---------|---------|
//! | `org = "acme", workspace = "prod"` | Only `acme/prod` |
//! | `org = "acme"` (no workspace) | Every workspace of `acme` |
//!
//! Capabilities are unioned across every matching binding of either kind.

mod evaluator;
mod store;

pub use evaluator::{AuthorizationTrace, Authorizer};
pub use store::{RoleBinding, RoleBindingStore};
