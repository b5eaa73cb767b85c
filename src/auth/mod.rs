//! Authentication state, route gating and audit events.

pub mod audit;
pub mod controller;
pub mod guard;

pub use controller::{AuthController, AuthState, LoginOutcome};
pub use guard::{guard, guard_role, navigate, GuardDecision};
