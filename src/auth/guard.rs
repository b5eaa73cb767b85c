use crate::api::models::Role;
use crate::auth::audit::AuditLogger;
use crate::auth::controller::AuthState;
use crate::routes::{Access, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Restoration or sign-in still in flight; show a neutral placeholder.
    Loading,
    Redirect(Route),
    Render,
}

/// Decide what to do with a navigation given the auth state and the route's requirement.
pub fn guard(state: &AuthState, access: Access) -> GuardDecision {
    if access == Access::Public {
        return GuardDecision::Render;
    }

    match state {
        AuthState::Restoring | AuthState::Authenticating => GuardDecision::Loading,
        AuthState::Authenticated(user) => match access {
            Access::Roles(roles) if !roles.contains(&user.role) => {
                GuardDecision::Redirect(Route::Unauthorized)
            }
            _ => GuardDecision::Render,
        },
        AuthState::Unauthenticated { .. } => GuardDecision::Redirect(Route::Login),
    }
}

/// Single-role form of [`guard`]: `None` means any authenticated user.
pub fn guard_role(state: &AuthState, required_role: Option<Role>) -> GuardDecision {
    match required_role {
        Some(role) => guard(state, Access::Roles(only(role))),
        None => guard(state, Access::Authenticated),
    }
}

fn only(role: Role) -> &'static [Role] {
    match role {
        Role::Chw => &[Role::Chw],
        Role::Cha => &[Role::Cha],
        Role::Admin => &[Role::Admin],
    }
}

/// Guard `route` and record an audit event when a signed-in user is turned away.
pub fn navigate(state: &AuthState, route: Route) -> GuardDecision {
    let decision = guard(state, route.access());
    if decision == GuardDecision::Redirect(Route::Unauthorized) {
        if let Some(user) = state.user() {
            AuditLogger::new().access_denied(&user.username, user.role.as_str(), route.path());
        }
    }
    decision
}
