use std::fmt;

use tokio::sync::watch;
use tracing::info;

use crate::api::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    Requests,
    NewRequest,
    Pending,
    Profile,
    Unauthorized,
    NotFound,
}

/// Roles for which [`Role::can_approve_requests`] holds.
const APPROVERS: &[Role] = &[Role::Cha, Role::Admin];

/// Who may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No session needed.
    Public,
    /// Any signed-in user.
    Authenticated,
    /// Signed-in user holding one of these roles.
    Roles(&'static [Role]),
}

impl Route {
    pub const ALL: [Route; 8] = [
        Route::Login,
        Route::Dashboard,
        Route::Requests,
        Route::NewRequest,
        Route::Pending,
        Route::Profile,
        Route::Unauthorized,
        Route::NotFound,
    ];

    /// Resolve a client path. `/` lands on the dashboard; unknown paths are `NotFound`.
    pub fn resolve(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Dashboard,
            "/login" => Route::Login,
            "/dashboard" => Route::Dashboard,
            "/requests" => Route::Requests,
            "/requests/new" => Route::NewRequest,
            "/pending" => Route::Pending,
            "/profile" => Route::Profile,
            "/unauthorized" => Route::Unauthorized,
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Requests => "/requests",
            Route::NewRequest => "/requests/new",
            Route::Pending => "/pending",
            Route::Profile => "/profile",
            Route::Unauthorized => "/unauthorized",
            Route::NotFound => "*",
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::Unauthorized | Route::NotFound => Access::Public,
            Route::Dashboard | Route::Requests | Route::Profile => Access::Authenticated,
            Route::NewRequest => Access::Roles(&[Role::Chw]),
            Route::Pending => Access::Roles(APPROVERS),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub name: &'static str,
    pub route: Route,
    pub roles: &'static [Role],
}

const NAVIGATION: [NavItem; 4] = [
    NavItem {
        name: "Dashboard",
        route: Route::Dashboard,
        roles: &Role::ALL,
    },
    NavItem {
        name: "My Requests",
        route: Route::Requests,
        roles: &Role::ALL,
    },
    NavItem {
        name: "New Request",
        route: Route::NewRequest,
        roles: &[Role::Chw],
    },
    NavItem {
        name: "Pending Approvals",
        route: Route::Pending,
        roles: APPROVERS,
    },
];

/// Menu entries visible to `role`, in display order.
pub fn navigation_for(role: Role) -> Vec<NavItem> {
    NAVIGATION
        .iter()
        .filter(|item| item.roles.contains(&role))
        .copied()
        .collect()
}

/// Holder for forced navigations (e.g. back to `/login` once the session is gone).
///
/// Clones share the same channel, so the HTTP layer can redirect and the
/// front end can observe it.
#[derive(Debug, Clone)]
pub struct Navigator {
    tx: watch::Sender<Option<Route>>,
}

impl Navigator {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn redirect(&self, route: Route) {
        info!(route = %route, "navigating");
        self.tx.send_replace(Some(route));
    }

    /// Most recent forced navigation, if any.
    pub fn current(&self) -> Option<Route> {
        *self.tx.borrow()
    }

    /// Consume the pending navigation.
    pub fn take(&self) -> Option<Route> {
        self.tx.send_replace(None)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Route>> {
        self.tx.subscribe()
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_paths() {
        assert_eq!(Route::resolve("/"), Route::Dashboard);
        assert_eq!(Route::resolve(""), Route::Dashboard);
        assert_eq!(Route::resolve("/login"), Route::Login);
        assert_eq!(Route::resolve("/requests/"), Route::Requests);
        assert_eq!(Route::resolve("/requests/new"), Route::NewRequest);
        assert_eq!(Route::resolve("/pending?page=2"), Route::Pending);
        assert_eq!(Route::resolve("/nope"), Route::NotFound);
        for route in Route::ALL.iter().filter(|r| **r != Route::NotFound) {
            assert_eq!(Route::resolve(route.path()), *route);
        }
    }

    #[test]
    fn test_route_access() {
        assert_eq!(Route::Login.access(), Access::Public);
        assert_eq!(Route::Profile.access(), Access::Authenticated);
        assert_eq!(Route::NewRequest.access(), Access::Roles(&[Role::Chw]));
        assert_eq!(
            Route::Pending.access(),
            Access::Roles(&[Role::Cha, Role::Admin])
        );
    }

    #[test]
    fn test_approvers_match_role_capability() {
        let approvers: Vec<Role> = Role::ALL
            .into_iter()
            .filter(|r| r.can_approve_requests())
            .collect();
        assert_eq!(APPROVERS, approvers.as_slice());
    }

    #[test]
    fn test_navigation_by_role() {
        let names = |role| {
            navigation_for(role)
                .into_iter()
                .map(|i| i.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names(Role::Chw), vec!["Dashboard", "My Requests", "New Request"]);
        assert_eq!(names(Role::Cha), vec!["Dashboard", "My Requests", "Pending Approvals"]);
        assert_eq!(names(Role::Admin), names(Role::Cha));
    }

    #[tokio::test]
    async fn test_navigator_notifies_subscribers() {
        let nav = Navigator::new();
        let mut rx = nav.subscribe();
        assert_eq!(nav.current(), None);

        nav.clone().redirect(Route::Login);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(Route::Login));

        assert_eq!(nav.take(), Some(Route::Login));
        assert_eq!(nav.current(), None);
    }
}
