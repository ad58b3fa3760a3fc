//! Views of the application and navigation between them.

use crate::api::models::{LotId, Role, User};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    HomeUsuario,
    HomeDuenio,
    DetailUsuario(LotId),
    DetailDuenio(LotId),
    Reserva(LotId),
    MisReservas,
    ReservasDuenio,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Redirect(Route),
}

impl Route {
    /// Matches a path case-insensitively, ignoring a trailing slash.
    pub fn from_path(path: &str) -> Option<Route> {
        let normalized = path.trim().trim_end_matches('/').to_ascii_lowercase();
        let segments: Vec<&str> = normalized
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        match segments.as_slice() {
            [] => Some(Route::Landing),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["home_usuario"] => Some(Route::HomeUsuario),
            ["home_duenio"] => Some(Route::HomeDuenio),
            ["mis_reservas"] => Some(Route::MisReservas),
            ["reservas_duenio"] => Some(Route::ReservasDuenio),
            ["profile"] => Some(Route::Profile),
            ["detail_usuario", id] => id.parse().ok().map(Route::DetailUsuario),
            ["detail_duenio", id] => id.parse().ok().map(Route::DetailDuenio),
            ["reserva", id] => id.parse().ok().map(Route::Reserva),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::HomeUsuario => "/home_usuario".to_string(),
            Route::HomeDuenio => "/home_duenio".to_string(),
            Route::DetailUsuario(id) => format!("/detail_usuario/{id}"),
            Route::DetailDuenio(id) => format!("/detail_duenio/{id}"),
            Route::Reserva(id) => format!("/reserva/{id}"),
            Route::MisReservas => "/mis_reservas".to_string(),
            Route::ReservasDuenio => "/reservas_duenio".to_string(),
            Route::Profile => "/profile".to_string(),
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Landing | Route::Login | Route::Register)
    }

    pub fn owner_only(&self) -> bool {
        matches!(
            self,
            Route::HomeDuenio | Route::DetailDuenio(_) | Route::ReservasDuenio
        )
    }

    /// Home view a user lands on after signing in.
    pub fn landing_for(role: &Role) -> Route {
        if role.is_owner() {
            Route::HomeDuenio
        } else {
            Route::HomeUsuario
        }
    }

    pub fn guard(&self, user: Option<&User>) -> Access {
        if !self.requires_auth() {
            return Access::Allowed;
        }
        match user {
            None => Access::Redirect(Route::Login),
            Some(user) if self.owner_only() && !user.rol.is_owner() => {
                Access::Redirect(Route::HomeUsuario)
            }
            Some(_) => Access::Allowed,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Holds the current view; subscribers observe redirects such as session expiry.
#[derive(Debug)]
pub struct Navigator {
    current_tx: watch::Sender<Route>,
}

impl Navigator {
    pub fn new(initial: Route) -> Self {
        let (current_tx, _current_rx) = watch::channel(initial);
        Self { current_tx }
    }

    pub fn current(&self) -> Route {
        self.current_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.current_tx.subscribe()
    }

    pub fn navigate(&self, route: Route) {
        debug!(route = %route, "navigate");
        self.current_tx.send_replace(route);
    }

    /// Navigates to `route`, or to wherever the guard sends the user instead.
    pub fn navigate_guarded(&self, route: Route, user: Option<&User>) -> Route {
        let target = match route.guard(user) {
            Access::Allowed => route,
            Access::Redirect(redirect) => redirect,
        };
        self.navigate(target.clone());
        target
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(Route::Landing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(rol: Role) -> User {
        User {
            id: 1,
            nombre: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            rol,
        }
    }

    #[test]
    fn paths_match_case_insensitively() {
        assert_eq!(Route::from_path("/Home_Usuario"), Some(Route::HomeUsuario));
        assert_eq!(Route::from_path("/home_duenio/"), Some(Route::HomeDuenio));
        assert_eq!(Route::from_path(""), Some(Route::Landing));
        assert_eq!(
            Route::from_path("/detail_usuario/42"),
            Some(Route::DetailUsuario(42))
        );
        assert_eq!(Route::from_path("/detail_usuario/abc"), None);
        assert_eq!(Route::from_path("/nowhere"), None);
    }

    #[test]
    fn path_round_trips_through_parser() {
        let routes = [
            Route::Landing,
            Route::Login,
            Route::Profile,
            Route::Reserva(7),
            Route::DetailDuenio(3),
        ];
        for route in routes {
            assert_eq!(Route::from_path(&route.path()), Some(route));
        }
    }

    #[test]
    fn owners_land_on_owner_home() {
        assert_eq!(Route::landing_for(&Role::Duenio), Route::HomeDuenio);
        assert_eq!(Route::landing_for(&Role::Usuario), Route::HomeUsuario);
        assert_eq!(
            Route::landing_for(&Role::Other("CLIENTE".to_string())),
            Route::HomeUsuario
        );
    }

    #[test]
    fn guard_redirects_anonymous_and_non_owner() {
        assert_eq!(Route::Login.guard(None), Access::Allowed);
        assert_eq!(
            Route::MisReservas.guard(None),
            Access::Redirect(Route::Login)
        );
        let customer = user(Role::Usuario);
        assert_eq!(
            Route::ReservasDuenio.guard(Some(&customer)),
            Access::Redirect(Route::HomeUsuario)
        );
        let owner = user(Role::Duenio);
        assert_eq!(Route::ReservasDuenio.guard(Some(&owner)), Access::Allowed);
    }

    #[test]
    fn navigator_publishes_current_route() {
        let navigator = Navigator::default();
        let receiver = navigator.subscribe();
        let landed = navigator.navigate_guarded(Route::Profile, None);
        assert_eq!(landed, Route::Login);
        assert_eq!(*receiver.borrow(), Route::Login);
        assert_eq!(navigator.current(), Route::Login);
    }
}
