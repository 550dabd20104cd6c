use std::fmt;

use uuid::Uuid;

/// Screens of the app, addressed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Map,
    NewPin,
    MyPins,
    Settings,
    ProfileSettings,
    AccountSettings,
    Login,
    Register,
    Reset,
    Activity,
    ActivityDrops,
    Profile(String),
    Trips,
    Trip(Uuid),
    Notifications,
}

/// Result of resolving a path: where to go, and whether the path had to
/// be redirected to get there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub route: Route,
    pub redirected: bool,
}

impl Route {
    /// Resolve a path. `/`, `/rides` and anything unknown land on the map.
    pub fn parse(path: &str) -> Resolved {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            ["rides", "map"] => Some(Route::Map),
            ["pins", "new"] => Some(Route::NewPin),
            ["pins", "mine"] => Some(Route::MyPins),
            ["settings"] => Some(Route::Settings),
            ["settings", "profile"] => Some(Route::ProfileSettings),
            ["settings", "account"] => Some(Route::AccountSettings),
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["reset"] => Some(Route::Reset),
            ["activity"] => Some(Route::Activity),
            ["activity", "drops"] => Some(Route::ActivityDrops),
            ["profile", username] => Some(Route::Profile(username.trim_start_matches('@').to_string())),
            ["trips"] => Some(Route::Trips),
            ["trips", id] => Uuid::parse_str(id).ok().map(Route::Trip),
            ["notifications"] => Some(Route::Notifications),
            _ => None,
        };

        match route {
            Some(route) => Resolved {
                route,
                redirected: false,
            },
            None => {
                tracing::debug!("redirecting {:?} to the map", path);
                Resolved {
                    route: Route::Map,
                    redirected: true,
                }
            }
        }
    }

    /// Canonical path for this route.
    pub fn path(&self) -> String {
        match self {
            Route::Map => "/rides/map".to_string(),
            Route::NewPin => "/pins/new".to_string(),
            Route::MyPins => "/pins/mine".to_string(),
            Route::Settings => "/settings".to_string(),
            Route::ProfileSettings => "/settings/profile".to_string(),
            Route::AccountSettings => "/settings/account".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Reset => "/reset".to_string(),
            Route::Activity => "/activity".to_string(),
            Route::ActivityDrops => "/activity/drops".to_string(),
            Route::Profile(username) => format!("/profile/{}", urlencoding::encode(username)),
            Route::Trips => "/trips".to_string(),
            Route::Trip(id) => format!("/trips/{}", id),
            Route::Notifications => "/notifications".to_string(),
        }
    }

    /// Screens that only make sense when signed in.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Route::NewPin
                | Route::MyPins
                | Route::ProfileSettings
                | Route::AccountSettings
                | Route::ActivityDrops
                | Route::Trips
                | Route::Notifications
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
