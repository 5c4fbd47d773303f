//! Gateway configuration file
//!
//! A single JSON document supplies the token signing key, the users with
//! their bcrypt password hashes, and the named routes:
//!
//! ```json
//! {
//!   "shared_key": "change-me",
//!   "users": [
//!     { "username": "bob", "password_hash": "$2b$12$..." }
//!   ],
//!   "allowed_routes": [
//!     { "name": "db", "destination": "http://10.0.0.5:8080", "users": ["bob"] }
//!   ]
//! }
//! ```
//!
//! The loaded [`GatewayConfig`] is immutable and doubles as the
//! [`CredentialStore`] and [`RouteStore`] for the server.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use gatehouse_auth::CredentialStore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{GatewayError, GatewayErrorExt, GatewayResult};
use crate::routes::RouteStore;

/// A configured user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Login name
    pub username: String,
    /// bcrypt hash of the password
    pub password_hash: String,
}

/// A configured route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// Route name, as used in `/proxy/{name}`
    pub name: String,
    /// Backend base URL
    pub destination: String,
    /// Users allowed to use the route
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Deserialize)]
struct RawConfig {
    shared_key: String,
    #[serde(default)]
    users: Vec<UserEntry>,
    #[serde(default, rename = "allowed_routes")]
    routes: Vec<RouteEntry>,
}

/// Loaded and validated gateway configuration
pub struct GatewayConfig {
    shared_key: SecretString,
    usernames: Vec<String>,
    password_hashes: HashMap<String, String>,
    destinations: HashMap<String, String>,
    allowed_users: HashMap<String, HashSet<String>>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("shared_key", &"<redacted>")
            .field("usernames", &self.usernames)
            .field("routes", &self.destinations.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl GatewayConfig {
    /// Read and validate the configuration file at `path`
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the file cannot be read,
    /// is not valid JSON, or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> GatewayResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Reading configuration");

        let contents = std::fs::read_to_string(path).config_context(path.display().to_string())?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] if the document is not valid
    /// JSON, the shared key is empty, or a username or route name repeats.
    pub fn from_json(json: &str) -> GatewayResult<Self> {
        let raw: RawConfig = serde_json::from_str(json).config_context("configuration document")?;

        if raw.shared_key.trim().is_empty() {
            return Err(GatewayError::configuration_with_key(
                "shared key must not be empty",
                "shared_key",
            ));
        }

        let mut usernames = Vec::with_capacity(raw.users.len());
        let mut password_hashes = HashMap::with_capacity(raw.users.len());
        for user in raw.users {
            if user.username.is_empty() {
                return Err(GatewayError::configuration_with_key(
                    "username must not be empty",
                    "users",
                ));
            }
            if password_hashes.contains_key(&user.username) {
                return Err(GatewayError::configuration_with_key(
                    format!("duplicate user '{}'", user.username),
                    "users",
                ));
            }
            usernames.push(user.username.clone());
            password_hashes.insert(user.username, user.password_hash);
        }

        let mut destinations = HashMap::with_capacity(raw.routes.len());
        let mut allowed_users = HashMap::with_capacity(raw.routes.len());
        for route in raw.routes {
            if destinations.contains_key(&route.name) {
                return Err(GatewayError::configuration_with_key(
                    format!("duplicate route '{}'", route.name),
                    "allowed_routes",
                ));
            }
            if let Err(e) = Url::parse(&route.destination) {
                warn!(
                    route = %route.name,
                    destination = %route.destination,
                    error = %e,
                    "Route destination is not a valid URL; requests to it will fail"
                );
            }
            for user in &route.users {
                if !password_hashes.contains_key(user) {
                    warn!(route = %route.name, username = %user, "Route allows an unknown user");
                }
            }
            allowed_users.insert(route.name.clone(), route.users.into_iter().collect());
            destinations.insert(route.name, route.destination);
        }

        Ok(Self {
            shared_key: SecretString::from(raw.shared_key),
            usernames,
            password_hashes,
            destinations,
            allowed_users,
        })
    }

    /// Token signing key
    pub fn shared_key(&self) -> &SecretString {
        &self.shared_key
    }

    /// Configured usernames, in file order
    pub fn usernames(&self) -> &[String] {
        &self.usernames
    }

    /// Number of configured routes
    pub fn route_count(&self) -> usize {
        self.destinations.len()
    }

    /// Log what was loaded, without the signing key
    pub fn log_summary(&self) {
        info!(
            users = self.usernames.len(),
            routes = self.destinations.len(),
            "Configuration loaded"
        );
        for (name, destination) in &self.destinations {
            debug!(route = %name, destination = %destination, "Route");
        }
    }
}

impl CredentialStore for GatewayConfig {
    fn username_exists(&self, username: &str) -> bool {
        self.password_hashes.contains_key(username)
    }

    fn verify_password(&self, username: &str, password: &str) -> bool {
        let Some(hash) = self.password_hashes.get(username) else {
            return false;
        };
        match bcrypt::verify(password, hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(username = %username, error = %e, "Stored password hash is unusable");
                false
            }
        }
    }
}

impl RouteStore for GatewayConfig {
    fn is_user_allowed(&self, route: &str, username: &str) -> bool {
        self.allowed_users
            .get(route)
            .is_some_and(|users| users.contains(username))
    }

    fn resolve_destination(&self, route: &str) -> Option<String> {
        self.destinations.get(route).cloned()
    }
}
