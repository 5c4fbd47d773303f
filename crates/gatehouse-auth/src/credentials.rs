//! Credential lookup contract
//!
//! The gateway never sees password hashes directly. It asks a
//! [`CredentialStore`] two questions, in this order, when a client opens a
//! session: does the username exist, and does the password match.

/// Answers username and password questions for session creation
///
/// Implementations must be cheap to share across request tasks. Password
/// verification may be CPU-bound (bcrypt, argon2); callers on an async
/// runtime should run it on the blocking pool.
pub trait CredentialStore: Send + Sync {
    /// Whether `username` is a configured user
    fn username_exists(&self, username: &str) -> bool;

    /// Whether `password` matches the stored hash for `username`
    ///
    /// Returns `false` for unknown usernames.
    fn verify_password(&self, username: &str, password: &str) -> bool;
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn username_exists(&self, username: &str) -> bool {
        (**self).username_exists(username)
    }

    fn verify_password(&self, username: &str, password: &str) -> bool {
        (**self).verify_password(username, password)
    }
}
