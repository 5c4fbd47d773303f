//! # gatehouse-auth
//!
//! Stateless session tokens and the credential contract used by the
//! gatehouse gateway.
//!
//! ## Architecture
//!
//! - [`token`] - [`TokenService`] trait and the HS256 [`JwtTokenService`]
//! - [`credentials`] - [`CredentialStore`] contract for username/password checks
//! - [`error`] - [`TokenError`] for signing failures
//!
//! ## Quick Start
//!
//! ```rust
//! use gatehouse_auth::{JwtTokenService, TokenService};
//!
//! let tokens = JwtTokenService::new("shared-signing-key");
//! let token = tokens.issue_token("bob").unwrap();
//!
//! assert_eq!(tokens.validate_token(&token).as_deref(), Some("bob"));
//! assert_eq!(tokens.validate_token("not-a-token"), None);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod error;
pub mod token;

#[doc(inline)]
pub use credentials::CredentialStore;
#[doc(inline)]
pub use error::{TokenError, TokenResult};
#[doc(inline)]
pub use token::{DEFAULT_TOKEN_TTL, JwtTokenService, SessionClaims, TokenService};
