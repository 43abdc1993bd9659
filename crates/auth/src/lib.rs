//! `armory-auth`: pure authorization boundary (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage. Callers hand
//! it a verified [`Credential`]; how the credential was obtained is not its
//! concern.

pub mod authorize;
pub mod claims;
pub mod operation;
pub mod principal;
pub mod roles;
pub mod verifier;

pub use authorize::{AccessGate, AuthzError, RoleMatrixGate};
pub use claims::{CredentialClaims, TokenValidationError, validate_claims};
pub use operation::OperationKind;
pub use principal::{Credential, PrincipalId};
pub use roles::Role;
pub use verifier::{CredentialVerifier, Hs256CredentialVerifier};
