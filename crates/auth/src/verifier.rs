//! Credential verification: turns an opaque bearer token into a [`Credential`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::{Credential, CredentialClaims, TokenValidationError, validate_claims};

/// Trusted source of credentials.
///
/// The HTTP layer depends on this trait only; swapping token formats (or
/// moving to sessions) does not touch the access gate or the ledger.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Credential, TokenValidationError>;
}

impl<V> CredentialVerifier for Arc<V>
where
    V: CredentialVerifier + ?Sized,
{
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Credential, TokenValidationError> {
        (**self).verify(token, now)
    }
}

/// HMAC-SHA256 signed tokens carrying [`CredentialClaims`].
pub struct Hs256CredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256CredentialVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // `issued_at`/`expires_at` are RFC 3339 claims checked by `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl CredentialVerifier for Hs256CredentialVerifier {
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Credential, TokenValidationError> {
        let data = jsonwebtoken::decode::<CredentialClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims.into_credential())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};

    use armory_core::BaseId;

    use crate::{PrincipalId, Role};

    fn mint(secret: &str, claims: &CredentialClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("failed to encode token")
    }

    fn commander_claims(now: DateTime<Utc>) -> CredentialClaims {
        CredentialClaims {
            sub: PrincipalId::new(),
            role: Role::BaseCommander,
            base_id: Some(BaseId::new(1)),
            issued_at: now - Duration::seconds(5),
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn verifies_signed_token_into_credential() {
        let now = Utc::now();
        let claims = commander_claims(now);
        let token = mint("secret", &claims);

        let verifier = Hs256CredentialVerifier::new("secret");
        let credential = verifier.verify(&token, now).unwrap();

        assert_eq!(credential.principal_id, claims.sub);
        assert_eq!(credential.role, Role::BaseCommander);
        assert_eq!(credential.base_scope, Some(BaseId::new(1)));
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let now = Utc::now();
        let token = mint("other", &commander_claims(now));

        let verifier = Hs256CredentialVerifier::new("secret");
        assert!(matches!(
            verifier.verify(&token, now),
            Err(TokenValidationError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let token = mint("secret", &commander_claims(now));

        let verifier = Hs256CredentialVerifier::new("secret");
        assert_eq!(
            verifier.verify(&token, now + Duration::hours(1)),
            Err(TokenValidationError::Expired)
        );
    }
}
