use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use super::claims::{Claims, TokenSubject};
use super::dto::PublicUser;
use crate::config::JwtConfig;

/// Holds JWT signing and verification keys with config data.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: cfg.expires_in,
        }
    }

    pub fn generate_token(&self, user: &PublicUser) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .context("token lifetime out of range")?;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        let token = encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?;
        debug!(user_id = %claims.sub, "jwt signed");
        Ok(token)
    }

    /// Any failure (malformed, expired, wrong key, issuer or audience,
    /// missing claims) yields `None`; the reason only goes to the log.
    pub fn verify_token(&self, token: &str) -> Option<TokenSubject> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let claims = match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "jwt rejected");
                return None;
            }
        };

        let id = match claims.sub.parse::<i64>() {
            Ok(id) if id > 0 => id,
            _ => {
                debug!(sub = %claims.sub, "jwt subject is not a user id");
                return None;
            }
        };
        if claims.email.is_empty() {
            debug!(user_id = id, "jwt has no email claim");
            return None;
        }
        debug!(user_id = id, "jwt verified");
        Some(TokenSubject {
            id,
            email: claims.email,
        })
    }
}

/// Accepts exactly `Bearer <token>`; anything else is `None`.
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    let mut parts = header?.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            expires_in: Duration::from_secs(300),
        })
    }

    fn user(id: i64) -> PublicUser {
        PublicUser {
            id,
            email: "test@example.com".into(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn claims_for(keys: &JwtKeys, sub: &str, exp_offset: i64) -> Claims {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Claims {
            sub: sub.into(),
            email: "test@example.com".into(),
            iat: now as usize,
            exp: (now + exp_offset) as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
        }
    }

    #[test]
    fn oversized_lifetime_is_an_error() {
        let keys = JwtKeys::from_config(&JwtConfig {
            secret: "dev-secret".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            expires_in: Duration::from_secs(u64::MAX),
        });
        assert!(keys.generate_token(&user(1)).is_err());
    }

    #[test]
    fn sign_and_verify_token() {
        let keys = make_keys("dev-secret", "test-issuer", "test-aud");
        let token = keys.generate_token(&user(42)).expect("sign token");
        let subject = keys.verify_token(&token).expect("verify token");
        assert_eq!(subject.id, 42);
        assert_eq!(subject.email, "test@example.com");
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys("same-secret", "good-iss", "good-aud");
        let token = good_keys.generate_token(&user(1)).expect("sign token");
        assert!(make_keys("same-secret", "bad-iss", "good-aud")
            .verify_token(&token)
            .is_none());
        assert!(make_keys("same-secret", "good-iss", "bad-aud")
            .verify_token(&token)
            .is_none());
    }

    #[test]
    fn verify_rejects_wrong_secret_and_garbage() {
        let keys = make_keys("secret-a", "iss", "aud");
        let token = keys.generate_token(&user(1)).expect("sign token");
        assert!(make_keys("secret-b", "iss", "aud").verify_token(&token).is_none());
        assert!(keys.verify_token("not.a.jwt").is_none());
        assert!(keys.verify_token("").is_none());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys("secret", "iss", "aud");
        let token = keys.sign(&claims_for(&keys, "1", -3600)).unwrap();
        assert!(keys.verify_token(&token).is_none());
    }

    #[test]
    fn verify_rejects_non_numeric_subject() {
        let keys = make_keys("secret", "iss", "aud");
        let token = keys.sign(&claims_for(&keys, "abc", 3600)).unwrap();
        assert!(keys.verify_token(&token).is_none());
        let token = keys.sign(&claims_for(&keys, "-4", 3600)).unwrap();
        assert!(keys.verify_token(&token).is_none());
    }

    #[test]
    fn extract_bearer_token_strictly() {
        assert_eq!(extract_token_from_header(Some("Bearer abc.def")), Some("abc.def"));
        assert_eq!(extract_token_from_header(Some("bearer abc")), None);
        assert_eq!(extract_token_from_header(Some("Bearer")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);
        assert_eq!(extract_token_from_header(Some("Bearer a b")), None);
        assert_eq!(extract_token_from_header(Some("Basic abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }
}
