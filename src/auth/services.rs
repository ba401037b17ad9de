use std::sync::Arc;

use lazy_static::lazy_static;
use tracing::{debug, info, instrument, warn};

use crate::auth::{
    dto::{AuthPayload, PublicUser},
    jwt::JwtKeys,
    password::{compare_password, hash_password},
    repo::UserRepository,
    repo_types::NewUser,
};
use crate::error::{internal, invalid, RepoError, ServiceError};
use crate::validation::{validate_login, validate_registration};

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";
pub const EMAIL_TAKEN: &str = "A user with this email address already exists";
pub const INVALID_TOKEN: &str = "Invalid or expired token";
pub const USER_NOT_FOUND: &str = "User not found";
pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again.";

lazy_static! {
    static ref DUMMY_HASH: String = hash_password("fintrack-unknown-user").unwrap_or_default();
}

/// Login, registration and token verification. Constructed once at start.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, keys: JwtKeys) -> Self {
        Self { users, keys }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ServiceError> {
        let creds = validate_login(email, password).map_err(invalid)?;

        let found = self
            .users
            .find_by_email(&creds.email)
            .await
            .map_err(|e| internal(e, UNEXPECTED))?;

        // Unknown emails are checked against a dummy hash so both misses cost one argon2 run.
        let hash = match &found {
            Some(u) => u.password_hash.clone(),
            None => DUMMY_HASH.clone(),
        };
        let plain = creds.password;
        let ok = tokio::task::spawn_blocking(move || compare_password(&plain, &hash))
            .await
            .map_err(|e| internal(e, UNEXPECTED))?;

        let user = match found {
            Some(u) if ok => u,
            Some(u) => {
                warn!(user_id = u.id, "login invalid password");
                return Err(ServiceError::Authentication(INVALID_CREDENTIALS.into()));
            }
            None => {
                warn!(email = %creds.email, "login unknown email");
                return Err(ServiceError::Authentication(INVALID_CREDENTIALS.into()));
            }
        };

        let user = PublicUser::from(user);
        let token = self
            .keys
            .generate_token(&user)
            .map_err(|e| internal(e, UNEXPECTED))?;
        info!(user_id = user.id, "user logged in");
        Ok(AuthPayload { token, user })
    }

    #[instrument(skip(self, password))]
    pub async fn register(&self, email: &str, password: &str) -> Result<AuthPayload, ServiceError> {
        let creds = validate_registration(email, password).map_err(invalid)?;

        match self.users.find_by_email(&creds.email).await {
            Ok(Some(_)) => {
                warn!(email = %creds.email, "email already registered");
                return Err(ServiceError::Conflict(EMAIL_TAKEN.into()));
            }
            Ok(None) => {}
            Err(e) => return Err(internal(e, UNEXPECTED)),
        }

        let plain = creds.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&plain))
            .await
            .map_err(|e| internal(e, UNEXPECTED))?
            .map_err(|e| internal(format!("{e:#}"), UNEXPECTED))?;

        let user = match self
            .users
            .create(NewUser {
                email: creds.email,
                password_hash,
            })
            .await
        {
            Ok(u) => PublicUser::from(u),
            // Lost a race with a concurrent registration.
            Err(RepoError::AlreadyExists(_)) => {
                return Err(ServiceError::Conflict(EMAIL_TAKEN.into()))
            }
            Err(e) => return Err(internal(e, UNEXPECTED)),
        };

        let token = self
            .keys
            .generate_token(&user)
            .map_err(|e| internal(e, UNEXPECTED))?;
        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(AuthPayload { token, user })
    }

    #[instrument(skip(self, token))]
    pub async fn verify_token(&self, token: &str) -> Result<PublicUser, ServiceError> {
        let Some(subject) = self.keys.verify_token(token) else {
            return Err(ServiceError::Authentication(INVALID_TOKEN.into()));
        };
        match self.users.find_by_id(subject.id).await {
            Ok(Some(user)) => {
                if !user.email.eq_ignore_ascii_case(&subject.email) {
                    debug!(user_id = user.id, "token email differs from current email");
                }
                Ok(user.into())
            }
            Ok(None) => {
                warn!(user_id = subject.id, "token for missing user");
                Err(ServiceError::NotFound(USER_NOT_FOUND.into()))
            }
            Err(e) => Err(internal(e, UNEXPECTED)),
        }
    }
}
