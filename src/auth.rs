//! Registration, login and request authentication.
//! Login failures are indistinct on purpose: unknown email, wrong password and a
//! disabled account all produce the same `invalid_credentials` outcome.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{Role, User, UserDto};
use crate::policy::Actor;
use crate::security;
use crate::store::SharedStore;
use crate::token::TokenSigner;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub job_title: String,
    pub unit: String,
    #[serde(default = "default_true")]
    pub contacts_enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub unit: String,
}

fn auth_response(user: &User, token: String) -> AuthResponse {
    AuthResponse {
        token,
        id: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        role: user.role,
        unit: user.unit.clone(),
    }
}

fn invalid_credentials() -> AppError {
    AppError::credentials("invalid_credentials", "invalid email or password")
}

/// Register a new principal. Role always starts at USER; duplicate email is a
/// conflict regardless of case.
pub fn register(store: &SharedStore, signer: &TokenSigner, req: &RegisterRequest) -> AppResult<AuthResponse> {
    for (field, value) in [
        ("name", &req.name),
        ("email", &req.email),
        ("jobTitle", &req.job_title),
        ("unit", &req.unit),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation("missing_field", format!("{field} is required").as_str()));
        }
    }
    if req.password.chars().count() < security::MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password_too_short",
            format!("password must be at least {} characters", security::MIN_PASSWORD_LEN).as_str(),
        ));
    }
    if store.user_exists_by_email(&req.email) {
        return Err(AppError::conflict("email_taken", "a user with this email already exists"));
    }

    let hash = security::hash_password(&req.password)?;
    let mut user = User::new(&req.name, &req.email, &hash, &req.job_title, &req.unit);
    user.contacts_enabled = req.contacts_enabled;
    let user = store.save_user(user);
    let token = signer.issue(&user)?;
    info!(target: "auth", "register user={} unit={}", user.id, user.unit);
    Ok(auth_response(&user, token))
}

pub fn login(store: &SharedStore, signer: &TokenSigner, req: &LoginRequest) -> AppResult<AuthResponse> {
    let Some(user) = store.find_user_by_email(&req.email) else {
        return Err(invalid_credentials());
    };
    if !user.enabled || !security::verify_password(&user.password_hash, &req.password) {
        return Err(invalid_credentials());
    }
    let token = signer.issue(&user)?;
    info!(target: "auth", "login user={}", user.id);
    Ok(auth_response(&user, token))
}

/// Resolve the authenticated principal's profile.
pub fn current_user(store: &SharedStore, actor: &Actor) -> AppResult<UserDto> {
    let id = actor.require_id()?;
    store
        .find_user_by_id(id)
        .map(|u| UserDto::from_user(&u))
        .ok_or_else(|| AppError::not_found("user_not_found", "user not found"))
}

/// Derive the actor from an optional `Authorization` header value.
/// A missing header, a non-bearer scheme, or any token-validation failure all
/// yield `Anonymous`; protected paths then raise the collapsed rejection, so the
/// three token failure modes are indistinguishable to the client.
pub fn actor_from_bearer(signer: &TokenSigner, header: Option<&str>) -> Actor {
    let Some(raw) = header else { return Actor::Anonymous };
    let Some(token) = raw.strip_prefix("Bearer ").map(str::trim) else {
        return Actor::Anonymous;
    };
    match signer.validate(token) {
        Ok(claims) => Actor::from_claims(&claims),
        Err(e) => {
            tracing::debug!(target: "auth", "token rejected: {e}");
            Actor::Anonymous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret".to_vec(), Duration::from_secs(3600))
    }

    fn req(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ada".into(),
            email: email.into(),
            password: "secret1".into(),
            job_title: "Engineer".into(),
            unit: "Eng".into(),
            contacts_enabled: true,
        }
    }

    #[test]
    fn register_then_login_roundtrip() {
        let store = SharedStore::new();
        let s = signer();
        let reg = register(&store, &s, &req("ada@example.com")).expect("register");
        assert_eq!(reg.role, Role::User);

        let login = login(&store, &s, &LoginRequest { email: "ada@example.com".into(), password: "secret1".into() })
            .expect("login");
        let claims = s.validate(&login.token).expect("valid token");
        assert_eq!(claims.sub, reg.id);
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn duplicate_email_is_conflict_case_insensitive() {
        let store = SharedStore::new();
        let s = signer();
        register(&store, &s, &req("ada@example.com")).expect("register");
        let err = register(&store, &s, &req("ADA@Example.com")).unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));
    }

    #[test]
    fn wrong_password_and_unknown_email_are_indistinct() {
        let store = SharedStore::new();
        let s = signer();
        register(&store, &s, &req("ada@example.com")).expect("register");
        let a = login(&store, &s, &LoginRequest { email: "ada@example.com".into(), password: "nope".into() })
            .unwrap_err();
        let b = login(&store, &s, &LoginRequest { email: "ghost@example.com".into(), password: "nope".into() })
            .unwrap_err();
        assert_eq!(a.code_str(), b.code_str());
    }

    #[test]
    fn disabled_account_cannot_login() {
        let store = SharedStore::new();
        let s = signer();
        let reg = register(&store, &s, &req("ada@example.com")).expect("register");
        let mut user = store.find_user_by_id(&reg.id).unwrap();
        user.enabled = false;
        store.save_user(user);
        let err = login(&store, &s, &LoginRequest { email: "ada@example.com".into(), password: "secret1".into() })
            .unwrap_err();
        assert!(matches!(err, AppError::Credentials { .. }));
    }

    #[test]
    fn short_password_is_rejected_at_the_boundary() {
        let store = SharedStore::new();
        let s = signer();
        let mut r = req("ada@example.com");
        r.password = "12345".into();
        let err = register(&store, &s, &r).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn bearer_parsing() {
        let store = SharedStore::new();
        let s = signer();
        let reg = register(&store, &s, &req("ada@example.com")).expect("register");

        assert_eq!(actor_from_bearer(&s, None), Actor::Anonymous);
        assert_eq!(actor_from_bearer(&s, Some("Basic abc")), Actor::Anonymous);
        assert_eq!(actor_from_bearer(&s, Some("Bearer garbage")), Actor::Anonymous);
        let actor = actor_from_bearer(&s, Some(&format!("Bearer {}", reg.token)));
        assert_eq!(actor.id(), Some(reg.id.as_str()));
    }
}
