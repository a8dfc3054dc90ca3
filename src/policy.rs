//! Access policy engine and visibility filter.
//!
//! State-free evaluation over `(actor, action, resource)`. The role tiers are not
//! a linear hierarchy: each rule names the principals it accepts. Denials carry an
//! internal reason for logs, but the HTTP boundary collapses every `Denied` and
//! `Unauthenticated` into the same generic rejection (see `error.rs`).

use crate::error::{AppError, AppResult};
use crate::model::{Certificate, Role, Visibility};
use crate::token::Claims;

/// The requesting principal: anonymous, or claims extracted from a valid token.
/// Claims are trusted as-is; a stale role/unit persists until the token expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    Authed { id: String, role: Role, unit: String },
}

impl Actor {
    pub fn from_claims(claims: &Claims) -> Self {
        Actor::Authed {
            id: claims.sub.clone(),
            role: claims.role,
            unit: claims.unit.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::Authed { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Actor::Anonymous => None,
            Actor::Authed { id, .. } => Some(id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Authed { role, .. } if role.is_admin())
    }

    /// The principal id, or the collapsed rejection for anonymous callers.
    pub fn require_id(&self) -> AppResult<&str> {
        self.id()
            .ok_or_else(|| AppError::unauthenticated("missing_bearer", "authentication required"))
    }
}

/// Read rule per declared visibility:
/// PUBLIC → anyone, PRIVATE → owner or admin, UNIT_ONLY → matching unit or admin.
pub fn can_read(actor: &Actor, cert: &Certificate) -> bool {
    match cert.visibility {
        Visibility::Public => true,
        Visibility::Private => match actor {
            Actor::Anonymous => false,
            Actor::Authed { id, role, .. } => role.is_admin() || id == &cert.author_id,
        },
        Visibility::UnitOnly => match actor {
            Actor::Anonymous => false,
            Actor::Authed { role, unit, .. } => role.is_admin() || unit == &cert.unit,
        },
    }
}

/// Read gate for the by-id path. Callers run the not-found check first.
pub fn authorize_read(actor: &Actor, cert: &Certificate) -> AppResult<()> {
    if can_read(actor, cert) {
        Ok(())
    } else {
        Err(AppError::denied("not_visible", "principal may not read this record"))
    }
}

/// Update/delete gate: resource owner or admin.
pub fn authorize_modify(actor: &Actor, cert: &Certificate) -> AppResult<()> {
    match actor {
        Actor::Anonymous => Err(AppError::unauthenticated("missing_bearer", "authentication required")),
        Actor::Authed { id, role, .. } => {
            if role.is_admin() || id == &cert.author_id {
                Ok(())
            } else {
                Err(AppError::denied("not_owner", "only the author or an admin may modify this record"))
            }
        }
    }
}

/// Unit-scoped list/export gate: MANAGER or ADMIN. No unit-equality requirement is
/// enforced; any manager may query any unit's data.
pub fn authorize_unit_scope(actor: &Actor) -> AppResult<()> {
    match actor {
        Actor::Anonymous => Err(AppError::unauthenticated("missing_bearer", "authentication required")),
        Actor::Authed { role, .. } => {
            if role.is_manager() {
                Ok(())
            } else {
                Err(AppError::denied("not_manager", "manager role required"))
            }
        }
    }
}

/// Admin-only gate.
pub fn authorize_admin(actor: &Actor) -> AppResult<()> {
    match actor {
        Actor::Anonymous => Err(AppError::unauthenticated("missing_bearer", "authentication required")),
        Actor::Authed { role, .. } => {
            if role.is_admin() {
                Ok(())
            } else {
                Err(AppError::denied("not_admin", "admin role required"))
            }
        }
    }
}

/// Narrow a candidate set to the records the actor may read. Applied to every
/// multi-resource query; membership matches `can_read` exactly.
pub fn filter_visible(actor: &Actor, certs: Vec<Certificate>) -> Vec<Certificate> {
    certs.into_iter().filter(|c| can_read(actor, c)).collect()
}
