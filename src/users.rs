//! User directory, profile updates and the admin-only account controls.
//! Directory reads require an authenticated actor; role and enablement changes
//! are admin-gated. Email is fixed at registration and never editable here.

use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{Role, UserDto};
use crate::policy::{self, Actor};
use crate::store::SharedStore;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub skill: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: String,
    pub job_title: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub contacts_enabled: Option<bool>,
}

fn user_not_found() -> AppError {
    AppError::not_found("user_not_found", "user not found")
}

pub fn list_users(store: &SharedStore, actor: &Actor, q: &UserQuery) -> AppResult<Vec<UserDto>> {
    actor.require_id()?;
    let mut users = store.list_users();
    if let Some(needle) = q.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let needle = needle.trim().to_lowercase();
        users.retain(|u| {
            u.name.to_lowercase().contains(&needle)
                || u.email.contains(&needle)
                || u.job_title.to_lowercase().contains(&needle)
        });
    }
    if let Some(unit) = q.unit.as_deref().filter(|s| !s.trim().is_empty()) {
        users.retain(|u| u.unit == unit);
    }
    if let Some(role) = q.role.as_deref().filter(|s| !s.trim().is_empty()) {
        users.retain(|u| u.role.as_str().eq_ignore_ascii_case(role));
    }
    if let Some(skill) = q.skill.as_deref().filter(|s| !s.trim().is_empty()) {
        users.retain(|u| u.skills.iter().any(|s| s.eq_ignore_ascii_case(skill)));
    }
    Ok(users.iter().map(UserDto::from_user).collect())
}

pub fn get_user(store: &SharedStore, actor: &Actor, id: &str) -> AppResult<UserDto> {
    actor.require_id()?;
    store
        .find_user_by_id(id)
        .map(|u| UserDto::from_user(&u))
        .ok_or_else(user_not_found)
}

/// Profile edits: the principal themselves, or an admin. Email, role and
/// enablement are not editable on this path.
pub fn update_profile(
    store: &SharedStore,
    actor: &Actor,
    id: &str,
    req: &UpdateProfileRequest,
) -> AppResult<UserDto> {
    let caller = actor.require_id()?;
    if caller != id && !actor.is_admin() {
        return Err(AppError::denied("not_self", "only the account owner or an admin may edit a profile"));
    }
    let mut user = store.find_user_by_id(id).ok_or_else(user_not_found)?;
    if req.name.trim().is_empty() || req.job_title.trim().is_empty() {
        return Err(AppError::validation("missing_field", "name and jobTitle are required"));
    }
    user.name = req.name.clone();
    user.job_title = req.job_title.clone();
    if let Some(unit) = &req.unit {
        user.unit = unit.clone();
    }
    if let Some(url) = &req.avatar_url {
        user.avatar_url = Some(url.clone());
    }
    if let Some(bio) = &req.bio {
        user.bio = Some(bio.clone());
    }
    if let Some(skills) = &req.skills {
        user.skills = skills.clone();
    }
    if let Some(flag) = req.contacts_enabled {
        user.contacts_enabled = flag;
    }
    user.touch();
    let user = store.save_user(user);
    Ok(UserDto::from_user(&user))
}

pub fn distinct_units(store: &SharedStore, actor: &Actor) -> AppResult<Vec<String>> {
    actor.require_id()?;
    let mut units: Vec<String> = store.list_users().into_iter().map(|u| u.unit).collect();
    units.sort();
    units.dedup();
    Ok(units)
}

pub fn distinct_job_titles(store: &SharedStore, actor: &Actor) -> AppResult<Vec<String>> {
    actor.require_id()?;
    let mut titles: Vec<String> = store.list_users().into_iter().map(|u| u.job_title).collect();
    titles.sort();
    titles.dedup();
    Ok(titles)
}

pub fn managers(store: &SharedStore, actor: &Actor) -> AppResult<Vec<UserDto>> {
    actor.require_id()?;
    Ok(store
        .list_users()
        .iter()
        .filter(|u| u.role.is_manager())
        .map(UserDto::from_user)
        .collect())
}

/// Admin-only role change. Takes effect on the next token issuance; outstanding
/// tokens keep their embedded role until expiry.
pub fn set_role(store: &SharedStore, actor: &Actor, id: &str, role: Role) -> AppResult<UserDto> {
    policy::authorize_admin(actor)?;
    let mut user = store.find_user_by_id(id).ok_or_else(user_not_found)?;
    user.role = role;
    user.touch();
    let user = store.save_user(user);
    info!(target: "admin", "set_role user={} role={}", user.id, user.role.as_str());
    Ok(UserDto::from_user(&user))
}

/// Admin-only enable/disable. A disabled account cannot log in; outstanding
/// tokens keep working until expiry.
pub fn set_enabled(store: &SharedStore, actor: &Actor, id: &str, enabled: bool) -> AppResult<UserDto> {
    policy::authorize_admin(actor)?;
    let mut user = store.find_user_by_id(id).ok_or_else(user_not_found)?;
    user.enabled = enabled;
    user.touch();
    let user = store.save_user(user);
    info!(target: "admin", "set_enabled user={} enabled={}", user.id, enabled);
    Ok(UserDto::from_user(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn authed(id: &str, role: Role) -> Actor {
        Actor::Authed { id: id.into(), role, unit: "Eng".into() }
    }

    fn seed(store: &SharedStore, name: &str, unit: &str, role: Role, skills: &[&str]) -> User {
        let mut u = User::new(name, &format!("{name}@example.com"), "phc", "Engineer", unit);
        u.role = role;
        u.skills = skills.iter().map(|s| s.to_string()).collect();
        store.save_user(u)
    }

    #[test]
    fn directory_filters_compose() {
        let store = SharedStore::new();
        seed(&store, "ada", "Eng", Role::User, &["rust"]);
        seed(&store, "brian", "Eng", Role::Manager, &["go"]);
        seed(&store, "carol", "Sales", Role::User, &["rust"]);
        let actor = authed("x", Role::User);

        assert_eq!(list_users(&store, &actor, &UserQuery::default()).unwrap().len(), 3);
        let eng = list_users(&store, &actor, &UserQuery { unit: Some("Eng".into()), ..Default::default() }).unwrap();
        assert_eq!(eng.len(), 2);
        let rusties = list_users(&store, &actor, &UserQuery { skill: Some("RUST".into()), ..Default::default() }).unwrap();
        assert_eq!(rusties.len(), 2);
        let mgrs = list_users(&store, &actor, &UserQuery { role: Some("manager".into()), ..Default::default() }).unwrap();
        assert_eq!(mgrs.len(), 1);
        assert!(list_users(&store, &Actor::Anonymous, &UserQuery::default()).is_err());
    }

    #[test]
    fn profile_edit_is_self_or_admin() {
        let store = SharedStore::new();
        let ada = seed(&store, "ada", "Eng", Role::User, &[]);
        let req = UpdateProfileRequest {
            name: "Ada L".into(),
            job_title: "Staff Engineer".into(),
            unit: None,
            avatar_url: None,
            bio: Some("hi".into()),
            skills: Some(vec!["rust".into()]),
            contacts_enabled: Some(false),
        };

        let stranger = authed("someone", Role::Manager);
        assert!(update_profile(&store, &stranger, &ada.id, &req).is_err());

        let updated = update_profile(&store, &authed(&ada.id, Role::User), &ada.id, &req).unwrap();
        assert_eq!(updated.name, "Ada L");
        assert!(!updated.contacts_enabled);

        let admin_touch = update_profile(&store, &authed("root", Role::Admin), &ada.id, &req);
        assert!(admin_touch.is_ok());
    }

    #[test]
    fn role_change_is_admin_only_and_persists() {
        let store = SharedStore::new();
        let ada = seed(&store, "ada", "Eng", Role::User, &[]);

        assert!(set_role(&store, &authed("m", Role::Manager), &ada.id, Role::Manager).is_err());
        let dto = set_role(&store, &authed("root", Role::Admin), &ada.id, Role::Manager).unwrap();
        assert_eq!(dto.role, Role::Manager);
        assert_eq!(store.find_user_by_id(&ada.id).unwrap().role, Role::Manager);
    }

    #[test]
    fn disable_then_reenable() {
        let store = SharedStore::new();
        let ada = seed(&store, "ada", "Eng", Role::User, &[]);
        let admin = authed("root", Role::Admin);
        assert!(!set_enabled(&store, &admin, &ada.id, false).unwrap().enabled);
        assert!(set_enabled(&store, &admin, &ada.id, true).unwrap().enabled);
    }
}
