//! Core data model: users (principals) and certificates (shared records).
//! Entities are plain structs with constructors; wire DTOs live alongside them
//! so every boundary serializes the same shapes.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Three-tier role. Not a linear hierarchy: each action names the roles it
/// accepts, so the helpers below are the only role comparisons in the codebase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Manager,
    Admin,
}

impl Role {
    pub fn is_manager(self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Manager => "MANAGER",
            Role::Admin => "ADMIN",
        }
    }
}

/// Record-level read scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    UnitOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: String,
    pub password_hash: String,
    pub job_title: String,
    pub unit: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub contacts_enabled: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: &str, email: &str, password_hash: &str, job_title: &str, unit: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.trim().to_lowercase(),
            password_hash: password_hash.to_string(),
            job_title: job_title.to_string(),
            unit: unit.to_string(),
            role: Role::User,
            avatar_url: None,
            bio: None,
            skills: Vec::new(),
            contacts_enabled: true,
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: String,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub issuer: String,
    pub completion_date: NaiveDate,
    pub file_url: Option<String>,
    pub external_links: Vec<String>,
    pub remarks: Option<String>,
    pub tags: Vec<String>,
    /// Owner reference; immutable after creation.
    pub author_id: String,
    /// Denormalized copy of the owner's unit at creation time, not a live reference.
    pub unit: String,
    pub visibility: Visibility,
    pub views: u64,
    pub likes: u64,
    pub liked_by: HashSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Certificate {
    pub fn new(
        title: &str,
        category: &str,
        issuer: &str,
        completion_date: NaiveDate,
        author_id: &str,
        unit: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            category: category.to_string(),
            subcategory: None,
            issuer: issuer.to_string(),
            completion_date,
            file_url: None,
            external_links: Vec::new(),
            remarks: None,
            tags: Vec::new(),
            author_id: author_id.to_string(),
            unit: unit.to_string(),
            visibility: Visibility::Public,
            views: 0,
            likes: 0,
            liked_by: HashSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liked_by.contains(user_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Public view of a user; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub name: String,
    pub email: String,
    pub job_title: String,
    pub unit: String,
    pub role: Role,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub contacts_enabled: bool,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl UserDto {
    pub fn from_user(u: &User) -> Self {
        Self {
            id: u.id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            job_title: u.job_title.clone(),
            unit: u.unit.clone(),
            role: u.role,
            avatar_url: u.avatar_url.clone(),
            bio: u.bio.clone(),
            skills: u.skills.clone(),
            contacts_enabled: u.contacts_enabled,
            enabled: u.enabled,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDto {
    pub id: String,
    pub title: String,
    pub category: String,
    pub subcategory: Option<String>,
    pub issuer: String,
    pub completion_date: NaiveDate,
    pub file_url: Option<String>,
    pub external_links: Vec<String>,
    pub remarks: Option<String>,
    pub tags: Vec<String>,
    pub author_id: String,
    pub unit: String,
    pub visibility: Visibility,
    pub likes: u64,
    pub views: u64,
    pub liked_by_current_user: bool,
    pub author: Option<UserDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificateDto {
    pub fn from_certificate(c: &Certificate) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            category: c.category.clone(),
            subcategory: c.subcategory.clone(),
            issuer: c.issuer.clone(),
            completion_date: c.completion_date,
            file_url: c.file_url.clone(),
            external_links: c.external_links.clone(),
            remarks: c.remarks.clone(),
            tags: c.tags.clone(),
            author_id: c.author_id.clone(),
            unit: c.unit.clone(),
            visibility: c.visibility,
            likes: c.likes,
            views: c.views,
            liked_by_current_user: false,
            author: None,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Paginated collection wrapper used by the list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
    pub total_pages: usize,
}
