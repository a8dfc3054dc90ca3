//! Unit-scope reporting for managers.
//! The gate is role-based only: any MANAGER (or ADMIN) may query any unit, not
//! just their own, and unit listings are not visibility-filtered. Reports read
//! the certificate's denormalized unit, so records follow the unit they were
//! created under even if the author later moves.

use serde::Serialize;

use crate::error::AppResult;
use crate::export;
use crate::model::{Certificate, CertificateDto, User, UserDto};
use crate::policy::{self, Actor};
use crate::store::SharedStore;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStats {
    pub unit_name: String,
    pub total_members: usize,
    pub total_certifications: usize,
    pub average_certifications: f64,
    pub active_learners: usize,
    pub top_performer: Option<UserDto>,
}

fn certs_in_unit(store: &SharedStore, unit: &str) -> Vec<Certificate> {
    store
        .list_certs()
        .into_iter()
        .filter(|c| c.unit == unit)
        .collect()
}

pub fn unit_members(store: &SharedStore, actor: &Actor, unit: &str) -> AppResult<Vec<UserDto>> {
    policy::authorize_unit_scope(actor)?;
    Ok(store.users_in_unit(unit).iter().map(UserDto::from_user).collect())
}

pub fn unit_certificates(store: &SharedStore, actor: &Actor, unit: &str) -> AppResult<Vec<CertificateDto>> {
    policy::authorize_unit_scope(actor)?;
    Ok(certs_in_unit(store, unit)
        .iter()
        .map(|c| crate::certs::dto_for(store, actor, c))
        .collect())
}

pub fn unit_stats(store: &SharedStore, actor: &Actor, unit: &str) -> AppResult<UnitStats> {
    policy::authorize_unit_scope(actor)?;
    let members = store.users_in_unit(unit);
    let total_certifications = certs_in_unit(store, unit).len();

    let counts: Vec<(usize, &User)> = members
        .iter()
        .map(|u| (store.count_certs_by_author(&u.id), u))
        .collect();
    let active_learners = counts.iter().filter(|(n, _)| *n > 0).count();
    let top_performer = counts
        .iter()
        .filter(|(n, _)| *n > 0)
        .max_by_key(|(n, _)| *n)
        .map(|(_, u)| UserDto::from_user(u));
    let average_certifications = if members.is_empty() {
        0.0
    } else {
        round2(total_certifications as f64 / members.len() as f64)
    };

    Ok(UnitStats {
        unit_name: unit.to_string(),
        total_members: members.len(),
        total_certifications,
        average_certifications,
        active_learners,
        top_performer,
    })
}

pub const MEMBER_EXPORT_HEADER: [&str; 8] = [
    "Name",
    "Email",
    "Job Title",
    "Unit",
    "Role",
    "Certificates Count",
    "Contact Enabled",
    "Join Date",
];

pub const CERT_EXPORT_HEADER: [&str; 10] = [
    "Title",
    "Category",
    "Subcategory",
    "Issuer",
    "Completion Date",
    "Author Name",
    "Author Email",
    "Likes",
    "Views",
    "Created Date",
];

pub fn export_unit_members(store: &SharedStore, actor: &Actor, unit: &str) -> AppResult<Vec<u8>> {
    policy::authorize_unit_scope(actor)?;
    let rows: Vec<Vec<String>> = store
        .users_in_unit(unit)
        .iter()
        .map(|u| {
            vec![
                u.name.clone(),
                u.email.clone(),
                u.job_title.clone(),
                u.unit.clone(),
                u.role.as_str().to_string(),
                store.count_certs_by_author(&u.id).to_string(),
                u.contacts_enabled.to_string(),
                u.created_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    Ok(export::to_csv(&MEMBER_EXPORT_HEADER, &rows))
}

pub fn export_unit_certificates(store: &SharedStore, actor: &Actor, unit: &str) -> AppResult<Vec<u8>> {
    policy::authorize_unit_scope(actor)?;
    let rows: Vec<Vec<String>> = certs_in_unit(store, unit)
        .iter()
        .map(|c| {
            let author = store.find_user_by_id(&c.author_id);
            vec![
                c.title.clone(),
                c.category.clone(),
                c.subcategory.clone().unwrap_or_default(),
                c.issuer.clone(),
                c.completion_date.format("%Y-%m-%d").to_string(),
                author.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
                author.as_ref().map(|u| u.email.clone()).unwrap_or_default(),
                c.likes.to_string(),
                c.views.to_string(),
                c.created_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    Ok(export::to_csv(&CERT_EXPORT_HEADER, &rows))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
