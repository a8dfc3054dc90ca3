//! Certificate service: create/update/delete, by-id reads with view counting,
//! like toggling, and the discovery queries (list, search, trending, recent).
//! Every multi-record query is narrowed through the visibility filter before it
//! leaves this module; by-id paths run the existence check before any policy
//! check so ownership probing cannot distinguish "absent" from "hidden" beyond
//! the collapsed rejection.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{Certificate, CertificateDto, Page, UserDto, Visibility};
use crate::policy::{self, Actor};
use crate::store::SharedStore;
use crate::upload::AssetHost;

pub const TRENDING_LIMIT: usize = 10;
pub const RECENT_LIMIT: usize = 20;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub issuer: String,
    pub completion_date: NaiveDate,
    #[serde(default)]
    pub external_links: Vec<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub visibility: Visibility,
    /// Raw file bytes, base64-encoded; delegated to the asset host when present.
    #[serde(default)]
    pub file_base64: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_sort")]
    pub sort: String,
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_size() -> usize {
    10
}

fn default_sort() -> String {
    "createdAt".to_string()
}

fn default_direction() -> String {
    "desc".to_string()
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 0,
            size: default_size(),
            sort: default_sort(),
            direction: default_direction(),
            search: None,
            category: None,
        }
    }
}

fn not_found() -> AppError {
    AppError::not_found("cert_not_found", "certificate not found")
}

fn validate_request(req: &CertificateRequest) -> AppResult<()> {
    for (field, value) in [
        ("title", &req.title),
        ("category", &req.category),
        ("issuer", &req.issuer),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::validation("missing_field", format!("{field} is required").as_str()));
        }
    }
    if req.completion_date > Utc::now().date_naive() {
        return Err(AppError::validation(
            "future_completion_date",
            "completion date cannot be in the future",
        ));
    }
    Ok(())
}

/// Push the optional attached file to the asset collaborator. An upload failure
/// aborts the enclosing create/update before anything is persisted.
fn upload_if_present(assets: &dyn AssetHost, req: &CertificateRequest) -> AppResult<Option<String>> {
    match &req.file_base64 {
        None => Ok(None),
        Some(encoded) => {
            let bytes = BASE64_STANDARD
                .decode(encoded)
                .map_err(|_| AppError::validation("bad_file_encoding", "file payload is not valid base64"))?;
            let url = assets.upload(&bytes, "certificates")?;
            Ok(Some(url))
        }
    }
}

/// Build the outward DTO: embed the author profile and the liked-by-me flag.
pub fn dto_for(store: &SharedStore, actor: &Actor, cert: &Certificate) -> CertificateDto {
    let mut dto = CertificateDto::from_certificate(cert);
    if let Some(author) = store.find_user_by_id(&cert.author_id) {
        dto.author = Some(UserDto::from_user(&author));
    }
    if let Some(id) = actor.id() {
        dto.liked_by_current_user = cert.is_liked_by(id);
    }
    dto
}

fn matches_search(cert: &Certificate, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    cert.title.to_lowercase().contains(&needle)
        || cert.issuer.to_lowercase().contains(&needle)
        || cert.category.to_lowercase().contains(&needle)
        || cert.tags.iter().any(|t| t.to_lowercase().contains(&needle))
}

fn sort_certs(certs: &mut [Certificate], sort: &str, direction: &str) {
    let descending = !direction.eq_ignore_ascii_case("asc");
    match sort {
        "likes" => order_by(certs, descending, |c| c.likes),
        "views" => order_by(certs, descending, |c| c.views),
        // "createdAt" and anything unrecognized fall back to creation time.
        _ => order_by(certs, descending, |c| c.created_at),
    }
}

/// Stable sort in either direction. The comparator is flipped rather than the
/// slice, so tied keys keep insertion order under desc as well as asc.
fn order_by<K: Ord>(certs: &mut [Certificate], descending: bool, key: impl Fn(&Certificate) -> K) {
    if descending {
        certs.sort_by(|a, b| key(b).cmp(&key(a)));
    } else {
        certs.sort_by(|a, b| key(a).cmp(&key(b)));
    }
}

fn paginate<T>(items: Vec<T>, page: usize, size: usize) -> Page<T> {
    let size = size.clamp(1, 100);
    let total = items.len();
    let total_pages = total.div_ceil(size);
    let items = items.into_iter().skip(page * size).take(size).collect();
    Page { items, page, size, total, total_pages }
}

/// Paginated, sorted, visibility-filtered listing with optional search/category.
pub fn list(store: &SharedStore, actor: &Actor, params: &ListParams) -> Page<CertificateDto> {
    let mut certs = policy::filter_visible(actor, store.list_certs());
    if let Some(q) = params.search.as_deref().filter(|q| !q.trim().is_empty()) {
        certs.retain(|c| matches_search(c, q.trim()));
    }
    if let Some(cat) = params.category.as_deref().filter(|c| !c.trim().is_empty()) {
        certs.retain(|c| c.category.eq_ignore_ascii_case(cat.trim()));
    }
    sort_certs(&mut certs, &params.sort, &params.direction);
    let page = paginate(certs, params.page, params.size);
    Page {
        items: page.items.iter().map(|c| dto_for(store, actor, c)).collect(),
        page: page.page,
        size: page.size,
        total: page.total,
        total_pages: page.total_pages,
    }
}

/// By-id read. Counts the view (every successful read, never deduplicated) and
/// returns the post-increment snapshot.
pub fn get_by_id(store: &SharedStore, actor: &Actor, id: &str) -> AppResult<CertificateDto> {
    let cert = store.find_cert(id).ok_or_else(not_found)?;
    policy::authorize_read(actor, &cert)?;
    let viewed = store.record_view(id).ok_or_else(not_found)?;
    Ok(dto_for(store, actor, &viewed))
}

pub fn create(
    store: &SharedStore,
    assets: &dyn AssetHost,
    actor: &Actor,
    req: &CertificateRequest,
) -> AppResult<CertificateDto> {
    let author_id = actor.require_id()?;
    let author = store
        .find_user_by_id(author_id)
        .ok_or_else(|| AppError::not_found("user_not_found", "author not found"))?;
    validate_request(req)?;
    let file_url = upload_if_present(assets, req)?;

    let mut cert = Certificate::new(
        &req.title,
        &req.category,
        &req.issuer,
        req.completion_date,
        &author.id,
        &author.unit,
    );
    cert.subcategory = req.subcategory.clone();
    cert.external_links = req.external_links.clone();
    cert.remarks = req.remarks.clone();
    cert.tags = req.tags.clone();
    cert.visibility = req.visibility;
    cert.file_url = file_url;

    let cert = store.save_cert(cert);
    info!(target: "certs", "create cert={} author={} visibility={:?}", cert.id, cert.author_id, cert.visibility);
    Ok(dto_for(store, actor, &cert))
}

/// Replace the mutable fields. The author reference and the denormalized unit
/// never change.
pub fn update(
    store: &SharedStore,
    assets: &dyn AssetHost,
    actor: &Actor,
    id: &str,
    req: &CertificateRequest,
) -> AppResult<CertificateDto> {
    let mut cert = store.find_cert(id).ok_or_else(not_found)?;
    policy::authorize_modify(actor, &cert)?;
    validate_request(req)?;
    let file_url = upload_if_present(assets, req)?;

    cert.title = req.title.clone();
    cert.category = req.category.clone();
    cert.subcategory = req.subcategory.clone();
    cert.issuer = req.issuer.clone();
    cert.completion_date = req.completion_date;
    cert.external_links = req.external_links.clone();
    cert.remarks = req.remarks.clone();
    cert.tags = req.tags.clone();
    cert.visibility = req.visibility;
    if let Some(url) = file_url {
        cert.file_url = Some(url);
    }
    cert.touch();

    let cert = store.save_cert(cert);
    info!(target: "certs", "update cert={} by={}", cert.id, actor.id().unwrap_or("?"));
    Ok(dto_for(store, actor, &cert))
}

pub fn delete(store: &SharedStore, actor: &Actor, id: &str) -> AppResult<()> {
    let cert = store.find_cert(id).ok_or_else(not_found)?;
    policy::authorize_modify(actor, &cert)?;
    store.delete_cert(id);
    info!(target: "certs", "delete cert={} by={}", id, actor.id().unwrap_or("?"));
    Ok(())
}

/// Idempotent like flip. Requires an authenticated actor that can read the
/// record; the store performs the flip atomically.
pub fn toggle_like(store: &SharedStore, actor: &Actor, id: &str) -> AppResult<(CertificateDto, bool)> {
    let user_id = actor.require_id()?.to_string();
    let cert = store.find_cert(id).ok_or_else(not_found)?;
    policy::authorize_read(actor, &cert)?;
    let (cert, now_liked) = store.toggle_like(id, &user_id).ok_or_else(not_found)?;
    Ok((dto_for(store, actor, &cert), now_liked))
}

pub fn by_author(store: &SharedStore, actor: &Actor, author_id: &str) -> Vec<CertificateDto> {
    policy::filter_visible(actor, store.certs_by_author(author_id))
        .iter()
        .map(|c| dto_for(store, actor, c))
        .collect()
}

pub fn by_tag(store: &SharedStore, actor: &Actor, tag: &str) -> Vec<CertificateDto> {
    let certs = store
        .list_certs()
        .into_iter()
        .filter(|c| c.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)))
        .collect();
    policy::filter_visible(actor, certs)
        .iter()
        .map(|c| dto_for(store, actor, c))
        .collect()
}

fn top_by<K: Ord>(store: &SharedStore, actor: &Actor, limit: usize, key: impl Fn(&Certificate) -> K) -> Vec<CertificateDto> {
    let mut certs = policy::filter_visible(actor, store.list_certs());
    certs.sort_by(|a, b| key(b).cmp(&key(a)));
    certs.iter().take(limit).map(|c| dto_for(store, actor, c)).collect()
}

pub fn most_liked(store: &SharedStore, actor: &Actor) -> Vec<CertificateDto> {
    top_by(store, actor, TRENDING_LIMIT, |c| c.likes)
}

pub fn most_viewed(store: &SharedStore, actor: &Actor) -> Vec<CertificateDto> {
    top_by(store, actor, TRENDING_LIMIT, |c| c.views)
}

pub fn recent(store: &SharedStore, actor: &Actor) -> Vec<CertificateDto> {
    top_by(store, actor, RECENT_LIMIT, |c| c.created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use crate::upload::LocalAssetHost;

    fn authed(id: &str, role: Role, unit: &str) -> Actor {
        Actor::Authed { id: id.into(), role, unit: unit.into() }
    }

    fn seed_user(store: &SharedStore, name: &str, unit: &str, role: Role) -> crate::model::User {
        let mut u = crate::model::User::new(name, &format!("{name}@example.com"), "phc", "Engineer", unit);
        u.role = role;
        store.save_user(u)
    }

    fn request(title: &str, visibility: Visibility) -> CertificateRequest {
        CertificateRequest {
            title: title.into(),
            category: "Programming".into(),
            subcategory: None,
            issuer: "RustConf".into(),
            completion_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            external_links: vec![],
            remarks: None,
            tags: vec!["rust".into()],
            visibility,
            file_base64: None,
        }
    }

    fn assets() -> LocalAssetHost {
        LocalAssetHost::new(std::env::temp_dir().join("certhub-test-assets"))
    }

    #[test]
    fn private_record_by_id_is_rejected_for_peer_and_open_for_admin() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        seed_user(&store, "b", "Eng", Role::User);
        let admin = seed_user(&store, "root", "HQ", Role::Admin);
        let owner = authed(&a.id, Role::User, "Eng");

        let created = create(&store, &assets(), &owner, &request("R1", Visibility::Private)).unwrap();

        let peer = authed("b-id", Role::User, "Eng");
        let err = get_by_id(&store, &peer, &created.id).unwrap_err();
        assert!(err.is_rejection());

        let as_admin = authed(&admin.id, Role::Admin, "HQ");
        assert!(get_by_id(&store, &as_admin, &created.id).is_ok());
        // Owner sees it too.
        assert!(get_by_id(&store, &owner, &created.id).is_ok());
    }

    #[test]
    fn get_by_id_counts_every_read() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let created = create(&store, &assets(), &owner, &request("R1", Visibility::Public)).unwrap();

        let first = get_by_id(&store, &owner, &created.id).unwrap();
        let second = get_by_id(&store, &owner, &created.id).unwrap();
        assert_eq!(first.views, 1);
        assert_eq!(second.views, 2);
    }

    #[test]
    fn unknown_id_is_not_found_before_any_policy_check() {
        let store = SharedStore::new();
        let err = get_by_id(&store, &Actor::Anonymous, "missing").unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[test]
    fn future_completion_date_is_invalid() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let mut req = request("R1", Visibility::Public);
        req.completion_date = Utc::now().date_naive() + chrono::Days::new(2);
        let err = create(&store, &assets(), &owner, &req).unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn unit_is_denormalized_from_author_and_immutable_on_update() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Engineering", Role::User);
        let owner = authed(&a.id, Role::User, "Engineering");
        let created = create(&store, &assets(), &owner, &request("R1", Visibility::Public)).unwrap();
        assert_eq!(created.unit, "Engineering");

        // Author switches unit; existing record keeps the snapshot.
        let mut moved = store.find_user_by_id(&a.id).unwrap();
        moved.unit = "Sales".into();
        store.save_user(moved);
        let updated = update(&store, &assets(), &owner, &created.id, &request("R1 v2", Visibility::Public)).unwrap();
        assert_eq!(updated.unit, "Engineering");
        assert_eq!(updated.title, "R1 v2");
    }

    #[test]
    fn update_and_delete_are_owner_or_admin_gated() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let created = create(&store, &assets(), &owner, &request("R1", Visibility::Public)).unwrap();

        let stranger = authed("someone-else", Role::Manager, "Eng");
        assert!(update(&store, &assets(), &stranger, &created.id, &request("x", Visibility::Public)).is_err());
        assert!(delete(&store, &stranger, &created.id).is_err());

        let admin = authed("root", Role::Admin, "HQ");
        assert!(delete(&store, &admin, &created.id).is_ok());
        assert!(store.find_cert(&created.id).is_none());
    }

    #[test]
    fn listing_sorts_and_paginates_with_insertion_tiebreak() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let c1 = create(&store, &assets(), &owner, &request("first", Visibility::Public)).unwrap();
        let c2 = create(&store, &assets(), &owner, &request("second", Visibility::Public)).unwrap();
        store.toggle_like(&c2.id, "fan").unwrap();

        let by_likes = list(
            &store,
            &owner,
            &ListParams { sort: "likes".into(), ..ListParams::default() },
        );
        assert_eq!(by_likes.items[0].id, c2.id);

        // Equal like counts: insertion order breaks the tie under asc.
        store.toggle_like(&c1.id, "fan").unwrap();
        let tied = list(
            &store,
            &owner,
            &ListParams { sort: "likes".into(), direction: "asc".into(), ..ListParams::default() },
        );
        assert_eq!(tied.items[0].id, c1.id);

        let paged = list(&store, &owner, &ListParams { size: 1, page: 1, direction: "asc".into(), ..ListParams::default() });
        assert_eq!(paged.total, 2);
        assert_eq!(paged.total_pages, 2);
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.items[0].id, c2.id);
    }

    #[test]
    fn desc_sort_keeps_insertion_order_for_ties() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let c1 = create(&store, &assets(), &owner, &request("one", Visibility::Public)).unwrap();
        let c2 = create(&store, &assets(), &owner, &request("two", Visibility::Public)).unwrap();
        let c3 = create(&store, &assets(), &owner, &request("three", Visibility::Public)).unwrap();

        // All like counts tied at zero: the default desc sort must not flip
        // creation order.
        let tied = list(
            &store,
            &owner,
            &ListParams { sort: "likes".into(), ..ListParams::default() },
        );
        let ids: Vec<&str> = tied.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![c1.id.as_str(), c2.id.as_str(), c3.id.as_str()]);

        // Same rule for the trending queries, which are always descending.
        let trending: Vec<String> = most_liked(&store, &owner).into_iter().map(|c| c.id).collect();
        assert_eq!(trending, vec![c1.id, c2.id, c3.id]);
    }

    #[test]
    fn search_matches_title_and_tags() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        create(&store, &assets(), &owner, &request("Kubernetes Basics", Visibility::Public)).unwrap();
        create(&store, &assets(), &owner, &request("Advanced Rust", Visibility::Public)).unwrap();

        let hit = list(&store, &Actor::Anonymous, &ListParams { search: Some("rust".into()), ..ListParams::default() });
        // "Advanced Rust" by title, "Kubernetes Basics" by its "rust" tag.
        assert_eq!(hit.total, 2);

        let narrow = list(&store, &Actor::Anonymous, &ListParams { search: Some("kubernetes".into()), ..ListParams::default() });
        assert_eq!(narrow.total, 1);
    }

    #[test]
    fn like_requires_authentication_and_read_access() {
        let store = SharedStore::new();
        let a = seed_user(&store, "a", "Eng", Role::User);
        let owner = authed(&a.id, Role::User, "Eng");
        let created = create(&store, &assets(), &owner, &request("R1", Visibility::Private)).unwrap();

        assert!(toggle_like(&store, &Actor::Anonymous, &created.id).is_err());
        let outsider = authed("x", Role::User, "Sales");
        assert!(toggle_like(&store, &outsider, &created.id).is_err());

        let (dto, liked) = toggle_like(&store, &owner, &created.id).unwrap();
        assert!(liked);
        assert!(dto.liked_by_current_user);
        assert_eq!(dto.likes, 1);
    }
}
