//! Shared store for users and certificates.
//!
//! A clonable handle over a single `parking_lot::RwLock`, the only shared mutable
//! state in the process. The engagement mutations (`record_view`, `toggle_like`)
//! are performed as single read-modify-write operations under the write lock, so
//! concurrent requests cannot lose updates and `likes == |liked_by|` holds at every
//! observable state transition.
//!
//! Listing methods return certificates in insertion order; callers that sort by
//! another key use a stable sort, so insertion order remains the tie-breaker.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::{Certificate, User};

#[derive(Default)]
struct StoreInner {
    users: HashMap<String, User>,
    certs: HashMap<String, Certificate>,
    /// Certificate id -> insertion sequence, for deterministic ordering.
    cert_seq: HashMap<String, u64>,
    user_seq: HashMap<String, u64>,
    next_seq: u64,
}

#[derive(Clone)]
pub struct SharedStore(Arc<RwLock<StoreInner>>);

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        SharedStore(Arc::new(RwLock::new(StoreInner::default())))
    }

    // --- identity persistence ---

    /// Insert or replace a user record. Returns the stored copy.
    pub fn save_user(&self, user: User) -> User {
        let mut g = self.0.write();
        if !g.user_seq.contains_key(&user.id) {
            let seq = g.next_seq;
            g.next_seq += 1;
            g.user_seq.insert(user.id.clone(), seq);
        }
        g.users.insert(user.id.clone(), user.clone());
        user
    }

    pub fn find_user_by_id(&self, id: &str) -> Option<User> {
        self.0.read().users.get(id).cloned()
    }

    /// Case-insensitive email lookup, matching the registration-time duplicate check.
    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let needle = email.trim().to_lowercase();
        self.0.read().users.values().find(|u| u.email == needle).cloned()
    }

    pub fn user_exists_by_email(&self, email: &str) -> bool {
        self.find_user_by_email(email).is_some()
    }

    pub fn list_users(&self) -> Vec<User> {
        let g = self.0.read();
        let mut out: Vec<User> = g.users.values().cloned().collect();
        out.sort_by_key(|u| g.user_seq.get(&u.id).copied().unwrap_or(u64::MAX));
        out
    }

    pub fn users_in_unit(&self, unit: &str) -> Vec<User> {
        self.list_users().into_iter().filter(|u| u.unit == unit).collect()
    }

    // --- resource persistence ---

    pub fn save_cert(&self, cert: Certificate) -> Certificate {
        let mut g = self.0.write();
        if !g.cert_seq.contains_key(&cert.id) {
            let seq = g.next_seq;
            g.next_seq += 1;
            g.cert_seq.insert(cert.id.clone(), seq);
        }
        g.certs.insert(cert.id.clone(), cert.clone());
        cert
    }

    pub fn find_cert(&self, id: &str) -> Option<Certificate> {
        self.0.read().certs.get(id).cloned()
    }

    pub fn delete_cert(&self, id: &str) -> bool {
        let mut g = self.0.write();
        g.cert_seq.remove(id);
        g.certs.remove(id).is_some()
    }

    /// All certificates in insertion order.
    pub fn list_certs(&self) -> Vec<Certificate> {
        let g = self.0.read();
        let mut out: Vec<Certificate> = g.certs.values().cloned().collect();
        out.sort_by_key(|c| g.cert_seq.get(&c.id).copied().unwrap_or(u64::MAX));
        out
    }

    pub fn certs_by_author(&self, author_id: &str) -> Vec<Certificate> {
        self.list_certs().into_iter().filter(|c| c.author_id == author_id).collect()
    }

    pub fn count_certs_by_author(&self, author_id: &str) -> usize {
        self.0.read().certs.values().filter(|c| c.author_id == author_id).count()
    }

    pub fn count_certs(&self) -> usize {
        self.0.read().certs.len()
    }

    pub fn count_users(&self) -> usize {
        self.0.read().users.len()
    }

    // --- engagement counters ---

    /// Atomic, non-deduplicated view increment. Does not advance `updated_at`.
    pub fn record_view(&self, id: &str) -> Option<Certificate> {
        let mut g = self.0.write();
        let cert = g.certs.get_mut(id)?;
        cert.views += 1;
        Some(cert.clone())
    }

    /// Atomic like flip for one principal. Adds the principal to `liked_by` if
    /// absent, removes it otherwise; `likes` is recomputed from the set size so the
    /// counter can never drift. Returns the updated record and the new membership.
    pub fn toggle_like(&self, id: &str, user_id: &str) -> Option<(Certificate, bool)> {
        let mut g = self.0.write();
        let cert = g.certs.get_mut(id)?;
        let now_liked = if cert.liked_by.contains(user_id) {
            cert.liked_by.remove(user_id);
            false
        } else {
            cert.liked_by.insert(user_id.to_string());
            true
        };
        cert.likes = cert.liked_by.len() as u64;
        cert.touch();
        Some((cert.clone(), now_liked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cert(author: &str) -> Certificate {
        Certificate::new(
            "Rust Cert",
            "Programming",
            "RustConf",
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            author,
            "Eng",
        )
    }

    #[test]
    fn toggle_like_is_an_involution() {
        let store = SharedStore::new();
        let c = store.save_cert(cert("u1"));
        let before_updated = c.updated_at;

        let (after_first, liked) = store.toggle_like(&c.id, "u2").unwrap();
        assert!(liked);
        assert_eq!(after_first.likes, 1);
        assert!(after_first.is_liked_by("u2"));

        let (after_second, liked) = store.toggle_like(&c.id, "u2").unwrap();
        assert!(!liked);
        assert_eq!(after_second.likes, 0);
        assert!(!after_second.is_liked_by("u2"));
        assert!(after_second.updated_at >= before_updated);
    }

    #[test]
    fn like_count_equals_membership_after_any_sequence() {
        let store = SharedStore::new();
        let c = store.save_cert(cert("u1"));
        for user in ["a", "b", "c", "a", "d", "b", "b"] {
            let (snap, _) = store.toggle_like(&c.id, user).unwrap();
            assert_eq!(snap.likes as usize, snap.liked_by.len());
        }
        let fin = store.find_cert(&c.id).unwrap();
        // a out, b in, c in, d in
        assert_eq!(fin.likes, 3);
    }

    #[test]
    fn record_view_does_not_touch_updated_at() {
        let store = SharedStore::new();
        let c = store.save_cert(cert("u1"));
        let before = store.find_cert(&c.id).unwrap().updated_at;
        store.record_view(&c.id).unwrap();
        let after = store.find_cert(&c.id).unwrap();
        assert_eq!(after.views, 1);
        assert_eq!(after.updated_at, before);
    }

    #[test]
    fn concurrent_views_are_not_lost() {
        let store = SharedStore::new();
        let c = store.save_cert(cert("u1"));
        let mut handles = Vec::new();
        for _ in 0..3 {
            let store = store.clone();
            let id = c.id.clone();
            handles.push(std::thread::spawn(move || {
                store.record_view(&id);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.find_cert(&c.id).unwrap().views, 3);
    }

    #[test]
    fn concurrent_toggles_preserve_invariant() {
        let store = SharedStore::new();
        let c = store.save_cert(cert("u1"));
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let id = c.id.clone();
            handles.push(std::thread::spawn(move || {
                let user = format!("user-{}", i % 4);
                store.toggle_like(&id, &user);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let fin = store.find_cert(&c.id).unwrap();
        assert_eq!(fin.likes as usize, fin.liked_by.len());
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let store = SharedStore::new();
        store.save_user(User::new("Ada", "Ada@Example.com", "phc", "Engineer", "Eng"));
        assert!(store.user_exists_by_email("ADA@EXAMPLE.COM"));
        assert!(store.find_user_by_email("ada@example.com").is_some());
        assert!(!store.user_exists_by_email("someone@else.com"));
    }

    #[test]
    fn list_certs_keeps_insertion_order() {
        let store = SharedStore::new();
        let a = store.save_cert(cert("u1"));
        let b = store.save_cert(cert("u2"));
        let c = store.save_cert(cert("u3"));
        let ids: Vec<String> = store.list_certs().into_iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
    }
}
