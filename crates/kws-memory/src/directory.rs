//! Contact directory store and the directory merge.
//!
//! The directory lives in one text file in the serialized directory format
//! (see [`kws_types::contact`]). Reads never fail: an unreadable file is
//! logged and reads as an empty directory. Mutations go through
//! [`DirectoryStore::update`], which holds the store lock across
//! load → mutate → save so concurrent writers cannot lose each other's
//! changes.

use crate::atomic::{atomic_write, read_existing};
use kws_types::contact::{parse_directory, serialize_directory, Contact};
use kws_types::error::{KwsError, KwsResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Counts produced by a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Incoming contacts whose identity was new.
    pub added: usize,
    /// Existing contacts whose `last_seen` moved forward.
    pub updated: usize,
}

impl MergeOutcome {
    /// True if the merge changed nothing.
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0
    }
}

/// Merge `incoming` into `existing`.
///
/// A contact whose identity is already present only contributes its
/// `last_seen`, and only when it sorts after the stored value; every other
/// field of the stored contact is kept. Unknown identities are appended as
/// received. Applying the same list twice is the same as applying it once.
pub fn merge_contacts(existing: &mut Vec<Contact>, incoming: Vec<Contact>) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for new_contact in incoming {
        match existing
            .iter_mut()
            .find(|c| c.identity == new_contact.identity)
        {
            Some(current) => {
                if new_contact.last_seen > current.last_seen {
                    current.last_seen = new_contact.last_seen;
                    outcome.updated += 1;
                }
            }
            None => {
                existing.push(new_contact);
                outcome.added += 1;
            }
        }
    }
    outcome
}

/// The node's contact directory, persisted as a single file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl DirectoryStore {
    /// Open the store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of all contacts. Unreadable files read as empty.
    pub async fn load(&self) -> Vec<Contact> {
        let _guard = self.lock.lock().await;
        self.read_lenient().await
    }

    /// The directory file as stored, surrounding whitespace trimmed.
    ///
    /// This is what a `LIST` request returns, byte for byte.
    pub async fn raw(&self) -> String {
        let _guard = self.lock.lock().await;
        match read_existing(&self.path).await {
            Ok(contents) => contents.trim().to_string(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read directory");
                String::new()
            }
        }
    }

    /// Find a contact by identity or display name.
    pub async fn find(&self, selector: &str) -> Option<Contact> {
        self.load().await.into_iter().find(|c| c.matches(selector))
    }

    /// Run `mutate` against the current directory and save the result.
    ///
    /// The store lock is held for the whole cycle. If the directory cannot
    /// be read the closure is not run, so a transient read error never
    /// causes the file to be overwritten with a partial directory.
    pub async fn update<F, R>(&self, mutate: F) -> KwsResult<R>
    where
        F: FnOnce(&mut Vec<Contact>) -> R,
    {
        let _guard = self.lock.lock().await;
        let contents = read_existing(&self.path).await?;
        let mut contacts = parse_directory(&contents);
        let result = mutate(&mut contacts);
        atomic_write(&self.path, &serialize_directory(&contacts)).await?;
        debug!(path = %self.path.display(), contacts = contacts.len(), "Directory saved");
        Ok(result)
    }

    /// Add a new contact. Fails if the identity is already known.
    pub async fn add_contact(&self, contact: Contact) -> KwsResult<()> {
        let identity = contact.identity.clone();
        let added = self
            .update(move |contacts| {
                if contacts.iter().any(|c| c.identity == contact.identity) {
                    false
                } else {
                    contacts.push(contact);
                    true
                }
            })
            .await?;
        if added {
            Ok(())
        } else {
            Err(KwsError::ContactExists(identity))
        }
    }

    /// Merge an already-parsed contact list into the directory.
    pub async fn merge(&self, incoming: Vec<Contact>) -> KwsResult<MergeOutcome> {
        self.update(move |contacts| merge_contacts(contacts, incoming))
            .await
    }

    /// Parse a serialized directory and merge it in.
    pub async fn merge_serialized(&self, serialized: &str) -> KwsResult<MergeOutcome> {
        self.merge(parse_directory(serialized)).await
    }

    async fn read_lenient(&self) -> Vec<Contact> {
        match read_existing(&self.path).await {
            Ok(contents) => parse_directory(&contents),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read directory, treating as empty");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kws_types::contact::ContactStatus;

    fn make_contact(identity: &str, last_seen: &str) -> Contact {
        Contact {
            username: format!("{identity}-user"),
            identity: identity.to_string(),
            last_seen: last_seen.to_string(),
            display_name: format!("{identity}-name"),
            address: "127.0.0.1".to_string(),
            status: ContactStatus::Offline,
        }
    }

    #[test]
    fn test_merge_newer_last_seen_wins() {
        let mut existing = vec![make_contact("A1", "2024-01-01 00:00:00")];
        let incoming = vec![make_contact("A1", "2024-06-01 00:00:00")];
        let outcome = merge_contacts(&mut existing, incoming);
        assert_eq!(existing[0].last_seen, "2024-06-01 00:00:00");
        assert_eq!(outcome, MergeOutcome { added: 0, updated: 1 });
    }

    #[test]
    fn test_merge_older_last_seen_ignored() {
        let mut existing = vec![make_contact("A1", "2024-06-01 00:00:00")];
        let incoming = vec![make_contact("A1", "2024-01-01 00:00:00")];
        let outcome = merge_contacts(&mut existing, incoming);
        assert_eq!(existing[0].last_seen, "2024-06-01 00:00:00");
        assert!(outcome.is_noop());
    }

    #[test]
    fn test_merge_keeps_local_fields() {
        let mut local = make_contact("A1", "2024-01-01 00:00:00");
        local.display_name = "my label".to_string();
        local.address = "10.0.0.1".to_string();
        local.status = ContactStatus::Online;
        let mut existing = vec![local.clone()];

        let mut remote = make_contact("A1", "2024-09-09 09:09:09");
        remote.display_name = "their label".to_string();
        remote.address = "10.9.9.9".to_string();
        remote.username = "someone-else".to_string();
        merge_contacts(&mut existing, vec![remote]);

        let merged = &existing[0];
        assert_eq!(merged.last_seen, "2024-09-09 09:09:09");
        assert_eq!(merged.display_name, local.display_name);
        assert_eq!(merged.address, local.address);
        assert_eq!(merged.username, local.username);
        assert_eq!(merged.status, local.status);
    }

    #[test]
    fn test_merge_appends_unknown_verbatim() {
        let mut existing = vec![make_contact("A1", "2024-01-01 00:00:00")];
        let mut newcomer = make_contact("B2", "2023-05-05 05:05:05");
        newcomer.status = ContactStatus::Online;
        let outcome = merge_contacts(&mut existing, vec![newcomer.clone()]);
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[1], newcomer);
        assert_eq!(outcome.added, 1);
    }

    #[test]
    fn test_merge_idempotent() {
        let base = vec![
            make_contact("A1", "2024-01-01 00:00:00"),
            make_contact("C3", "2024-03-03 00:00:00"),
        ];
        let incoming = vec![
            make_contact("A1", "2024-02-01 00:00:00"),
            make_contact("B2", "2024-01-15 00:00:00"),
            make_contact("C3", "2023-01-01 00:00:00"),
        ];

        let mut once = base.clone();
        merge_contacts(&mut once, incoming.clone());
        let mut twice = once.clone();
        let second = merge_contacts(&mut twice, incoming);

        assert_eq!(once, twice);
        assert!(second.is_noop());
    }

    #[test]
    fn test_merge_duplicate_identities_in_one_list() {
        let mut existing = Vec::new();
        let incoming = vec![
            make_contact("A1", "2024-01-01 00:00:00"),
            make_contact("A1", "2024-05-01 00:00:00"),
        ];
        merge_contacts(&mut existing, incoming);
        assert_eq!(existing.len(), 1);
        assert_eq!(existing[0].last_seen, "2024-05-01 00:00:00");
    }

    #[tokio::test]
    async fn test_store_add_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("contacts.cdf"));
        assert!(store.load().await.is_empty());

        store
            .add_contact(make_contact("A1", "2024-01-01 00:00:00"))
            .await
            .unwrap();
        let contacts = store.load().await;
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].identity, "A1");

        let err = store
            .add_contact(make_contact("A1", "2024-02-02 00:00:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, KwsError::ContactExists(id) if id == "A1"));
    }

    #[tokio::test]
    async fn test_store_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contacts.cdf");
        let store = DirectoryStore::new(&path);
        store
            .add_contact(make_contact("A1", "2024-01-01 00:00:00"))
            .await
            .unwrap();

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            on_disk,
            "A1-user;A1;2024-01-01 00:00:00;A1-name;127.0.0.1;offline|\n"
        );
        assert_eq!(
            store.raw().await,
            "A1-user;A1;2024-01-01 00:00:00;A1-name;127.0.0.1;offline|"
        );
    }

    #[tokio::test]
    async fn test_store_find_by_name_or_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("contacts.cdf"));
        store
            .add_contact(make_contact("A1", "2024-01-01 00:00:00"))
            .await
            .unwrap();
        assert!(store.find("A1").await.is_some());
        assert!(store.find("A1-name").await.is_some());
        assert!(store.find("nobody").await.is_none());
    }

    #[tokio::test]
    async fn test_store_merge_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("contacts.cdf"));
        store
            .add_contact(make_contact("A1", "2024-01-01 00:00:00"))
            .await
            .unwrap();

        let payload = "x;A1;2024-06-01 00:00:00;X;1.2.3.4;online|\n\
                       y;B2;2024-06-02 00:00:00;Y;5.6.7.8;online|\n\
                       broken;line";
        let outcome = store.merge_serialized(payload).await.unwrap();
        assert_eq!(outcome, MergeOutcome { added: 1, updated: 1 });

        let contacts = store.load().await;
        assert_eq!(contacts.len(), 2);
        assert_eq!(contacts[0].last_seen, "2024-06-01 00:00:00");
        assert_eq!(contacts[0].address, "127.0.0.1");
        assert_eq!(contacts[1].identity, "B2");
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("contacts.cdf"));

        let mut tasks = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .merge(vec![make_contact(&format!("P{i}"), "2024-01-01 00:00:00")])
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.load().await.len(), 20);
    }
}
