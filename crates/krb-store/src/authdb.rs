//! Credential database persisted as a single JSON file.
//!
//! Layout on disk:
//! ```text
//! { "next_id": 3,
//!   "users": [ { "id": 1, "first_name": .., "username": .., "key": "<base64>" }, .. ],
//!   "shared_keys": { "as-tgs": "<base64>", "tgs-fs": "<base64>" } }
//! ```
//!
//! Nothing is cached: every lookup re-reads the file, so a running AS sees
//! users registered by `krb admin` in another process. Access is serialized
//! across processes by an advisory lock on a sidecar `<name>.lock` file,
//! shared for reads and exclusive for writes. A write re-loads the tables
//! inside the exclusive lock, applies the change, and replaces the file
//! atomically through a private temp file in the same directory.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use krb_crypto::{generate_key, SecretKey};

use crate::registry::{ServicePair, StaticKeyRegistry};
use crate::user::UserCredential;
use crate::{CredentialStore, KeyRegistry, StoreError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    next_id: u64,
    #[serde(default)]
    users: Vec<UserCredential>,
    #[serde(default)]
    shared_keys: HashMap<ServicePair, SecretKey>,
}

pub struct AuthDb {
    path: PathBuf,
    lock_path: PathBuf,
}

impl AuthDb {
    /// Open the database at `path`, creating it on first run, and make sure
    /// both shared keys exist. Existing keys are never replaced.
    pub fn initialize(path: &Path) -> Result<Self, StoreError> {
        let db = Self::at(path);
        let _guard = db.lock(Access::Exclusive)?;

        let mut tables = if path.exists() {
            load(path)?
        } else {
            info!(path = %path.display(), "running first time setup");
            Tables::default()
        };

        let mut created = false;
        for pair in ServicePair::ALL {
            if !tables.shared_keys.contains_key(&pair) {
                tables.shared_keys.insert(pair, generate_key());
                info!(pair = %pair, "generated shared key");
                created = true;
            }
        }
        if created {
            persist(path, &tables)?;
        }

        info!(path = %path.display(), users = tables.users.len(), "credential database ready");
        Ok(db)
    }

    /// Open an existing database. Services other than the AS use this: they
    /// must not invent shared keys of their own.
    pub fn connect(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::Missing(path.display().to_string()));
        }
        let db = Self::at(path);
        db.read(|_| ())?;
        Ok(db)
    }

    fn at(path: &Path) -> Self {
        let mut lock_name = path.file_name().unwrap_or_default().to_os_string();
        lock_name.push(".lock");
        Self {
            path: path.to_path_buf(),
            lock_path: path.with_file_name(lock_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Register a new user, deriving their key from `password`.
    pub fn add_user(
        &self,
        first_name: &str,
        last_name: &str,
        username: &str,
        password: &str,
    ) -> Result<UserCredential, StoreError> {
        let user = self.mutate(|tables| {
            if tables.users.iter().any(|u| u.username_matches(username)) {
                return Err(StoreError::DuplicateUsername(username.to_string()));
            }
            tables.next_id += 1;
            let user = UserCredential::new(tables.next_id, first_name, last_name, username, password);
            tables.users.push(user.clone());
            Ok(user)
        })?;
        info!(id = user.id, username = %user.username, "user added");
        Ok(user)
    }

    /// Replace every field of user `id`. The key is re-derived, so a password
    /// is always required.
    pub fn update_user(
        &self,
        id: u64,
        first_name: &str,
        last_name: &str,
        username: &str,
        password: &str,
    ) -> Result<UserCredential, StoreError> {
        let user = self.mutate(|tables| {
            if tables
                .users
                .iter()
                .any(|u| u.id != id && u.username_matches(username))
            {
                return Err(StoreError::DuplicateUsername(username.to_string()));
            }
            let slot = tables
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(StoreError::UserNotFound(id))?;
            *slot = UserCredential::new(id, first_name, last_name, username, password);
            Ok(slot.clone())
        })?;
        info!(id, username = %user.username, "user updated");
        Ok(user)
    }

    pub fn delete_user(&self, id: u64) -> Result<UserCredential, StoreError> {
        let user = self.mutate(|tables| {
            let pos = tables
                .users
                .iter()
                .position(|u| u.id == id)
                .ok_or(StoreError::UserNotFound(id))?;
            Ok(tables.users.remove(pos))
        })?;
        info!(id, username = %user.username, "user deleted");
        Ok(user)
    }

    /// Users whose first name contains `fragment` (ASCII case-insensitive)
    pub fn find_users_by_first_name(&self, fragment: &str) -> Result<Vec<UserCredential>, StoreError> {
        self.filter(|u| contains_ignore_case(&u.first_name, fragment))
    }

    /// Users whose last name contains `fragment` (ASCII case-insensitive)
    pub fn find_users_by_last_name(&self, fragment: &str) -> Result<Vec<UserCredential>, StoreError> {
        self.filter(|u| contains_ignore_case(&u.last_name, fragment))
    }

    /// Search by `"First Last"`; each part matches as a fragment.
    pub fn find_users_by_full_name(&self, name: &str) -> Result<Vec<UserCredential>, StoreError> {
        let parts: Vec<&str> = name.split_whitespace().collect();
        let [first, last] = parts.as_slice() else {
            return Err(StoreError::InvalidName(name.to_string()));
        };
        self.filter(|u| {
            contains_ignore_case(&u.first_name, first) && contains_ignore_case(&u.last_name, last)
        })
    }

    pub fn list_users(&self) -> Result<Vec<UserCredential>, StoreError> {
        self.filter(|_| true)
    }

    /// Snapshot the requested shared keys into an immutable registry.
    pub fn key_registry(&self, pairs: &[ServicePair]) -> Result<StaticKeyRegistry, StoreError> {
        let tables = self.read(Tables::clone)?;
        pairs
            .iter()
            .try_fold(StaticKeyRegistry::new(), |registry, &pair| -> Result<_, StoreError> {
                Ok(registry.with_key(pair, shared_key(&tables, pair)?))
            })
    }

    fn filter(
        &self,
        predicate: impl Fn(&UserCredential) -> bool,
    ) -> Result<Vec<UserCredential>, StoreError> {
        self.read(|tables| tables.users.iter().filter(|u| predicate(u)).cloned().collect())
    }

    /// Run `view` over the current on-disk tables under a shared lock.
    fn read<T>(&self, view: impl FnOnce(&Tables) -> T) -> Result<T, StoreError> {
        let _guard = self.lock(Access::Shared)?;
        Ok(view(&load(&self.path)?))
    }

    /// Load, change and persist under an exclusive lock. Nothing is written
    /// when `change` fails.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Tables) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock(Access::Exclusive)?;
        let mut tables = load(&self.path)?;
        let out = change(&mut tables)?;
        persist(&self.path, &tables)?;
        Ok(out)
    }

    fn lock(&self, access: Access) -> Result<LockGuard, StoreError> {
        if let Some(parent) = self.lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("creating {}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| StoreError::Io(format!("opening {}: {e}", self.lock_path.display())))?;
        let locked = match access {
            Access::Shared => FileExt::lock_shared(&file),
            Access::Exclusive => FileExt::lock_exclusive(&file),
        };
        locked.map_err(|e| StoreError::Io(format!("locking {}: {e}", self.lock_path.display())))?;
        debug!(lock = %self.lock_path.display(), ?access, "database locked");
        Ok(LockGuard(file))
    }
}

#[derive(Debug, Clone, Copy)]
enum Access {
    Shared,
    Exclusive,
}

/// Releases the advisory lock when dropped.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl CredentialStore for AuthDb {
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserCredential>, StoreError> {
        self.read(|tables| {
            tables
                .users
                .iter()
                .find(|u| u.username_matches(username))
                .cloned()
        })
    }
}

impl KeyRegistry for AuthDb {
    fn shared_key(&self, pair: ServicePair) -> Result<SecretKey, StoreError> {
        self.read(|tables| shared_key(tables, pair))?
    }
}

impl std::fmt::Debug for AuthDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDb").field("path", &self.path).finish()
    }
}

fn shared_key(tables: &Tables, pair: ServicePair) -> Result<SecretKey, StoreError> {
    tables
        .shared_keys
        .get(&pair)
        .cloned()
        .ok_or(StoreError::MissingSharedKey(pair.name()))
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

fn load(path: &Path) -> Result<Tables, StoreError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| StoreError::Corrupt(format!("parsing {}: {e}", path.display())))
}

fn persist(path: &Path, tables: &Tables) -> Result<(), StoreError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => parent,
        None => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .map_err(|e| StoreError::Io(format!("creating {}: {e}", dir.display())))?;

    let json = serde_json::to_vec_pretty(tables)
        .map_err(|e| StoreError::Corrupt(format!("serializing database: {e}")))?;

    // Atomic write: unique temp file in the same directory, then rename
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| StoreError::Io(format!("creating temp file in {}: {e}", dir.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| StoreError::Io(format!("chmod {}: {e}", tmp.path().display())))?;
    }

    tmp.write_all(&json)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::Io(format!("writing {}: {e}", tmp.path().display())))?;
    tmp.persist(path)
        .map_err(|e| StoreError::Io(format!("renaming onto {}: {}", path.display(), e.error)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use krb_crypto::derive_key;
    use tempfile::TempDir;

    fn fresh_db() -> (TempDir, AuthDb) {
        let tmp = TempDir::new().unwrap();
        let db = AuthDb::initialize(&tmp.path().join("kerberos.json")).unwrap();
        (tmp, db)
    }

    #[test]
    fn test_initialize_creates_file_and_keys() {
        let (_tmp, db) = fresh_db();

        assert!(db.path().exists());
        let as_tgs = db.shared_key(ServicePair::AsTgs).unwrap();
        let tgs_fs = db.shared_key(ServicePair::TgsFs).unwrap();
        assert_ne!(as_tgs, tgs_fs);
    }

    #[test]
    fn test_shared_keys_stable_across_reopen() {
        let (_tmp, db) = fresh_db();
        let before = db.shared_key(ServicePair::AsTgs).unwrap();

        let again = AuthDb::initialize(db.path()).unwrap();
        let connected = AuthDb::connect(db.path()).unwrap();

        assert_eq!(again.shared_key(ServicePair::AsTgs).unwrap(), before);
        assert_eq!(connected.shared_key(ServicePair::AsTgs).unwrap(), before);
    }

    #[test]
    fn test_connect_requires_existing_file() {
        let tmp = TempDir::new().unwrap();
        let result = AuthDb::connect(&tmp.path().join("kerberos.json"));
        assert!(matches!(result, Err(StoreError::Missing(_))));
    }

    #[test]
    fn test_connect_rejects_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("kerberos.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(AuthDb::connect(&path), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_add_and_find_case_insensitive() {
        let (_tmp, db) = fresh_db();
        let added = db.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        assert_eq!(added.key, derive_key("jdoe42", "mypass123"));

        let found = db.find_user_by_username("JDOE42").unwrap().unwrap();
        assert_eq!(found, added);
        assert!(db.find_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (_tmp, db) = fresh_db();
        db.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        let result = db.add_user("Jane", "Doe", "JDoe42", "other");
        assert!(matches!(result, Err(StoreError::DuplicateUsername(_))));
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_users_persist() {
        let (_tmp, db) = fresh_db();
        db.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        let reopened = AuthDb::connect(db.path()).unwrap();
        let user = reopened.find_user_by_username("jdoe42").unwrap().unwrap();
        assert_eq!(user.first_name, "John");
        assert_eq!(user.key, derive_key("jdoe42", "mypass123"));
    }

    #[test]
    fn test_update_rederives_key() {
        let (_tmp, db) = fresh_db();
        let user = db.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        let updated = db
            .update_user(user.id, "Johnny", "Doe", "jdoe42", "newpass")
            .unwrap();

        assert_eq!(updated.id, user.id);
        assert_eq!(updated.first_name, "Johnny");
        assert_eq!(updated.key, derive_key("jdoe42", "newpass"));
        assert!(matches!(
            db.update_user(999, "a", "b", "c", "d"),
            Err(StoreError::UserNotFound(999))
        ));
    }

    #[test]
    fn test_update_cannot_steal_username() {
        let (_tmp, db) = fresh_db();
        db.add_user("John", "Doe", "jdoe42", "p1").unwrap();
        let jane = db.add_user("Jane", "Roe", "jroe", "p2").unwrap();

        let result = db.update_user(jane.id, "Jane", "Roe", "JDOE42", "p2");
        assert!(matches!(result, Err(StoreError::DuplicateUsername(_))));
    }

    #[test]
    fn test_delete() {
        let (_tmp, db) = fresh_db();
        let user = db.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        assert_eq!(db.delete_user(user.id).unwrap().username, "jdoe42");
        assert!(db.find_user_by_username("jdoe42").unwrap().is_none());
        assert!(matches!(
            db.delete_user(user.id),
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let (_tmp, db) = fresh_db();
        let first = db.add_user("A", "A", "a", "p").unwrap();
        db.delete_user(first.id).unwrap();
        let second = db.add_user("B", "B", "b", "p").unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_name_searches() {
        let (_tmp, db) = fresh_db();
        db.add_user("John", "Doe", "jdoe42", "p").unwrap();
        db.add_user("Johanna", "Smith", "jsmith", "p").unwrap();
        db.add_user("Mary", "Doerr", "mdoerr", "p").unwrap();

        assert_eq!(db.find_users_by_first_name("joh").unwrap().len(), 2);
        assert_eq!(db.find_users_by_last_name("DOE").unwrap().len(), 2);

        let full = db.find_users_by_full_name("john doe").unwrap();
        assert_eq!(full.len(), 1);
        assert_eq!(full[0].username, "jdoe42");

        assert!(matches!(
            db.find_users_by_full_name("John"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_key_registry_snapshot() {
        let (_tmp, db) = fresh_db();
        let registry = db.key_registry(&[ServicePair::TgsFs]).unwrap();

        assert!(registry.contains(ServicePair::TgsFs));
        assert!(!registry.contains(ServicePair::AsTgs));
        assert_eq!(
            registry.shared_key(ServicePair::TgsFs).unwrap(),
            db.shared_key(ServicePair::TgsFs).unwrap()
        );
    }

    #[test]
    fn test_lookup_sees_user_added_by_other_handle() {
        let (_tmp, serving) = fresh_db();
        assert!(serving.find_user_by_username("jdoe42").unwrap().is_none());

        let admin = AuthDb::connect(serving.path()).unwrap();
        admin.add_user("John", "Doe", "jdoe42", "mypass123").unwrap();

        let found = serving.find_user_by_username("jdoe42").unwrap().unwrap();
        assert_eq!(found.key, derive_key("jdoe42", "mypass123"));

        admin.delete_user(found.id).unwrap();
        assert!(serving.find_user_by_username("jdoe42").unwrap().is_none());
    }

    #[test]
    fn test_interleaved_handles_keep_both_users() {
        let (_tmp, db) = fresh_db();
        let a = AuthDb::connect(db.path()).unwrap();
        let b = AuthDb::connect(db.path()).unwrap();

        let alice = a.add_user("Alice", "A", "alice", "p").unwrap();
        let bob = b.add_user("Bob", "B", "bob", "p").unwrap();
        assert_ne!(alice.id, bob.id);

        let names: Vec<String> = AuthDb::connect(db.path())
            .unwrap()
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["alice", "bob"]);

        let dup = b.add_user("Alice", "Again", "ALICE", "p");
        assert!(matches!(dup, Err(StoreError::DuplicateUsername(_))));
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let (_tmp, db) = fresh_db();
        let path = db.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let db = AuthDb::connect(&path).unwrap();
                    for j in 0..5 {
                        db.add_user("U", "U", &format!("user{i}_{j}"), "p").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 40);
        let mut ids: Vec<u64> = users.iter().map(|u| u.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 40);
    }

    #[test]
    fn test_writes_leave_no_temp_files() {
        let (tmp, db) = fresh_db();
        db.add_user("John", "Doe", "jdoe42", "p").unwrap();
        db.add_user("Jane", "Roe", "jroe", "p").unwrap();

        let mut names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["kerberos.json", "kerberos.json.lock"]);
    }

    #[test]
    fn test_shared_keys_survive_user_writes_from_other_handle() {
        let (_tmp, db) = fresh_db();
        let before = db.shared_key(ServicePair::TgsFs).unwrap();

        AuthDb::connect(db.path())
            .unwrap()
            .add_user("John", "Doe", "jdoe42", "p")
            .unwrap();

        assert_eq!(db.shared_key(ServicePair::TgsFs).unwrap(), before);
    }

    #[cfg(unix)]
    #[test]
    fn test_database_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_tmp, db) = fresh_db();
        let mode = std::fs::metadata(db.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
