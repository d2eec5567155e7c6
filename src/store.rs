//! The authoritative in-memory user list and its persistence.
//!
//! A [`UserStore`] is owned and read by a single thread. [`UserStore::persist`]
//! hands a snapshot of the list to a background thread which encodes it and
//! writes it under [`STORE_KEY`]. Those writes, and [`UserStore::load_users`],
//! run inside one critical section shared by every persist spawned from the
//! same store, so concurrent persists never interleave.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::error::{Context, Result};
use crate::events::{Channel, ChangeEvent};
use crate::model::User;
use crate::sys::{SettingsStore, lock};

/// Settings key the serialized user list lives under.
pub const STORE_KEY: &str = "UserStoreKey";

#[derive(Debug, Default)]
struct PersistState {
    // Generation of the most recent snapshot written to settings.
    written: Option<u64>,
}

/// Ordered collection of users, unique by `user_id`.
pub struct UserStore {
    users: Vec<User>,
    settings: Arc<dyn SettingsStore>,
    persist_state: Arc<Mutex<PersistState>>,
    // Bumped on every membership change; orders background writes.
    generation: u64,
    changes: Channel<ChangeEvent>,
}

impl UserStore {
    /// Create a store over `settings` and load whatever is persisted there.
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        let mut store = Self {
            users: Vec::new(),
            settings,
            persist_state: Arc::new(Mutex::new(PersistState::default())),
            generation: 0,
            changes: Channel::new(),
        };
        store.load_users();
        store
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// All users in insertion order.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn get(&self, index: usize) -> Option<&User> {
        self.users.get(index)
    }

    pub fn fetch(&self, id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == id)
    }

    pub fn exists(&self, id: &str) -> bool {
        self.users.iter().any(|u| u.user_id == id)
    }

    pub fn changes(&self) -> &Channel<ChangeEvent> {
        &self.changes
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    /// Append `user` unless a user with the same id is already present.
    ///
    /// Returns whether the user was inserted. A duplicate id is silently
    /// ignored and emits no change event.
    pub fn add(&mut self, user: User) -> bool {
        if self.exists(&user.user_id) {
            tracing::debug!(user_id = %user.user_id, "add ignored: id already present");
            return false;
        }
        let index = self.users.len();
        tracing::debug!(user_id = %user.user_id, index, "user added");
        self.users.push(user.clone());
        self.generation += 1;
        self.changes.publish(&ChangeEvent::Insert { index, items: vec![user] });
        true
    }

    /// Remove the user with the same id as `user`, returning it if found.
    pub fn remove(&mut self, user: &User) -> Option<User> {
        self.remove_by_id(&user.user_id)
    }

    pub fn remove_by_id(&mut self, id: &str) -> Option<User> {
        let index = self.users.iter().position(|u| u.user_id == id)?;
        let removed = self.users.remove(index);
        tracing::debug!(user_id = %removed.user_id, index, "user removed");
        self.generation += 1;
        self.changes.publish(&ChangeEvent::Remove { index, items: vec![removed.clone()] });
        Some(removed)
    }

    /// Write the current list to settings on a background thread.
    ///
    /// The returned handle may be dropped (fire-and-forget) or waited on.
    /// Failures are logged; they never reach the caller.
    pub fn persist(&self) -> PersistHandle {
        let snapshot = self.users.clone();
        let generation = self.generation;
        let settings = Arc::clone(&self.settings);
        let state = Arc::clone(&self.persist_state);

        let spawned = thread::Builder::new()
            .name("user-store-persist".to_string())
            .spawn(move || {
                match write_snapshot(&*settings, &state, &snapshot, generation) {
                    Ok(true) => {
                        tracing::debug!(count = snapshot.len(), generation, "user list persisted");
                        true
                    }
                    Ok(false) => {
                        tracing::debug!(generation, "skipped stale user list snapshot");
                        true
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to persist user list");
                        false
                    }
                }
            });

        match spawned {
            Ok(handle) => PersistHandle(Some(handle)),
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn persist thread");
                PersistHandle(None)
            }
        }
    }

    /// Replace the whole list with what is persisted under [`STORE_KEY`].
    ///
    /// Missing, empty, or undecodable data yields an empty list. Always
    /// emits [`ChangeEvent::Reset`].
    pub fn load_users(&mut self) {
        let loaded = {
            let _guard = lock(&self.persist_state);
            read_users(self.settings.as_ref())
        };
        tracing::debug!(count = loaded.len(), "user list loaded");
        self.users = loaded;
        self.generation += 1;
        self.changes.publish(&ChangeEvent::Reset);
    }
}

impl std::fmt::Debug for UserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserStore")
            .field("count", &self.users.len())
            .field("generation", &self.generation)
            .field("changes", &self.changes)
            .finish()
    }
}

/// Delete the persisted user list. In-memory stores are left untouched.
pub fn clear_local_storage(settings: &dyn SettingsStore) -> Result<()> {
    settings.remove(STORE_KEY).map_err(|e| {
        tracing::warn!(error = %e, "failed to clear persisted user list");
        e
    })?;
    tracing::info!("persisted user list cleared");
    Ok(())
}

/// Handle to a background persist.
#[derive(Debug)]
pub struct PersistHandle(Option<JoinHandle<bool>>);

impl PersistHandle {
    /// Block until the write finished.
    ///
    /// Returns `true` if the snapshot was stored, or skipped because a newer
    /// one already was. Returns `false` if the worker could not be started,
    /// panicked, or the settings write failed.
    pub fn wait(self) -> bool {
        match self.0 {
            Some(handle) => handle.join().unwrap_or(false),
            None => false,
        }
    }
}

fn write_snapshot(
    settings: &dyn SettingsStore,
    state: &Mutex<PersistState>,
    users: &[User],
    generation: u64,
) -> Result<bool> {
    let mut state = lock(state);
    if state.written.is_some_and(|w| w > generation) {
        return Ok(false);
    }
    let json = serde_json::to_string(users).with_ctx(|| "encode user list".to_string())?;
    settings.set(STORE_KEY, &json)?;
    state.written = Some(generation);
    Ok(true)
}

fn read_users(settings: &dyn SettingsStore) -> Vec<User> {
    let raw = match settings.get(STORE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read persisted users; starting empty");
            return Vec::new();
        }
    };
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let decoded: Vec<User> = match serde_json::from_str::<Option<Vec<User>>>(&raw) {
        Ok(users) => users.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "persisted users are malformed; starting empty");
            return Vec::new();
        }
    };

    let mut users: Vec<User> = Vec::with_capacity(decoded.len());
    for user in decoded {
        if users.iter().any(|u| u.user_id == user.user_id) {
            tracing::warn!(user_id = %user.user_id, "dropping duplicate persisted user");
            continue;
        }
        users.push(user);
    }
    users
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sys::MemorySettings;
	use std::cell::RefCell;
	use std::rc::Rc;

	fn mk_user(id: &str, name: &str) -> User {
		User::with_id(id, name, "abc12", format!("{name}@example.com"), false)
	}

	fn empty_store() -> (Arc<MemorySettings>, UserStore) {
		let settings = Arc::new(MemorySettings::new());
		let store = UserStore::new(settings.clone());
		(settings, store)
	}

	fn record(store: &UserStore) -> Rc<RefCell<Vec<ChangeEvent>>> {
		let events = Rc::new(RefCell::new(Vec::new()));
		let sink = Rc::clone(&events);
		store.changes().subscribe(move |e| sink.borrow_mut().push(e.clone()));
		events
	}

	#[test]
	fn add_is_a_noop_for_duplicate_ids() {
		let (_s, mut store) = empty_store();
		let events = record(&store);
		assert!(store.add(mk_user("1", "alice")));
		assert!(!store.add(mk_user("1", "someone-else")));
		assert_eq!(store.count(), 1);
		assert_eq!(store.fetch("1").unwrap().username, "alice");
		assert_eq!(events.borrow().len(), 1);
	}

	#[test]
	fn add_to_empty_store_emits_insert_at_zero() {
		let (_s, mut store) = empty_store();
		let events = record(&store);
		let u = mk_user("1", "alice");
		store.add(u.clone());
		assert_eq!(*events.borrow(), vec![ChangeEvent::Insert { index: 0, items: vec![u] }]);
	}

	#[test]
	fn removing_only_user_emits_remove_at_zero() {
		let (_s, mut store) = empty_store();
		let u = mk_user("1", "alice");
		store.add(u.clone());
		let events = record(&store);
		assert_eq!(store.remove(&u), Some(u.clone()));
		assert!(store.is_empty());
		assert_eq!(*events.borrow(), vec![ChangeEvent::Remove { index: 0, items: vec![u.clone()] }]);

		assert_eq!(store.remove(&u), None);
		assert_eq!(events.borrow().len(), 1);
	}

	#[test]
	fn remove_reports_the_index_of_the_removed_user() {
		let (_s, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		store.add(mk_user("2", "b"));
		store.add(mk_user("3", "c"));
		let events = record(&store);
		store.remove_by_id("2");
		assert!(matches!(events.borrow()[0], ChangeEvent::Remove { index: 1, .. }));
		let ids: Vec<_> = store.users().iter().map(|u| u.user_id.as_str()).collect();
		assert_eq!(ids, vec!["1", "3"]);
	}

	#[test]
	fn fetch_and_exists_scan_by_id() {
		let (_s, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		assert!(store.exists("1"));
		assert!(!store.exists("2"));
		assert!(store.fetch("2").is_none());
		assert_eq!(store.get(0).map(|u| u.username.as_str()), Some("a"));
	}

	#[test]
	fn persist_then_reload_reproduces_the_list() {
		let (settings, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		store.add(mk_user("2", "b"));
		assert!(store.persist().wait());

		let reloaded = UserStore::new(settings.clone());
		assert_eq!(reloaded.users(), store.users());
	}

	#[test]
	fn load_users_overwrites_and_emits_reset() {
		let (settings, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		store.persist().wait();
		store.add(mk_user("2", "b"));
		let events = record(&store);

		store.load_users();
		assert_eq!(store.count(), 1);
		assert_eq!(*events.borrow(), vec![ChangeEvent::Reset]);

		settings.remove(STORE_KEY).unwrap();
		store.load_users();
		assert!(store.is_empty());
		assert_eq!(events.borrow().len(), 2);
	}

	#[test]
	fn malformed_or_empty_data_loads_as_empty() {
		for raw in ["", "   ", "not json", "{\"userId\":1}", "null"] {
			let settings = Arc::new(MemorySettings::new());
			settings.set(STORE_KEY, raw).unwrap();
			let store = UserStore::new(settings);
			assert!(store.is_empty(), "input {raw:?}");
		}
	}

	#[test]
	fn duplicate_ids_in_persisted_data_keep_the_first() {
		let settings = Arc::new(MemorySettings::new());
		let raw = serde_json::to_string(&vec![mk_user("1", "a"), mk_user("1", "b")]).unwrap();
		settings.set(STORE_KEY, &raw).unwrap();
		let store = UserStore::new(settings);
		assert_eq!(store.count(), 1);
		assert_eq!(store.users()[0].username, "a");
	}

	#[test]
	fn stale_snapshot_does_not_overwrite_newer_one() {
		let (settings, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		store.add(mk_user("2", "b"));
		assert!(store.persist().wait());

		// Replay an older snapshot through the same critical section.
		let written = write_snapshot(&*settings, &store.persist_state, &[], 0).unwrap();
		assert!(!written);
		assert_eq!(UserStore::new(settings).count(), 2);
	}

	#[test]
	fn concurrent_persists_leave_a_decodable_value() {
		let (settings, mut store) = empty_store();
		let mut handles = Vec::new();
		for i in 0..20 {
			store.add(mk_user(&i.to_string(), "u"));
			handles.push(store.persist());
		}
		for h in handles {
			assert!(h.wait());
		}
		assert_eq!(UserStore::new(settings).count(), 20);
	}

	struct BrokenSettings;

	impl SettingsStore for BrokenSettings {
		fn get(&self, _key: &str) -> Result<Option<String>> {
			Err(crate::error::DynError::from("device storage unavailable"))
		}
		fn set(&self, _key: &str, _value: &str) -> Result<()> {
			Err(crate::error::DynError::from("device storage is read-only"))
		}
		fn remove(&self, _key: &str) -> Result<()> {
			Err(crate::error::DynError::from("device storage is read-only"))
		}
	}

	#[test]
	fn unreadable_storage_loads_empty_and_emits_reset() {
		let mut store = UserStore::new(Arc::new(BrokenSettings));
		assert!(store.is_empty());
		let events = record(&store);
		store.load_users();
		assert!(store.is_empty());
		assert_eq!(*events.borrow(), vec![ChangeEvent::Reset]);
	}

	#[test]
	fn failed_write_is_reported_by_wait_and_keeps_memory() {
		let mut store = UserStore::new(Arc::new(BrokenSettings));
		store.add(mk_user("1", "a"));
		assert!(!store.persist().wait());
		assert_eq!(store.count(), 1);
		assert!(store.exists("1"));
		assert!(clear_local_storage(&BrokenSettings).is_err());
	}

	#[test]
	fn stale_skip_still_counts_as_success() {
		let (_settings, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		let older = store.persist();
		store.add(mk_user("2", "b"));
		let newer = store.persist();
		assert!(newer.wait());
		assert!(older.wait());
	}

	#[test]
	fn clear_local_storage_leaves_memory_untouched() {
		let (settings, mut store) = empty_store();
		store.add(mk_user("1", "a"));
		store.persist().wait();
		clear_local_storage(&*settings).unwrap();
		assert_eq!(store.count(), 1);
		assert_eq!(settings.get(STORE_KEY).unwrap(), None);
		store.load_users();
		assert!(store.is_empty());
	}
}
