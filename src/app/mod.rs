//! Application context and lifecycle glue.
//!
//! [`App`] owns the one [`UserStore`] of a run. The entry point constructs
//! it explicitly and hands out references; there is no global accessor.
//! Hosts call [`App::on_enter_background`] and [`App::on_terminate`] from
//! their lifecycle events so the user list reaches durable storage.

pub mod config;
pub mod form;

use std::sync::Arc;

pub use config::AppConfig;
pub use form::CreateUserForm;

use crate::error::Result;
use crate::store::{self, PersistHandle, UserStore};
use crate::sys::{FileSettings, MemorySettings, SettingsStore};

pub struct App {
    pub config: AppConfig,
    store: UserStore,
}

impl App {
    /// Build the settings backend described by `config` and load the store from it.
    pub fn open(config: AppConfig) -> Self {
        let settings: Arc<dyn SettingsStore> = if config.ephemeral {
            Arc::new(MemorySettings::new())
        } else {
            Arc::new(FileSettings::new(config.storage_path.clone()))
        };
        Self::with_settings(config, settings)
    }

    pub fn with_settings(config: AppConfig, settings: Arc<dyn SettingsStore>) -> Self {
        let store = UserStore::new(settings);
        tracing::info!(
            users = store.count(),
            storage = %config.storage_path.display(),
            ephemeral = config.ephemeral,
            "user store opened"
        );
        Self { config, store }
    }

    pub fn store(&self) -> &UserStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut UserStore {
        &mut self.store
    }

    /// A create-user form committing into this app's store.
    pub fn create_user_form(&mut self) -> CreateUserForm<'_> {
        CreateUserForm::new(&mut self.store)
    }

    /// Delete the persisted user list; the in-memory list is kept.
    pub fn clear_local_storage(&self) -> Result<()> {
        store::clear_local_storage(self.store.settings().as_ref())
    }

    pub fn on_enter_background(&self) -> PersistHandle {
        tracing::info!("app entering background state");
        self.store.persist()
    }

    pub fn on_terminate(&self) -> PersistHandle {
        tracing::info!("app is terminating");
        self.store.persist()
    }
}
