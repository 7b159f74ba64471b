//! Site settings view.

use super::{finish_fetch, snapshot_channel, spawn_watch, ViewSnapshot, WatchHandle};
use crate::classify::ErrorReporter;
use crate::constants::TABLE_SITE_SETTINGS;
use crate::optimizer::DatabaseOptimizer;
use std::sync::Arc;
use storefront_core::{
    validate_settings, SettingsPatch, SiteSettings, StorefrontError, StorefrontResult,
};
use storefront_storage::{decode_row, encode_row, Filter, Namespace};
use tokio::sync::watch;

pub struct SettingsView {
    optimizer: Arc<DatabaseOptimizer>,
    reporter: ErrorReporter,
    state: watch::Sender<ViewSnapshot<Option<SiteSettings>>>,
}

impl std::fmt::Debug for SettingsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsView")
            .field("settings", &self.settings())
            .finish_non_exhaustive()
    }
}

impl SettingsView {
    pub fn new(optimizer: Arc<DatabaseOptimizer>, reporter: ErrorReporter) -> Self {
        Self {
            optimizer,
            reporter,
            state: snapshot_channel(),
        }
    }

    pub fn snapshot(&self) -> ViewSnapshot<Option<SiteSettings>> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewSnapshot<Option<SiteSettings>>> {
        self.state.subscribe()
    }

    pub fn settings(&self) -> Option<SiteSettings> {
        self.state.borrow().data.clone()
    }

    pub async fn fetch(&self) -> bool {
        match self.optimizer.site_settings(true).await {
            Ok(settings) => {
                finish_fetch(&self.state, Ok(settings));
                true
            }
            Err(e) => {
                let classified = self.reporter.report(&e, "fetch_site_settings");
                finish_fetch(&self.state, Err(classified));
                false
            }
        }
    }

    /// Save a partial update. Settings must have been loaded first.
    pub async fn update(&self, patch: SettingsPatch) -> StorefrontResult<SiteSettings> {
        let Some(mut current) = self.settings() else {
            let e = StorefrontError::NotLoaded {
                resource: TABLE_SITE_SETTINGS.to_string(),
            };
            self.reporter.report(&e, "update_site_settings");
            return Err(e);
        };

        if let Err(e) = validate_settings(&patch) {
            self.reporter.report(&e, "update_site_settings");
            return Err(e.into());
        }

        let result = async {
            let row = encode_row(&patch)?;
            self.optimizer
                .store()
                .update(
                    TABLE_SITE_SETTINGS,
                    row,
                    &[Filter::eq("id", current.id.to_string())],
                )
                .await
        }
        .await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                self.reporter.report(&e, "update_site_settings");
                return Err(e.into());
            }
        };

        // Prefer the stored row; fall back to merging locally.
        let updated = match rows.into_iter().next().map(decode_row::<SiteSettings>) {
            Some(Ok(stored)) => stored,
            _ => {
                current.apply(&patch);
                current
            }
        };

        self.state
            .send_modify(|snap| snap.data = Some(updated.clone()));
        self.optimizer.invalidate_namespace(&Namespace::SiteSettings);
        tracing::info!(settings_id = %updated.id, "Site settings updated");
        self.reporter.success("Site settings saved");
        Ok(updated)
    }

    pub fn watch(self: &Arc<Self>) -> WatchHandle {
        let stream = self.optimizer.store().subscribe(TABLE_SITE_SETTINGS);
        let view = Arc::clone(self);
        spawn_watch(stream, move |_event| {
            let view = Arc::clone(&view);
            async move {
                view.optimizer.invalidate_namespace(&Namespace::SiteSettings);
                view.fetch().await;
            }
        })
    }
}
