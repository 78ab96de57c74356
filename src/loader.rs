//! Document loading and nested expansion.
//!
//! # Responsibilities
//! - Fetch each URL at most once per store; further references to it get a
//!   copy of the document already loaded
//! - Install the first document as the root, splice nested ones in place
//! - Run an aggregation pass after every successful load
//! - Schedule the nested loads that pass discovers
//!
//! # Design Decisions
//! - Top-level failures are returned; nested failures are logged and leave the
//!   placeholder URL in the tree so a later pass can retry it
//! - A failed URL is never recorded as loaded
//! - Nested loads are detached by default; `settle` waits for all of them
//! - A document is never spliced inside another copy of itself

use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde_json::Value;

use crate::aggregate::PendingExpansion;
use crate::config::NestedLoadMode;
use crate::error::{ConfigError, ConfigResult};
use crate::path::JsonPath;
use crate::store::ConfigurationStore;

impl ConfigurationStore {
    /// Load the document at `url` as the root of the tree.
    ///
    /// Completes immediately if `url` was already loaded. In detached mode,
    /// nested documents may still be loading when this returns; call
    /// [`ConfigurationStore::settle`] to wait for them.
    pub async fn load(&self, url: &str) -> ConfigResult<()> {
        let claimed = self.inner.context.lock().begin(url);
        if !claimed {
            tracing::debug!(url = %url, "Document already loaded");
            return Ok(());
        }
        self.merge_document(url.to_string(), None).await
    }

    /// Wait until no background nested loads remain.
    pub async fn settle(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.detached.lock());
            if handles.is_empty() {
                break;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Nested load task aborted");
                }
            }
        }
    }

    /// Fetch a claimed `url` and merge it at `target`, or as the root.
    fn merge_document(
        &self,
        url: String,
        target: Option<JsonPath>,
    ) -> BoxFuture<'static, ConfigResult<()>> {
        self.clone().run_merge(url, target).boxed()
    }

    async fn run_merge(self, url: String, target: Option<JsonPath>) -> ConfigResult<()> {
        let fetched = self.fetch_document(&url).await;

        let pending = {
            let mut context = self.inner.context.lock();
            context.in_flight.remove(&url);
            let document = fetched?;
            match &target {
                None => context.install_root(&url, document),
                Some(location) => match context.splice(&url, location, document)? {
                    Some(pending) => pending,
                    None => {
                        tracing::debug!(
                            url = %url,
                            path = %location,
                            "Placeholder replaced before document arrived"
                        );
                        context.refresh()
                    }
                },
            }
        };

        match &target {
            None => tracing::info!(url = %url, nested = pending.len(), "Configuration loaded"),
            Some(location) => tracing::info!(
                url = %url,
                path = %location,
                nested = pending.len(),
                "Nested configuration merged"
            ),
        }

        self.expand(pending).await;
        Ok(())
    }

    async fn fetch_document(&self, url: &str) -> ConfigResult<Value> {
        let response = self
            .inner
            .fetcher
            .get(url)
            .await
            .map_err(|source| ConfigError::Fetch {
                url: url.to_string(),
                source,
            })?;

        if !response.is_ok() {
            return Err(ConfigError::Load {
                url: url.to_string(),
                status: response.status,
            });
        }

        serde_json::from_str(&response.body).map_err(|source| ConfigError::Parse {
            url: url.to_string(),
            source,
        })
    }

    async fn expand(&self, pending: Vec<PendingExpansion>) {
        let pending = self.inner.context.lock().reuse_loaded(pending);
        if pending.is_empty() {
            return;
        }

        match self.inner.nested_mode {
            NestedLoadMode::Detached => {
                let mut detached = self.inner.detached.lock();
                detached.retain(|handle| !handle.is_finished());
                for expansion in pending {
                    let url = expansion.url.clone();
                    let load = self.merge_document(expansion.url, Some(expansion.location));
                    detached.push(tokio::spawn(async move {
                        if let Err(e) = load.await {
                            report_nested_failure(&url, &e);
                        }
                    }));
                }
            }
            NestedLoadMode::Awaited => {
                let loads = pending.into_iter().map(|expansion| {
                    let url = expansion.url.clone();
                    self.merge_document(expansion.url, Some(expansion.location))
                        .map(move |result| (url, result))
                });
                for (url, result) in join_all(loads).await {
                    if let Err(e) = result {
                        report_nested_failure(&url, &e);
                    }
                }
            }
        }
    }
}

fn report_nested_failure(url: &str, error: &ConfigError) {
    tracing::warn!(url = %url, error = %error, "Nested configuration load failed");
}
