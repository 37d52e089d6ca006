//! History workflow
//!
//! Loads the signed-in user's prediction log, newest first. When the
//! owner-filtered query fails the whole collection is read and filtered
//! here instead.
//!
//! The full-scan fallback bypasses store-side filtering and reads every
//! user's records. It is kept for parity with existing deployments whose
//! owner index or access rules reject the filtered query, and should not
//! be carried into a hardened deployment.

use rdd_common::models::sort_newest_first;
use rdd_common::{Identity, PredictionRecord};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::records::{RecordStore, StoreError};
use crate::session::UiSession;

/// Which query produced a history page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    OwnerQuery,
    FullScan,
}

/// Records owned by one identity, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub records: Vec<PredictionRecord>,
    pub source: HistorySource,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History unavailable (owner query: {primary}; full scan: {fallback})")]
    Unavailable {
        primary: StoreError,
        fallback: StoreError,
    },
}

/// Reads prediction history back from the record store
#[derive(Clone)]
pub struct HistoryWorkflow {
    records: Arc<dyn RecordStore>,
}

impl HistoryWorkflow {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    /// Fetch every record owned by `identity`, newest first
    pub async fn fetch_history(&self, identity: &Identity) -> Result<HistoryPage, HistoryError> {
        let primary = match self.records.query_by_owner(&identity.id).await {
            Ok(mut records) => {
                sort_newest_first(&mut records);
                return Ok(HistoryPage {
                    records,
                    source: HistorySource::OwnerQuery,
                });
            }
            Err(e) => e,
        };

        warn!(owner_id = %identity.id, error = %primary, "Owner query failed, scanning full collection");

        match self.records.list_all().await {
            Ok(all) => {
                let mut records: Vec<PredictionRecord> = all
                    .into_iter()
                    .filter(|r| r.owner_id == identity.id)
                    .collect();
                sort_newest_first(&mut records);
                Ok(HistoryPage {
                    records,
                    source: HistorySource::FullScan,
                })
            }
            Err(fallback) => Err(HistoryError::Unavailable { primary, fallback }),
        }
    }

    /// Reload the history shown in `ui`
    ///
    /// Returns the page on success. When both queries fail the failure is
    /// logged and `None` is returned; the previously shown history stays.
    pub async fn refresh(&self, ui: &UiSession, identity: &Identity) -> Option<HistoryPage> {
        match self.fetch_history(identity).await {
            Ok(page) => {
                info!(owner_id = %identity.id, count = page.records.len(), source = ?page.source, "Loaded prediction history");
                ui.replace_history(page.records.clone());
                Some(page)
            }
            Err(e) => {
                error!(owner_id = %identity.id, error = %e, "Fallback fetch also failed");
                None
            }
        }
    }
}
