//! Shared application state for the query API.

use nids_ml::MlDetector;
use nids_store::Store;
use parking_lot::RwLock;
use std::sync::Arc;

/// State handed to every handler via an `Extension`. The store is
/// already internally synchronized; the detector is additionally
/// guarded here since the API and the cycle worker both hold a
/// reference to the same live model.
pub struct ApiState {
    pub store: Arc<Store>,
    pub ml: Arc<RwLock<MlDetector>>,
}

impl ApiState {
    pub fn new(store: Arc<Store>, ml: Arc<RwLock<MlDetector>>) -> Self {
        Self { store, ml }
    }
}
