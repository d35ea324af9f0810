use std::sync::Arc;

use entity_common::{EntityTable, PhotoQueue, Storage};

/// The managed services the handlers talk to.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<dyn EntityTable>,
    pub storage: Arc<Storage>,
    pub queue: Arc<dyn PhotoQueue>,
}
