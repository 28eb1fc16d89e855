pub mod admin;
pub mod cart;
pub mod menu;
pub mod payment;
pub mod router;
pub mod worker;

use crate::config::Config;
use crate::domain::ports::{CatalogRef, StoreRef, TransportRef};
use std::sync::Arc;

/// Everything a worker needs beyond its own inbox: the persistence port, the
/// outbound transport, localized strings and the engine configuration.
#[derive(Clone)]
pub struct Services {
    pub store: StoreRef,
    pub transport: TransportRef,
    pub catalog: CatalogRef,
    pub config: Arc<Config>,
}
