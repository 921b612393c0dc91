//! Service surface consumed by the routing layer: pagination, counting and
//! entity lifecycle operations over a document store.

pub mod pagination;
pub mod service;

pub use pagination::{Page, PageRequest, PageWindow, Statistics};
pub use service::{EntityService, Payload};
