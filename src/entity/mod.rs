//! Entity identity and classification: the stored document and the static
//! per-kind descriptor that decides which attributes exist and which may be
//! searched, created or updated.

pub mod document;
pub mod kind;

pub use document::Entity;
pub use kind::{Capabilities, EntityKind, EntityKindBuilder, FieldPolicy, KindDescriptor};
