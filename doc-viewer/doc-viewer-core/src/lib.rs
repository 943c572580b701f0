pub mod archive;
pub mod document;
pub mod events;
pub mod store;

pub use document::{Document, DocumentMetadata, DocumentStatus, DocumentSummary, NewDocument};
pub use events::{Event, EventBroadcaster, Subscription};
pub use store::{DocumentStore, StoreError};
