pub mod backends;
pub mod publisher;
pub mod template;

pub use publisher::{PublishedResult, Publisher};
pub use template::StorageBackend;
