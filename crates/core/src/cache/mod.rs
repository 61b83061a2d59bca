mod error;
mod keys;
mod patterns;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{CacheKeys, DEFAULT_NAMESPACE};
pub use patterns::pattern_matches;
pub use serialization::{deserialize_snapshot, serialize_snapshot, SerializationError};
pub use traits::Cache;
