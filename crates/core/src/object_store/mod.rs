mod error;
mod layout;
mod traits;
mod version;

pub use error::{ObjectStoreError, Result};
pub use layout::{ObjectLayout, DEFAULT_BUCKET, DEFAULT_FOLDER, DEFAULT_PREFIX};
pub use traits::{validate_object_name, ObjectStore, StoredObject, JSON_CONTENT_TYPE};
pub use version::{Version, VersionError, VERSION_FORMAT};
