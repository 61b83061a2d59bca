//! Naming rules for snapshot objects.
//!
//! Objects live at `<bucket>/<folder>/<prefix>-<version>.json`. The `All`
//! view appends `-all` to the prefix. Parsing requires the part after
//! `<prefix>-` to be a version and nothing else, so `snapshot-all-...` is never
//! mistaken for an active-view object.

use crate::snapshot::SnapshotView;

use super::Version;

pub const DEFAULT_BUCKET: &str = "strata-snapshots";
pub const DEFAULT_FOLDER: &str = "snapshots";
pub const DEFAULT_PREFIX: &str = "snapshot";

const EXTENSION: &str = ".json";

/// Where snapshot objects are stored and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLayout {
    pub bucket: String,
    pub folder: String,
    pub prefix: String,
}

impl ObjectLayout {
    pub fn new(
        bucket: impl Into<String>,
        folder: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            folder: folder.into().trim_matches('/').to_string(),
            prefix: prefix.into(),
        }
    }

    /// File prefix for a view: `snapshot` or `snapshot-all`.
    pub fn view_prefix(&self, view: SnapshotView) -> String {
        match view {
            SnapshotView::ActiveOnly => self.prefix.clone(),
            SnapshotView::All => format!("{}-all", self.prefix),
        }
    }

    /// Listing prefix covering every object of a view.
    pub fn list_prefix(&self, view: SnapshotView) -> String {
        format!("{}{}-", self.folder_path(), self.view_prefix(view))
    }

    /// Object name (without bucket) for a version of a view.
    pub fn object_name(&self, view: SnapshotView, version: &Version) -> String {
        format!(
            "{}{}-{}{}",
            self.folder_path(),
            self.view_prefix(view),
            version,
            EXTENSION
        )
    }

    /// Extracts the version from an object name belonging to `view`.
    ///
    /// Returns `None` for names of other views, other folders, or with a
    /// malformed timestamp.
    pub fn parse_version(&self, view: SnapshotView, name: &str) -> Option<Version> {
        let rest = name.strip_prefix(&self.list_prefix(view))?;
        let stamp = rest.strip_suffix(EXTENSION)?;
        Version::parse(stamp).ok()
    }

    /// Highest version among `names` belonging to `view`.
    pub fn latest_version<'a, I>(&self, view: SnapshotView, names: I) -> Option<Version>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter_map(|name| self.parse_version(view, name))
            .max()
    }

    fn folder_path(&self) -> String {
        if self.folder.is_empty() {
            String::new()
        } else {
            format!("{}/", self.folder)
        }
    }
}

impl Default for ObjectLayout {
    fn default() -> Self {
        Self::new(DEFAULT_BUCKET, DEFAULT_FOLDER, DEFAULT_PREFIX)
    }
}
