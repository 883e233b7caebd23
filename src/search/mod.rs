//! Listing files by their tags and folders.
//!
//! Build a [`FileQuery`], then hand it to [`Catalog::list_files`](crate::catalog::Catalog::list_files).

use std::str::FromStr;

use uuid::Uuid;

use crate::{
    error::CatalogError,
    models::{file::CatalogFile, tags::TagId},
};

pub mod modifiers;
pub mod query;

/// How many files a page holds unless told otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// The biggest page anyone can ask for.
pub const MAX_PAGE_SIZE: u32 = 500;

/// How a file has to relate to the folders in a [`FileQuery`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FolderMatch {
    /// The file must be in every listed folder. Same rule as tags.
    #[default]
    All,
    /// Being in one of the listed folders is enough.
    Any,
}

/// What to list, and which page of it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FileQuery {
    /// Files must carry all of these.
    pub tag_ids: Vec<TagId>,
    pub folder_ids: Vec<Uuid>,
    pub folder_match: FolderMatch,
    /// Starts at 1.
    pub page: u32,
    pub size: u32,
}

impl Default for FileQuery {
    fn default() -> Self {
        Self {
            tag_ids: Vec::new(),
            folder_ids: Vec::new(),
            folder_match: FolderMatch::default(),
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FileQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(mut self, tag_ids: impl IntoIterator<Item = TagId>) -> Self {
        self.tag_ids = tag_ids.into_iter().collect();
        self
    }

    pub fn folders(mut self, folder_ids: impl IntoIterator<Item = Uuid>) -> Self {
        self.folder_ids = folder_ids.into_iter().collect();
        self
    }

    pub fn folder_match(mut self, folder_match: FolderMatch) -> Self {
        self.folder_match = folder_match;
        self
    }

    pub fn page(mut self, page: u32, size: u32) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    /// Builds a query from raw request parameters, where the id lists are
    /// comma-joined (`"3,7,12"`).
    ///
    /// Blank entries are skipped. Missing `page`/`size` use the defaults.
    pub fn from_params(
        tag_ids: Option<&str>,
        folder_ids: Option<&str>,
        page: Option<u32>,
        size: Option<u32>,
    ) -> Result<Self, CatalogError> {
        Ok(Self {
            tag_ids: tag_ids
                .map(|raw| parse_id_list(raw, "tag"))
                .transpose()?
                .unwrap_or_default(),
            folder_ids: folder_ids
                .map(|raw| parse_id_list(raw, "folder"))
                .transpose()?
                .unwrap_or_default(),
            folder_match: FolderMatch::default(),
            page: page.unwrap_or(1),
            size: size.unwrap_or(DEFAULT_PAGE_SIZE),
        })
    }

    /// Checks that there's something to filter by and that the page makes
    /// sense.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.tag_ids.is_empty() && self.folder_ids.is_empty() {
            return Err(CatalogError::InvalidArgument(
                "give at least one tag id or folder id to filter by".into(),
            ));
        }
        if self.page < 1 {
            return Err(CatalogError::InvalidArgument("`page` starts at 1".into()));
        }
        if self.size < 1 {
            return Err(CatalogError::InvalidArgument(
                "`size` must be at least 1".into(),
            ));
        }
        if self.size > MAX_PAGE_SIZE {
            return Err(CatalogError::InvalidArgument(format!(
                "`size` can't be more than {MAX_PAGE_SIZE}"
            )));
        }

        // sqlite takes offsets as signed 64-bit ints
        match self.offset() {
            Some(offset) if i64::try_from(offset).is_ok() => Ok(()),
            _ => Err(CatalogError::InvalidArgument(format!(
                "page {} is out of range",
                self.page
            ))),
        }
    }

    /// How many files come before this page. `None` if that overflows.
    pub fn offset(&self) -> Option<u64> {
        u64::from(self.page.saturating_sub(1)).checked_mul(u64::from(self.size))
    }
}

/// One page of a listing.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FilePage {
    /// Matches across all pages.
    pub total: u64,
    pub items: Vec<CatalogFile>,
}

impl FilePage {
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
        }
    }
}

/// Parses a comma-joined list of ids, like `"1, 2,3"`.
pub fn parse_id_list<T: FromStr>(raw: &str, what: &str) -> Result<Vec<T>, CatalogError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                CatalogError::InvalidArgument(format!("`{s}` is not a valid {what} id"))
            })
        })
        .collect()
}
