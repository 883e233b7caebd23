//! The parent of the other tests.
//!
//! Mostly to import the setup stuff below.

use camino::{Utf8Path, Utf8PathBuf};
use temp_dir::TempDir;
use uuid::Uuid;

use folio::{
    catalog::Catalog,
    config::Config,
    models::{file::UploadReceipt, tags::TagId},
};

/// Smallest thing `infer` will call a PDF.
#[allow(dead_code, reason = "it's used in the other tests")]
pub const PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

/// A catalog living in its own temporary directory.
///
/// Keep this around for the whole test. Dropping it deletes the directory!
pub struct Setup {
    pub catalog: Catalog,
    pub dir: TempDir,
}

impl Setup {
    #[allow(dead_code, reason = "it's used in the other tests")]
    pub fn data_dir(&self) -> &Utf8Path {
        self.catalog.config().data_dir.as_path()
    }
}

/// call this at the top of any new test func! :)
pub async fn setup() -> Setup {
    setup_with(|conf| conf).await
}

/// Like [`setup`], but lets you tweak the config first.
pub async fn setup_with(tweak: impl FnOnce(Config) -> Config) -> Setup {
    // start logging. other tests in this binary might've beaten us to it
    _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    let dir = TempDir::new().expect("create temp dir");
    let data_dir = Utf8PathBuf::try_from(dir.path().join("folio")).expect("utf-8 temp dir");

    let catalog = Catalog::open(tweak(Config::new(data_dir)))
        .await
        .expect("open catalog");

    Setup { catalog, dir }
}

/// Uploads the sample PDF under `name`.
#[allow(dead_code, reason = "it's used in the other tests")]
pub async fn upload(
    catalog: &Catalog,
    name: &str,
    tag_ids: &[TagId],
    folder_ids: &[Uuid],
) -> UploadReceipt {
    catalog
        .upload_file(name, PDF, tag_ids, folder_ids)
        .await
        .expect("upload should work")
}

/// Counts regular files under `dir`, recursively. A missing `dir` has none.
#[allow(dead_code, reason = "it's used in the other tests")]
pub fn stored_files(dir: &Utf8Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    entries
        .flatten()
        .map(|entry| {
            let path = Utf8PathBuf::try_from(entry.path()).expect("utf-8 path");
            if path.is_dir() {
                stored_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// How many files the catalog has rows for.
#[allow(dead_code, reason = "it's used in the other tests")]
pub async fn file_rows(catalog: &Catalog) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM files")
        .fetch_one(catalog.pool())
        .await
        .expect("count files")
}
