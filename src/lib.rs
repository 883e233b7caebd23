/*! # `folio`

A metadata catalog for PDF documents.

## Purpose

`folio` keeps track of your PDFs (sheet music, papers, manuals...) and lets
you organize them two ways at once:

- **Folders**, nested as deep as you like. A file can sit in several folders.
- **Tags**, grouped into free-form categories. Tags can have aliases, so
  "Shostakovich" and "Shosty" find the same tag.

Then you can list files by tag intersection (every tag must match) and/or by
folder membership. Each listed file comes back with its tags and the full
root-to-leaf path of every folder it's in.

## Usage

```no_run
use folio::{catalog::Catalog, config::Config, search::FileQuery};

# async fn run() -> Result<(), Box<dyn std::error::Error>> {
let catalog = Catalog::open(Config::new("/srv/folio")).await?;

let composer = catalog.create_tag("Shostakovich", "composer").await?;
let year = catalog.create_folder("2024", None).await?;
let spring = catalog.create_folder("Spring", Some(year.id)).await?;

let pdf = std::fs::read("symphony_5.pdf")?;
catalog
    .upload_file("symphony_5.pdf", &pdf, &[composer.tag.id], &[spring.id])
    .await?;

let page = catalog
    .list_files(&FileQuery::new().tags([composer.tag.id]))
    .await?;
assert_eq!(page.items[0].folders[0].full_path, ["2024", "Spring"]);
# Ok(())
# }
```

## Storage

Metadata lives in a SQLite database inside the data directory. Uploaded bytes
are stored on the local disk, bucketed by upload month.
*/

pub mod associations;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod search;
pub mod storage;
