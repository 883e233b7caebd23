//! Table and column names for building queries with `sea_query`.
//!
//! Keep these in sync with the migrations!

use sea_query::Iden;

/// the uploaded files
#[derive(Iden)]
pub enum Files {
    Table,
    Id,
    Name,
    UploadPath,
    Size,
    UploadedAt,
}

/// the folder tree
#[derive(Iden)]
pub enum Folders {
    Table,
    Id,
    Name,
    ParentId,
    CreatedAt,
}

#[derive(Iden)]
pub enum FileFolders {
    Table,
    FileId,
    FolderId,
}

#[derive(Iden)]
pub enum Tags {
    Table,
    Id,
    Name,
    Category,
}

#[derive(Iden)]
pub enum TagAliases {
    Table,
    Id,
    TagId,
    Alias,
}

#[derive(Iden)]
pub enum FileTags {
    Table,
    FileId,
    TagId,
}
