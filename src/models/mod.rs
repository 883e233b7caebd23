//! Types that are really the bedrock of the catalog.

pub mod file;
pub mod folder;
pub mod tags;
