use sea_query::SimpleExpr;
use uuid::Uuid;

use crate::models::tags::TagId;

/// A single restriction on which files a listing returns.
///
/// A listing `AND`s all of its modifiers together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileModifier {
    /// The file carries every one of these tags. No repeats, please.
    HasAllTags(Vec<TagId>),

    /// The file sits in this folder.
    InFolder(Uuid),

    /// The file sits in at least one of these folders.
    InAnyFolder(Vec<Uuid>),
}

/// A modifier must become a query to be used.
///
/// All modifiers must implement this trait!
pub trait ToQuery {
    /// Converts the modifier into a clause on the `files` table.
    fn to_query(self) -> SimpleExpr;
}
