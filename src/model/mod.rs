//! Items that define the domain data model and logic.
//!
//! These are types that are used in multiple situations (loading from DB,
//! exposing via API, ...) and thus don't neatly fit into `db` or `api`.

mod key;
mod language;
pub(crate) mod event_type;

pub(crate) use self::{
    key::Key,
    language::LanguageCode,
};
