//! This module and its children define the object types of the API and how
//! they are loaded.

pub(crate) mod app;
pub(crate) mod translatable;
pub(crate) mod webhook;
