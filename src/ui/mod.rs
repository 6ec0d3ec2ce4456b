//! Discord presentation: localized text and embeds.

pub mod embeds;
pub mod messages;
