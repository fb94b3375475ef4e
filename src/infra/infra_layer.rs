// The infra module contains implementations of core traits.
// Each external system gets its own submodule.

#[path = "ai/mod.rs"]
pub mod ai;

#[path = "news/mod.rs"]
pub mod news;

#[path = "images/mod.rs"]
pub mod images;

#[path = "deck/mod.rs"]
pub mod deck;

#[path = "google_drive/mod.rs"]
pub mod google_drive;
