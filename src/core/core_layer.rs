// The core module contains all business logic.
// Each feature gets its own submodule; external systems are reached
// through the traits declared here and implemented in infra.

#[path = "news/mod.rs"]
pub mod news;

#[path = "deck/mod.rs"]
pub mod deck;

#[path = "sharing/mod.rs"]
pub mod sharing;

#[path = "pipeline/mod.rs"]
pub mod pipeline;

#[path = "auth/mod.rs"]
pub mod auth;
