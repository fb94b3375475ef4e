pub mod gnews_client;

pub use gnews_client::{GNewsClient, GNewsSettings};
