pub mod drive_client;
pub mod service_account;

pub use drive_client::DriveClient;
pub use service_account::{ServiceAccountAuth, DRIVE_SCOPE};
