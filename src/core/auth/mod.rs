pub mod credentials;
pub mod session_store;

pub use credentials::{CredentialProvider, Identity, StaticCredentials};
pub use session_store::{Session, SessionStore};
