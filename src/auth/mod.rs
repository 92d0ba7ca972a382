pub mod authorizer;
pub mod store;
pub mod token;

pub use authorizer::{Authorizer, ConsentHandler, LocalServerAuthorizer};
pub use store::{CredentialProvider, CredentialStore};
pub use token::StoredToken;
