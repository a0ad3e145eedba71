pub mod credentials;
pub mod directory;
pub mod jwt;

pub use credentials::{CredentialPolicy, CredentialService};
pub use directory::{AuthActor, DirectoryError, IdentityDirectory, JwtDirectory};
pub use jwt::JwtConfig;
