//! Credential blob (§4.B) and endpoint/token resolver (§4.C).

pub mod blob;
pub mod resolver;

pub use blob::{AuthBlob, ZeroconfAuthenticator};
pub use resolver::{CredentialsResolver, EndpointKind};
