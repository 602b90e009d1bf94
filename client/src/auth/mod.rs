pub mod credentials;
pub mod sas_token;

pub use credentials::SasCredentials;
pub use sas_token::{SasToken, SasTokenGenerator, TOKEN_LIFETIME_SECS};
