use crate::auth::credentials::SasCredentials;
use crate::broker::errors::{ProviderError, ProviderResult};
use crate::broker::types::BrokerAddress;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Validity window of a generated token, in seconds.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// A shared access signature bound to one broker address.
///
/// The value is the bare `sr=...&sig=...&se=...&skn=...` assembly; the
/// transport prepends its authorization scheme when placing the token in
/// a header. The value is fixed at generation time and never refreshed;
/// callers that outlive the window build a new token.
#[derive(Clone)]
pub struct SasToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl SasToken {
    /// The token in wire form.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// The instant the signed expiry names.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// True once the signed expiry lies in the past. The broker rejects
    /// expired tokens with a 401, so this is a local early warning, not a
    /// guarantee of acceptance.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Derives SAS tokens from a credential pair.
///
/// The signature is HMAC-SHA256 over the URL-encoded target address and the
/// expiry timestamp, keyed with the raw UTF-8 bytes of the access key. The
/// key is used exactly as configured; it is not base64 decoded first.
///
/// # Examples
///
/// ```no_run
/// use client::auth::{SasCredentials, SasTokenGenerator};
/// use client::broker::BrokerAddress;
///
/// let credentials = SasCredentials::new("RootManageSharedAccessKey", "the-key")?;
/// let address = BrokerAddress::from_namespace("my-namespace")?;
/// let token = SasTokenGenerator::new(credentials).generate(&address)?;
/// assert!(!token.is_expired());
/// ```
pub struct SasTokenGenerator {
    credentials: SasCredentials,
}

impl SasTokenGenerator {
    /// Creates a generator signing with `credentials`.
    pub fn new(credentials: SasCredentials) -> Self {
        Self { credentials }
    }

    /// Generates a token for `address`, valid for [`TOKEN_LIFETIME_SECS`]
    /// from now.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Authentication`] if HMAC key setup fails.
    pub fn generate(&self, address: &BrokerAddress) -> ProviderResult<SasToken> {
        self.generate_with_expiry(address, Utc::now().timestamp() + TOKEN_LIFETIME_SECS)
    }

    fn generate_with_expiry(
        &self,
        address: &BrokerAddress,
        expiry: i64,
    ) -> ProviderResult<SasToken> {
        let encoded_address = urlencoding::encode(address.as_str());
        let string_to_sign = format!("{encoded_address}\n{expiry}");

        let mut mac = HmacSha256::new_from_slice(self.credentials.key().as_bytes())
            .map_err(|e| {
                ProviderError::Authentication(format!("Failed to create HMAC: {e}"))
            })?;
        mac.update(string_to_sign.as_bytes());
        let signature = general_purpose::STANDARD.encode(mac.finalize().into_bytes());

        let value = format!(
            "sr={}&sig={}&se={}&skn={}",
            encoded_address,
            urlencoding::encode(&signature),
            expiry,
            self.credentials.key_name()
        );

        let expires_at = Utc.timestamp_opt(expiry, 0).single().ok_or_else(|| {
            ProviderError::Authentication(format!("token expiry {expiry} is out of range"))
        })?;

        Ok(SasToken { value, expires_at })
    }
}
