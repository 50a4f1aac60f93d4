//! Shared access signature (SAS) tokens.
//!
//! A SAS token is a pre-signed query string issued by the account owner.
//! This crate accepts tokens as given and never signs them; the token is
//! appended to request URLs as-is.

use azure_cognitive_core::auth::ServiceCredential;
use azure_cognitive_core::error::{ServiceError, ServiceResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// A parsed SAS token.
///
/// The full query string is kept secret; only the descriptive fields are
/// exposed and shown in `Debug` output.
#[derive(Clone)]
pub struct SasToken {
    query: SecretString,
    version: String,
    permissions: SasPermissions,
    expiry: Option<String>,
    start: Option<String>,
    resource: Option<String>,
}

impl SasToken {
    /// Parse a SAS query string. A leading `?` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if the token is empty or
    /// lacks the `sv` (version) or `sig` (signature) parameter.
    pub fn parse(token: &str) -> ServiceResult<Self> {
        let query = token.trim().trim_start_matches('?');
        if query.is_empty() {
            return Err(ServiceError::InvalidArgument("SAS token is empty".into()));
        }

        let mut version = None;
        let mut signature = false;
        let mut permissions = SasPermissions::default();
        let mut expiry = None;
        let mut start = None;
        let mut resource = None;

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "sv" => version = Some(value.into_owned()),
                "sig" => signature = !value.is_empty(),
                "sp" => permissions = SasPermissions::parse(&value),
                "se" => expiry = Some(value.into_owned()),
                "st" => start = Some(value.into_owned()),
                "sr" | "srt" => resource = Some(value.into_owned()),
                _ => {}
            }
        }

        let version = version
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::InvalidArgument("SAS token is missing 'sv'".into()))?;
        if !signature {
            return Err(ServiceError::InvalidArgument("SAS token is missing 'sig'".into()));
        }

        Ok(Self {
            query: SecretString::from(query.to_string()),
            version,
            permissions,
            expiry,
            start,
            resource,
        })
    }

    /// The storage service version the token was signed for (`sv`).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The permissions granted by the token (`sp`).
    pub fn permissions(&self) -> SasPermissions {
        self.permissions
    }

    /// The expiry time (`se`), as issued.
    pub fn expiry(&self) -> Option<&str> {
        self.expiry.as_deref()
    }

    /// The start time (`st`), as issued.
    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    /// The signed resource (`sr`) or resource types (`srt`).
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// A credential that appends this token to every request.
    pub fn to_credential(&self) -> ServiceCredential {
        ServiceCredential::query_token(self.query.expose_secret())
    }

    pub(crate) fn query(&self) -> &str {
        self.query.expose_secret()
    }
}

impl fmt::Debug for SasToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasToken")
            .field("version", &self.version)
            .field("permissions", &self.permissions.to_string())
            .field("expiry", &self.expiry)
            .field("signature", &"****")
            .finish()
    }
}

/// Permissions carried in the `sp` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SasPermissions {
    pub read: bool,
    pub add: bool,
    pub create: bool,
    pub write: bool,
    pub delete: bool,
    pub list: bool,
}

impl SasPermissions {
    fn parse(raw: &str) -> Self {
        let mut permissions = Self::default();
        for flag in raw.chars() {
            match flag {
                'r' => permissions.read = true,
                'a' => permissions.add = true,
                'c' => permissions.create = true,
                'w' => permissions.write = true,
                'd' => permissions.delete = true,
                'l' => permissions.list = true,
                _ => {}
            }
        }
        permissions
    }
}

impl fmt::Display for SasPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.read, 'r'),
            (self.add, 'a'),
            (self.create, 'c'),
            (self.write, 'w'),
            (self.delete, 'd'),
            (self.list, 'l'),
        ];
        for (set, flag) in flags {
            if set {
                write!(f, "{flag}")?;
            }
        }
        Ok(())
    }
}
