//! Leases: exclusive write and delete locks on blobs and containers.
//!
//! A lease is identified by a lease id (a GUID). The holder passes the id
//! to writes while the lease is active. Every action is a `PUT` with
//! `comp=lease` and an `x-ms-lease-action` header.
//!
//! ```rust,no_run
//! use azure_storage_blob::client::BlobServiceClient;
//! use azure_storage_blob::lease::{self, LeaseDuration, LeaseTarget};
//!
//! # async fn example(client: &BlobServiceClient) -> azure_cognitive_core::ServiceResult<()> {
//! let target = LeaseTarget::blob("locks", "job.lock");
//! let acquired = lease::acquire(client, &target, LeaseDuration::fixed(30)?, None).await?;
//! let lease_id = acquired.lease_id.unwrap_or_default();
//!
//! lease::renew(client, &target, &lease_id).await?;
//! lease::release(client, &target, &lease_id).await?;
//! # Ok(())
//! # }
//! ```

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use azure_cognitive_core::request::OperationRequest;
use azure_cognitive_core::response::{FromHeaders, HeaderReader};
use reqwest::Method;

use crate::blob::blob_request;
use crate::client::BlobServiceClient;
use crate::models::{validate_container_name, LEASE_ID_HEADER};

const LEASE_ACTION_HEADER: &str = "x-ms-lease-action";
const PROPOSED_LEASE_ID_HEADER: &str = "x-ms-proposed-lease-id";

/// Longest break period, in seconds.
pub const MAX_BREAK_PERIOD: u32 = 60;

macro_rules! lease_operation {
    ($name:ident, $op:literal, $path:literal, $status:literal) => {
        static $name: Operation = Operation {
            name: $op,
            method: Method::PUT,
            path: $path,
            success: &[$status],
            error_format: ErrorFormat::Xml,
        };
    };
}

lease_operation!(ACQUIRE_BLOB_LEASE, "acquire_blob_lease", "/{container}/{blob*}", 201);
lease_operation!(RENEW_BLOB_LEASE, "renew_blob_lease", "/{container}/{blob*}", 200);
lease_operation!(CHANGE_BLOB_LEASE, "change_blob_lease", "/{container}/{blob*}", 200);
lease_operation!(RELEASE_BLOB_LEASE, "release_blob_lease", "/{container}/{blob*}", 200);
lease_operation!(BREAK_BLOB_LEASE, "break_blob_lease", "/{container}/{blob*}", 202);
lease_operation!(ACQUIRE_CONTAINER_LEASE, "acquire_container_lease", "/{container}", 201);
lease_operation!(RENEW_CONTAINER_LEASE, "renew_container_lease", "/{container}", 200);
lease_operation!(CHANGE_CONTAINER_LEASE, "change_container_lease", "/{container}", 200);
lease_operation!(RELEASE_CONTAINER_LEASE, "release_container_lease", "/{container}", 200);
lease_operation!(BREAK_CONTAINER_LEASE, "break_container_lease", "/{container}", 202);

/// The resource a lease applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseTarget<'a> {
    Container(&'a str),
    Blob { container: &'a str, blob: &'a str },
}

impl<'a> LeaseTarget<'a> {
    /// A lease on a container.
    pub fn container(container: &'a str) -> Self {
        Self::Container(container)
    }

    /// A lease on a blob.
    pub fn blob(container: &'a str, blob: &'a str) -> Self {
        Self::Blob { container, blob }
    }
}

#[derive(Debug, Clone, Copy)]
enum LeaseAction {
    Acquire,
    Renew,
    Change,
    Release,
    Break,
}

impl LeaseAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::Renew => "renew",
            Self::Change => "change",
            Self::Release => "release",
            Self::Break => "break",
        }
    }

    fn operation(self, target: &LeaseTarget<'_>) -> &'static Operation {
        match (self, target) {
            (Self::Acquire, LeaseTarget::Blob { .. }) => &ACQUIRE_BLOB_LEASE,
            (Self::Renew, LeaseTarget::Blob { .. }) => &RENEW_BLOB_LEASE,
            (Self::Change, LeaseTarget::Blob { .. }) => &CHANGE_BLOB_LEASE,
            (Self::Release, LeaseTarget::Blob { .. }) => &RELEASE_BLOB_LEASE,
            (Self::Break, LeaseTarget::Blob { .. }) => &BREAK_BLOB_LEASE,
            (Self::Acquire, LeaseTarget::Container(_)) => &ACQUIRE_CONTAINER_LEASE,
            (Self::Renew, LeaseTarget::Container(_)) => &RENEW_CONTAINER_LEASE,
            (Self::Change, LeaseTarget::Container(_)) => &CHANGE_CONTAINER_LEASE,
            (Self::Release, LeaseTarget::Container(_)) => &RELEASE_CONTAINER_LEASE,
            (Self::Break, LeaseTarget::Container(_)) => &BREAK_CONTAINER_LEASE,
        }
    }
}

/// How long an acquired lease lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseDuration {
    /// 15 to 60 seconds.
    Fixed(u32),
    /// Until released or broken.
    Infinite,
}

impl LeaseDuration {
    /// A fixed duration in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] outside `15..=60`.
    pub fn fixed(seconds: u32) -> ServiceResult<Self> {
        if !(15..=60).contains(&seconds) {
            return Err(ServiceError::InvalidArgument(format!(
                "lease duration {seconds} is outside valid range (15..=60)"
            )));
        }
        Ok(Self::Fixed(seconds))
    }

    /// The value of the `x-ms-lease-duration` header.
    pub fn header_value(&self) -> String {
        match self {
            Self::Fixed(seconds) => seconds.to_string(),
            Self::Infinite => "-1".to_string(),
        }
    }
}

/// Headers returned by lease actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaseHeaders {
    /// The active lease id; absent after release and break.
    pub lease_id: Option<String>,
    /// Seconds until a broken lease ends.
    pub lease_time: Option<u32>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl FromHeaders for LeaseHeaders {
    fn from_headers(headers: &HeaderReader<'_>) -> ServiceResult<Self> {
        Ok(Self {
            lease_id: headers.optional(LEASE_ID_HEADER),
            lease_time: headers.parse("x-ms-lease-time")?,
            etag: headers.optional("ETag"),
            last_modified: headers.optional("Last-Modified"),
        })
    }
}

/// A fresh lease id to propose on acquire or change.
pub fn new_lease_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn require_id(name: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::InvalidArgument(format!("{name} is required")));
    }
    Ok(())
}

fn lease_request(action: LeaseAction, target: &LeaseTarget<'_>) -> ServiceResult<OperationRequest> {
    let operation = action.operation(target);
    let request = match target {
        LeaseTarget::Blob { container, blob } => blob_request(operation, container, blob)?,
        LeaseTarget::Container(container) => {
            validate_container_name(container)?;
            OperationRequest::new(operation)
                .path_param("container", *container)
                .query("restype", "container")
        }
    };
    Ok(request
        .query("comp", "lease")
        .header(LEASE_ACTION_HEADER, action.as_str()))
}

async fn execute(client: &BlobServiceClient, request: OperationRequest) -> ServiceResult<LeaseHeaders> {
    let response = client.service().send(request).await?.headers_only::<LeaseHeaders>()?;
    tracing::debug!(lease_id = ?response.headers.lease_id, "lease action complete");
    Ok(response.headers)
}

/// Acquire a lease.
///
/// # Tracing
///
/// Emits a span named `blob::acquire_lease`.
#[tracing::instrument(name = "blob::acquire_lease", skip(client))]
pub async fn acquire(
    client: &BlobServiceClient,
    target: &LeaseTarget<'_>,
    duration: LeaseDuration,
    proposed_lease_id: Option<&str>,
) -> ServiceResult<LeaseHeaders> {
    let request = lease_request(LeaseAction::Acquire, target)?
        .header("x-ms-lease-duration", duration.header_value())
        .header_opt(PROPOSED_LEASE_ID_HEADER, proposed_lease_id);
    execute(client, request).await
}

/// Reset the clock on an active lease.
#[tracing::instrument(name = "blob::renew_lease", skip(client, lease_id))]
pub async fn renew(client: &BlobServiceClient, target: &LeaseTarget<'_>, lease_id: &str) -> ServiceResult<LeaseHeaders> {
    require_id("lease id", lease_id)?;
    let request = lease_request(LeaseAction::Renew, target)?.header(LEASE_ID_HEADER, lease_id);
    execute(client, request).await
}

/// Replace the id of an active lease.
#[tracing::instrument(name = "blob::change_lease", skip(client, lease_id))]
pub async fn change(
    client: &BlobServiceClient,
    target: &LeaseTarget<'_>,
    lease_id: &str,
    proposed_lease_id: &str,
) -> ServiceResult<LeaseHeaders> {
    require_id("lease id", lease_id)?;
    require_id("proposed lease id", proposed_lease_id)?;
    let request = lease_request(LeaseAction::Change, target)?
        .header(LEASE_ID_HEADER, lease_id)
        .header(PROPOSED_LEASE_ID_HEADER, proposed_lease_id);
    execute(client, request).await
}

/// Release a lease so another client may acquire it immediately.
#[tracing::instrument(name = "blob::release_lease", skip(client, lease_id))]
pub async fn release(
    client: &BlobServiceClient,
    target: &LeaseTarget<'_>,
    lease_id: &str,
) -> ServiceResult<LeaseHeaders> {
    require_id("lease id", lease_id)?;
    let request = lease_request(LeaseAction::Release, target)?.header(LEASE_ID_HEADER, lease_id);
    execute(client, request).await
}

/// Break a lease without knowing its id.
///
/// The lease ends after `break_period` seconds (`0..=60`), or when its
/// current duration expires if `None`.
///
/// # Tracing
///
/// Emits a span named `blob::break_lease`.
#[tracing::instrument(name = "blob::break_lease", skip(client))]
pub async fn break_lease(
    client: &BlobServiceClient,
    target: &LeaseTarget<'_>,
    break_period: Option<u32>,
) -> ServiceResult<LeaseHeaders> {
    if let Some(period) = break_period.filter(|p| *p > MAX_BREAK_PERIOD) {
        return Err(ServiceError::InvalidArgument(format!(
            "break period {period} is outside valid range (0..={MAX_BREAK_PERIOD})"
        )));
    }
    let request = lease_request(LeaseAction::Break, target)?
        .header_opt("x-ms-lease-break-period", break_period.map(|p| p.to_string()));
    execute(client, request).await
}
