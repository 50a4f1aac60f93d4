//! Thumbnail generation with optional smart cropping.

use azure_cognitive_core::error::{ServiceError, ServiceResult};
use azure_cognitive_core::operation::{ErrorFormat, Operation};
use bytes::Bytes;
use reqwest::Method;

use crate::client::ComputerVisionClient;
use crate::models::ImageInput;

static GENERATE_THUMBNAIL: Operation = Operation {
    name: "generate_thumbnail",
    method: Method::POST,
    path: "/generateThumbnail",
    success: &[200],
    error_format: ErrorFormat::Json,
};

/// Largest accepted thumbnail edge, in pixels.
pub const MAX_THUMBNAIL_DIMENSION: u32 = 1024;

/// Parameters for [`generate_thumbnail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailOptions {
    width: u32,
    height: u32,
    smart_cropping: Option<bool>,
}

impl ThumbnailOptions {
    /// Creates a new builder.
    pub fn builder() -> ThumbnailOptionsBuilder {
        ThumbnailOptionsBuilder::default()
    }

    /// Thumbnail width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Thumbnail height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Builder for [`ThumbnailOptions`].
#[derive(Debug, Default)]
pub struct ThumbnailOptionsBuilder {
    width: Option<u32>,
    height: Option<u32>,
    smart_cropping: Option<bool>,
}

impl ThumbnailOptionsBuilder {
    /// Sets the width (required, 1..=1024).
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the height (required, 1..=1024).
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Enables or disables smart cropping (service default off).
    pub fn smart_cropping(mut self, enabled: bool) -> Self {
        self.smart_cropping = Some(enabled);
        self
    }

    /// Builds the options, validating both dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::InvalidArgument`] if a dimension is missing or
    /// outside `1..=1024`.
    pub fn build(self) -> ServiceResult<ThumbnailOptions> {
        Ok(ThumbnailOptions {
            width: check_dimension("width", self.width)?,
            height: check_dimension("height", self.height)?,
            smart_cropping: self.smart_cropping,
        })
    }
}

fn check_dimension(name: &str, value: Option<u32>) -> ServiceResult<u32> {
    let value = value.ok_or_else(|| ServiceError::InvalidArgument(format!("{name} is required")))?;
    if !(1..=MAX_THUMBNAIL_DIMENSION).contains(&value) {
        return Err(ServiceError::InvalidArgument(format!(
            "{name} {value} is outside valid range (1..={MAX_THUMBNAIL_DIMENSION})"
        )));
    }
    Ok(value)
}

async fn thumbnail(client: &ComputerVisionClient, image: ImageInput, options: &ThumbnailOptions) -> ServiceResult<Bytes> {
    tracing::debug!("requesting thumbnail");

    let request = image
        .into_request(&GENERATE_THUMBNAIL)?
        .query("width", options.width)
        .query("height", options.height)
        .query_opt("smartCropping", options.smart_cropping);

    let bytes = client.service().send(request).await?.bytes()?;

    tracing::debug!(size = bytes.len(), "thumbnail generated");
    Ok(bytes)
}

/// Generate a thumbnail of an image URL. Returns the encoded image bytes.
///
/// # Tracing
///
/// Emits a span named `vision::generate_thumbnail` with fields `width` and `height`.
#[tracing::instrument(
    name = "vision::generate_thumbnail",
    skip(client, url, options),
    fields(width = options.width, height = options.height)
)]
pub async fn generate_thumbnail(
    client: &ComputerVisionClient,
    url: &str,
    options: &ThumbnailOptions,
) -> ServiceResult<Bytes> {
    thumbnail(client, ImageInput::Url(url.to_string()), options).await
}

/// Generate a thumbnail of raw image bytes.
#[tracing::instrument(
    name = "vision::generate_thumbnail_in_stream",
    skip(client, image, options),
    fields(width = options.width, height = options.height)
)]
pub async fn generate_thumbnail_in_stream(
    client: &ComputerVisionClient,
    image: impl Into<Bytes>,
    options: &ThumbnailOptions,
) -> ServiceResult<Bytes> {
    thumbnail(client, ImageInput::Stream(image.into()), options).await
}
