use crate::SwTilesError;

/// The image codec every payload in the archive is encoded with.
///
/// Determines the media type advertised for payloads; the payload bytes
/// themselves are opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ImageFormat {
    /// WebP.
    WebP = 1,
    /// PNG.
    Png = 2,
    /// JPEG.
    Jpeg = 3,
    /// AVIF.
    Avif = 4,
}

impl ImageFormat {
    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }

    /// The `Content-Type` HTTP header value for payloads of this format.
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Avif => "image/avif",
        }
    }
}

impl TryFrom<u8> for ImageFormat {
    type Error = SwTilesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::WebP),
            2 => Ok(Self::Png),
            3 => Ok(Self::Jpeg),
            4 => Ok(Self::Avif),
            _ => Err(SwTilesError::BadEnum {
                field: "image_format",
                value,
            }),
        }
    }
}
