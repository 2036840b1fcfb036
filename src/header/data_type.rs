use crate::SwTilesError;

/// What kind of raster data a level's payloads represent.
///
/// Purely descriptive: it does not alter how a reader decodes anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataType {
    /// Visual imagery (orthophotos, basemaps).
    Raster = 1,
    /// Elevation or other continuous terrain data.
    Terrain = 2,
    /// Anything else.
    Other = 3,
}

impl DataType {
    pub(crate) const fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for DataType {
    type Error = SwTilesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Raster),
            2 => Ok(Self::Terrain),
            3 => Ok(Self::Other),
            _ => Err(SwTilesError::BadEnum {
                field: "data_type",
                value,
            }),
        }
    }
}
