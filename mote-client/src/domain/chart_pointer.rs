use super::DeviceCategory;

/// Where the presentation layer finds the latest chart of a category.
/// `file_path` is relative to the media root.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartPointer {
    pub category: DeviceCategory,
    pub file_path: String,
}
