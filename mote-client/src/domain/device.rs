use std::fmt;

/// Device classification. Stored as a small integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceCategory {
    Water,
    Energy,
    Gas,
}

impl DeviceCategory {
    /// Fixed processing order for batch jobs.
    pub const ALL: [DeviceCategory; 3] = [Self::Water, Self::Energy, Self::Gas];

    pub fn code(self) -> i16 {
        match self {
            Self::Water => 1,
            Self::Energy => 2,
            Self::Gas => 3,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(Self::Water),
            2 => Some(Self::Energy),
            3 => Some(Self::Gas),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Energy => "energy",
            Self::Gas => "gas",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AuthStatus {
    Unauthorized,
    Authorized,
}

impl AuthStatus {
    pub fn code(self) -> i16 {
        match self {
            Self::Unauthorized => 0,
            Self::Authorized => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Authorized => "authorized",
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Unauthorized),
            1 => Some(Self::Authorized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i64,
    pub name: Option<String>,
    pub category: DeviceCategory,
    pub auth_status: AuthStatus,
}

/// Insert payload for a device; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: Option<String>,
    pub category: DeviceCategory,
    pub auth_status: AuthStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_are_stable() {
        for category in DeviceCategory::ALL {
            assert_eq!(DeviceCategory::from_code(category.code()), Some(category));
        }
        assert_eq!(DeviceCategory::Water.code(), 1);
        assert_eq!(DeviceCategory::Gas.code(), 3);
        assert_eq!(DeviceCategory::from_code(4), None);
    }

    #[test]
    fn auth_status_rejects_unknown_codes() {
        assert_eq!(AuthStatus::from_code(1), Some(AuthStatus::Authorized));
        assert_eq!(AuthStatus::from_code(7), None);
    }
}
