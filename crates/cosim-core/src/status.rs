use serde::{Deserialize, Serialize};

/// Status code returned to the host for every protocol call.
///
/// The discriminants are the FMI 2.0 `fmi2Status` values and cross the C
/// boundary unchanged.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fmi2Status {
    Ok = 0,
    Warning = 1,
    Discard = 2,
    Error = 3,
    Fatal = 4,
    Pending = 5,
}

impl Fmi2Status {
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Fmi2Status::Ok),
            1 => Some(Fmi2Status::Warning),
            2 => Some(Fmi2Status::Discard),
            3 => Some(Fmi2Status::Error),
            4 => Some(Fmi2Status::Fatal),
            5 => Some(Fmi2Status::Pending),
            _ => None,
        }
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for Fmi2Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fmi2Status::Ok => write!(f, "ok"),
            Fmi2Status::Warning => write!(f, "warning"),
            Fmi2Status::Discard => write!(f, "discard"),
            Fmi2Status::Error => write!(f, "error"),
            Fmi2Status::Fatal => write!(f, "fatal"),
            Fmi2Status::Pending => write!(f, "pending"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_match_fmi2_header() {
        assert_eq!(Fmi2Status::Ok.as_raw(), 0);
        assert_eq!(Fmi2Status::Discard.as_raw(), 2);
        assert_eq!(Fmi2Status::Fatal.as_raw(), 4);
        assert_eq!(Fmi2Status::from_raw(3), Some(Fmi2Status::Error));
        assert_eq!(Fmi2Status::from_raw(9), None);
        assert_eq!(Fmi2Status::from_raw(-1), None);
    }

    #[test]
    fn severity_is_ordered() {
        assert!(Fmi2Status::Fatal > Fmi2Status::Error);
        assert!(Fmi2Status::Discard > Fmi2Status::Warning);
    }
}
