//! Macro for implementing Display and FromStr for domain enums
//!
//! Eliminates boilerplate for enum <-> string conversions used when
//! persisting statuses and topics. Parsing is case-insensitive; output is
//! the canonical lowercase form.

/// Implements Display and FromStr traits for string-backed domain enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their canonical string
///   representations
#[macro_export]
macro_rules! impl_domain_string_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Pending,
        Completed,
    }

    impl_domain_string_conversions!(TestStatus {
        Pending => "pending",
        Completed => "completed",
    });

    #[test]
    fn display_uses_canonical_form() {
        assert_eq!(TestStatus::Pending.to_string(), "pending");
        assert_eq!(TestStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(TestStatus::from_str("PENDING").unwrap(), TestStatus::Pending);
        assert_eq!(TestStatus::from_str("Completed").unwrap(), TestStatus::Completed);
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let result = TestStatus::from_str("bogus");
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid TestStatus: bogus"));
    }

    #[test]
    fn roundtrip() {
        for status in [TestStatus::Pending, TestStatus::Completed] {
            let parsed = TestStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(status, parsed);
        }
    }
}
