//! Macro for implementing Display and FromStr for unit enums
//!
//! Used by the error taxonomy and operation kinds so that their wire/log
//! labels and parsing stay in one table.
//!
//! # Example
//!
//! ```rust
//! use carelink_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ChannelState {
//!     Idle,
//!     Open,
//!     Closed,
//! }
//!
//! impl_domain_status_conversions!(ChannelState {
//!     Idle => "idle",
//!     Open => "open",
//!     Closed => "closed",
//! });
//!
//! assert_eq!(ChannelState::Open.to_string(), "open");
//! assert_eq!("CLOSED".parse::<ChannelState>().unwrap(), ChannelState::Closed);
//! ```

/// Implements Display and FromStr traits for unit enums
///
/// This macro generates:
/// - Display trait: converts enum variants to their lowercase labels
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their string
///   representations (must be lowercase)
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
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
    enum TestState {
        Idle,
        Open,
        Closed,
    }

    impl_domain_status_conversions!(TestState {
        Idle => "idle",
        Open => "open",
        Closed => "closed",
    });

    #[test]
    fn display_uses_lowercase_label() {
        assert_eq!(TestState::Idle.to_string(), "idle");
        assert_eq!(TestState::Open.to_string(), "open");
        assert_eq!(TestState::Closed.to_string(), "closed");
    }

    #[test]
    fn from_str_ignores_case() {
        assert_eq!(TestState::from_str("OPEN").unwrap(), TestState::Open);
        assert_eq!(TestState::from_str("Closed").unwrap(), TestState::Closed);
    }

    #[test]
    fn from_str_rejects_unknown_and_empty() {
        let result = TestState::from_str("half-open");
        assert!(result.unwrap_err().contains("Invalid TestState: half-open"));
        assert!(TestState::from_str("").is_err());
    }

    mod with_result_alias {
        #[allow(dead_code)]
        type Result<T> = std::result::Result<T, String>;

        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Mode {
            Push,
            Pull,
        }

        impl_domain_status_conversions!(Mode {
            Push => "push",
            Pull => "pull",
        });
    }

    #[test]
    fn expands_where_result_is_a_local_alias() {
        use with_result_alias::Mode;

        assert_eq!(Mode::from_str("PULL").unwrap(), Mode::Pull);
        assert_eq!(Mode::Push.to_string(), "push");
    }
}
