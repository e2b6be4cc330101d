//! Macro for implementing Display and FromStr for marker enums
//!
//! Marker enums are persisted as plain strings (storage values, query
//! parameters, HTTP method names). This macro keeps the string form of each
//! variant in one place and gives case-insensitive parsing for values read
//! back from storage.
//!
//! # Example
//!
//! ```rust
//! use ecm_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum LoginPhase {
//!     Idle,
//!     Redirecting,
//! }
//!
//! impl_domain_status_conversions!(LoginPhase {
//!     Idle => "idle",
//!     Redirecting => "redirecting",
//! });
//!
//! assert_eq!("REDIRECTING".parse::<LoginPhase>().unwrap(), LoginPhase::Redirecting);
//! ```

/// Implements Display and FromStr for enums with a fixed string form
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of variants to their lowercase string form
///
/// Parsing lowercases the input first, so the mapped strings must be
/// lowercase.
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
