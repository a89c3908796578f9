//! Domain types and DTOs
//!
//! One module per schema model: the row type, its Postgres enum types and the
//! typed field/where/unique/create/update inputs consumed by the client,
//! followed by the request and response DTOs the routes use.

/// Label, `Display` and bind conversion for a Postgres enum type.
macro_rules! pg_enum {
    ($name:ident, $pg_type:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $name {
            pub const PG_TYPE: &'static str = $pg_type;
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for crate::client::Value {
            fn from(v: $name) -> Self {
                crate::client::Value::Enum {
                    pg_type: $name::PG_TYPE,
                    label: v.as_str(),
                }
            }
        }
    };
}

pub mod auth;
pub mod bids;
pub mod compliance;
pub mod designs;
pub mod materials;
pub mod projects;
pub mod tasks;
pub mod users;

// Re-export commonly used types
pub use auth::*;
pub use bids::*;
pub use compliance::*;
pub use designs::*;
pub use materials::*;
pub use projects::*;
pub use tasks::*;
pub use users::*;
