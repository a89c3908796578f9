pub mod claims;
pub mod context;
pub mod credentials;
pub mod middleware;
pub mod tokens;

pub use claims::Claims;
pub use context::AuthContext;
pub use middleware::{RequireAdmin, RequireAuth};
pub use tokens::JwtKeys;
