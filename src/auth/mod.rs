pub mod extractors;
pub mod jwt;
pub mod password;

pub use extractors::{require_self, AuthUser};
pub use jwt::JwtKeys;
