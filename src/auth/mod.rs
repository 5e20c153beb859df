//! Authentication and authorization module

pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use cookie::{CookiePolicy, ACCESS_COOKIE, REFRESH_COOKIE};
pub use jwt::{Claims, JwtKeys, JwtService, TokenError, TokenPair, TokenSubject, TokenType};
pub use middleware::{authorize, extract_token, jwt_auth_middleware, require_roles, AuthContext};
pub use password::PasswordHasher;
