pub mod extractors;
pub mod password;
pub mod token;

pub use extractors::{protected_method_not_allowed, AuthUser};
