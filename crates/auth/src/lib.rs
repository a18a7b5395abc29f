//! `figura-auth`: authentication/authorization boundary.
//!
//! Token issuance lives elsewhere; this crate only validates tokens, models the
//! authenticated principal, and answers "may this principal do X in this tenant".

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{validate_claims, JwtClaims, TokenValidationError};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use principal::{PrincipalId, SchoolMembership};
pub use roles::{Role, SchoolRole};
