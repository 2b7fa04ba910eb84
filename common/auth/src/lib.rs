pub mod claims;
pub mod codec;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod revocation;
pub mod roles;

pub use claims::Claims;
pub use codec::{IssuedToken, TokenCodec, TokenConfig, TokenSubject, DEFAULT_TTL_SECONDS};
pub use error::{AuthError, AuthResult};
pub use extractors::{bearer_token, AuthContext};
pub use guards::{authorize, ensure, AccessRequest, Decision, DenyReason, GuardError};
pub use revocation::{InMemoryRevocationRegistry, RevocationRegistry};
pub use roles::{Role, RoleAssignment, ROLE_ADMIN, ROLE_DINER, ROLE_FRANCHISEE, ROLE_HIERARCHY};
