//! Directory authentication and authorization for Bawwab
//!
//! Opens per-request LDAP connections (plain, StartTLS, or implicit
//! TLS), resolves credentials to a directory identity in bind or
//! search mode, and checks allow-list authorization. All directory
//! traffic goes through the [`DirectoryOps`] trait so the decision
//! logic can be exercised without a live server.

pub mod authn;
pub mod authz;
pub mod connection;
pub mod filter;

#[cfg(test)]
pub(crate) mod test_support;

pub use authn::authenticate;
pub use authz::authorize;
pub use connection::{connect, directory_address, DirectoryConnection, DirectoryOps};

// Re-exported so DirectoryOps implementations and callers don't need
// their own ldap3 dependency.
pub use ldap3::{Scope, SearchEntry};
