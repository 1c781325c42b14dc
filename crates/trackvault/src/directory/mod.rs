//! Authorization directory adapters.
//!
//! The directory mirrors two privileged account attributes: the role, as
//! membership in one of the role groups, and the enabled flag.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): [`InMemoryDirectory`], with failure injection for tests
//! - `cognito`: [`CognitoDirectory`] over a Cognito user pool

#[cfg(feature = "cognito")]
mod cognito;
#[cfg(any(test, feature = "inmemory"))]
mod inmemory;

#[cfg(feature = "cognito")]
pub use cognito::CognitoDirectory;
#[cfg(any(test, feature = "inmemory"))]
pub use inmemory::{DirectoryCall, DirectoryOperation, InMemoryDirectory};
