//! # provider
//!
//! Resolution and installation of resource providers: typed descriptors, the
//! versioned [`ResourceIndex`], the [`ProviderRepository`] collaborator
//! boundary, the [`HostRuntime`] boundary, and the [`Environment`] that ties
//! them together into a resolve-or-install flow with runtime validation,
//! search-path management and policy-gated signature verification.
//!
//! ## Example
//!
//! ```
//! use provider::{Environment, MockRepository, MockRuntime};
//! use provider::types::ResourceDescriptor;
//! use unitkit::{ConfigurationUnit, Intent, NormalizedUnit};
//!
//! let runtime = MockRuntime::supported();
//! let repository = MockRepository::new();
//! repository.deliver_to(runtime.resource_store());
//! repository.add(ResourceDescriptor::new("MyDsc", "Registry", "1.0".parse().unwrap()));
//!
//! let environment = Environment::new(Box::new(runtime), Box::new(repository));
//! environment.validate().unwrap();
//!
//! let mut unit = ConfigurationUnit::new("Registry", Intent::Apply);
//! unit.directives.insert("module", "MyDsc");
//! let resolved = environment
//!     .ensure_resource(&NormalizedUnit::new(unit, None))
//!     .unwrap();
//! assert_eq!(resolved.descriptor.qualified_name(), "MyDsc/Registry@1.0");
//! ```

#![warn(missing_docs)]

pub mod environment;
pub mod error;
pub mod index;
pub mod repository;
pub mod runtime;
pub mod types;

pub use environment::{
    Environment, ResolvedResource, SEARCH_PATH_SEPARATOR, SEARCH_PATH_VARIABLE,
    VerificationPolicy,
};
pub use error::{Error, ErrorCategory, Result};
pub use index::ResourceIndex;
pub use repository::{MockRepository, ProviderRepository};
pub use runtime::{HostRuntime, MockRuntime};
pub use types::{
    Certificate, InstallLocation, PropertyInfo, PropertyType, ResourceDescriptor, ResourceQuery,
    RuntimeEdition, RuntimeInfo, Signature, SignatureStatus,
};
