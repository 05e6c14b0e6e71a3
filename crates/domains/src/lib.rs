//! Sending-domain registry and DNS verification engine.
//!
//! Tenants register sending domains, receive the DNS record set the domain
//! must publish (MX routing, SPF, a provider CNAME, and DMARC policy), and
//! prove both publication and ownership: the verification engine polls live
//! DNS and drives the domain state machine, and one-time tokens prove
//! control of the zone.
//!
//! The crate is a library with no transport layer. The surrounding
//! application brings its own HTTP surface, authentication, and scheduling;
//! it hands this core an already-authenticated owner id and a storage
//! backend ([`registry::DomainRegistry`] - PostgreSQL and in-memory
//! implementations ship here).
//!
//! ```ignore
//! let registry = Arc::new(PgDomainRegistry::new(pool));
//! let resolver = Arc::new(HickoryDnsResolver::new(config.query_timeout));
//! let service = DomainService::new(registry, resolver, provider, config);
//!
//! let added = service.add_domain("example.com", DomainType::Spoofing, owner).await?;
//! let report = service.verify(added.domain.id).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod records;
pub mod registry;
pub mod resolver;
pub mod service;

#[cfg(test)]
mod test_utils;

pub use config::{ProviderConfig, VerifierConfig};
pub use error::DomainError;
pub use service::DomainService;
