//! DNS resolver abstraction for domain verification.
//!
//! Provides a trait-based DNS resolver that can be swapped for testing.
//! Production uses hickory-resolver, tests use a mock implementation.
//!
//! Every failure mode is a value: answers, a clean not-found, or an error
//! string. The resolver never raises to the verification engine - a record
//! that cannot be resolved simply does not verify this pass.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::proto::rr::RecordType as WireRecordType;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{
    config::ResolverConfig, name_server::TokioConnectionProvider, ResolveError, ResolveErrorKind,
    Resolver,
};

/// Query types the adapter can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryType::A => "A",
            QueryType::Aaaa => "AAAA",
            QueryType::Cname => "CNAME",
            QueryType::Mx => "MX",
            QueryType::Txt => "TXT",
        };
        f.write_str(s)
    }
}

/// Normalized outcome of one DNS query.
///
/// MX answers are exchange hosts with the trailing dot trimmed; TXT answers
/// are each record's character-strings concatenated with no separator;
/// CNAME answers are canonical targets with the trailing dot trimmed;
/// A/AAAA answers are address strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Vec<String>),
    NotFound,
    Error(String),
}

/// Trait for typed DNS lookups.
///
/// `name` is a fully-qualified label string (e.g. "example.com").
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, name: &str, query_type: QueryType) -> Resolution;
}

/// Production DNS resolver using hickory-resolver.
pub struct HickoryDnsResolver {
    resolver: Resolver<TokioConnectionProvider>,
    query_timeout: Duration,
}

impl HickoryDnsResolver {
    /// Create a new resolver with system configuration and a per-query
    /// timeout. A hung upstream must not stall a verification pass.
    pub fn new(query_timeout: Duration) -> Self {
        let resolver = Resolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build();
        Self {
            resolver,
            query_timeout,
        }
    }

    async fn lookup(&self, name: &str, query_type: QueryType) -> Resolution {
        match query_type {
            QueryType::Txt => match self.resolver.txt_lookup(name).await {
                Ok(lookup) => Resolution::Found(
                    lookup
                        .iter()
                        .map(|txt| {
                            txt.iter()
                                .map(|data| String::from_utf8_lossy(data).to_string())
                                .collect::<Vec<_>>()
                                .join("")
                        })
                        .collect(),
                ),
                Err(err) => classify(&err),
            },
            QueryType::Mx => match self.resolver.mx_lookup(name).await {
                Ok(lookup) => Resolution::Found(
                    lookup
                        .iter()
                        .map(|mx| mx.exchange().to_utf8().trim_end_matches('.').to_string())
                        .collect(),
                ),
                Err(err) => classify(&err),
            },
            QueryType::Cname => match self.resolver.lookup(name, WireRecordType::CNAME).await {
                Ok(lookup) => Resolution::Found(
                    lookup
                        .iter()
                        .filter_map(|rdata| rdata.as_cname())
                        .map(|cname| cname.0.to_utf8().trim_end_matches('.').to_string())
                        .collect(),
                ),
                Err(err) => classify(&err),
            },
            QueryType::A => match self.resolver.ipv4_lookup(name).await {
                Ok(lookup) => {
                    Resolution::Found(lookup.iter().map(|a| a.0.to_string()).collect())
                }
                Err(err) => classify(&err),
            },
            QueryType::Aaaa => match self.resolver.ipv6_lookup(name).await {
                Ok(lookup) => {
                    Resolution::Found(lookup.iter().map(|aaaa| aaaa.0.to_string()).collect())
                }
                Err(err) => classify(&err),
            },
        }
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn resolve(&self, name: &str, query_type: QueryType) -> Resolution {
        match tokio::time::timeout(self.query_timeout, self.lookup(name, query_type)).await {
            Ok(resolution) => resolution,
            Err(_) => {
                tracing::warn!("DNS query {} {} timed out", query_type, name);
                Resolution::Error(format!("DNS query for {name} timed out"))
            }
        }
    }
}

/// NXDOMAIN and empty answer sets are a clean not-found; everything else
/// (transport failures, servfail, upstream timeouts) carries its reason.
fn classify(err: &ResolveError) -> Resolution {
    if let ResolveErrorKind::Proto(proto) = err.kind() {
        if matches!(proto.kind(), ProtoErrorKind::NoRecordsFound { .. }) {
            return Resolution::NotFound;
        }
    }
    Resolution::Error(format!("DNS query failed: {err}"))
}

/// Mock DNS resolver for testing.
///
/// Preloaded with answers keyed by (name, query type); anything else
/// resolves as `NotFound`, mirroring NXDOMAIN.
#[derive(Default)]
pub struct MockDnsResolver {
    answers: Mutex<HashMap<(String, QueryType), Resolution>>,
}

impl MockDnsResolver {
    /// Create a new mock resolver with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload answers for a query.
    pub fn add(&self, name: &str, query_type: QueryType, values: &[&str]) {
        let mut answers = self.answers.lock().unwrap();
        answers.insert(
            (name.to_string(), query_type),
            Resolution::Found(values.iter().map(|v| v.to_string()).collect()),
        );
    }

    /// Make a query fail with the given reason.
    pub fn add_error(&self, name: &str, query_type: QueryType, reason: &str) {
        let mut answers = self.answers.lock().unwrap();
        answers.insert(
            (name.to_string(), query_type),
            Resolution::Error(reason.to_string()),
        );
    }

    /// Drop any preloaded answer, so the query resolves as `NotFound`.
    pub fn remove(&self, name: &str, query_type: QueryType) {
        let mut answers = self.answers.lock().unwrap();
        answers.remove(&(name.to_string(), query_type));
    }
}

#[async_trait]
impl DnsResolver for MockDnsResolver {
    async fn resolve(&self, name: &str, query_type: QueryType) -> Resolution {
        let answers = self.answers.lock().unwrap();
        answers
            .get(&(name.to_string(), query_type))
            .cloned()
            .unwrap_or(Resolution::NotFound)
    }
}
