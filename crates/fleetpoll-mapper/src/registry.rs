//! Closed registry of vendor enrichment pipelines.
//!
//! Adding a vendor means adding a [`Vendor`] variant, its OID suffixes and
//! a `build` arm; device-type resolution stays a total, compiler-checked
//! mapping instead of runtime class lookup.

use crate::mikrotik::MikrotikMapper;
use crate::DeviceMapper;
use fleetpoll_common::{CredentialKey, CredentialStore, Device, OidTrie};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vendor {
    Mikrotik,
}

impl Vendor {
    pub const ALL: &'static [Vendor] = &[Vendor::Mikrotik];

    /// sysObjectID suffix patterns this vendor claims.
    pub fn oid_suffixes(&self) -> &'static [&'static str] {
        match self {
            Vendor::Mikrotik => &["14988.1"],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Mikrotik => "mikrotik",
        }
    }
}

/// Built once at startup and shared read-only across all poll tasks.
pub struct MapperRegistry {
    trie: OidTrie<Vendor>,
    api_tls: bool,
    api_connect_timeout: Duration,
}

impl MapperRegistry {
    pub fn new(api_tls: bool, api_connect_timeout: Duration) -> Self {
        let mut trie = OidTrie::new();
        for vendor in Vendor::ALL {
            for suffix in vendor.oid_suffixes() {
                trie.register(suffix, *vendor);
            }
        }
        Self {
            trie,
            api_tls,
            api_connect_timeout,
        }
    }

    /// The unique vendor for a reported sysObjectID, or `None` when the
    /// value matches no suffix or more than one (ambiguity disables vendor
    /// enrichment rather than guessing).
    pub fn resolve(&self, sys_object_id: &str) -> Option<Vendor> {
        self.trie.resolve(sys_object_id)
    }

    /// Fresh mapper instance for one device's poll. Credentials come from
    /// the cycle's store so a vendor stage can be skipped cleanly when its
    /// API credentials are not configured.
    pub fn build(
        &self,
        vendor: Vendor,
        device: &Device,
        credentials: &Arc<dyn CredentialStore>,
    ) -> Box<dyn DeviceMapper> {
        match vendor {
            Vendor::Mikrotik => Box::new(MikrotikMapper::new(
                &device.ip,
                credentials.lookup(CredentialKey::MikrotikApi),
                self.api_tls,
                self.api_connect_timeout,
            )),
        }
    }
}
