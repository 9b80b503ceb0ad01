//! Read-only credential lookup for secondary management-protocol sessions.

use serde::Deserialize;
use std::collections::HashMap;

/// Username/password/port triple for a device-class API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    MikrotikApi,
}

impl CredentialKey {
    /// Key under which the inventory payload carries these credentials.
    pub fn inventory_name(&self) -> &'static str {
        match self {
            CredentialKey::MikrotikApi => "mikrotik_api",
        }
    }
}

/// Shared read-only store. `None` means the credential class is simply not
/// configured; callers skip the dependent enrichment stage.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, key: CredentialKey) -> Option<ApiCredentials>;
}

/// In-memory store built from a fetched inventory payload, rebuilt each
/// cycle alongside the device list.
#[derive(Debug, Default)]
pub struct InventoryCredentials {
    entries: HashMap<CredentialKey, ApiCredentials>,
}

impl InventoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: CredentialKey, credentials: ApiCredentials) {
        self.entries.insert(key, credentials);
    }
}

impl CredentialStore for InventoryCredentials {
    fn lookup(&self, key: CredentialKey) -> Option<ApiCredentials> {
        self.entries.get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_returns_none_when_unconfigured() {
        let store = InventoryCredentials::new();
        assert_eq!(store.lookup(CredentialKey::MikrotikApi), None);
    }

    #[test]
    fn lookup_returns_configured_credentials() {
        let mut store = InventoryCredentials::new();
        store.insert(
            CredentialKey::MikrotikApi,
            ApiCredentials {
                username: "poller".to_string(),
                password: "secret".to_string(),
                port: 8729,
            },
        );
        let creds = store.lookup(CredentialKey::MikrotikApi).unwrap();
        assert_eq!(creds.username, "poller");
        assert_eq!(creds.port, 8729);
    }
}
