//! Shared domain types for the fleetpoll poller.
//!
//! This crate carries the data model exchanged between the SNMP boundary,
//! the enrichment mappers and the agent: devices and their monitoring
//! templates, per-interface poll results, the retryable/non-retryable
//! error classification, and the OID suffix trie used for device-type
//! resolution. It contains no I/O.

pub mod creds;
pub mod mac;
pub mod trie;
pub mod types;

pub use creds::{ApiCredentials, CredentialKey, CredentialStore, InventoryCredentials};
pub use mac::{format_mac, format_mac_str, MacFormatError};
pub use trie::{OidTrie, TrieMatch};
pub use types::{
    Device, Interface, MonitoringTemplate, PollOutcome, Snmp3Params, SnmpError, SnmpResult,
    SnmpVersion, StageReport, StageStatus, WireValue, IF_DESCR_PREFIX, SYS_OBJECT_ID,
};
