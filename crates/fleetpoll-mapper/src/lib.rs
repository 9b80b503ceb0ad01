//! Vendor enrichment pipelines for poll results.
//!
//! A [`DeviceMapper`] takes the raw per-device [`SnmpResult`] and enriches
//! its interface table from additional sources: vendor OID subtrees and,
//! for MikroTik hardware, the RouterOS API. Enrichment is strictly
//! best-effort: a failed stage is recorded in the result's stage journal
//! and never fails the poll.

pub mod base;
pub mod mikrotik;
pub mod registry;
pub mod routeros;

#[cfg(test)]
mod tests;

pub use base::BaseDeviceMapper;
pub use mikrotik::MikrotikMapper;
pub use registry::{MapperRegistry, Vendor};
pub use routeros::{RouterOsClient, RouterOsError, Sentence};

use async_trait::async_trait;
use fleetpoll_common::SnmpResult;
use fleetpoll_snmp::SnmpWalker;

/// An enrichment pipeline bound to one device for one poll.
///
/// Implementations mutate the interface table and append stage reports;
/// they never error, and any secondary session they open lives no longer
/// than the mapper instance itself.
#[async_trait]
pub trait DeviceMapper: Send {
    async fn map(&mut self, snmp: &mut dyn SnmpWalker, result: SnmpResult) -> SnmpResult;
}
