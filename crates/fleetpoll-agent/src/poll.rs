//! One device, one poll attempt.

use fleetpoll_common::{CredentialStore, Device, PollOutcome, SnmpResult};
use fleetpoll_mapper::MapperRegistry;
use fleetpoll_snmp::SnmpClient;
use std::sync::Arc;
use std::time::Duration;

/// Connects, fetches the template OID set, then runs the vendor enrichment
/// pipeline selected by the reported sysObjectID. The SNMP session lives
/// only for the duration of this call.
pub async fn poll_device(
    device: Device,
    registry: Arc<MapperRegistry>,
    credentials: Arc<dyn CredentialStore>,
    snmp_timeout: Duration,
) -> PollOutcome {
    let mut client = match SnmpClient::connect(&device, snmp_timeout).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(ip = %device.ip, error = %e, "snmp connect failed");
            return PollOutcome::Error(e.into_snmp_error(&device.ip));
        }
    };

    let values = match client.fetch(device.template.oids()).await {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(ip = %device.ip, error = %e, "snmp fetch failed");
            return PollOutcome::Error(e.into_snmp_error(&device.ip));
        }
    };

    let result = SnmpResult::from_values(&device.ip, values);

    let result = match result.sys_object_id().and_then(|oid| registry.resolve(oid)) {
        Some(vendor) => {
            tracing::debug!(ip = %device.ip, vendor = vendor.name(), "running vendor enrichment");
            let mut mapper = registry.build(vendor, &device, &credentials);
            mapper.map(&mut client, result).await
        }
        None => result,
    };

    PollOutcome::Result(result)
}
