use crate::DeviceMapper;
use async_trait::async_trait;
use fleetpoll_common::SnmpResult;
use fleetpoll_snmp::SnmpWalker;

/// Generic enrichment every vendor mapper starts from: make sure the
/// interface table covers every index the if-table rows mention, and
/// nothing else. Reapplying it to an already-normalized result changes
/// nothing.
pub struct BaseDeviceMapper;

impl BaseDeviceMapper {
    pub fn normalize(result: &mut SnmpResult) {
        result.refresh_interfaces();
    }
}

#[async_trait]
impl DeviceMapper for BaseDeviceMapper {
    async fn map(&mut self, _snmp: &mut dyn SnmpWalker, mut result: SnmpResult) -> SnmpResult {
        Self::normalize(&mut result);
        result
    }
}
