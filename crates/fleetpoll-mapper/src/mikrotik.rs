//! MikroTik enrichment: wireless association walk, LLDP-style neighbor
//! walks, and the RouterOS bridge host table.

use crate::base::BaseDeviceMapper;
use crate::routeros::RouterOsClient;
use crate::DeviceMapper;
use async_trait::async_trait;
use fleetpoll_common::{format_mac, format_mac_str, ApiCredentials, SnmpResult, StageReport};
use fleetpoll_snmp::SnmpWalker;
use std::collections::HashMap;
use std::time::Duration;

/// Wireless registration table; the leaf OID component is the ifIndex the
/// client is associated on.
pub const WIRELESS_REG_MAC: &str = "1.3.6.1.4.1.14988.1.1.1.2.1.1";
/// Neighbor table, remote MAC column.
pub const NEIGHBOR_MAC: &str = "1.3.6.1.4.1.14988.1.1.11.1.1.3";
/// Neighbor table, local interface index column. Shares the entry index
/// space with [`NEIGHBOR_MAC`].
pub const NEIGHBOR_IFINDEX: &str = "1.3.6.1.4.1.14988.1.1.11.1.1.8";

/// Enrichment pipeline for RouterOS devices.
///
/// The three stages are independent; each records its own [`StageReport`]
/// and a failure in one never suppresses the others. The API session for
/// the bridge-host stage is opened lazily and owned by this instance, so
/// it can be reused within one poll but never across cycles.
pub struct MikrotikMapper {
    ip: String,
    credentials: Option<ApiCredentials>,
    api_tls: bool,
    api_connect_timeout: Duration,
    session: Option<RouterOsClient>,
}

impl MikrotikMapper {
    pub fn new(
        ip: &str,
        credentials: Option<ApiCredentials>,
        api_tls: bool,
        api_connect_timeout: Duration,
    ) -> Self {
        Self {
            ip: ip.to_string(),
            credentials,
            api_tls,
            api_connect_timeout,
            session: None,
        }
    }

    /// Layer-1 stage: one MAC per wireless registration row, appended to
    /// the interface named by the row's trailing index. Malformed rows are
    /// skipped, a failed walk degrades to a stage report.
    async fn wireless_clients(
        &self,
        snmp: &mut dyn SnmpWalker,
        result: &mut SnmpResult,
    ) -> StageReport {
        let rows = match snmp.walk(WIRELESS_REG_MAC).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(ip = %self.ip, error = %e, "wireless registration walk failed");
                return StageReport::failed("wireless_clients", e.to_string());
            }
        };
        let mut applied = 0;
        for (oid, value) in rows {
            let Some(index) = trailing_index(&oid) else {
                continue;
            };
            let Ok(mac) = format_mac(&value) else {
                continue;
            };
            if let Some(iface) = result.interfaces.get_mut(&index) {
                iface.connected_layer1_macs.push(mac);
                applied += 1;
            }
        }
        StageReport::applied("wireless_clients", applied)
    }

    /// Layer-2 neighbor stage: two correlated walks over the same entry
    /// index space, joined on the trailing OID component.
    async fn neighbor_table(
        &self,
        snmp: &mut dyn SnmpWalker,
        result: &mut SnmpResult,
    ) -> StageReport {
        let macs = match snmp.walk(NEIGHBOR_MAC).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(ip = %self.ip, error = %e, "neighbor MAC walk failed");
                return StageReport::failed("neighbor_table", e.to_string());
            }
        };
        let indexes = match snmp.walk(NEIGHBOR_IFINDEX).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(ip = %self.ip, error = %e, "neighbor ifIndex walk failed");
                return StageReport::failed("neighbor_table", e.to_string());
            }
        };

        let mut ifindex_by_entry: HashMap<u32, u32> = HashMap::new();
        for (oid, value) in indexes {
            let Some(entry) = trailing_index(&oid) else {
                continue;
            };
            if let Some(ifindex) = value.as_u32() {
                ifindex_by_entry.insert(entry, ifindex);
            }
        }

        let mut applied = 0;
        for (oid, value) in macs {
            let Some(entry) = trailing_index(&oid) else {
                continue;
            };
            let Ok(mac) = format_mac(&value) else {
                continue;
            };
            let Some(ifindex) = ifindex_by_entry.get(&entry) else {
                continue;
            };
            if let Some(iface) = result.interfaces.get_mut(ifindex) {
                iface.connected_layer2_macs.push(mac);
                applied += 1;
            }
        }
        StageReport::applied("neighbor_table", applied)
    }

    /// Bridge-host stage over the RouterOS API. The API reports interface
    /// names, not SNMP indices, so rows are joined by name against the
    /// already-known interface set. Missing credentials or an unreachable
    /// API skip the stage; the walk-derived result stands as is.
    async fn bridge_hosts(&mut self, result: &mut SnmpResult) -> StageReport {
        let Some(credentials) = self.credentials.clone() else {
            return StageReport::skipped("bridge_hosts", "no api credentials configured");
        };

        let session = match self.session {
            Some(ref mut session) => session,
            None => {
                match RouterOsClient::connect(
                    &self.ip,
                    &credentials,
                    self.api_tls,
                    self.api_connect_timeout,
                )
                .await
                {
                    Ok(session) => self.session.insert(session),
                    Err(e) => {
                        tracing::warn!(ip = %self.ip, error = %e, "routeros api session unavailable");
                        return StageReport::skipped(
                            "bridge_hosts",
                            format!("api session unavailable: {e}"),
                        );
                    }
                }
            }
        };

        let rows = match session
            .command(
                "/interface/bridge/host/print",
                &[".proplist=.id,local,on-interface"],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(ip = %self.ip, error = %e, "bridge host fetch failed");
                return StageReport::failed("bridge_hosts", e.to_string());
            }
        };

        let index_by_name: HashMap<String, u32> = result
            .interfaces
            .values()
            .map(|iface| (iface.name.clone(), iface.index))
            .collect();

        let mut applied = 0;
        for row in rows {
            if row.get(".id").is_none() {
                continue;
            }
            let (Some(mac), Some(on_interface)) = (row.get("local"), row.get("on-interface"))
            else {
                continue;
            };
            let Ok(mac) = format_mac_str(mac) else {
                continue;
            };
            if let Some(index) = index_by_name.get(on_interface) {
                if let Some(iface) = result.interfaces.get_mut(index) {
                    iface.connected_layer2_macs.push(mac);
                    applied += 1;
                }
            }
        }
        StageReport::applied("bridge_hosts", applied)
    }
}

#[async_trait]
impl DeviceMapper for MikrotikMapper {
    async fn map(&mut self, snmp: &mut dyn SnmpWalker, mut result: SnmpResult) -> SnmpResult {
        BaseDeviceMapper::normalize(&mut result);

        let report = self.wireless_clients(snmp, &mut result).await;
        result.stages.push(report);
        let report = self.neighbor_table(snmp, &mut result).await;
        result.stages.push(report);
        let report = self.bridge_hosts(&mut result).await;
        result.stages.push(report);

        result
    }
}

/// Trailing component of a dotted OID, the per-row index in the tables
/// this mapper walks.
fn trailing_index(oid: &str) -> Option<u32> {
    oid.rsplit('.').next()?.parse().ok()
}
