use crate::base::BaseDeviceMapper;
use crate::mikrotik::{MikrotikMapper, NEIGHBOR_IFINDEX, NEIGHBOR_MAC, WIRELESS_REG_MAC};
use crate::registry::{MapperRegistry, Vendor};
use crate::DeviceMapper;
use async_trait::async_trait;
use fleetpoll_common::{
    CredentialStore, InventoryCredentials, SnmpResult, StageStatus, WireValue,
};
use fleetpoll_snmp::{SnmpClientError, SnmpWalker};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Walker returning canned rows per subtree; unknown subtrees fail the way
/// a device without that table would.
#[derive(Default)]
struct ScriptedWalker {
    subtrees: HashMap<String, Vec<(String, WireValue)>>,
}

impl ScriptedWalker {
    fn with(mut self, root: &str, rows: Vec<(String, WireValue)>) -> Self {
        self.subtrees.insert(root.to_string(), rows);
        self
    }
}

#[async_trait]
impl SnmpWalker for ScriptedWalker {
    async fn walk(&mut self, root: &str) -> Result<Vec<(String, WireValue)>, SnmpClientError> {
        match self.subtrees.get(root) {
            Some(rows) => Ok(rows.clone()),
            None => Err(SnmpClientError::Protocol {
                target: "test".to_string(),
                detail: format!("no such subtree {root}"),
            }),
        }
    }
}

fn mac(bytes: [u8; 6]) -> WireValue {
    WireValue::OctetString(bytes.to_vec())
}

fn result_with_interfaces(entries: &[(u32, &str)]) -> SnmpResult {
    let mut values = BTreeMap::new();
    for (index, name) in entries {
        values.insert(
            format!("1.3.6.1.2.1.2.2.1.2.{index}"),
            (*name).to_string(),
        );
    }
    SnmpResult::from_values("10.0.0.1", values)
}

fn mikrotik() -> MikrotikMapper {
    MikrotikMapper::new("10.0.0.1", None, false, Duration::from_millis(100))
}

fn stage<'a>(result: &'a SnmpResult, name: &str) -> &'a StageStatus {
    &result
        .stages
        .iter()
        .find(|report| report.stage == name)
        .unwrap_or_else(|| panic!("missing stage {name}"))
        .status
}

#[tokio::test]
async fn base_mapper_is_idempotent() {
    let mut walker = ScriptedWalker::default();
    let result = result_with_interfaces(&[(1, "ether1"), (2, "wlan1")]);
    let mut mapper = BaseDeviceMapper;
    let once = mapper.map(&mut walker, result).await;
    let twice = mapper.map(&mut walker, once.clone()).await;
    assert_eq!(once.interfaces, twice.interfaces);
}

#[tokio::test]
async fn wireless_walk_appends_layer1_macs_by_index() {
    let mut walker = ScriptedWalker::default()
        .with(
            WIRELESS_REG_MAC,
            vec![
                (
                    format!("{WIRELESS_REG_MAC}.0.12.66.171.1.255.2"),
                    mac([0x00, 0x0C, 0x42, 0xAB, 0x01, 0xFF]),
                ),
                // Malformed value: skipped, not fatal.
                (format!("{WIRELESS_REG_MAC}.1.2.3.4.5.6.2"), WireValue::Integer(7)),
            ],
        )
        .with(NEIGHBOR_MAC, vec![])
        .with(NEIGHBOR_IFINDEX, vec![]);

    let result = result_with_interfaces(&[(1, "ether1"), (2, "wlan1")]);
    let mut mapper = mikrotik();
    let result = mapper.map(&mut walker, result).await;

    assert_eq!(
        result.interfaces[&2].connected_layer1_macs,
        vec!["00:0C:42:AB:01:FF".to_string()]
    );
    assert!(result.interfaces[&1].connected_layer1_macs.is_empty());
    assert_eq!(
        stage(&result, "wireless_clients"),
        &StageStatus::Applied { entries: 1 }
    );
}

#[tokio::test]
async fn neighbor_walks_join_on_trailing_entry_index() {
    let mut walker = ScriptedWalker::default()
        .with(WIRELESS_REG_MAC, vec![])
        .with(
            NEIGHBOR_MAC,
            vec![
                (
                    format!("{NEIGHBOR_MAC}.7"),
                    mac([0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22]),
                ),
                // Entry 8 has a MAC but no ifIndex row: skipped.
                (
                    format!("{NEIGHBOR_MAC}.8"),
                    mac([0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x33]),
                ),
            ],
        )
        .with(
            NEIGHBOR_IFINDEX,
            vec![(format!("{NEIGHBOR_IFINDEX}.7"), WireValue::Integer(1))],
        );

    let result = result_with_interfaces(&[(1, "ether1")]);
    let mut mapper = mikrotik();
    let result = mapper.map(&mut walker, result).await;

    assert_eq!(
        result.interfaces[&1].connected_layer2_macs,
        vec!["AA:BB:CC:00:11:22".to_string()]
    );
    assert_eq!(
        stage(&result, "neighbor_table"),
        &StageStatus::Applied { entries: 1 }
    );
}

#[tokio::test]
async fn failed_walk_degrades_stage_without_suppressing_others() {
    // Wireless subtree unsupported on this device; neighbor tables present.
    let mut walker = ScriptedWalker::default()
        .with(
            NEIGHBOR_MAC,
            vec![(
                format!("{NEIGHBOR_MAC}.1"),
                mac([0xAA, 0xBB, 0xCC, 0x00, 0x11, 0x22]),
            )],
        )
        .with(
            NEIGHBOR_IFINDEX,
            vec![(format!("{NEIGHBOR_IFINDEX}.1"), WireValue::Integer(1))],
        );

    let result = result_with_interfaces(&[(1, "ether1")]);
    let mut mapper = mikrotik();
    let result = mapper.map(&mut walker, result).await;

    assert!(matches!(
        stage(&result, "wireless_clients"),
        StageStatus::Failed { .. }
    ));
    assert_eq!(
        stage(&result, "neighbor_table"),
        &StageStatus::Applied { entries: 1 }
    );
    assert_eq!(
        result.interfaces[&1].connected_layer2_macs,
        vec!["AA:BB:CC:00:11:22".to_string()]
    );
}

#[tokio::test]
async fn bridge_stage_is_skipped_without_credentials() {
    let mut walker = ScriptedWalker::default()
        .with(WIRELESS_REG_MAC, vec![])
        .with(NEIGHBOR_MAC, vec![])
        .with(NEIGHBOR_IFINDEX, vec![]);

    let result = result_with_interfaces(&[(1, "ether1")]);
    let mut mapper = mikrotik();
    let result = mapper.map(&mut walker, result).await;

    assert!(matches!(
        stage(&result, "bridge_hosts"),
        StageStatus::Skipped { .. }
    ));
    // The walk-derived result stands unchanged.
    assert!(result.interfaces[&1].connected_layer2_macs.is_empty());
}

#[test]
fn registry_resolves_mikrotik_sys_object_id() {
    let registry = MapperRegistry::new(false, Duration::from_secs(5));
    assert_eq!(
        registry.resolve("1.3.6.1.4.1.14988.1"),
        Some(Vendor::Mikrotik)
    );
    assert_eq!(registry.resolve("1.3.6.1.4.1.9.1.1"), None);
    assert_eq!(registry.resolve(""), None);
}

#[test]
fn registry_builds_a_mapper_per_vendor() {
    let registry = MapperRegistry::new(false, Duration::from_secs(5));
    let store: Arc<dyn CredentialStore> = Arc::new(InventoryCredentials::new());
    let device = fleetpoll_common::Device {
        id: 1,
        ip: "10.0.0.1".to_string(),
        snmp_port: 161,
        template: Arc::new(fleetpoll_common::MonitoringTemplate::new(
            false,
            true,
            fleetpoll_common::SnmpVersion::V2c,
            Some("public".to_string()),
            None,
            vec![],
        )),
    };
    let _mapper = registry.build(Vendor::Mikrotik, &device, &store);
}
