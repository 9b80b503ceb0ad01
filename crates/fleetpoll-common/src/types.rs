use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// sysObjectID, always part of a template's OID set. Its value selects the
/// vendor enrichment pipeline for a device.
pub const SYS_OBJECT_ID: &str = "1.3.6.1.2.1.1.2.0";

/// ifDescr column; rows under this prefix seed the interface table.
pub const IF_DESCR_PREFIX: &str = "1.3.6.1.2.1.2.2.1.2.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    V2c,
    V3,
}

impl SnmpVersion {
    /// Inventory encodes the version numerically; 2 and 3 are meaningful,
    /// anything else falls back to v1.
    pub fn from_inventory(raw: i64) -> Self {
        match raw {
            2 => SnmpVersion::V2c,
            3 => SnmpVersion::V3,
            _ => SnmpVersion::V1,
        }
    }
}

impl fmt::Display for SnmpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnmpVersion::V1 => write!(f, "v1"),
            SnmpVersion::V2c => write!(f, "v2c"),
            SnmpVersion::V3 => write!(f, "v3"),
        }
    }
}

/// SNMPv3 security material from the monitoring template.
#[derive(Debug, Clone, Default)]
pub struct Snmp3Params {
    pub security_level: Option<String>,
    pub auth_protocol: Option<String>,
    pub auth_passphrase: Option<String>,
    pub priv_protocol: Option<String>,
    pub priv_passphrase: Option<String>,
    pub context_name: Option<String>,
    pub context_engine_id: Option<String>,
}

/// Declares what to collect from a device and how to authenticate.
///
/// Immutable after construction. The OID set never contains duplicates and
/// always includes [`SYS_OBJECT_ID`].
#[derive(Debug, Clone)]
pub struct MonitoringTemplate {
    icmp: bool,
    collect_interface_statistics: bool,
    version: SnmpVersion,
    community: Option<String>,
    v3: Option<Snmp3Params>,
    oids: Vec<String>,
}

impl MonitoringTemplate {
    pub fn new(
        icmp: bool,
        collect_interface_statistics: bool,
        version: SnmpVersion,
        community: Option<String>,
        v3: Option<Snmp3Params>,
        extra_oids: Vec<String>,
    ) -> Self {
        let mut oids = vec![SYS_OBJECT_ID.to_string()];
        for oid in extra_oids {
            if !oids.contains(&oid) {
                oids.push(oid);
            }
        }
        Self {
            icmp,
            collect_interface_statistics,
            version,
            community,
            v3,
            oids,
        }
    }

    pub fn icmp(&self) -> bool {
        self.icmp
    }

    pub fn collect_interface_statistics(&self) -> bool {
        self.collect_interface_statistics
    }

    pub fn version(&self) -> SnmpVersion {
        self.version
    }

    pub fn community(&self) -> &str {
        self.community.as_deref().unwrap_or("public")
    }

    pub fn v3(&self) -> Option<&Snmp3Params> {
        self.v3.as_ref()
    }

    pub fn oids(&self) -> &[String] {
        &self.oids
    }
}

/// One managed device for the duration of a single poll cycle.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: i64,
    pub ip: String,
    pub snmp_port: u16,
    pub template: Arc<MonitoringTemplate>,
}

impl Device {
    pub fn target(&self) -> String {
        format!("{}:{}", self.ip, self.snmp_port)
    }
}

/// Per-device network interface, keyed by SNMP ifIndex.
///
/// `connected_layer1_macs` holds physically/radio-associated peers;
/// `connected_layer2_macs` holds peers learned from neighbor or bridging
/// tables. The two lists are populated independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub index: u32,
    pub name: String,
    pub connected_layer1_macs: Vec<String>,
    pub connected_layer2_macs: Vec<String>,
}

impl Interface {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            connected_layer1_macs: Vec::new(),
            connected_layer2_macs: Vec::new(),
        }
    }
}

/// Owned SNMP value decoupled from any wire representation.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Boolean(bool),
    Integer(i64),
    OctetString(Vec<u8>),
    ObjectId(String),
    IpAddress([u8; 4]),
    Counter32(u32),
    Unsigned32(u32),
    Timeticks(u32),
    Counter64(u64),
    Null,
}

impl WireValue {
    /// String form stored in the result value map.
    pub fn render(&self) -> String {
        match self {
            WireValue::Boolean(b) => b.to_string(),
            WireValue::Integer(i) => i.to_string(),
            WireValue::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) if s.chars().all(|c| !c.is_control() || c.is_ascii_whitespace()) => {
                    s.trim_end_matches('\0').to_string()
                }
                _ => hex_pairs(bytes),
            },
            WireValue::ObjectId(oid) => oid.clone(),
            WireValue::IpAddress(octets) => {
                format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3])
            }
            WireValue::Counter32(c) => c.to_string(),
            WireValue::Unsigned32(u) => u.to_string(),
            WireValue::Timeticks(t) => t.to_string(),
            WireValue::Counter64(c) => c.to_string(),
            WireValue::Null => String::new(),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            WireValue::Integer(i) => u32::try_from(*i).ok(),
            WireValue::Counter32(c) => Some(*c),
            WireValue::Unsigned32(u) => Some(*u),
            WireValue::Timeticks(t) => Some(*t),
            _ => None,
        }
    }
}

fn hex_pairs(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Outcome of one enrichment stage. Stage failures degrade to reports
/// instead of failing the poll, so tests and the collector can see exactly
/// which stages ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    #[serde(flatten)]
    pub status: StageStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Applied { entries: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

impl StageReport {
    pub fn applied(stage: &str, entries: usize) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Applied { entries },
        }
    }

    pub fn skipped(stage: &str, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Skipped {
                reason: reason.into(),
            },
        }
    }

    pub fn failed(stage: &str, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Failed {
                reason: reason.into(),
            },
        }
    }
}

/// Successful poll of one device: the raw OID value map plus the interface
/// table derived from it, mutated only by enrichment mappers.
#[derive(Debug, Clone, Serialize)]
pub struct SnmpResult {
    pub ip: String,
    pub values: BTreeMap<String, String>,
    pub interfaces: BTreeMap<u32, Interface>,
    pub stages: Vec<StageReport>,
}

impl SnmpResult {
    pub fn from_values(ip: &str, values: BTreeMap<String, String>) -> Self {
        let mut result = Self {
            ip: ip.to_string(),
            values,
            interfaces: BTreeMap::new(),
            stages: Vec::new(),
        };
        result.refresh_interfaces();
        result
    }

    /// Ensures every interface index discoverable from ifDescr rows has an
    /// [`Interface`] entry. Idempotent; existing entries are kept as is.
    pub fn refresh_interfaces(&mut self) {
        let discovered: Vec<(u32, String)> = self
            .values
            .iter()
            .filter_map(|(oid, value)| {
                let index = oid.strip_prefix(IF_DESCR_PREFIX)?.parse::<u32>().ok()?;
                Some((index, value.clone()))
            })
            .collect();
        for (index, name) in discovered {
            self.interfaces
                .entry(index)
                .or_insert_with(|| Interface::new(index, name));
        }
    }

    /// The sysObjectID value, if the device reported a non-empty one.
    pub fn sys_object_id(&self) -> Option<&str> {
        self.values
            .get(SYS_OBJECT_ID)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Terminal failure of one device's poll attempt.
///
/// `retryable` is advisory for the consuming collector; no retry happens
/// inside this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnmpError {
    pub ip: String,
    pub retryable: bool,
    pub message: String,
}

/// Exactly one of these per scheduled device per cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PollOutcome {
    Result(SnmpResult),
    Error(SnmpError),
}
