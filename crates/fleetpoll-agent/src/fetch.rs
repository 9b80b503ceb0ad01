//! Inventory fetch: devices, templates and credentials for one cycle.

use anyhow::Context;
use fleetpoll_common::{
    ApiCredentials, CredentialKey, CredentialStore, Device, InventoryCredentials,
    MonitoringTemplate, Snmp3Params, SnmpVersion,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct InventoryPayload {
    pub data: InventoryData,
}

#[derive(Debug, Deserialize)]
pub struct InventoryData {
    pub devices: Vec<DeviceRow>,
    #[serde(default)]
    pub monitoring_templates: HashMap<String, TemplateRow>,
    #[serde(default)]
    pub credentials: HashMap<String, ApiCredentials>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceRow {
    pub id: i64,
    pub ip: String,
    #[serde(default = "default_snmp_port")]
    pub snmp_port: u16,
    pub monitoring_template_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TemplateRow {
    #[serde(default)]
    pub icmp: bool,
    #[serde(default)]
    pub collect_interface_statistics: bool,
    pub snmp_version: i64,
    #[serde(default)]
    pub snmp_community: Option<String>,
    #[serde(default)]
    pub snmp3_sec_level: Option<String>,
    #[serde(default)]
    pub snmp3_auth_protocol: Option<String>,
    #[serde(default)]
    pub snmp3_auth_passphrase: Option<String>,
    #[serde(default)]
    pub snmp3_priv_protocol: Option<String>,
    #[serde(default)]
    pub snmp3_priv_passphrase: Option<String>,
    #[serde(default)]
    pub snmp3_context_name: Option<String>,
    #[serde(default)]
    pub snmp3_context_engine_id: Option<String>,
    #[serde(default)]
    pub oids: Vec<String>,
}

fn default_snmp_port() -> u16 {
    161
}

/// One cycle's worth of work in domain form.
pub struct Inventory {
    pub devices: Vec<Device>,
    pub credentials: Arc<dyn CredentialStore>,
}

impl Inventory {
    pub fn from_payload(payload: InventoryPayload) -> Self {
        let data = payload.data;

        let templates: HashMap<i64, Arc<MonitoringTemplate>> = data
            .monitoring_templates
            .into_iter()
            .filter_map(|(id, row)| {
                let id: i64 = id.parse().ok()?;
                Some((id, Arc::new(template_from_row(row))))
            })
            .collect();

        let mut devices = Vec::new();
        for row in data.devices {
            match templates.get(&row.monitoring_template_id) {
                Some(template) => devices.push(Device {
                    id: row.id,
                    ip: row.ip,
                    snmp_port: row.snmp_port,
                    template: template.clone(),
                }),
                None => {
                    tracing::warn!(
                        device_id = row.id,
                        template_id = row.monitoring_template_id,
                        "device references an unknown monitoring template, skipping"
                    );
                }
            }
        }

        let mut credentials = InventoryCredentials::new();
        for key in [CredentialKey::MikrotikApi] {
            if let Some(entry) = data.credentials.get(key.inventory_name()) {
                credentials.insert(key, entry.clone());
            }
        }

        Self {
            devices,
            credentials: Arc::new(credentials),
        }
    }
}

fn template_from_row(row: TemplateRow) -> MonitoringTemplate {
    let version = SnmpVersion::from_inventory(row.snmp_version);
    let v3 = if version == SnmpVersion::V3 {
        Some(Snmp3Params {
            security_level: row.snmp3_sec_level,
            auth_protocol: row.snmp3_auth_protocol,
            auth_passphrase: row.snmp3_auth_passphrase,
            priv_protocol: row.snmp3_priv_protocol,
            priv_passphrase: row.snmp3_priv_passphrase,
            context_name: row.snmp3_context_name,
            context_engine_id: row.snmp3_context_engine_id,
        })
    } else {
        None
    };
    MonitoringTemplate::new(
        row.icmp,
        row.collect_interface_statistics,
        version,
        row.snmp_community,
        v3,
        row.oids,
    )
}

pub struct Fetcher {
    client: reqwest::Client,
    base_url: String,
}

impl Fetcher {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn fetch(&self, debug: bool) -> anyhow::Result<Inventory> {
        let url = format!("{}/api/poller/work", self.base_url);
        let payload: InventoryPayload = self
            .client
            .get(&url)
            .query(&[("debug", if debug { "1" } else { "0" })])
            .send()
            .await
            .context("inventory request failed")?
            .error_for_status()
            .context("inventory request rejected")?
            .json()
            .await
            .context("inventory payload malformed")?;
        Ok(Inventory::from_payload(payload))
    }
}
