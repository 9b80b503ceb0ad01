use fleetpoll_common::SnmpError;
use thiserror::Error;

/// Failure taxonomy for the SNMP boundary.
///
/// `Timeout` and `Connect` are connection-level (the device may simply be
/// unreachable right now); everything else is protocol-level and a later
/// attempt is unlikely to fare better.
#[derive(Debug, Error)]
pub enum SnmpClientError {
    #[error("snmp request to {target} timed out after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },

    #[error("snmp session to {target} could not be established: {detail}")]
    Connect { target: String, detail: String },

    #[error("snmp protocol error from {target}: {detail}")]
    Protocol { target: String, detail: String },

    #[error("invalid oid '{oid}' in template")]
    BadOid { oid: String },

    #[error("unsupported snmp configuration: {detail}")]
    Unsupported { detail: String },
}

impl SnmpClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SnmpClientError::Timeout { .. } | SnmpClientError::Connect { .. }
        )
    }

    /// Terminal per-device outcome carried back to the collector.
    pub fn into_snmp_error(self, ip: &str) -> SnmpError {
        SnmpError {
            ip: ip.to_string(),
            retryable: self.is_retryable(),
            message: self.to_string(),
        }
    }
}
