//! SNMP protocol boundary for the poller.
//!
//! Wraps [`snmp2`] sessions behind a small client that knows how to build
//! the right session flavor (v1/v2c community, v3 auth/priv) from a
//! device's monitoring template, GET a template's full OID set, and walk
//! vendor subtrees. The wire protocol itself is entirely the `snmp2`
//! crate's concern.

pub mod error;

pub use error::SnmpClientError;

use async_trait::async_trait;
use fleetpoll_common::{Device, MonitoringTemplate, Snmp3Params, SnmpVersion, WireValue};
use snmp2::{AsyncSession, Oid, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Subtree retrieval, factored out of [`SnmpClient`] so enrichment stages
/// can be exercised against scripted walk data in tests.
#[async_trait]
pub trait SnmpWalker: Send {
    async fn walk(&mut self, root: &str) -> Result<Vec<(String, WireValue)>, SnmpClientError>;
}

/// One device's SNMP session, owned by a single poll task and dropped when
/// the task finishes.
pub struct SnmpClient {
    session: AsyncSession,
    version: SnmpVersion,
    target: String,
    timeout: Duration,
}

impl SnmpClient {
    /// Builds the session matching the device template's SNMP version.
    /// Session construction failures are connection-level: the device may
    /// be back next cycle.
    pub async fn connect(device: &Device, timeout: Duration) -> Result<Self, SnmpClientError> {
        let target = device.target();
        let template = device.template.as_ref();
        let version = template.version();
        let community = template.community().as_bytes().to_vec();

        let session = match version {
            SnmpVersion::V1 => AsyncSession::new_v1(&target, &community, 0).await,
            SnmpVersion::V2c => AsyncSession::new_v2c(&target, &community, 0).await,
            SnmpVersion::V3 => {
                let security = build_security(template, &target)?;
                AsyncSession::new_v3(&target, 0, security).await
            }
        }
        .map_err(|e| SnmpClientError::Connect {
            target: target.clone(),
            detail: e.to_string(),
        })?;

        tracing::debug!(peer = %target, version = %version, "snmp session established");

        let mut client = Self {
            session,
            version,
            target,
            timeout,
        };

        // v3 needs an engine discovery round trip before the first request.
        if version == SnmpVersion::V3 {
            match tokio::time::timeout(client.timeout, client.session.init()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(SnmpClientError::Connect {
                        target: client.target,
                        detail: format!("v3 engine discovery failed: {e}"),
                    })
                }
                Err(_) => {
                    return Err(SnmpClientError::Timeout {
                        target: client.target,
                        timeout_secs: client.timeout.as_secs(),
                    })
                }
            }
        }

        Ok(client)
    }

    /// GETs every OID in the template set, returning rendered values keyed
    /// by the requested OID string. Sessions carry a single varbind per
    /// request, so the set costs one round trip per OID; a protocol
    /// failure partway through aborts the whole fetch, keeping the
    /// template read all-or-nothing. Exception varbinds (noSuchObject and
    /// friends) are omitted rather than treated as errors, so a device
    /// without a sysObjectID still yields a valid partial result.
    pub async fn fetch(
        &mut self,
        oids: &[String],
    ) -> Result<BTreeMap<String, String>, SnmpClientError> {
        let mut values = BTreeMap::new();
        for oid_str in oids {
            let oid = parse_oid(oid_str)?;
            let resp = match tokio::time::timeout(self.timeout, self.session.get(&oid)).await {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    return Err(SnmpClientError::Protocol {
                        target: self.target.clone(),
                        detail: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(SnmpClientError::Timeout {
                        target: self.target.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    })
                }
            };
            if let Some((_oid, value)) = resp.varbinds.into_iter().next() {
                let wire = to_wire(&value);
                if !matches!(wire, WireValue::Null) {
                    values.insert(oid_str.clone(), wire.render());
                }
            }
        }
        Ok(values)
    }

    /// Walks the subtree under `root`. GETBULK on v2c/v3, GETNEXT on v1.
    pub async fn walk(&mut self, root: &str) -> Result<Vec<(String, WireValue)>, SnmpClientError> {
        let root_oid = parse_oid(root)?;
        match self.version {
            SnmpVersion::V1 => self.walk_next(&root_oid).await,
            SnmpVersion::V2c | SnmpVersion::V3 => self.walk_bulk(&root_oid, 10).await,
        }
    }

    async fn walk_bulk(
        &mut self,
        root: &Oid<'_>,
        max_repetitions: u32,
    ) -> Result<Vec<(String, WireValue)>, SnmpClientError> {
        let mut results = Vec::new();
        let mut current = root.to_owned();
        loop {
            let resp = match tokio::time::timeout(
                self.timeout,
                self.session.getbulk(&[&current], 0, max_repetitions),
            )
            .await
            {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    return Err(SnmpClientError::Protocol {
                        target: self.target.clone(),
                        detail: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(SnmpClientError::Timeout {
                        target: self.target.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    })
                }
            };

            let mut next: Option<Oid<'static>> = None;
            for (oid, value) in resp.varbinds {
                if !oid.starts_with(root) {
                    return Ok(results);
                }
                let wire = to_wire(&value);
                if !matches!(wire, WireValue::Null) {
                    results.push((oid.to_string(), wire));
                }
                next = Some(oid.to_owned());
            }

            match next {
                // A repeated OID means the agent is not advancing; stop
                // instead of spinning.
                Some(n) if n != current => current = n,
                _ => return Ok(results),
            }
        }
    }

    async fn walk_next(&mut self, root: &Oid<'_>) -> Result<Vec<(String, WireValue)>, SnmpClientError> {
        let mut results = Vec::new();
        let mut current = root.to_owned();
        loop {
            let resp = match tokio::time::timeout(self.timeout, self.session.getnext(&current)).await
            {
                Ok(Ok(resp)) => resp,
                Ok(Err(e)) => {
                    return Err(SnmpClientError::Protocol {
                        target: self.target.clone(),
                        detail: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(SnmpClientError::Timeout {
                        target: self.target.clone(),
                        timeout_secs: self.timeout.as_secs(),
                    })
                }
            };

            let mut next: Option<Oid<'static>> = None;
            if let Some((oid, value)) = resp.varbinds.into_iter().next() {
                if !oid.starts_with(root) {
                    return Ok(results);
                }
                let wire = to_wire(&value);
                if !matches!(wire, WireValue::Null) {
                    results.push((oid.to_string(), wire));
                }
                next = Some(oid.to_owned());
            }

            match next {
                Some(n) if n != current => current = n,
                _ => return Ok(results),
            }
        }
    }
}

#[async_trait]
impl SnmpWalker for SnmpClient {
    async fn walk(&mut self, root: &str) -> Result<Vec<(String, WireValue)>, SnmpClientError> {
        SnmpClient::walk(self, root).await
    }
}

fn parse_oid(s: &str) -> Result<Oid<'static>, SnmpClientError> {
    let parts: Result<Vec<u64>, _> = s
        .trim()
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>())
        .collect();
    let parts = parts.map_err(|_| SnmpClientError::BadOid { oid: s.to_string() })?;
    Oid::from(&parts).map_err(|_| SnmpClientError::BadOid { oid: s.to_string() })
}

fn to_wire(value: &Value<'_>) -> WireValue {
    match value {
        Value::Boolean(b) => WireValue::Boolean(*b),
        Value::Integer(i) => WireValue::Integer(*i),
        Value::OctetString(bytes) => WireValue::OctetString(bytes.to_vec()),
        Value::ObjectIdentifier(oid) => WireValue::ObjectId(oid.to_string()),
        Value::IpAddress(octets) => WireValue::IpAddress(*octets),
        Value::Counter32(c) => WireValue::Counter32(*c),
        Value::Unsigned32(u) => WireValue::Unsigned32(*u),
        Value::Timeticks(t) => WireValue::Timeticks(*t),
        Value::Counter64(c) => WireValue::Counter64(*c),
        _ => WireValue::Null,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

/// The template's declared security level, or the level implied by which
/// passphrases it carries when none is declared.
fn security_level(params: &Snmp3Params) -> Result<SecurityLevel, SnmpClientError> {
    match params
        .security_level
        .as_deref()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("noauthnopriv") => Ok(SecurityLevel::NoAuthNoPriv),
        Some("authnopriv") => Ok(SecurityLevel::AuthNoPriv),
        Some("authpriv") => Ok(SecurityLevel::AuthPriv),
        None => Ok(if params.priv_passphrase.is_some() {
            SecurityLevel::AuthPriv
        } else if params.auth_passphrase.is_some() {
            SecurityLevel::AuthNoPriv
        } else {
            SecurityLevel::NoAuthNoPriv
        }),
        Some(other) => Err(SnmpClientError::Unsupported {
            detail: format!("unknown v3 security level '{other}'"),
        }),
    }
}

/// Maps template v3 parameters onto `snmp2` security material. The
/// template's community field doubles as the v3 security name, matching
/// the inventory schema. The security level decides what gets applied:
/// noAuthNoPriv sessions carry neither auth nor privacy material,
/// authNoPriv requires an auth passphrase, authPriv additionally a
/// privacy passphrase. Context name and engine id selection is not
/// supported and is rejected rather than silently dropped.
fn build_security(
    template: &MonitoringTemplate,
    target: &str,
) -> Result<snmp2::v3::Security, SnmpClientError> {
    use snmp2::v3::{Auth, AuthProtocol, Cipher, Security};

    let params = template.v3().ok_or_else(|| SnmpClientError::Unsupported {
        detail: format!("v3 template for {target} carries no security parameters"),
    })?;

    if params.context_name.as_deref().is_some_and(|v| !v.is_empty())
        || params
            .context_engine_id
            .as_deref()
            .is_some_and(|v| !v.is_empty())
    {
        return Err(SnmpClientError::Unsupported {
            detail: format!("v3 context selection is not supported (target {target})"),
        });
    }

    let level = security_level(params)?;
    let username = template.community().as_bytes();

    if level == SecurityLevel::NoAuthNoPriv {
        return Ok(Security::new(username, b""));
    }

    let auth_passphrase = params
        .auth_passphrase
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| SnmpClientError::Unsupported {
            detail: format!("v3 template for {target} requires auth but has no auth passphrase"),
        })?;
    let mut security = Security::new(username, auth_passphrase.as_bytes());

    match params
        .auth_protocol
        .as_deref()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("md5") => security = security.with_auth_protocol(AuthProtocol::Md5),
        Some("sha") | Some("sha1") | None => {
            security = security.with_auth_protocol(AuthProtocol::Sha1)
        }
        Some(other) => {
            return Err(SnmpClientError::Unsupported {
                detail: format!("unknown v3 auth protocol '{other}'"),
            })
        }
    }

    if level == SecurityLevel::AuthPriv {
        let priv_passphrase = params
            .priv_passphrase
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SnmpClientError::Unsupported {
                detail: format!(
                    "v3 template for {target} requires privacy but has no privacy passphrase"
                ),
            })?;
        let cipher = match params
            .priv_protocol
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("aes") | Some("aes128") | None => Cipher::Aes128,
            Some(other) => {
                return Err(SnmpClientError::Unsupported {
                    detail: format!("unknown v3 privacy protocol '{other}'"),
                })
            }
        };
        security = security.with_auth(Auth::AuthPriv {
            cipher,
            privacy_password: priv_passphrase.as_bytes().to_vec(),
        });
    }

    Ok(security)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_oid_accepts_dotted_numeric() {
        assert!(parse_oid("1.3.6.1.2.1.1.2.0").is_ok());
        assert!(parse_oid(" 1.3.6.1.2.1.1.2.0 ").is_ok());
    }

    #[test]
    fn parse_oid_rejects_garbage() {
        assert!(matches!(
            parse_oid("1.3.banana"),
            Err(SnmpClientError::BadOid { .. })
        ));
    }

    fn v3_template(params: Snmp3Params) -> MonitoringTemplate {
        MonitoringTemplate::new(
            false,
            false,
            SnmpVersion::V3,
            Some("observer".to_string()),
            Some(params),
            vec![],
        )
    }

    #[test]
    fn no_auth_no_priv_builds_without_any_passphrase() {
        let template = v3_template(Snmp3Params {
            security_level: Some("noAuthNoPriv".to_string()),
            ..Default::default()
        });
        assert!(build_security(&template, "10.0.0.1:161").is_ok());
    }

    #[test]
    fn auth_level_without_passphrase_is_rejected() {
        let template = v3_template(Snmp3Params {
            security_level: Some("authNoPriv".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            build_security(&template, "10.0.0.1:161"),
            Err(SnmpClientError::Unsupported { .. })
        ));
    }

    #[test]
    fn auth_priv_requires_a_privacy_passphrase() {
        let template = v3_template(Snmp3Params {
            security_level: Some("authPriv".to_string()),
            auth_passphrase: Some("authpass".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            build_security(&template, "10.0.0.1:161"),
            Err(SnmpClientError::Unsupported { .. })
        ));
    }

    #[test]
    fn security_level_is_inferred_from_the_carried_material() {
        let none = Snmp3Params::default();
        assert_eq!(security_level(&none).unwrap(), SecurityLevel::NoAuthNoPriv);
        let auth_only = Snmp3Params {
            auth_passphrase: Some("authpass".to_string()),
            ..Default::default()
        };
        assert_eq!(security_level(&auth_only).unwrap(), SecurityLevel::AuthNoPriv);
        let full = Snmp3Params {
            auth_passphrase: Some("authpass".to_string()),
            priv_passphrase: Some("privpass".to_string()),
            ..Default::default()
        };
        assert_eq!(security_level(&full).unwrap(), SecurityLevel::AuthPriv);
    }

    #[test]
    fn unknown_security_level_is_rejected() {
        let bad = Snmp3Params {
            security_level: Some("authMaybe".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            security_level(&bad),
            Err(SnmpClientError::Unsupported { .. })
        ));
    }

    #[test]
    fn context_selection_is_rejected_not_dropped() {
        let template = v3_template(Snmp3Params {
            security_level: Some("authPriv".to_string()),
            auth_passphrase: Some("authpass".to_string()),
            priv_passphrase: Some("privpass".to_string()),
            context_name: Some("vrf-mgmt".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            build_security(&template, "10.0.0.1:161"),
            Err(SnmpClientError::Unsupported { .. })
        ));
    }
}
