//! Minimal RouterOS API conversation: length-prefixed words grouped into
//! sentences, plain (post-6.43) login, and `print` commands with property
//! projection. TLS endpoints commonly present self-signed certificates,
//! so certificate and hostname verification are disabled for this
//! session.

use fleetpoll_common::ApiCredentials;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_native_tls::TlsStream;

#[derive(Debug, Error)]
pub enum RouterOsError {
    #[error("routeros api i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("routeros api tls error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("routeros api connect to {target} timed out")]
    ConnectTimeout { target: String },

    #[error("routeros api login rejected: {reason}")]
    LoginRejected { reason: String },

    #[error("routeros api requires the pre-6.43 challenge login, which is not supported")]
    ChallengeLogin,

    #[error("routeros api word of {0} bytes exceeds the {MAX_WORD_LEN} byte limit")]
    OversizedWord(u32),

    #[error("routeros api trap: {0}")]
    Trap(String),

    #[error("routeros api fatal reply: {0}")]
    Fatal(String),
}

/// Upper bound on a single API word. Bridge host rows are tiny; anything
/// near this size is a corrupt or hostile stream, not data.
const MAX_WORD_LEN: u32 = 4 * 1024 * 1024;

enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.write_all(buf).await,
            Transport::Tls(s) => s.write_all(buf).await,
        }
    }

    async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Transport::Plain(s) => s.read_exact(buf).await.map(|_| ()),
            Transport::Tls(s) => s.read_exact(buf).await.map(|_| ()),
        }
    }
}

/// One reply sentence: the reply word (`!re`, `!done`, ...) plus its
/// attribute words with the leading `=` stripped.
#[derive(Debug, Clone, Default)]
pub struct Sentence {
    pub reply: String,
    pub attributes: HashMap<String, String>,
}

impl Sentence {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A logged-in RouterOS API session.
pub struct RouterOsClient {
    stream: Transport,
}

impl RouterOsClient {
    pub async fn connect(
        host: &str,
        credentials: &ApiCredentials,
        tls: bool,
        timeout: Duration,
    ) -> Result<Self, RouterOsError> {
        let target = format!("{host}:{}", credentials.port);
        let tcp = tokio::time::timeout(timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| RouterOsError::ConnectTimeout {
                target: target.clone(),
            })??;

        let stream = if tls {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?;
            let connector = tokio_native_tls::TlsConnector::from(connector);
            let tls_stream = connector.connect(host, tcp).await?;
            Transport::Tls(Box::new(tls_stream))
        } else {
            Transport::Plain(tcp)
        };

        let mut client = Self { stream };
        client
            .login(&credentials.username, &credentials.password)
            .await?;
        Ok(client)
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<(), RouterOsError> {
        let words = [
            "/login".to_string(),
            format!("=name={username}"),
            format!("=password={password}"),
        ];
        self.send(&words).await?;
        let reply = self.read_reply().await?;
        for sentence in &reply {
            if sentence.reply == "!trap" {
                return Err(RouterOsError::LoginRejected {
                    reason: sentence.get("message").unwrap_or("unknown").to_string(),
                });
            }
            // A challenge in the done sentence means the device expects
            // the deprecated md5 login flow.
            if sentence.reply == "!done" && sentence.get("ret").is_some() {
                return Err(RouterOsError::ChallengeLogin);
            }
        }
        Ok(())
    }

    /// Runs a command and returns its `!re` data sentences. `attributes`
    /// are written as API words with a leading `=` (e.g.
    /// `.proplist=.id,local,on-interface`).
    pub async fn command(
        &mut self,
        command: &str,
        attributes: &[&str],
    ) -> Result<Vec<Sentence>, RouterOsError> {
        let mut words = vec![command.to_string()];
        for attribute in attributes {
            words.push(format!("={attribute}"));
        }
        self.send(&words).await?;
        let reply = self.read_reply().await?;
        for sentence in &reply {
            if sentence.reply == "!trap" {
                return Err(RouterOsError::Trap(
                    sentence.get("message").unwrap_or("unknown").to_string(),
                ));
            }
        }
        Ok(reply
            .into_iter()
            .filter(|sentence| sentence.reply == "!re")
            .collect())
    }

    async fn send(&mut self, words: &[String]) -> Result<(), RouterOsError> {
        let mut buf = Vec::new();
        for word in words {
            encode_length(word.len(), &mut buf);
            buf.extend_from_slice(word.as_bytes());
        }
        buf.push(0);
        self.stream.write_all(&buf).await?;
        Ok(())
    }

    /// Reads sentences until the terminating `!done`. A `!fatal` sentence
    /// means the device is closing the connection.
    async fn read_reply(&mut self) -> Result<Vec<Sentence>, RouterOsError> {
        let mut sentences = Vec::new();
        loop {
            let sentence = self.read_sentence().await?;
            if sentence.reply == "!fatal" {
                let mut reasons: Vec<String> = sentence.attributes.keys().cloned().collect();
                reasons.sort();
                return Err(RouterOsError::Fatal(reasons.join(", ")));
            }
            let done = sentence.reply == "!done";
            sentences.push(sentence);
            if done {
                return Ok(sentences);
            }
        }
    }

    async fn read_sentence(&mut self) -> Result<Sentence, RouterOsError> {
        let mut sentence = Sentence::default();
        loop {
            let len = self.read_word_length().await?;
            if len == 0 {
                if sentence.reply.is_empty() && sentence.attributes.is_empty() {
                    // Stray terminator between sentences.
                    continue;
                }
                return Ok(sentence);
            }
            let mut word = vec![0u8; len];
            self.stream.read_exact(&mut word).await?;
            let word = String::from_utf8_lossy(&word).into_owned();
            if word.starts_with('!') && sentence.reply.is_empty() {
                sentence.reply = word;
            } else if let Some(rest) = word.strip_prefix('=') {
                match rest.split_once('=') {
                    Some((key, value)) => {
                        sentence
                            .attributes
                            .insert(key.to_string(), value.to_string());
                    }
                    None => {
                        sentence.attributes.insert(rest.to_string(), String::new());
                    }
                }
            } else {
                // Plain words (fatal reasons, tags) keyed with an empty
                // value so they stay visible.
                sentence.attributes.insert(word, String::new());
            }
        }
    }

    async fn read_word_length(&mut self) -> Result<usize, RouterOsError> {
        let mut first = [0u8; 1];
        self.stream.read_exact(&mut first).await?;
        let first = u32::from(first[0]);
        let len = if first < 0x80 {
            first
        } else if first < 0xC0 {
            let mut rest = [0u8; 1];
            self.stream.read_exact(&mut rest).await?;
            ((first & 0x3F) << 8) | u32::from(rest[0])
        } else if first < 0xE0 {
            let mut rest = [0u8; 2];
            self.stream.read_exact(&mut rest).await?;
            ((first & 0x1F) << 16) | (u32::from(rest[0]) << 8) | u32::from(rest[1])
        } else if first < 0xF0 {
            let mut rest = [0u8; 3];
            self.stream.read_exact(&mut rest).await?;
            ((first & 0x0F) << 24)
                | (u32::from(rest[0]) << 16)
                | (u32::from(rest[1]) << 8)
                | u32::from(rest[2])
        } else {
            let mut rest = [0u8; 4];
            self.stream.read_exact(&mut rest).await?;
            u32::from_be_bytes(rest)
        };
        check_word_length(len)
    }
}

/// Word lengths drive buffer allocation, so they are bounded before any
/// allocation happens.
fn check_word_length(len: u32) -> Result<usize, RouterOsError> {
    if len > MAX_WORD_LEN {
        return Err(RouterOsError::OversizedWord(len));
    }
    Ok(len as usize)
}

/// RouterOS API word length prefix.
fn encode_length(len: usize, buf: &mut Vec<u8>) {
    let len = len as u32;
    if len < 0x80 {
        buf.push(len as u8);
    } else if len < 0x4000 {
        buf.extend_from_slice(&(len | 0x8000).to_be_bytes()[2..]);
    } else if len < 0x20_0000 {
        buf.extend_from_slice(&(len | 0xC0_0000).to_be_bytes()[1..]);
    } else if len < 0x1000_0000 {
        buf.extend_from_slice(&(len | 0xE000_0000).to_be_bytes());
    } else {
        buf.push(0xF0);
        buf.extend_from_slice(&len.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_length(buf: &[u8]) -> (u32, usize) {
        let first = u32::from(buf[0]);
        if first < 0x80 {
            (first, 1)
        } else if first < 0xC0 {
            (((first & 0x3F) << 8) | u32::from(buf[1]), 2)
        } else if first < 0xE0 {
            (
                ((first & 0x1F) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]),
                3,
            )
        } else if first < 0xF0 {
            (
                ((first & 0x0F) << 24)
                    | (u32::from(buf[1]) << 16)
                    | (u32::from(buf[2]) << 8)
                    | u32::from(buf[3]),
                4,
            )
        } else {
            (u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]), 5)
        }
    }

    #[test]
    fn length_prefix_round_trips_at_boundaries() {
        for len in [
            0usize, 1, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, 0x0FFF_FFFF,
            0x1000_0000,
        ] {
            let mut buf = Vec::new();
            encode_length(len, &mut buf);
            let (decoded, consumed) = decode_length(&buf);
            assert_eq!(decoded as usize, len, "len {len:#x}");
            assert_eq!(consumed, buf.len(), "len {len:#x}");
        }
    }

    #[test]
    fn short_lengths_use_a_single_byte() {
        let mut buf = Vec::new();
        encode_length(0x45, &mut buf);
        assert_eq!(buf, vec![0x45]);
    }

    #[test]
    fn oversized_words_are_rejected_before_allocation() {
        assert_eq!(check_word_length(MAX_WORD_LEN).unwrap(), MAX_WORD_LEN as usize);
        assert!(matches!(
            check_word_length(MAX_WORD_LEN + 1),
            Err(RouterOsError::OversizedWord(_))
        ));
        assert!(matches!(
            check_word_length(u32::MAX),
            Err(RouterOsError::OversizedWord(_))
        ));
    }
}
