//! One-shot loopback handoff of the session credential to the companion.
//!
//! The launcher binds `127.0.0.1:0`, passes `handoff://127.0.0.1:<port>` as a
//! positional argument and the random key through the child's environment. The
//! first connection that writes the key followed by a newline receives the
//! secret and the listener closes. Unclaimed offers close after the TTL.

use std::net::SocketAddr;
use std::time::Duration;

use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::errors::{LauncherError, Result};

pub const HANDOFF_KEY_ENV: &str = "CEREMEET_HANDOFF_KEY";
pub const HANDOFF_SCHEME: &str = "handoff://";

const KEY_LEN: usize = 32;
const MAX_KEY_LINE: u64 = 128;
/// How long one connection may take to present the key.
const CLAIM_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffOutcome {
    Delivered,
    Expired,
}

/// A pending offer. Dropping it withdraws the secret.
pub struct HandoffTicket {
    uri: String,
    key: String,
    task: Option<JoinHandle<HandoffOutcome>>,
}

impl HandoffTicket {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Waits for the offer to be claimed or to expire.
    pub async fn outcome(mut self) -> HandoffOutcome {
        let Some(task) = self.task.take() else {
            return HandoffOutcome::Expired;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("credential handoff task ended abnormally: {}", err);
                HandoffOutcome::Expired
            }
        }
    }
}

impl Drop for HandoffTicket {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Clone, Debug)]
pub struct CredentialHandoff {
    ttl: Duration,
}

impl CredentialHandoff {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub async fn offer(&self, secret: String) -> Result<HandoffTicket> {
        if secret.is_empty() {
            return Err(LauncherError::Auth("nothing to hand off".to_string()));
        }
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let key = generate_key();
        let deadline = Instant::now() + self.ttl;
        let task = tokio::spawn(serve(listener, key.clone(), secret, deadline));

        tracing::info!("credential handoff listening on {} for {:?}", addr, self.ttl);
        Ok(HandoffTicket {
            uri: format!("{HANDOFF_SCHEME}{addr}"),
            key,
            task: Some(task),
        })
    }
}

fn generate_key() -> String {
    let mut bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

async fn serve(
    listener: TcpListener,
    key: String,
    secret: String,
    deadline: Instant,
) -> HandoffOutcome {
    loop {
        let accepted = match tokio::time::timeout_at(deadline, listener.accept()).await {
            Ok(accepted) => accepted,
            Err(_) => {
                tracing::info!("credential handoff expired unclaimed");
                return HandoffOutcome::Expired;
            }
        };
        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!("credential handoff accept failed: {}", err);
                continue;
            }
        };

        let claim_deadline = deadline.min(Instant::now() + CLAIM_TIMEOUT);
        match tokio::time::timeout_at(claim_deadline, exchange(stream, &key, &secret)).await {
            Ok(Ok(true)) => {
                tracing::info!("credential handed off to {}", peer);
                return HandoffOutcome::Delivered;
            }
            Ok(Ok(false)) => tracing::warn!("credential handoff: wrong key from {}", peer),
            Ok(Err(err)) => tracing::warn!("credential handoff with {} failed: {}", peer, err),
            Err(_) if Instant::now() >= deadline => {
                tracing::info!("credential handoff expired during exchange");
                return HandoffOutcome::Expired;
            }
            Err(_) => tracing::warn!("credential handoff: {} sent no key in time", peer),
        }
    }
}

async fn exchange(stream: TcpStream, key: &str, secret: &str) -> std::io::Result<bool> {
    let (reader, mut writer) = stream.into_split();
    let mut line = String::new();
    BufReader::new(reader.take(MAX_KEY_LINE))
        .read_line(&mut line)
        .await?;
    if !keys_match(line.trim_end_matches(['\r', '\n']), key) {
        return Ok(false);
    }
    writer.write_all(secret.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.shutdown().await?;
    Ok(true)
}

fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
