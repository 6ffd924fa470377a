// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the wire protocol

use std::time::Duration;

use tokio::net::TcpStream;

use crate::protocol::{self, ProtocolError, Request, Response, DEFAULT_TIMEOUT};

/// Sends one request per connection to a daemon at `addr`.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    addr: String,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ProtocolError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| ProtocolError::Timeout)??;
        let (mut reader, mut writer) = stream.into_split();
        protocol::write_request(&mut writer, request, self.timeout).await?;
        protocol::read_response(&mut reader, self.timeout).await
    }
}
