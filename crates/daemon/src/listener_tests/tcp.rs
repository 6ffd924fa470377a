// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End to end over a real socket, through `serve`.

use super::*;
use crate::client::DaemonClient;

#[tokio::test]
async fn serve_answers_and_shuts_down_on_request() {
    let dir = TempDir::new().unwrap();
    let config = Config::for_state_dir(dir.path());
    let started = startup(&config).await.unwrap();
    let addr = started.local_addr().unwrap();
    let server = tokio::spawn(crate::serve(started, CancellationToken::new()));

    let client = DaemonClient::new(addr.to_string());
    assert_eq!(client.send(&Request::Ping).await.unwrap(), Response::Pong);
    assert_eq!(
        client
            .send(&Request::Admin {
                token: None,
                op: AdminOp::Shutdown,
            })
            .await
            .unwrap(),
        Response::ShuttingDown
    );

    server.await.unwrap().unwrap();
    assert!(config.snapshot_path.exists());
    assert!(!config.lock_path.exists());
}

#[tokio::test]
async fn garbage_request_closes_the_connection() {
    use tokio::io::AsyncWriteExt;

    let dir = TempDir::new().unwrap();
    let config = Config::for_state_dir(dir.path());
    let started = startup(&config).await.unwrap();
    let addr = started.local_addr().unwrap();
    let cancel = CancellationToken::new();
    let server = tokio::spawn(crate::serve(started, cancel.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    protocol::write_message(&mut stream, b"not json").await.unwrap();
    stream.flush().await.unwrap();
    let mut reader = stream;
    assert!(protocol::read_message(&mut reader).await.is_err());

    // The daemon keeps serving
    let client = DaemonClient::new(addr.to_string());
    assert_eq!(client.send(&Request::Ping).await.unwrap(), Response::Pong);

    cancel.cancel();
    server.await.unwrap().unwrap();
}
