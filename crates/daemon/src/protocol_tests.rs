// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use rp_core::{Error, Phase};
use yare::parameterized;

#[test]
fn requests_are_tagged_by_type() {
    let json = serde_json::to_value(Request::Ping).unwrap();
    assert_eq!(json, serde_json::json!({ "type": "Ping" }));

    let request = Request::Agent {
        token: "rpt_abc".to_string(),
        op: AgentOp::GetJobs {
            agent_id: AgentId::new("agent-1"),
        },
    };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["type"], "Agent");
    assert_eq!(json["op"]["type"], "GetJobs");
    assert_eq!(json["op"]["agent_id"], "agent-1");
}

#[test]
fn handwritten_agent_request_decodes() {
    let raw = br#"{
        "type": "Agent",
        "token": "rpt_abc",
        "op": { "type": "Register", "name": "runner-1", "max_jobs": 2 }
    }"#;
    let request: Request = decode(raw).unwrap();
    assert_eq!(
        request,
        Request::Agent {
            token: "rpt_abc".to_string(),
            op: AgentOp::Register {
                name: "runner-1".to_string(),
                version: String::new(),
                max_jobs: 2,
            },
        }
    );
}

#[test]
fn admin_token_is_optional_on_the_wire() {
    let raw = br#"{ "type": "Admin", "op": { "type": "ListJobs" } }"#;
    let request: Request = decode(raw).unwrap();
    assert_eq!(
        request,
        Request::Admin {
            token: None,
            op: AdminOp::ListJobs,
        }
    );
}

#[test]
fn job_spec_survives_the_wire() {
    let request = Request::Admin {
        token: Some("admin".to_string()),
        op: AdminOp::SignalJob {
            spec: JobSpec::new("run-1", Phase::Apply),
            signal: Signal::ForceCancel,
        },
    };
    let decoded: Request = decode(&encode(&request).unwrap()).unwrap();
    assert_eq!(request, decoded);
}

#[test]
fn error_response_carries_kind() {
    let response = Response::error(&Error::not_found("workspace", "ws-9"));
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["type"], "Error");
    assert_eq!(json["kind"], "resource_not_found");
    assert!(json["message"].as_str().unwrap().contains("ws-9"));
}

#[parameterized(
    ping = { Request::Ping, "ping", true },
    status = { Request::Status, "status", true },
    job_info = { Request::JobInfo { token: "rpj_secret".into() }, "job_info", false },
    poll = {
        Request::Agent { token: "rpt_secret".into(), op: AgentOp::GetJobs { agent_id: AgentId::new("a") } },
        "agent.get_jobs",
        true,
    },
    finish = {
        Request::Agent {
            token: "rpt_secret".into(),
            op: AgentOp::FinishJob {
                agent_id: AgentId::new("a"),
                spec: JobSpec::new("run-1", Phase::Plan),
                status: JobStatus::Finished,
                error: None,
            },
        },
        "agent.finish_job",
        false,
    },
)]
fn request_labels(request: Request, label: &str, frequent: bool) {
    assert_eq!(request.label(), label);
    assert!(!request.label().contains("secret"));
    assert_eq!(request.is_frequent(), frequent);
}

#[tokio::test]
async fn message_is_length_prefixed() {
    let mut buf = Vec::new();
    write_message(&mut buf, b"{}").await.unwrap();
    assert_eq!(buf, vec![0, 0, 0, 2, b'{', b'}']);

    let mut reader = buf.as_slice();
    assert_eq!(read_message(&mut reader).await.unwrap(), b"{}".to_vec());
}

#[tokio::test]
async fn request_response_over_duplex() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    write_request(&mut client, &Request::Status, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(
        read_request(&mut server, DEFAULT_TIMEOUT).await.unwrap(),
        Request::Status
    );

    write_response(&mut server, &Response::Pong, DEFAULT_TIMEOUT)
        .await
        .unwrap();
    assert_eq!(
        read_response(&mut client, DEFAULT_TIMEOUT).await.unwrap(),
        Response::Pong
    );
}

#[tokio::test]
async fn eof_reads_as_connection_closed() {
    let mut reader: &[u8] = &[];
    assert!(matches!(
        read_message(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn oversized_length_prefix_is_rejected() {
    let len = (MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes();
    let mut reader: &[u8] = &len;
    assert!(matches!(
        read_message(&mut reader).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn silent_peer_times_out() {
    let (_client, mut server) = tokio::io::duplex(64);
    let result = read_request(&mut server, std::time::Duration::from_millis(20)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
