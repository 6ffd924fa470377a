// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use rp_core::{AgentStatus, ErrorKind, JobSpec, JobStatus, Phase, RunStatus};
use rp_engine::CreateRunOptions;

#[tokio::test]
async fn unknown_pool_token_is_rejected() {
    let f = Fixture::new().await;
    let response = f.agent(
        "rpt_nope",
        AgentOp::Register {
            name: "runner-1".to_string(),
            version: "1.0".to_string(),
            max_jobs: 1,
        },
    );
    assert_eq!(error_kind(&response), Some(ErrorKind::AccessNotPermitted));
}

#[tokio::test]
async fn register_records_the_peer_address() {
    let f = Fixture::new().await;
    let pool = f.pool();
    let token = f.token(&pool);

    match f.agent(
        &token,
        AgentOp::Register {
            name: "runner-1".to_string(),
            version: "1.0".to_string(),
            max_jobs: 2,
        },
    ) {
        Response::Agent { agent } => {
            assert_eq!(agent.ip_address, PEER);
            assert_eq!(agent.agent_pool_id, pool.id);
            assert_eq!(agent.status, AgentStatus::Idle);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn job_round_trip_through_requests() {
    let f = Fixture::new().await;
    let pool = f.pool();
    let token = f.token(&pool);
    let ws = f.workspace("network");
    let run = f
        .ctx
        .runs
        .create_run(CreateRunOptions::new(ws.id.clone()))
        .unwrap();
    // The scheduler is not running here; enqueue the plan directly
    f.ctx.allocator.enqueue_phase(&run.id, Phase::Plan).unwrap();

    let agent = match f.agent(
        &token,
        AgentOp::Register {
            name: "runner-1".to_string(),
            version: "1.0".to_string(),
            max_jobs: 1,
        },
    ) {
        Response::Agent { agent } => agent,
        other => panic!("unexpected response: {other:?}"),
    };

    let spec = JobSpec::new(run.id.clone(), Phase::Plan);
    match f.agent(
        &token,
        AgentOp::GetJobs {
            agent_id: agent.id.clone(),
        },
    ) {
        Response::Jobs { jobs } => {
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].spec, spec);
            assert_eq!(jobs[0].status, JobStatus::Allocated);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    let started = match f.agent(
        &token,
        AgentOp::StartJob {
            agent_id: agent.id.clone(),
            spec: spec.clone(),
        },
    ) {
        Response::StartedJob { started } => started,
        other => panic!("unexpected response: {other:?}"),
    };
    assert_eq!(started.run.status, RunStatus::Planning);

    match f.send(Request::JobInfo {
        token: started.token.clone(),
    }) {
        Response::JobInfo {
            job,
            run: info_run,
            workspace,
        } => {
            assert_eq!(job.spec, spec);
            assert_eq!(info_run.id, run.id);
            assert_eq!(workspace.id, ws.id);
        }
        other => panic!("unexpected response: {other:?}"),
    }

    match f.agent(
        &token,
        AgentOp::FinishJob {
            agent_id: agent.id.clone(),
            spec: spec.clone(),
            status: JobStatus::Finished,
            error: None,
        },
    ) {
        Response::Job { job } => assert_eq!(job.status, JobStatus::Finished),
        other => panic!("unexpected response: {other:?}"),
    }

    // The job token dies with the job
    let expired = f.send(Request::JobInfo {
        token: started.token,
    });
    assert_eq!(error_kind(&expired), Some(ErrorKind::AccessNotPermitted));
}

#[tokio::test]
async fn agents_cannot_touch_other_pools() {
    let f = Fixture::new().await;
    let pool = f.pool();
    let token = f.token(&pool);
    let other = match f.admin(AdminOp::CreatePool {
        options: CreatePoolOptions {
            name: "other".to_string(),
            organization: "acme".to_string(),
            organization_scoped: true,
            allowed_workspaces: Vec::new(),
        },
    }) {
        Response::Pool { pool } => pool,
        other => panic!("unexpected response: {other:?}"),
    };
    let other_token = f.token(&other);

    let agent = match f.agent(
        &token,
        AgentOp::Register {
            name: "runner-1".to_string(),
            version: "1.0".to_string(),
            max_jobs: 1,
        },
    ) {
        Response::Agent { agent } => agent,
        other => panic!("unexpected response: {other:?}"),
    };

    let response = f.agent(
        &other_token,
        AgentOp::UpdateStatus {
            agent_id: agent.id,
            status: AgentStatus::Busy,
        },
    );
    assert_eq!(error_kind(&response), Some(ErrorKind::AccessNotPermitted));
}
