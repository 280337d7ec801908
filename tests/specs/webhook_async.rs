// SPDX-License-Identifier: MIT

//! Scenario 5 (spec.md §8): a `webhook` transport agent's synchronous
//! `Execute` response reports `monitor_started` (SPEC_FULL.md §9 Open
//! Question 2: a call only stays eligible for a later callback if its
//! synchronous response carried no inline completion); a subsequent
//! callback delivered through [`mywant_api::CoreApi::deliver_webhook_callback`]
//! then carries the completing `state_updates`. Both land in the want's
//! history in temporal order.

use crate::common::{build_api, wait_for_status, InstantAchieve};
use mywant_agents::{AgentCallStatus, LocalAgentTable, WebhookCallback};
use mywant_core::{AgentDef, AgentKind, Capability, Transport, Want, WantStatus};
use mywant_engine::{WantLogic, WantTypeRegistry};
use mywant_recipe::CustomTypeRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Spawns a bare HTTP/1.1-over-TCP server that answers a single `POST
/// /execute` with a `monitor_started` envelope and no inline updates —
/// the webhook agent equivalent of "kicked off async work, check back
/// later" (spec.md §4.5).
async fn spawn_monitor_started_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind should succeed");
    let addr = listener.local_addr().expect("addr").to_string();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept should succeed");
        let (read_half, mut write_half) = socket.split();
        let mut reader = BufReader::new(read_half);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await.expect("read request line");
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).await.expect("read header");
            if line == "\r\n" {
                break;
            }
            if let Some(val) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = val.trim().parse().unwrap_or(0);
            }
        }
        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await.expect("read body");

        let response_body = serde_json::json!({
            "status": "monitor_started",
            "state_updates": {},
            "error": null,
            "execution_time_ms": 7,
        })
        .to_string();
        let response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}", response_body.len(), response_body);
        write_half.write_all(response.as_bytes()).await.expect("write response");
    });

    addr
}

#[tokio::test]
async fn webhook_agent_monitor_started_then_async_callback_lands_in_history_order() {
    let type_registry = WantTypeRegistry::new();
    type_registry.register("instant", Arc::new(|_w: &Want| Box::new(InstantAchieve) as Box<dyn WantLogic>));

    let (api, _cancellation) = build_api(type_registry, CustomTypeRegistry::new(), LocalAgentTable::new());

    let addr = spawn_monitor_started_server().await;
    api.register_capability(Capability::new("flight_api_agency", ["create_flight".to_string()]));
    api.register_agent(
        AgentDef::new("remote_agent", AgentKind::Do, Transport::Webhook { url: addr, callback_url: None })
            .with_capabilities(["flight_api_agency".to_string()]),
    );

    let mut want = Want::new("book-a-flight", "instant", 0);
    want.spec.requires.insert("create_flight".to_string());
    let ids = api.submit_config(vec![want], false).await.expect("submit");

    // The synchronous response carries no inline updates and the want still
    // achieves: `monitor_started` resolves the capability without closing
    // the call out.
    wait_for_status(&api, &ids[0], WantStatus::Achieved).await;
    let after_sync = api.get_want(&ids[0]).expect("get");
    assert!(after_sync.explicit_state.get("booking_id").is_none());
    let seq_at_achieved = after_sync.history.last().expect("history entry").seq;

    let callback = WebhookCallback {
        agent_name: "remote_agent".to_string(),
        want_id: ids[0].as_str().to_string(),
        status: AgentCallStatus::Completed,
        state_updates: BTreeMap::from([("booking_id".to_string(), serde_json::json!("flt-async-1"))]),
        error: None,
    };
    api.deliver_webhook_callback(callback, None).await.expect("callback should apply");

    let after_callback = api.get_want(&ids[0]).expect("get");
    assert_eq!(after_callback.explicit_state.get("booking_id"), Some(&serde_json::json!("flt-async-1")));

    // The callback's state-store history entry comes strictly after every
    // entry recorded before it landed — temporal order per spec.md §4.5.
    let callback_entry = after_callback.history.last().expect("history entry");
    assert!(callback_entry.seq > seq_at_achieved);

    // A second callback for the same call is rejected: mixed sync/async use
    // is forbidden (SPEC_FULL.md §9 Open Question 2), and a callback only
    // ever applies once.
    let duplicate = WebhookCallback {
        agent_name: "remote_agent".to_string(),
        want_id: ids[0].as_str().to_string(),
        status: AgentCallStatus::Completed,
        state_updates: BTreeMap::from([("booking_id".to_string(), serde_json::json!("flt-async-2"))]),
        error: None,
    };
    let err = api.deliver_webhook_callback(duplicate, None).await.unwrap_err();
    assert!(matches!(err, mywant_api::ApiError::Core(mywant_core::CoreError::Conflict { .. })));
}
