//! Integration tests for compute, storage, stitch, script and prefix routing.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::*;
use meridian_config::{NetworkAction, OrchestratorSettings, ScriptRequest, SdxPrefix, SlicePolicy};
use meridian_site::testing::{Reply, ScriptedBackend};
use meridian_workflow::{Counters, OrchestratorError, Outcome, Workflow, WorkflowEnv};

#[tokio::test]
async fn test_first_compute_creates_and_registers_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  let outcome = guard.process_compute(&compute("A"), false).await.unwrap();

  let Outcome::Completed(response) = outcome else {
    panic!("expected completion");
  };
  assert!(response.host_names.contains_key("node1"));
  assert_eq!(response.node_count, 1);
  assert_eq!(guard.site_keys(), vec!["A"]);
  assert_eq!(guard.counters().node_count, 1);
  assert!(guard.host_request("node1").is_some());
  assert_eq!(backend.ledger("A").created, 1);
}

#[tokio::test]
async fn test_second_compute_reuses_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  guard.process_compute(&compute("A"), false).await.unwrap();
  guard.process_compute(&compute("A"), false).await.unwrap();

  assert_eq!(backend.ledger("A").created, 1);
  assert_eq!(guard.counters().node_count, 2);
  assert_eq!(guard.host_requests().len(), 2);
}

#[tokio::test]
async fn test_requests_on_empty_workflow_are_not_found() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  let storage = guard.process_storage(&storage("node1"), false).await;
  assert!(matches!(storage, Err(OrchestratorError::NotFound { .. })));

  let stitch = guard.process_stitch(&stitch("node1"), false).await;
  assert!(matches!(stitch, Err(OrchestratorError::NotFound { .. })));

  let script = ScriptRequest {
    target: "node1".into(),
    name: "hello".into(),
    script: "echo hi".into(),
  };
  let script = guard.process_script(&script, false).await;
  assert!(matches!(script, Err(OrchestratorError::NotFound { .. })));

  let prefix = SdxPrefix {
    source: "node1".into(),
    gateway_ip: "10.0.0.1".into(),
    source_subnet: "10.0.0.0/24".into(),
    dest_subnet: None,
    bandwidth: None,
  };
  let prefix = guard.process_sdx_prefix(&prefix).await;
  assert!(matches!(prefix, Err(OrchestratorError::NotFound { .. })));

  let network = guard
    .process_network(&link(NetworkAction::Add, "node1", "node2"), false)
    .await;
  assert!(matches!(network, Err(OrchestratorError::NotFound { .. })));

  assert_eq!(guard.deferred_len(), 0);
}

#[tokio::test]
async fn test_existing_policy_without_name_is_bad_request() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  let mut request = compute("A");
  request.slice_policy = SlicePolicy::Existing;
  request.cpus = Some(8);
  request.host_name_prefix = Some("worker".into());

  let err = guard.process_compute(&request, false).await.unwrap_err();
  assert!(matches!(err, OrchestratorError::BadRequest { .. }));

  // Still a bad request once the workflow has sites.
  guard.process_compute(&compute("A"), false).await.unwrap();
  let err = guard.process_compute(&request, true).await.unwrap_err();
  assert!(matches!(err, OrchestratorError::BadRequest { .. }));
  assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_existing_policy_with_unknown_slice_is_not_found() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  let mut request = compute("A");
  request.slice_policy = SlicePolicy::Existing;
  request.slice_name = Some("missing".into());

  let err = guard.process_compute(&request, false).await.unwrap_err();
  assert!(matches!(err, OrchestratorError::NotFound { .. }));
  assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_existing_policy_routes_to_owning_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  let mut request = compute("Elsewhere");
  request.slice_policy = SlicePolicy::Existing;
  request.slice_name = Some(format!("{WORKFLOW_ID}-A"));

  guard.process_compute(&request, false).await.unwrap();

  assert_eq!(guard.site_keys(), vec!["A"]);
  assert_eq!(backend.ledger("A").compute_calls, 2);
  assert_eq!(backend.ledger("Elsewhere").created, 0);
}

#[tokio::test]
async fn test_backend_failure_rolls_back_new_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  let before = guard.counters();

  backend.reply("B", Reply::Fail);
  let err = guard.process_compute(&compute("B"), false).await.unwrap_err();

  assert!(matches!(err, OrchestratorError::Backend { ref site, .. } if site == "B"));
  assert_eq!(err.status_code(), 500);
  assert!(!guard.has_site("B"));
  assert_eq!(backend.ledger("B").stop_calls, 1);
  assert_eq!(guard.counters(), before);
  assert_eq!(guard.host_requests().len(), 1);
}

#[tokio::test]
async fn test_failure_on_existing_site_keeps_it() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  backend.reply("A", Reply::Fail);
  assert!(guard.process_compute(&compute("A"), false).await.is_err());

  assert!(guard.has_site("A"));
  assert_eq!(backend.ledger("A").stop_calls, 0);
  assert_eq!(guard.counters().node_count, 1);
}

#[tokio::test]
async fn test_unknown_site_is_bad_request() {
  let backend = ScriptedBackend::new();
  backend.reject_site("Mars:1");
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  let err = guard
    .process_compute(&compute("Mars:1"), false)
    .await
    .unwrap_err();

  assert!(matches!(err, OrchestratorError::BadRequest { .. }));
  assert!(guard.site_keys().is_empty());
}

#[tokio::test]
async fn test_deferred_compute_leaves_no_trace() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  let before = guard.counters();

  backend.reply("B", Reply::Defer);
  let outcome = guard.process_compute(&compute("B"), false).await.unwrap();

  assert!(outcome.is_deferred());
  assert!(!guard.has_site("B"));
  assert_eq!(guard.counters(), before);
  assert_eq!(guard.host_requests().len(), 1);
  assert_eq!(guard.deferred_len(), 1);
  // The context created for the attempt is released, not leaked.
  assert_eq!(backend.ledger("B").stop_calls, 1);
}

#[tokio::test]
async fn test_counters_never_decrease_and_skip_unsuccessful_calls() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  let mut history: Vec<Counters> = vec![guard.counters()];

  guard.process_compute(&compute("A"), false).await.unwrap();
  history.push(guard.counters());

  guard.process_storage(&storage("node1"), false).await.unwrap();
  history.push(guard.counters());

  guard.process_stitch(&stitch("node1"), false).await.unwrap();
  history.push(guard.counters());

  backend.reply("A", Reply::Defer);
  let deferred = guard.process_storage(&storage("node1"), false).await.unwrap();
  assert!(deferred.is_deferred());
  assert_eq!(guard.counters(), *history.last().unwrap());

  backend.reply("A", Reply::Fail);
  assert!(guard.process_stitch(&stitch("node1"), false).await.is_err());
  assert_eq!(guard.counters(), *history.last().unwrap());

  backend.reply("A", Reply::Fail);
  assert!(guard.process_compute(&compute("A"), false).await.is_err());
  assert_eq!(guard.counters(), *history.last().unwrap());

  for pair in history.windows(2) {
    assert!(pair[1].node_count >= pair[0].node_count);
    assert!(pair[1].storage_count >= pair[0].storage_count);
    assert!(pair[1].stitch_count >= pair[0].stitch_count);
  }
  assert_eq!(
    guard.counters(),
    Counters {
      node_count: 1,
      storage_count: 1,
      stitch_count: 1,
    }
  );
}

#[tokio::test]
async fn test_storage_unknown_target_is_not_found_and_not_queued() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  let err = guard
    .process_storage(&storage("ghost"), false)
    .await
    .unwrap_err();

  assert!(matches!(err, OrchestratorError::NotFound { .. }));
  assert_eq!(guard.deferred_len(), 0);
  assert_eq!(backend.ledger("A").storage_calls, 0);
}

#[tokio::test]
async fn test_storage_routes_to_owning_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  guard.process_compute(&compute("B"), false).await.unwrap();

  let outcome = guard.process_storage(&storage("node2"), false).await.unwrap();

  assert_eq!(outcome, Outcome::Completed(1));
  assert_eq!(backend.ledger("A").storage_calls, 0);
  assert_eq!(backend.ledger("B").storage_calls, 1);
}

#[tokio::test]
async fn test_deferred_stitch_is_queued() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  backend.reply("A", Reply::Defer);
  let outcome = guard.process_stitch(&stitch("node1"), false).await.unwrap();

  assert!(outcome.is_deferred());
  assert_eq!(guard.deferred_len(), 1);
  assert_eq!(guard.counters().stitch_count, 0);
}

#[tokio::test]
async fn test_script_delivered_to_qualified_host() {
  let backend = ScriptedBackend::new();
  backend.local_network_family("Chameleon");
  let metadata = Arc::new(RecordingMetadata::default());
  let env = WorkflowEnv::new(Arc::new(backend.clone())).with_metadata_sink(metadata.clone());
  let workflow = Workflow::new(WORKFLOW_ID, Arc::new(env));
  let mut guard = workflow.lock().await;
  guard
    .process_compute(&compute("Chameleon:CHI@UC"), false)
    .await
    .unwrap();

  let script = ScriptRequest {
    target: "node1".into(),
    name: "setup".into(),
    script: "yum install -y htop".into(),
  };
  guard.process_script(&script, false).await.unwrap();

  let entries = metadata.entries.lock().unwrap();
  assert_eq!(
    *entries,
    vec![(
      WORKFLOW_ID.to_string(),
      "node1.novalocal".to_string(),
      "setup".to_string(),
      "yum install -y htop".to_string(),
    )]
  );
  assert_eq!(guard.counters().node_count, 1);
}

#[tokio::test]
async fn test_script_without_metadata_sink_is_accepted() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();

  let script = ScriptRequest {
    target: "node1".into(),
    name: "noop".into(),
    script: "true".into(),
  };
  assert!(guard.process_script(&script, false).await.is_ok());
  assert_eq!(guard.deferred_len(), 0);
}

#[tokio::test]
async fn test_sdx_prefix_routes_to_source_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  guard.process_compute(&compute("B"), false).await.unwrap();

  let prefix = SdxPrefix {
    source: "node2".into(),
    gateway_ip: "10.0.0.1".into(),
    source_subnet: "10.0.0.0/24".into(),
    dest_subnet: Some("10.1.0.0/24".into()),
    bandwidth: None,
  };
  guard.process_sdx_prefix(&prefix).await.unwrap();

  assert_eq!(backend.ledger("A").sdx_calls, 0);
  assert_eq!(backend.ledger("B").sdx_calls, 1);
}

#[tokio::test]
async fn test_reprovision_request_targets_host_slice() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;

  let mut request = compute("A");
  request.host_name_prefix = Some("worker".into());
  request.image_name = Some("centos7".into());
  guard.process_compute(&request, false).await.unwrap();

  let next = guard.reprovision_request("worker1").unwrap();
  assert_eq!(next.slice_policy, SlicePolicy::Existing);
  assert_eq!(next.slice_name, Some(format!("{WORKFLOW_ID}-A")));
  assert_eq!(next.host_name_prefix.as_deref(), Some("workerMON"));
  assert_eq!(next.image_name.as_deref(), Some("centos7"));

  // The template is directly usable for scale-out.
  guard.process_compute(&next, false).await.unwrap();
  assert!(guard.host_request("workerMON2").is_some());

  assert!(matches!(
    guard.reprovision_request("ghost"),
    Err(OrchestratorError::NotFound { .. })
  ));
}

fn stitch_settings() -> OrchestratorSettings {
  OrchestratorSettings {
    stitch_ports: HashMap::from([
      ("UC".to_string(), "http://uc-port".to_string()),
      ("TACC".to_string(), "http://tacc-port".to_string()),
    ]),
    ..Default::default()
  }
}

fn stitched_compute(site: &str) -> meridian_config::ComputeRequest {
  let mut request = compute(site);
  request.stitch_port_url = Some("http://client-port".into());
  request.stitch_tag = Some("3291".into());
  request.stitch_bandwidth = Some("10000000".into());
  request
}

#[tokio::test]
async fn test_companion_stitch_through_connecting_site() {
  let backend = ScriptedBackend::new();
  backend.vlan("Chameleon:CHI@UC", "vlan-42");
  let workflow = Workflow::new(WORKFLOW_ID, env_with_settings(&backend, &stitch_settings()));
  let mut guard = workflow.lock().await;

  guard
    .process_compute(&stitched_compute("Chameleon:CHI@UC"), false)
    .await
    .unwrap();

  assert_eq!(guard.site_keys(), vec!["Chameleon:CHI@UC", "Exogeni"]);
  assert_eq!(guard.counters().stitch_count, 1);
  let ledger = backend.ledger("Exogeni");
  let peer = &ledger.peer_stitches[0];
  assert_eq!(peer.vlan_id, "vlan-42");
  assert_eq!(peer.tag, "3291");
  assert_eq!(peer.port_url, "http://client-port");
  assert_eq!(peer.destination_url, "http://uc-port");

  // A second stitched request reuses the connecting site.
  guard
    .process_compute(&stitched_compute("Chameleon:CHI@UC"), false)
    .await
    .unwrap();
  assert_eq!(backend.ledger("Exogeni").created, 1);
  assert_eq!(backend.ledger("Exogeni").peer_stitches.len(), 2);
  assert_eq!(guard.counters().stitch_count, 2);
}

#[tokio::test]
async fn test_no_companion_stitch_without_vlan() {
  let backend = ScriptedBackend::new();
  let workflow = Workflow::new(WORKFLOW_ID, env_with_settings(&backend, &stitch_settings()));
  let mut guard = workflow.lock().await;

  guard
    .process_compute(&stitched_compute("Jetstream:TACC"), false)
    .await
    .unwrap();

  assert_eq!(guard.site_keys(), vec!["Jetstream:TACC"]);
  assert_eq!(backend.ledger("Exogeni").created, 0);
}

#[tokio::test]
async fn test_companion_stitch_failure_rolls_back_everything() {
  let backend = ScriptedBackend::new();
  backend.vlan("Chameleon:CHI@TACC", "vlan-7");
  backend.reply("Exogeni", Reply::Fail);
  let workflow = Workflow::new(WORKFLOW_ID, env_with_settings(&backend, &stitch_settings()));
  let mut guard = workflow.lock().await;

  let err = guard
    .process_compute(&stitched_compute("Chameleon:CHI@TACC"), false)
    .await
    .unwrap_err();

  assert!(matches!(err, OrchestratorError::Backend { ref site, .. } if site == "Exogeni"));
  assert!(guard.site_keys().is_empty());
  assert!(guard.host_requests().is_empty());
  assert_eq!(guard.counters(), Counters::default());
  assert_eq!(backend.ledger("Chameleon:CHI@TACC").stop_calls, 1);
  assert_eq!(backend.ledger("Exogeni").stop_calls, 1);
}

#[tokio::test]
async fn test_companion_stitch_without_port_configured() {
  let backend = ScriptedBackend::new();
  backend.vlan("Chameleon:CHI@KVM", "vlan-9");
  let workflow = Workflow::new(WORKFLOW_ID, env_with_settings(&backend, &stitch_settings()));
  let mut guard = workflow.lock().await;

  let err = guard
    .process_compute(&stitched_compute("Chameleon:CHI@KVM"), false)
    .await
    .unwrap_err();

  assert!(matches!(err, OrchestratorError::BadRequest { .. }));
  assert!(!guard.has_site("Chameleon:CHI@KVM"));
  assert_eq!(backend.ledger("Chameleon:CHI@KVM").stop_calls, 1);
}

#[tokio::test]
async fn test_stop_releases_every_site() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  guard.process_compute(&compute("B"), false).await.unwrap();
  guard
    .process_network(&link(NetworkAction::Add, "node1", "node2"), false)
    .await
    .unwrap();

  guard.stop().await.unwrap();

  assert!(guard.site_keys().is_empty());
  assert!(guard.link_requests().is_empty());
  assert!(guard.host_requests().is_empty());
  assert_eq!(backend.ledger("A").stop_calls, 1);
  assert_eq!(backend.ledger("B").stop_calls, 1);
  assert_eq!(guard.status(), serde_json::json!([]));
}

#[tokio::test]
async fn test_lock_is_released_with_guard() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  assert!(!workflow.locked());

  {
    let mut guard = workflow.lock().await;
    assert!(workflow.locked());
    // Error paths release too.
    let _ = guard.process_storage(&storage("ghost"), false).await;
  }

  assert!(!workflow.locked());
}

#[tokio::test]
async fn test_status_lists_sites_with_hosts() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  assert_eq!(workflow.status().await, serde_json::json!([]));

  {
    let mut guard = workflow.lock().await;
    guard.process_compute(&compute("A"), false).await.unwrap();
    guard.process_compute(&compute("B"), false).await.unwrap();
  }

  let status = workflow.status().await;
  let sites: Vec<_> = status
    .as_array()
    .unwrap()
    .iter()
    .map(|s| s["site"].as_str().unwrap().to_string())
    .collect();
  assert_eq!(sites, vec!["A", "B"]);
}

#[tokio::test]
async fn test_stopped_workflow_rejects_requests() {
  let backend = ScriptedBackend::new();
  let workflow = workflow(&backend);
  let mut guard = workflow.lock().await;
  guard.process_compute(&compute("A"), false).await.unwrap();
  guard.stop().await.unwrap();
  assert!(guard.is_stopped());

  let err = guard
    .process_compute(&compute("B"), false)
    .await
    .unwrap_err();
  assert!(matches!(err, OrchestratorError::NotFound { .. }));
  assert_eq!(backend.ledger("B").created, 0);

  let err = guard
    .process_network(&link(NetworkAction::Add, "node1", "node2"), false)
    .await
    .unwrap_err();
  assert!(matches!(err, OrchestratorError::NotFound { .. }));

  let report = guard.reconcile().await;
  assert_eq!(report.retried, 0);
  assert_eq!(backend.ledger("A").refresh_calls, 0);
  assert!(guard.site_keys().is_empty());
}
