#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use meridian_config::{
  ComputeRequest, NetworkAction, NetworkRequest, OrchestratorSettings, StitchRequest,
  StorageRequest,
};
use meridian_site::testing::ScriptedBackend;
use meridian_workflow::{MetadataSink, SinkError, Workflow, WorkflowEnv};

pub const WORKFLOW_ID: &str = "wf-1";

pub fn env(backend: &ScriptedBackend) -> Arc<WorkflowEnv> {
  Arc::new(WorkflowEnv::new(Arc::new(backend.clone())))
}

pub fn env_with_settings(
  backend: &ScriptedBackend,
  settings: &OrchestratorSettings,
) -> Arc<WorkflowEnv> {
  Arc::new(WorkflowEnv::from_settings(
    Arc::new(backend.clone()),
    settings,
  ))
}

pub fn workflow(backend: &ScriptedBackend) -> Workflow {
  Workflow::new(WORKFLOW_ID, env(backend))
}

pub fn compute(site: &str) -> ComputeRequest {
  ComputeRequest::for_site(site)
}

pub fn storage(target: &str) -> StorageRequest {
  StorageRequest {
    target: target.to_string(),
    size: 50,
    mount_point: Some("/data".to_string()),
    action: None,
    lease_start: None,
    lease_end: None,
  }
}

pub fn stitch(target: &str) -> StitchRequest {
  StitchRequest {
    target: target.to_string(),
    port: "http://geni-orca.renci.org/owl/port".to_string(),
    tag: "3000".to_string(),
    bandwidth: None,
    stitch_ip: None,
  }
}

/// A link between two hosts with distinct, host-derived addressing.
pub fn link(action: NetworkAction, source: &str, destination: &str) -> NetworkRequest {
  NetworkRequest {
    action,
    source: source.to_string(),
    source_ip: format!("{source}.ip"),
    source_subnet: format!("{source}.subnet"),
    source_local_subnet: None,
    destination: destination.to_string(),
    destination_ip: format!("{destination}.ip"),
    destination_subnet: format!("{destination}.subnet"),
    dest_local_subnet: None,
    link_speed: Some("1000000000".to_string()),
    sdx_controller_ip: None,
  }
}

/// Metadata sink that records every delivered script.
#[derive(Default)]
pub struct RecordingMetadata {
  pub entries: Mutex<Vec<(String, String, String, String)>>,
}

#[async_trait]
impl MetadataSink for RecordingMetadata {
  async fn create_script_entry(
    &self,
    workflow_id: &str,
    host: &str,
    name: &str,
    script: &str,
  ) -> Result<(), SinkError> {
    self.entries.lock().unwrap().push((
      workflow_id.to_string(),
      host.to_string(),
      name.to_string(),
      script.to_string(),
    ));
    Ok(())
  }
}
