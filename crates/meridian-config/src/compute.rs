use serde::{Deserialize, Serialize};

/// How a compute request chooses the allocation (slice) it lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlicePolicy {
  /// Let the site decide whether to reuse or create an allocation.
  #[default]
  Default,
  /// Always create a fresh allocation.
  New,
  /// Add to the allocation named by `slice_name`.
  Existing,
}

/// Request to provision one or more compute nodes on a site.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
  pub site: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cpus: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gpus: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ram_per_cpus: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub disk_per_cpus: Option<u32>,
  #[serde(default)]
  pub coallocate: bool,
  #[serde(default)]
  pub slice_policy: SlicePolicy,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub slice_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host_name_prefix: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bandwidth: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub network_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub physical_network: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub external_network: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub network_cidr: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_hash: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub post_boot_script: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub forceflavor: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stitch_port_url: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stitch_tag: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stitch_bandwidth: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lease_start: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lease_end: Option<String>,
}

impl ComputeRequest {
  /// Create a request for `site` with every optional field unset.
  pub fn for_site(site: impl Into<String>) -> Self {
    Self {
      site: site.into(),
      ..Default::default()
    }
  }

  /// True when the request must land in a named, already existing allocation.
  pub fn targets_existing_slice(&self) -> bool {
    self.slice_policy == SlicePolicy::Existing
  }

  /// True when a companion stitch to the connecting site was asked for.
  pub fn wants_stitch(&self) -> bool {
    self.stitch_port_url.is_some() && self.stitch_tag.is_some()
  }

  /// Derive the request that would add another node next to a host that
  /// lives in `slice_name`, if the backend reported one.
  ///
  /// With a slice the result targets that existing allocation. A host name
  /// prefix, when present, gets a `MON` suffix so scale-out nodes are
  /// distinguishable; without one no prefix is invented.
  pub fn reprovision_in(&self, slice_name: Option<&str>) -> Self {
    let mut next = self.clone();
    if let Some(slice_name) = slice_name {
      next.slice_policy = SlicePolicy::Existing;
      next.slice_name = Some(slice_name.to_string());
    }
    next.host_name_prefix = self
      .host_name_prefix
      .as_ref()
      .map(|prefix| format!("{prefix}MON"));
    next
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_optional_fields_are_omitted() {
    let request = ComputeRequest::for_site("Chameleon:CHI@UC");
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["site"], "Chameleon:CHI@UC");
    assert_eq!(json["slice_policy"], "default");
    assert!(json.get("image_url").is_none());
    assert!(json.get("stitch_tag").is_none());
  }

  #[test]
  fn test_minimal_document_parses() {
    let request: ComputeRequest =
      serde_json::from_str(r#"{"site": "Exogeni:RENCI", "cpus": 4}"#).unwrap();

    assert_eq!(request.cpus, Some(4));
    assert_eq!(request.slice_policy, SlicePolicy::Default);
    assert!(!request.coallocate);
  }

  #[test]
  fn test_wants_stitch_needs_port_and_tag() {
    let mut request = ComputeRequest::for_site("Chameleon:CHI@TACC");
    request.stitch_port_url = Some("http://port".into());
    assert!(!request.wants_stitch());

    request.stitch_tag = Some("3291".into());
    assert!(request.wants_stitch());
  }

  #[test]
  fn test_reprovision_targets_slice() {
    let mut request = ComputeRequest::for_site("Exogeni:RENCI");
    request.host_name_prefix = Some("worker".into());
    request.image_name = Some("centos".into());

    let next = request.reprovision_in(Some("slice-7"));

    assert_eq!(next.slice_policy, SlicePolicy::Existing);
    assert_eq!(next.slice_name.as_deref(), Some("slice-7"));
    assert_eq!(next.host_name_prefix.as_deref(), Some("workerMON"));
    assert_eq!(next.image_name.as_deref(), Some("centos"));
  }

  #[test]
  fn test_reprovision_without_prefix() {
    let next = ComputeRequest::for_site("Jetstream:TACC").reprovision_in(Some("s"));
    assert_eq!(next.host_name_prefix, None);
    assert_eq!(next.slice_name.as_deref(), Some("s"));
  }

  #[test]
  fn test_reprovision_without_slice_keeps_policy() {
    let mut request = ComputeRequest::for_site("Jetstream:TACC");
    request.host_name_prefix = Some("worker".into());

    let next = request.reprovision_in(None);

    assert_eq!(next.slice_policy, SlicePolicy::Default);
    assert_eq!(next.slice_name, None);
    assert_eq!(next.host_name_prefix.as_deref(), Some("workerMON"));
  }
}
