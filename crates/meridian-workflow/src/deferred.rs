use std::collections::VecDeque;

use meridian_config::{ComputeRequest, StitchRequest, StorageRequest};

/// A request accepted but not yet applied.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredRequest {
  Compute(ComputeRequest),
  Storage(StorageRequest),
  Stitch(StitchRequest),
}

/// Requests waiting for the next reconciliation tick, one FIFO per kind.
#[derive(Debug, Default)]
pub struct DeferredQueue {
  compute: VecDeque<ComputeRequest>,
  storage: VecDeque<StorageRequest>,
  stitch: VecDeque<StitchRequest>,
}

impl DeferredQueue {
  pub fn push(&mut self, request: DeferredRequest) {
    match request {
      DeferredRequest::Compute(r) => self.compute.push_back(r),
      DeferredRequest::Storage(r) => self.storage.push_back(r),
      DeferredRequest::Stitch(r) => self.stitch.push_back(r),
    }
  }

  pub fn len(&self) -> usize {
    self.compute.len() + self.storage.len() + self.stitch.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn compute_len(&self) -> usize {
    self.compute.len()
  }

  pub fn storage_len(&self) -> usize {
    self.storage.len()
  }

  pub fn stitch_len(&self) -> usize {
    self.stitch.len()
  }

  pub fn pop_compute(&mut self) -> Option<ComputeRequest> {
    self.compute.pop_front()
  }

  pub fn pop_storage(&mut self) -> Option<StorageRequest> {
    self.storage.pop_front()
  }

  pub fn pop_stitch(&mut self) -> Option<StitchRequest> {
    self.stitch.pop_front()
  }

  /// Everything queued, compute first, then storage, then stitch.
  pub fn pending(&self) -> Vec<DeferredRequest> {
    self
      .compute
      .iter()
      .cloned()
      .map(DeferredRequest::Compute)
      .chain(self.storage.iter().cloned().map(DeferredRequest::Storage))
      .chain(self.stitch.iter().cloned().map(DeferredRequest::Stitch))
      .collect()
  }

  pub fn clear(&mut self) {
    self.compute.clear();
    self.storage.clear();
    self.stitch.clear();
  }
}
