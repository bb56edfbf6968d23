use std::collections::BTreeMap;

use meridian_site::SiteContext;

use crate::OrchestratorError;

/// Site key to the one context a workflow holds for that site.
#[derive(Default)]
pub struct SiteRegistry {
  contexts: BTreeMap<String, Box<dyn SiteContext>>,
}

impl SiteRegistry {
  pub fn is_empty(&self) -> bool {
    self.contexts.is_empty()
  }

  pub fn len(&self) -> usize {
    self.contexts.len()
  }

  pub fn contains(&self, site: &str) -> bool {
    self.contexts.contains_key(site)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.contexts.keys().map(String::as_str)
  }

  pub fn get(&self, site: &str) -> Option<&dyn SiteContext> {
    self.contexts.get(site).map(|c| &**c)
  }

  pub fn get_mut(&mut self, site: &str) -> Option<&mut (dyn SiteContext + 'static)> {
    self.contexts.get_mut(site).map(|c| &mut **c)
  }

  /// Register a context. A key that is already taken keeps its context and
  /// the new one is handed back.
  pub fn insert(
    &mut self,
    site: String,
    context: Box<dyn SiteContext>,
  ) -> Result<(), Box<dyn SiteContext>> {
    if self.contexts.contains_key(&site) {
      return Err(context);
    }
    self.contexts.insert(site, context);
    Ok(())
  }

  pub fn remove(&mut self, site: &str) -> Option<Box<dyn SiteContext>> {
    self.contexts.remove(site)
  }

  /// Key of the site that owns `host`.
  pub fn site_of_host(&self, host: &str) -> Option<String> {
    self
      .contexts
      .iter()
      .find(|(_, c)| c.contains_host(host))
      .map(|(site, _)| site.clone())
  }

  /// Key of the site that owns allocation `slice`.
  pub fn site_of_slice(&self, slice: &str) -> Option<String> {
    self
      .contexts
      .iter()
      .find(|(_, c)| c.contains_slice(slice))
      .map(|(site, _)| site.clone())
  }

  /// The context owning `host`, failing with `NotFound` when the workflow
  /// has no contexts at all or none of them holds the host.
  pub fn context_for_host(
    &mut self,
    host: &str,
  ) -> Result<&mut (dyn SiteContext + 'static), OrchestratorError> {
    if self.contexts.is_empty() {
      return Err(OrchestratorError::not_found("workflow has no site contexts"));
    }
    self
      .contexts
      .values_mut()
      .find(|c| c.contains_host(host))
      .map(|c| &mut **c)
      .ok_or_else(|| OrchestratorError::not_found(format!("target '{host}' not found")))
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn SiteContext)> {
    self.contexts.iter().map(|(k, c)| (k.as_str(), &**c))
  }

  pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut (dyn SiteContext + 'static))> {
    self.contexts.iter_mut().map(|(k, c)| (k.as_str(), &mut **c))
  }

  /// Remove every context, in key order.
  pub fn drain(&mut self) -> Vec<(String, Box<dyn SiteContext>)> {
    std::mem::take(&mut self.contexts).into_iter().collect()
  }
}
