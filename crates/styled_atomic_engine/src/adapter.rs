use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::context::DynamicNodeContext;

/// Style-merger descriptor consumed only by the emitter (function name plus
/// its import source).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMerger {
  pub function: String,
  pub import_source: String,
}

/// Capability set supplied by the host application for project-specific
/// resolution. Returning `None` for a context the engine could not resolve
/// itself is an ordinary bail, not an engine fault.
pub trait Adapter {
  fn resolve_value(&self, _context: &DynamicNodeContext) -> Option<String> {
    None
  }

  fn resolve_call(&self, _context: &DynamicNodeContext) -> Option<String> {
    None
  }

  fn resolve_selector(&self, _context: &DynamicNodeContext) -> Option<String> {
    None
  }

  fn style_merger(&self) -> Option<StyleMerger> {
    None
  }
}

/// Adapter that resolves nothing; every ambiguous context bails.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAdapter;

impl Adapter for DefaultAdapter {}

/// Whether a referenced component's consumers are all being converted in the
/// same run, or at least one consumer stays unconverted and a bridge (a
/// stable, content-derived public class name) must already exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsumerStatus {
  AllConverting { marker_class: String },
  NeedsBridge { bridge_class: String },
}

impl ConsumerStatus {
  /// The class name the engine may substitute for the component reference.
  pub fn class_name(&self) -> &str {
    match self {
      ConsumerStatus::AllConverting { marker_class } => marker_class,
      ConsumerStatus::NeedsBridge { bridge_class } => bridge_class,
    }
  }
}

/// Read-only facts produced by the (out-of-scope) cross-file prepass, keyed
/// by the component name as visible in the current file.
#[derive(Clone, Debug, Default)]
pub struct CrossFileFacts {
  map: IndexMap<String, ConsumerStatus>,
}

impl CrossFileFacts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, component: impl Into<String>, status: ConsumerStatus) {
    self.map.insert(component.into(), status);
  }

  pub fn get(&self, component: &str) -> Option<&ConsumerStatus> {
    self.map.get(component)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_adapter_resolves_nothing() {
    let adapter = DefaultAdapter;
    assert!(adapter.style_merger().is_none());
  }

  #[test]
  fn consumer_status_exposes_class_names() {
    let mut facts = CrossFileFacts::new();
    facts.insert(
      "Icon",
      ConsumerStatus::NeedsBridge {
        bridge_class: "icon-b1c2".to_string(),
      },
    );
    assert_eq!(facts.get("Icon").unwrap().class_name(), "icon-b1c2");
    assert!(facts.get("Other").is_none());
  }
}
