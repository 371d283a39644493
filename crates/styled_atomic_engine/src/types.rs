use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use swc_core::common::Span;
use swc_core::ecma::ast::Tpl;

/// Engine policy knobs, serde-compatible with the host application's
/// camelCase configuration files.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineOptions {
  /// Bail instead of degrading to the falsy branch when a conditional's
  /// prop name cannot be resolved. Off by default: the lossy fallback keeps
  /// the styling that applies when the flag is absent.
  pub strict_conditionals: bool,
  /// Treat universal selectors as convertible instead of bailing.
  pub allow_universal_selector: bool,
}

impl Default for EngineOptions {
  fn default() -> Self {
    Self {
      strict_conditionals: false,
      allow_universal_selector: false,
    }
  }
}

/// Per-file facts supplied by the caller's collection pass: which local
/// bindings are styled components, keyframes definitions (with their
/// animation name when known), and imported style helpers.
#[derive(Clone, Debug, Default)]
pub struct FileFacts {
  pub components: IndexSet<String>,
  pub keyframes: IndexMap<String, Option<String>>,
  pub helpers: IndexSet<String>,
}

impl FileFacts {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_component(mut self, name: impl Into<String>) -> Self {
    self.components.insert(name.into());
    self
  }

  pub fn with_keyframes(mut self, local: impl Into<String>, animation: Option<String>) -> Self {
    self.keyframes.insert(local.into(), animation);
    self
  }

  pub fn with_helper(mut self, name: impl Into<String>) -> Self {
    self.helpers.insert(name.into());
    self
  }
}

/// One styled-component definition handed to the engine: the CSS-in-JS
/// template plus the structural flags the caller's parse already knows.
#[derive(Clone, Debug)]
pub struct StyledDefinition {
  pub name: String,
  pub template: Tpl,
  pub span: Span,
  /// The styled factory is wrapped by another higher-order function; no
  /// static analysis can know what the wrapper does to props.
  pub wrapped_in_factory: bool,
  /// Static properties are attached to the component reference.
  pub has_static_members: bool,
}

impl StyledDefinition {
  pub fn new(name: impl Into<String>, template: Tpl, span: Span) -> Self {
    Self {
      name: name.into(),
      template,
      span,
      wrapped_in_factory: false,
      has_static_members: false,
    }
  }
}
