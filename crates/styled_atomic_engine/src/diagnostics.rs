use serde::{Deserialize, Serialize};
use swc_core::common::Span;

/// Categorized reasons for refusing to convert a declaration or definition.
///
/// The kebab-case serialized names are a public contract: callers build
/// per-fixture expectations against category names, never message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningCategory {
  UnsupportedSelector,
  UnsupportedCssHelper,
  BooleanCssValue,
  ClosureVariableInStaticHelper,
  UniversalSelector,
  SpecificityHack,
  HigherOrderFactory,
  StaticPropertyOnComponent,
  AdapterReturnedUnresolved,
  HelperCallUnresolved,
}

impl WarningCategory {
  /// Stable name used in reports; identical to the serde representation.
  pub fn name(&self) -> &'static str {
    match self {
      WarningCategory::UnsupportedSelector => "unsupported-selector",
      WarningCategory::UnsupportedCssHelper => "unsupported-css-helper",
      WarningCategory::BooleanCssValue => "boolean-css-value",
      WarningCategory::ClosureVariableInStaticHelper => "closure-variable-in-static-helper",
      WarningCategory::UniversalSelector => "universal-selector",
      WarningCategory::SpecificityHack => "specificity-hack",
      WarningCategory::HigherOrderFactory => "higher-order-factory",
      WarningCategory::StaticPropertyOnComponent => "static-property-on-component",
      WarningCategory::AdapterReturnedUnresolved => "adapter-returned-unresolved",
      WarningCategory::HelperCallUnresolved => "helper-call-unresolved",
    }
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
  #[default]
  Warning,
  Error,
}

/// One diagnostic produced while resolving a definition. Append-only;
/// deduplication for reporting belongs to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Warning {
  pub severity: Severity,
  pub category: WarningCategory,
  pub message: String,
  #[serde(skip)]
  pub span: Option<Span>,
}

impl Warning {
  pub fn new(category: WarningCategory, message: impl Into<String>) -> Self {
    Self {
      severity: Severity::Warning,
      category,
      message: message.into(),
      span: None,
    }
  }

  pub fn with_span(mut self, span: Span) -> Self {
    self.span = Some(span);
    self
  }

  pub fn error(mut self) -> Self {
    self.severity = Severity::Error;
    self
  }
}

/// Caller-owned warning accumulator for the duration of one file's
/// processing. Passed by reference through the pipeline so the core stays
/// free of ambient mutable state.
#[derive(Debug, Default)]
pub struct Diagnostics {
  warnings: Vec<Warning>,
}

impl Diagnostics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, warning: Warning) {
    tracing::debug!(
      category = warning.category.name(),
      message = %warning.message,
      "diagnostic recorded"
    );
    self.warnings.push(warning);
  }

  pub fn warnings(&self) -> &[Warning] {
    &self.warnings
  }

  pub fn is_empty(&self) -> bool {
    self.warnings.is_empty()
  }

  pub fn len(&self) -> usize {
    self.warnings.len()
  }

  pub fn into_warnings(self) -> Vec<Warning> {
    self.warnings
  }

  /// Merge another accumulator (e.g. from a worker that processed an
  /// independent definition) into this one.
  pub fn merge(&mut self, other: Diagnostics) {
    self.warnings.extend(other.warnings);
  }
}

/// Malformed CSS reaching the rule compiler. This is the fatal tier: the
/// template splitter should never hand the compiler unparsable text, so a
/// parse failure indicates an upstream contract violation rather than an
/// expected unsupported pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CssParseError {
  #[error("unbalanced braces in CSS block (depth {depth} at byte {at})")]
  UnbalancedBraces { depth: usize, at: usize },
  #[error("unterminated {what} starting at byte {at}")]
  Unterminated { what: &'static str, at: usize },
  #[error("declaration `{text}` is missing a `:` separator")]
  MissingColon { text: String },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_names_are_stable() {
    assert_eq!(WarningCategory::SpecificityHack.name(), "specificity-hack");
    assert_eq!(WarningCategory::BooleanCssValue.name(), "boolean-css-value");
    assert_eq!(
      WarningCategory::ClosureVariableInStaticHelper.name(),
      "closure-variable-in-static-helper"
    );
  }

  #[test]
  fn serde_names_match_reported_names() {
    for category in [
      WarningCategory::UnsupportedSelector,
      WarningCategory::UnsupportedCssHelper,
      WarningCategory::BooleanCssValue,
      WarningCategory::ClosureVariableInStaticHelper,
      WarningCategory::UniversalSelector,
      WarningCategory::SpecificityHack,
      WarningCategory::HigherOrderFactory,
      WarningCategory::StaticPropertyOnComponent,
      WarningCategory::AdapterReturnedUnresolved,
      WarningCategory::HelperCallUnresolved,
    ] {
      let serialized = serde_json::to_string(&category).expect("serialize category");
      assert_eq!(serialized, format!("\"{}\"", category.name()));
    }
  }

  #[test]
  fn diagnostics_accumulate_and_merge() {
    let mut a = Diagnostics::new();
    a.push(Warning::new(WarningCategory::SpecificityHack, "a"));
    let mut b = Diagnostics::new();
    b.push(Warning::new(WarningCategory::UniversalSelector, "b"));
    a.merge(b);
    assert_eq!(a.len(), 2);
    assert_eq!(a.warnings()[1].category, WarningCategory::UniversalSelector);
  }
}
