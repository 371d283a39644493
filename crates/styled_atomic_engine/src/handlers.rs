use indexmap::IndexMap;
use inflector::Inflector;
use serde::Serialize;
use swc_core::common::Span;

use crate::adapter::{Adapter, CrossFileFacts};
use crate::context::{
  num_to_string, BranchExpr, BranchValue, ConditionalInfo, DynamicNodeContext, ExpressionShape,
};
use crate::css::{compile_block, CssCompiler};
use crate::diagnostics::WarningCategory;
use crate::types::{EngineOptions, FileFacts};

/// One prop-truthiness constraint on a variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropCondition {
  pub prop: String,
  pub truthy: bool,
}

/// A named style fragment applied when all of `conditions` hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariantDef {
  pub name: String,
  pub conditions: Vec<PropCondition>,
  pub styles: IndexMap<String, String>,
}

/// A declaration re-expressed as a small parameterized style function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DynamicFnDescriptor {
  /// Sanitized prop name keying the function.
  pub prop: String,
  pub css_property: String,
  /// Member path after the props root.
  pub value_path: Vec<String>,
  /// Literal text around the interpolation inside the declaration value.
  pub prefix: String,
  pub suffix: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BailInfo {
  pub category: WarningCategory,
  pub message: String,
  #[serde(skip)]
  pub span: Option<Span>,
}

impl BailInfo {
  fn new(category: WarningCategory, message: impl Into<String>, span: Span) -> Self {
    Self {
      category,
      message: message.into(),
      span: Some(span),
    }
  }
}

/// Exactly one decision is produced per dynamic node context. `Bail` is
/// terminal for the enclosing declaration; the IR builder widens it to the
/// whole definition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Decision {
  /// Replace the interpolation with static text.
  Convert(String),
  /// Expand a static style snippet in place (possibly empty: declaration is
  /// dropped entirely, e.g. both conditional branches omit).
  ConvertDeclarations(Vec<(String, String)>),
  Variant {
    base: IndexMap<String, String>,
    prop: String,
    variants: Vec<VariantDef>,
  },
  DynamicStyleFn(DynamicFnDescriptor),
  Bail(BailInfo),
}

/// Everything a handler may consult besides the context itself. Handlers are
/// pure classifiers; the environment is read-only.
pub struct ResolveEnv<'a> {
  pub adapter: &'a dyn Adapter,
  pub facts: &'a FileFacts,
  pub cross_file: &'a CrossFileFacts,
  pub options: &'a EngineOptions,
  pub compiler: &'a dyn CssCompiler,
}

type Handler = fn(&DynamicNodeContext, &ResolveEnv<'_>) -> Option<Decision>;

/// Fixed-order handler chain: the first non-empty result wins. The catalog
/// of shapes is closed, so the chain is exhaustive by construction.
const HANDLERS: &[Handler] = &[
  handle_selector_context,
  handle_keyframes,
  handle_css_snippet,
  handle_conditional,
  handle_logical,
  handle_theme_access,
  handle_prop_access,
  handle_helper_call,
  handle_component_ref,
  handle_static,
  handle_opaque,
];

pub fn resolve_dynamic_node(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Decision {
  for handler in HANDLERS {
    if let Some(decision) = handler(cx, env) {
      tracing::debug!(shape = ?cx.shape, decision = ?decision_kind(&decision), "resolved dynamic node");
      return decision;
    }
  }
  Decision::Bail(BailInfo::new(
    WarningCategory::AdapterReturnedUnresolved,
    "expression shape outside the supported catalog",
    cx.span,
  ))
}

fn decision_kind(decision: &Decision) -> &'static str {
  match decision {
    Decision::Convert(_) => "convert",
    Decision::ConvertDeclarations(_) => "convert-declarations",
    Decision::Variant { .. } => "variant",
    Decision::DynamicStyleFn(_) => "dynamic-style-fn",
    Decision::Bail(_) => "bail",
  }
}

// Selector-position resolution runs first: every shape is judged against the
// cross-component policy before any value-position handler can claim it.
fn handle_selector_context(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if !cx.in_selector {
    return None;
  }
  if cx.shape == ExpressionShape::ComponentRef {
    let name = cx.component_name.as_deref().unwrap_or_default();
    if cx.suffix.contains('&') {
      // `${Other}:hover &` — parent-state selectors have no static-atomic
      // equivalent; conversion always requires a manual bridge strategy.
      return Some(Decision::Bail(BailInfo::new(
        WarningCategory::UnsupportedSelector,
        format!("cross-component parent selector on `{name}` cannot be converted"),
        cx.span,
      )));
    }
    if let Some(status) = env.cross_file.get(name) {
      return Some(Decision::Convert(format!(".{}", status.class_name())));
    }
    if let Some(resolved) = env.adapter.resolve_selector(cx) {
      return Some(Decision::Convert(resolved));
    }
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::UnsupportedSelector,
      format!("component `{name}` used as a selector has no known bridge or marker"),
      cx.span,
    )));
  }
  if let Some(resolved) = env.adapter.resolve_selector(cx) {
    return Some(Decision::Convert(resolved));
  }
  if cx.shape == ExpressionShape::Static {
    if let Some(source) = &cx.source {
      return Some(Decision::Convert(source.clone()));
    }
  }
  Some(Decision::Bail(BailInfo::new(
    WarningCategory::UnsupportedSelector,
    "interpolated selector could not be resolved to static text",
    cx.span,
  )))
}

fn handle_keyframes(cx: &DynamicNodeContext, _env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::KeyframesRef {
    return None;
  }
  // Prefer the known animation name; fall back to the reference text.
  let text = cx
    .animation_name
    .clone()
    .or_else(|| cx.source.clone())
    .unwrap_or_default();
  Some(Decision::Convert(text))
}

fn handle_css_snippet(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::CssSnippet {
    return None;
  }
  let Some(body) = &cx.snippet_body else {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::ClosureVariableInStaticHelper,
      "style snippet closes over variables that cannot be resolved statically",
      cx.span,
    )));
  };
  if cx.css_property.is_some() {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::UnsupportedCssHelper,
      "style snippet used as a declaration value",
      cx.span,
    )));
  }
  match compile_snippet(env.compiler, body) {
    Some(styles) => Some(Decision::ConvertDeclarations(styles)),
    None => Some(Decision::Bail(BailInfo::new(
      WarningCategory::UnsupportedCssHelper,
      "style snippet contains nested rules or unparsable text",
      cx.span,
    ))),
  }
}

fn handle_conditional(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::Conditional {
    return None;
  }
  let info = cx.conditional.as_ref()?;
  if let Some(bail) = boolean_branch_bail(info, cx) {
    return Some(Decision::Bail(bail));
  }
  let Some(prop) = info.prop.clone() else {
    return Some(unresolved_conditional_fallback(cx, env, info));
  };

  let mut entries: Vec<(Vec<PropCondition>, IndexMap<String, String>)> = Vec::new();
  let mut saw_omit = false;
  if let Err(bail) = flatten_conditional(cx, env, info, &prop, &[], &mut entries, &mut saw_omit) {
    return Some(Decision::Bail(bail));
  }

  let mut base = IndexMap::new();
  let mut variants = Vec::new();
  for (conditions, styles) in entries {
    let all_false = conditions.iter().all(|c| !c.truthy);
    if all_false && !saw_omit {
      // The all-flags-absent path is the base bucket; truthy variants
      // override it.
      base.extend(styles);
    } else {
      variants.push(VariantDef {
        name: variant_name(&conditions),
        conditions,
        styles,
      });
    }
  }
  if base.is_empty() && variants.is_empty() {
    return Some(Decision::ConvertDeclarations(Vec::new()));
  }
  Some(Decision::Variant {
    base,
    prop,
    variants,
  })
}

fn handle_logical(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::Logical {
    return None;
  }
  let info = cx.logical.as_ref()?;
  if matches!(info.value.value, BranchValue::Bool(_)) {
    return Some(Decision::Bail(boolean_bail(cx)));
  }
  let Some(prop) = info.prop.clone() else {
    if let Some(resolved) = env.adapter.resolve_value(cx) {
      return Some(Decision::Convert(resolved));
    }
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::AdapterReturnedUnresolved,
      "logical style requires a resolvable prop name",
      cx.span,
    )));
  };
  let styles = match branch_styles(cx, env, &info.value) {
    Ok(Some(styles)) => styles,
    Ok(None) => return Some(Decision::ConvertDeclarations(Vec::new())),
    Err(bail) => return Some(Decision::Bail(bail)),
  };
  let conditions = vec![PropCondition {
    prop: prop.clone(),
    truthy: true,
  }];
  Some(Decision::Variant {
    base: IndexMap::new(),
    prop,
    variants: vec![VariantDef {
      name: variant_name(&conditions),
      conditions,
      styles,
    }],
  })
}

fn handle_theme_access(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::ThemeAccess {
    return None;
  }
  if let Some(resolved) = env.adapter.resolve_value(cx) {
    return Some(Decision::Convert(resolved));
  }
  let path = cx.prop_path.as_deref().unwrap_or_default();
  if path.is_empty() {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::AdapterReturnedUnresolved,
      "theme access has no token path",
      cx.span,
    )));
  }
  Some(Decision::Convert(path.join("-")))
}

fn handle_prop_access(cx: &DynamicNodeContext, _env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::PropAccess {
    return None;
  }
  let Some(css_property) = cx.css_property.clone() else {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::UnsupportedCssHelper,
      "prop access outside a declaration value",
      cx.span,
    )));
  };
  let path = cx.prop_path.clone().unwrap_or_default();
  let prop = path.last().map(|p| sanitize_prop(p)).unwrap_or_default();
  if prop.is_empty() {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::AdapterReturnedUnresolved,
      "prop access has no usable path",
      cx.span,
    )));
  }
  Some(Decision::DynamicStyleFn(DynamicFnDescriptor {
    prop,
    css_property,
    value_path: path,
    prefix: cx.prefix.clone(),
    suffix: cx.suffix.clone(),
  }))
}

fn handle_helper_call(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::HelperCall {
    return None;
  }
  if cx.call_captures_props {
    return Some(Decision::Bail(BailInfo::new(
      WarningCategory::HelperCallUnresolved,
      "helper call captures the props parameter and cannot be re-targeted",
      cx.span,
    )));
  }
  if let Some(resolved) = env.adapter.resolve_call(cx) {
    return Some(Decision::Convert(resolved));
  }
  // Preserve the original call text; the emitter re-targets the call to an
  // equivalent static helper.
  match &cx.source {
    Some(source) => Some(Decision::Convert(source.clone())),
    None => Some(Decision::Bail(BailInfo::new(
      WarningCategory::HelperCallUnresolved,
      "helper call could not be printed for re-targeting",
      cx.span,
    ))),
  }
}

fn handle_component_ref(cx: &DynamicNodeContext, _env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::ComponentRef {
    return None;
  }
  // Outside a selector the reference is benign.
  Some(Decision::Convert(cx.source.clone().unwrap_or_default()))
}

fn handle_static(cx: &DynamicNodeContext, _env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::Static {
    return None;
  }
  cx.source.clone().map(Decision::Convert)
}

fn handle_opaque(cx: &DynamicNodeContext, env: &ResolveEnv<'_>) -> Option<Decision> {
  if cx.shape != ExpressionShape::Opaque {
    return None;
  }
  if let Some(resolved) = env.adapter.resolve_value(cx) {
    return Some(Decision::Convert(resolved));
  }
  Some(Decision::Bail(BailInfo::new(
    WarningCategory::AdapterReturnedUnresolved,
    "expression could not be resolved to a static construct",
    cx.span,
  )))
}

// Branch plumbing.

fn boolean_bail(cx: &DynamicNodeContext) -> BailInfo {
  BailInfo::new(
    WarningCategory::BooleanCssValue,
    "boolean literal used as a CSS value (the omit-declaration convention); \
     stringifying it would change behavior",
    cx.span,
  )
}

fn boolean_branch_bail(info: &ConditionalInfo, cx: &DynamicNodeContext) -> Option<BailInfo> {
  fn branch_has_bool(branch: &BranchExpr) -> bool {
    if matches!(branch.value, BranchValue::Bool(_)) {
      return true;
    }
    branch
      .nested
      .as_ref()
      .is_some_and(|inner| branch_has_bool(&inner.cons) || branch_has_bool(&inner.alt))
  }
  if branch_has_bool(&info.cons) || branch_has_bool(&info.alt) {
    Some(boolean_bail(cx))
  } else {
    None
  }
}

/// The documented lossy fallback: when the prop driving a conditional cannot
/// be resolved, degrade to the branch that applies when the flag is absent.
fn unresolved_conditional_fallback(
  cx: &DynamicNodeContext,
  env: &ResolveEnv<'_>,
  info: &ConditionalInfo,
) -> Decision {
  if !env.options.strict_conditionals {
    if let BranchValue::Str(_) | BranchValue::Num(_) | BranchValue::Other(_) = info.alt.value {
      if info.alt.nested.is_none() {
        if let Some(value) = branch_css_value(&info.alt.value, cx.css_property.as_deref()) {
          tracing::debug!(property = ?cx.css_property, "degrading unresolvable conditional to its falsy branch");
          return Decision::Convert(value);
        }
      }
    }
  }
  if let Some(resolved) = env.adapter.resolve_value(cx) {
    return Decision::Convert(resolved);
  }
  Decision::Bail(BailInfo::new(
    WarningCategory::AdapterReturnedUnresolved,
    "conditional test does not resolve to a single prop",
    cx.span,
  ))
}

fn flatten_conditional(
  cx: &DynamicNodeContext,
  env: &ResolveEnv<'_>,
  info: &ConditionalInfo,
  prop: &str,
  prefix: &[PropCondition],
  entries: &mut Vec<(Vec<PropCondition>, IndexMap<String, String>)>,
  saw_omit: &mut bool,
) -> Result<(), BailInfo> {
  let with = |truthy: bool| {
    let mut conditions = prefix.to_vec();
    conditions.push(PropCondition {
      prop: prop.to_string(),
      truthy,
    });
    conditions
  };
  for (branch, truthy) in [(&info.cons, true), (&info.alt, false)] {
    let conditions = with(truthy);
    if let Some(inner) = &branch.nested {
      let Some(inner_prop) = inner.prop.clone() else {
        return Err(BailInfo::new(
          WarningCategory::AdapterReturnedUnresolved,
          "nested conditional test does not resolve to a single prop",
          branch.span,
        ));
      };
      flatten_conditional(cx, env, inner, &inner_prop, &conditions, entries, saw_omit)?;
      continue;
    }
    match branch_styles(cx, env, branch) {
      Ok(Some(styles)) => entries.push((conditions, styles)),
      Ok(None) => *saw_omit = true,
      Err(bail) => return Err(bail),
    }
  }
  Ok(())
}

/// Resolve one branch to a style map: `Ok(None)` means the declaration is
/// omitted on this branch.
fn branch_styles(
  cx: &DynamicNodeContext,
  env: &ResolveEnv<'_>,
  branch: &BranchExpr,
) -> Result<Option<IndexMap<String, String>>, BailInfo> {
  match &branch.value {
    BranchValue::Bool(_) => Err(boolean_bail(cx)),
    BranchValue::Absent => Ok(None),
    BranchValue::Snippet(body) => {
      if cx.css_property.is_some() {
        return Err(BailInfo::new(
          WarningCategory::UnsupportedCssHelper,
          "style snippet used as a declaration value",
          branch.span,
        ));
      }
      match compile_snippet(env.compiler, body) {
        Some(styles) => Ok(Some(styles.into_iter().collect())),
        None => Err(BailInfo::new(
          WarningCategory::UnsupportedCssHelper,
          "style snippet contains nested rules or unparsable text",
          branch.span,
        )),
      }
    }
    BranchValue::DynamicSnippet => Err(BailInfo::new(
      WarningCategory::ClosureVariableInStaticHelper,
      "style snippet closes over variables that cannot be resolved statically",
      branch.span,
    )),
    value => {
      let Some(css_property) = cx.css_property.as_deref() else {
        return Err(BailInfo::new(
          WarningCategory::UnsupportedCssHelper,
          "dynamic value outside a declaration",
          branch.span,
        ));
      };
      match branch_css_value(value, Some(css_property)) {
        Some(text) => {
          let mut styles = IndexMap::new();
          let full = format!("{}{}{}", cx.prefix, text, cx.suffix);
          styles.insert(css_property.to_string(), full.trim().to_string());
          Ok(Some(styles))
        }
        None => Err(BailInfo::new(
          WarningCategory::AdapterReturnedUnresolved,
          "branch value could not be resolved to static text",
          branch.span,
        )),
      }
    }
  }
}

fn branch_css_value(value: &BranchValue, css_property: Option<&str>) -> Option<String> {
  match value {
    BranchValue::Str(s) => Some(s.clone()),
    BranchValue::Num(n) => {
      let mut text = num_to_string(*n);
      let unitless = css_property.map(is_unitless_property).unwrap_or(true);
      if !unitless && *n != 0.0 {
        text.push_str("px");
      }
      Some(text)
    }
    BranchValue::Other(source) => Some(source.clone()),
    _ => None,
  }
}

fn compile_snippet(compiler: &dyn CssCompiler, body: &str) -> Option<Vec<(String, String)>> {
  let compiled = compile_block(compiler, body).ok()?;
  let mut styles = Vec::new();
  for rule in &compiled.rules {
    if rule.selector != "&" || !rule.at_rules.is_empty() || rule.unsupported_at_rule.is_some() {
      return None;
    }
    for decl in &rule.declarations {
      if decl.is_mixin() || crate::template::find_slots(&decl.value).first().is_some() {
        return None;
      }
      styles.push((decl.property.clone(), decl.value.clone()));
    }
  }
  Some(styles)
}

pub fn sanitize_prop(prop: &str) -> String {
  prop
    .trim_start_matches('$')
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
    .collect::<String>()
    .trim_matches('_')
    .to_string()
}

/// Derive a variant name from its conditions: `$on` → `On`, a negated
/// condition gains a `Not` prefix, compound conditions concatenate.
pub fn variant_name(conditions: &[PropCondition]) -> String {
  let mut name = String::new();
  for condition in conditions {
    if !condition.truthy {
      name.push_str("Not");
    }
    name.push_str(&sanitize_prop(&condition.prop).to_pascal_case());
  }
  name
}

fn is_unitless_property(name: &str) -> bool {
  matches!(
    name,
    "opacity"
      | "z-index"
      | "flex"
      | "flex-grow"
      | "flex-shrink"
      | "font-weight"
      | "line-height"
      | "order"
      | "orphans"
      | "widows"
      | "zoom"
      | "animation-iteration-count"
  )
}
