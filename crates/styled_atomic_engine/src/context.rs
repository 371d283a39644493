use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::*;

use crate::types::FileFacts;

/// Closed catalog of expression shapes the resolver understands. Anything
/// outside the catalog is `Opaque` and gets exactly one adapter chance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpressionShape {
  Static,
  KeyframesRef,
  CssSnippet,
  Conditional,
  Logical,
  ThemeAccess,
  PropAccess,
  HelperCall,
  ComponentRef,
  Opaque,
}

/// How the arrow parameter binds props, resolved once per expression.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ParamBinding {
  #[default]
  None,
  /// `(p) => ...`
  Ident(String),
  /// `({ $on: on, $big }) => ...` — pairs of (local, prop name).
  Destructured(Vec<(String, String)>),
}

impl ParamBinding {
  /// Map a bare identifier back to the prop it binds, if any.
  fn prop_for_local(&self, local: &str) -> Option<String> {
    match self {
      ParamBinding::Destructured(pairs) => pairs
        .iter()
        .find(|(l, _)| l == local)
        .map(|(_, prop)| prop.clone()),
      _ => None,
    }
  }

  fn is_param_ident(&self, name: &str) -> bool {
    matches!(self, ParamBinding::Ident(param) if param == name)
  }
}

/// A conditional/logical branch reduced to a value the engine can reason
/// about. `Bool` is kept distinct because boolean literals used as CSS values
/// are the library convention for "omit this declaration" and must bail.
#[derive(Clone, Debug, PartialEq)]
pub enum BranchValue {
  Str(String),
  Num(f64),
  Bool(bool),
  /// `undefined` / `null` — the declaration is omitted on this branch.
  Absent,
  /// A static nested style snippet (css helper body without interpolations).
  Snippet(String),
  /// A snippet with interpolations that close over outer variables.
  DynamicSnippet,
  /// Printable but not a literal (identifier, member chain, call).
  Other(String),
  Unprintable,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BranchExpr {
  pub value: BranchValue,
  /// Set when the branch is itself a conditional (nested variant source).
  pub nested: Option<Box<ConditionalInfo>>,
  pub span: Span,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConditionalInfo {
  /// Prop name driving the test, when it resolves to exactly one prop.
  pub prop: Option<String>,
  pub cons: BranchExpr,
  pub alt: BranchExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LogicalInfo {
  pub prop: Option<String>,
  pub value: BranchExpr,
}

/// Immutable input to the handler chain, built once per expression
/// occurrence. Handlers classify over the shape already extracted here; they
/// never re-parse expressions.
#[derive(Clone, Debug)]
pub struct DynamicNodeContext {
  pub shape: ExpressionShape,
  pub css_property: Option<String>,
  pub in_selector: bool,
  pub conditional: Option<ConditionalInfo>,
  pub logical: Option<LogicalInfo>,
  /// Member path after the props root (theme segment stripped for theme
  /// access).
  pub prop_path: Option<Vec<String>>,
  pub is_theme_access: bool,
  pub helper_name: Option<String>,
  pub component_name: Option<String>,
  /// For keyframes references: the known animation name, when one exists.
  pub animation_name: Option<String>,
  /// Static snippet body for `CssSnippet` shapes.
  pub snippet_body: Option<String>,
  /// True when a helper call's arguments capture the props parameter.
  pub call_captures_props: bool,
  /// Printable source of the expression, when it is in the printable set.
  pub source: Option<String>,
  /// Literal text around the slot inside the declaration value.
  pub prefix: String,
  pub suffix: String,
  pub span: Span,
}

impl DynamicNodeContext {
  fn new(shape: ExpressionShape, span: Span) -> Self {
    Self {
      shape,
      css_property: None,
      in_selector: false,
      conditional: None,
      logical: None,
      prop_path: None,
      is_theme_access: false,
      helper_name: None,
      component_name: None,
      animation_name: None,
      snippet_body: None,
      call_captures_props: false,
      source: None,
      prefix: String::new(),
      suffix: String::new(),
      span,
    }
  }
}

/// Where the expression occurrence sits inside the rule IR.
#[derive(Clone, Debug, Default)]
pub struct Occurrence<'a> {
  pub css_property: Option<&'a str>,
  pub in_selector: bool,
  pub prefix: &'a str,
  pub suffix: &'a str,
}

pub fn build_context(expr: &Expr, occurrence: &Occurrence<'_>, facts: &FileFacts) -> DynamicNodeContext {
  let expr = unwrap_parens(expr);
  let (binding, body) = match expr {
    Expr::Arrow(arrow) => match arrow_parts(arrow) {
      Some((binding, body)) => (binding, body),
      None => (ParamBinding::None, expr),
    },
    _ => (ParamBinding::None, expr),
  };
  let mut cx = analyze(unwrap_parens(body), &binding, facts);
  cx.css_property = occurrence.css_property.map(str::to_string);
  cx.in_selector = occurrence.in_selector;
  cx.prefix = occurrence.prefix.to_string();
  cx.suffix = occurrence.suffix.to_string();
  tracing::trace!(shape = ?cx.shape, property = ?cx.css_property, "built dynamic node context");
  cx
}

fn arrow_parts<'a>(arrow: &'a ArrowExpr) -> Option<(ParamBinding, &'a Expr)> {
  let body = match &*arrow.body {
    BlockStmtOrExpr::Expr(expr) => expr,
    // Statement bodies cannot be re-expressed statically.
    BlockStmtOrExpr::BlockStmt(_) => return None,
  };
  let binding = match arrow.params.first() {
    None => ParamBinding::None,
    Some(Pat::Ident(BindingIdent { id, .. })) => ParamBinding::Ident(id.sym.to_string()),
    Some(Pat::Object(obj)) => ParamBinding::Destructured(collect_binding_pairs(obj)),
    Some(_) => return None,
  };
  Some((binding, body))
}

fn collect_binding_pairs(obj: &ObjectPat) -> Vec<(String, String)> {
  let mut pairs = Vec::new();
  for prop in &obj.props {
    match prop {
      ObjectPatProp::KeyValue(kv) => {
        let key_name = match &kv.key {
          PropName::Ident(i) => i.sym.to_string(),
          PropName::Str(s) => s.value.to_string(),
          _ => continue,
        };
        if let Pat::Ident(BindingIdent { id, .. }) = &*kv.value {
          pairs.push((id.sym.to_string(), key_name));
        }
      }
      ObjectPatProp::Assign(assign) => {
        let local = assign.key.sym.to_string();
        pairs.push((local.clone(), local));
      }
      ObjectPatProp::Rest(_) => {}
    }
  }
  pairs
}

fn analyze(expr: &Expr, binding: &ParamBinding, facts: &FileFacts) -> DynamicNodeContext {
  let span = expr.span();
  match expr {
    Expr::Cond(cond) => {
      let mut cx = DynamicNodeContext::new(ExpressionShape::Conditional, span);
      cx.conditional = Some(ConditionalInfo {
        prop: resolve_prop_name(&cond.test, binding),
        cons: branch_expr(&cond.cons, binding, facts),
        alt: branch_expr(&cond.alt, binding, facts),
      });
      cx
    }
    Expr::Bin(bin) if bin.op == BinaryOp::LogicalAnd => {
      let mut cx = DynamicNodeContext::new(ExpressionShape::Logical, span);
      cx.logical = Some(LogicalInfo {
        prop: resolve_prop_name(&bin.left, binding),
        value: branch_expr(&bin.right, binding, facts),
      });
      cx
    }
    Expr::Ident(ident) => {
      let name = ident.sym.to_string();
      if let Some(animation) = facts.keyframes.get(&name) {
        let mut cx = DynamicNodeContext::new(ExpressionShape::KeyframesRef, span);
        cx.animation_name = animation.clone();
        cx.source = Some(name);
        return cx;
      }
      if facts.components.contains(&name) {
        let mut cx = DynamicNodeContext::new(ExpressionShape::ComponentRef, span);
        cx.component_name = Some(name.clone());
        cx.source = Some(name);
        return cx;
      }
      if let Some(prop) = binding.prop_for_local(&name) {
        let mut cx = DynamicNodeContext::new(ExpressionShape::PropAccess, span);
        cx.prop_path = Some(vec![prop]);
        cx.source = Some(name);
        return cx;
      }
      let mut cx = DynamicNodeContext::new(ExpressionShape::Static, span);
      cx.source = Some(name);
      cx
    }
    Expr::Member(_) => {
      if let Some(path) = props_relative_path(expr, binding) {
        if path.first().map(String::as_str) == Some("theme") {
          let mut cx = DynamicNodeContext::new(ExpressionShape::ThemeAccess, span);
          cx.is_theme_access = true;
          cx.prop_path = Some(path[1..].to_vec());
          cx.source = print_expr(expr);
          return cx;
        }
        let mut cx = DynamicNodeContext::new(ExpressionShape::PropAccess, span);
        cx.prop_path = Some(path);
        cx.source = print_expr(expr);
        return cx;
      }
      let mut cx = DynamicNodeContext::new(ExpressionShape::Static, span);
      cx.source = print_expr(expr);
      if cx.source.is_none() {
        cx.shape = ExpressionShape::Opaque;
      }
      cx
    }
    Expr::Call(call) => {
      let mut cx = DynamicNodeContext::new(ExpressionShape::HelperCall, span);
      let callee_name = match &call.callee {
        Callee::Expr(callee) => match unwrap_parens(callee) {
          Expr::Ident(ident) => Some(ident.sym.to_string()),
          _ => None,
        },
        _ => None,
      };
      match callee_name {
        Some(name) => {
          cx.helper_name = Some(name);
          cx.call_captures_props = call
            .args
            .iter()
            .any(|arg| references_binding(&arg.expr, binding));
          cx.source = print_expr(expr);
          cx
        }
        None => DynamicNodeContext::new(ExpressionShape::Opaque, span),
      }
    }
    Expr::TaggedTpl(tagged) => snippet_context(&tagged.tpl, span, facts),
    Expr::Tpl(tpl) => {
      if tpl.exprs.is_empty() {
        let mut cx = DynamicNodeContext::new(ExpressionShape::Static, span);
        cx.source = Some(tpl_text(tpl));
        cx
      } else {
        snippet_context(tpl, span, facts)
      }
    }
    Expr::Lit(lit) => {
      let mut cx = DynamicNodeContext::new(ExpressionShape::Static, span);
      cx.source = print_lit(lit);
      if cx.source.is_none() {
        cx.shape = ExpressionShape::Opaque;
      }
      cx
    }
    _ => DynamicNodeContext::new(ExpressionShape::Opaque, span),
  }
}

fn snippet_context(tpl: &Tpl, span: Span, _facts: &FileFacts) -> DynamicNodeContext {
  let mut cx = DynamicNodeContext::new(ExpressionShape::CssSnippet, span);
  if tpl.exprs.is_empty() {
    cx.snippet_body = Some(tpl_text(tpl));
  }
  cx
}

fn branch_expr(expr: &Expr, binding: &ParamBinding, facts: &FileFacts) -> BranchExpr {
  let expr = unwrap_parens(expr);
  let span = expr.span();
  if let Expr::Cond(cond) = expr {
    return BranchExpr {
      value: BranchValue::Unprintable,
      nested: Some(Box::new(ConditionalInfo {
        prop: resolve_prop_name(&cond.test, binding),
        cons: branch_expr(&cond.cons, binding, facts),
        alt: branch_expr(&cond.alt, binding, facts),
      })),
      span,
    };
  }
  BranchExpr {
    value: branch_value(expr, binding, facts),
    nested: None,
    span,
  }
}

fn branch_value(expr: &Expr, binding: &ParamBinding, facts: &FileFacts) -> BranchValue {
  match expr {
    Expr::Lit(Lit::Str(s)) => BranchValue::Str(s.value.to_string()),
    Expr::Lit(Lit::Num(n)) => BranchValue::Num(n.value),
    Expr::Lit(Lit::Bool(b)) => BranchValue::Bool(b.value),
    Expr::Lit(Lit::Null(_)) => BranchValue::Absent,
    Expr::Ident(ident) if &*ident.sym == "undefined" => BranchValue::Absent,
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => BranchValue::Str(tpl_text(tpl)),
    Expr::TaggedTpl(tagged) => {
      if tagged.tpl.exprs.is_empty() {
        BranchValue::Snippet(tpl_text(&tagged.tpl))
      } else {
        BranchValue::DynamicSnippet
      }
    }
    Expr::Ident(ident) => {
      let name = ident.sym.to_string();
      if let Some(Some(animation)) = facts.keyframes.get(&name) {
        return BranchValue::Other(animation.clone());
      }
      if binding.prop_for_local(&name).is_some() {
        // A bare prop forwarded as the value; not a literal we can place.
        return BranchValue::Unprintable;
      }
      BranchValue::Other(name)
    }
    _ => match print_expr(expr) {
      Some(source) if !references_binding(expr, binding) => BranchValue::Other(source),
      _ => BranchValue::Unprintable,
    },
  }
}

/// Resolve the prop name driving a conditional/logical test. Only a direct
/// member access on the props param (`p.$on`) or a destructured local
/// (`$on`) resolves; anything else (negation, comparisons, compound
/// `p.$a && p.$b`) does not name exactly one prop.
pub fn resolve_prop_name(test: &Expr, binding: &ParamBinding) -> Option<String> {
  match unwrap_parens(test) {
    Expr::Ident(ident) => binding.prop_for_local(&ident.sym),
    Expr::Member(_) => {
      let path = props_relative_path(unwrap_parens(test), binding)?;
      if path.len() == 1 && path[0] != "theme" {
        Some(path[0].clone())
      } else {
        None
      }
    }
    _ => None,
  }
}

/// Member path relative to the props object: `p.theme.color.brand` with
/// param `p` yields `["theme", "color", "brand"]`. A plain `props` root is
/// accepted even without an arrow binding.
fn props_relative_path(expr: &Expr, binding: &ParamBinding) -> Option<Vec<String>> {
  let mut segments = member_path(expr)?;
  if segments.len() < 2 {
    return None;
  }
  let root = segments.remove(0);
  if binding.is_param_ident(&root) || (matches!(binding, ParamBinding::None) && root == "props") {
    return Some(segments);
  }
  None
}

fn member_path(expr: &Expr) -> Option<Vec<String>> {
  match expr {
    Expr::Ident(ident) => Some(vec![ident.sym.to_string()]),
    Expr::Member(member) => {
      let mut path = member_path(unwrap_parens(&member.obj))?;
      match &member.prop {
        MemberProp::Ident(ident) => path.push(ident.sym.to_string()),
        _ => return None,
      }
      Some(path)
    }
    _ => None,
  }
}

/// True when `expr` references the props parameter anywhere.
pub fn references_binding(expr: &Expr, binding: &ParamBinding) -> bool {
  let matches_name = |name: &str| match binding {
    ParamBinding::None => false,
    ParamBinding::Ident(param) => param == name,
    ParamBinding::Destructured(pairs) => pairs.iter().any(|(local, _)| local == name),
  };
  match expr {
    Expr::Ident(ident) => matches_name(&ident.sym),
    Expr::Member(member) => {
      references_binding(&member.obj, binding)
        || matches!(&member.prop, MemberProp::Computed(c) if references_binding(&c.expr, binding))
    }
    Expr::Call(call) => {
      let callee = matches!(&call.callee, Callee::Expr(e) if references_binding(e, binding));
      callee
        || call
          .args
          .iter()
          .any(|arg| references_binding(&arg.expr, binding))
    }
    Expr::Bin(bin) => {
      references_binding(&bin.left, binding) || references_binding(&bin.right, binding)
    }
    Expr::Cond(cond) => {
      references_binding(&cond.test, binding)
        || references_binding(&cond.cons, binding)
        || references_binding(&cond.alt, binding)
    }
    Expr::Unary(unary) => references_binding(&unary.arg, binding),
    Expr::Paren(paren) => references_binding(&paren.expr, binding),
    Expr::Tpl(tpl) => tpl.exprs.iter().any(|e| references_binding(e, binding)),
    Expr::TaggedTpl(tagged) => tagged
      .tpl
      .exprs
      .iter()
      .any(|e| references_binding(e, binding)),
    _ => false,
  }
}

fn unwrap_parens(expr: &Expr) -> &Expr {
  match expr {
    Expr::Paren(paren) => unwrap_parens(&paren.expr),
    _ => expr,
  }
}

fn tpl_text(tpl: &Tpl) -> String {
  tpl
    .quasis
    .iter()
    .map(|q| q.raw.as_ref())
    .collect::<Vec<_>>()
    .join("")
}

pub fn num_to_string(n: f64) -> String {
  if (n - (n as i64 as f64)).abs() < f64::EPSILON {
    (n as i64).to_string()
  } else {
    n.to_string()
  }
}

fn print_lit(lit: &Lit) -> Option<String> {
  match lit {
    Lit::Str(s) => Some(s.value.to_string()),
    Lit::Num(n) => Some(num_to_string(n.value)),
    _ => None,
  }
}

/// Closed-shape printer: identifiers, member chains, string/number literals,
/// no-interpolation templates and simple calls. Expressions outside this set
/// are by definition not statically re-expressible.
pub fn print_expr(expr: &Expr) -> Option<String> {
  match expr {
    Expr::Ident(ident) => Some(ident.sym.to_string()),
    Expr::Lit(lit) => print_lit(lit),
    Expr::Tpl(tpl) if tpl.exprs.is_empty() => Some(tpl_text(tpl)),
    Expr::Member(member) => {
      let obj = print_expr(unwrap_parens(&member.obj))?;
      match &member.prop {
        MemberProp::Ident(ident) => Some(format!("{obj}.{}", ident.sym)),
        _ => None,
      }
    }
    Expr::Call(call) => {
      let callee = match &call.callee {
        Callee::Expr(callee) => print_expr(unwrap_parens(callee))?,
        _ => return None,
      };
      let mut args = Vec::with_capacity(call.args.len());
      for arg in &call.args {
        if arg.spread.is_some() {
          return None;
        }
        args.push(print_call_arg(&arg.expr)?);
      }
      Some(format!("{callee}({})", args.join(", ")))
    }
    Expr::Paren(paren) => print_expr(&paren.expr),
    _ => None,
  }
}

fn print_call_arg(expr: &Expr) -> Option<String> {
  match expr {
    // String arguments keep their quotes so the call text stays valid source.
    Expr::Lit(Lit::Str(s)) => Some(format!("'{}'", s.value)),
    Expr::Lit(Lit::Num(n)) => Some(num_to_string(n.value)),
    Expr::Lit(Lit::Bool(b)) => Some(b.value.to_string()),
    _ => print_expr(expr),
  }
}

#[cfg(test)]
mod tests {
  use swc_core::common::sync::Lrc;
  use swc_core::common::{FileName, SourceMap};
  use swc_core::ecma::ast::EsVersion;
  use swc_core::ecma::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

  use super::*;
  use crate::types::FileFacts;

  fn parse(source: &str) -> Box<Expr> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom("cx.js".into()).into(), source.to_string());
    let lexer = Lexer::new(
      Syntax::Es(EsSyntax::default()),
      EsVersion::Es2022,
      StringInput::from(&*fm),
      None,
    );
    let mut parser = Parser::new_from(lexer);
    parser.parse_expr().expect("parse expression")
  }

  fn context_for(source: &str, facts: &FileFacts) -> DynamicNodeContext {
    let expr = parse(source);
    build_context(&expr, &Occurrence::default(), facts)
  }

  #[test]
  fn classifies_conditionals_with_resolvable_props() {
    let cx = context_for("(p) => p.$on ? 'red' : 'blue'", &FileFacts::new());
    assert_eq!(cx.shape, ExpressionShape::Conditional);
    let info = cx.conditional.expect("conditional info");
    assert_eq!(info.prop.as_deref(), Some("$on"));
    assert_eq!(info.cons.value, BranchValue::Str("red".to_string()));
    assert_eq!(info.alt.value, BranchValue::Str("blue".to_string()));
  }

  #[test]
  fn destructured_params_resolve_prop_names() {
    let cx = context_for("({ $big }) => $big ? '2rem' : '1rem'", &FileFacts::new());
    let info = cx.conditional.expect("conditional info");
    assert_eq!(info.prop.as_deref(), Some("$big"));
  }

  #[test]
  fn compound_tests_do_not_resolve_a_prop() {
    let cx = context_for("(p) => p.$a && p.$b ? 'x' : 'y'", &FileFacts::new());
    let info = cx.conditional.expect("conditional info");
    assert_eq!(info.prop, None);
  }

  #[test]
  fn boolean_branches_are_kept_distinct() {
    let cx = context_for("(p) => p.disabled ? true : 'pointer'", &FileFacts::new());
    let info = cx.conditional.expect("conditional info");
    assert_eq!(info.cons.value, BranchValue::Bool(true));
  }

  #[test]
  fn theme_access_strips_the_roots() {
    let cx = context_for("(p) => p.theme.colors.primary", &FileFacts::new());
    assert_eq!(cx.shape, ExpressionShape::ThemeAccess);
    assert!(cx.is_theme_access);
    assert_eq!(
      cx.prop_path,
      Some(vec!["colors".to_string(), "primary".to_string()])
    );
  }

  #[test]
  fn prop_access_keeps_the_full_path() {
    let cx = context_for("(p) => p.$width", &FileFacts::new());
    assert_eq!(cx.shape, ExpressionShape::PropAccess);
    assert_eq!(cx.prop_path, Some(vec!["$width".to_string()]));
  }

  #[test]
  fn known_keyframes_identifiers_resolve() {
    let facts = FileFacts::new().with_keyframes("pulse", Some("pulseAnim".to_string()));
    let cx = context_for("pulse", &facts);
    assert_eq!(cx.shape, ExpressionShape::KeyframesRef);
    assert_eq!(cx.animation_name.as_deref(), Some("pulseAnim"));
  }

  #[test]
  fn component_identifiers_resolve() {
    let facts = FileFacts::new().with_component("Icon");
    let cx = context_for("Icon", &facts);
    assert_eq!(cx.shape, ExpressionShape::ComponentRef);
    assert_eq!(cx.component_name.as_deref(), Some("Icon"));
  }

  #[test]
  fn nested_conditionals_are_captured() {
    let cx = context_for("(p) => p.$a ? (p.$b ? 'x' : 'y') : 'z'", &FileFacts::new());
    let info = cx.conditional.expect("conditional info");
    let nested = info.cons.nested.expect("nested conditional");
    assert_eq!(nested.prop.as_deref(), Some("$b"));
  }

  #[test]
  fn helper_calls_record_prop_capture() {
    let plain = context_for("spacing(2)", &FileFacts::new());
    assert_eq!(plain.shape, ExpressionShape::HelperCall);
    assert!(!plain.call_captures_props);
    assert_eq!(plain.source.as_deref(), Some("spacing(2)"));

    let capturing = context_for("(p) => spacing(p.$size)", &FileFacts::new());
    assert_eq!(capturing.shape, ExpressionShape::HelperCall);
    assert!(capturing.call_captures_props);
  }

  #[test]
  fn arrow_block_bodies_are_opaque() {
    let cx = context_for("(p) => { return p.$x; }", &FileFacts::new());
    assert_eq!(cx.shape, ExpressionShape::Opaque);
  }

  #[test]
  fn printer_covers_the_closed_shape_set() {
    assert_eq!(print_expr(&parse("brandColor")).as_deref(), Some("brandColor"));
    assert_eq!(
      print_expr(&parse("colors.primary")).as_deref(),
      Some("colors.primary")
    );
    assert_eq!(
      print_expr(&parse("spacing(2, 'x')")).as_deref(),
      Some("spacing(2, 'x')")
    );
    assert_eq!(print_expr(&parse("a + b")), None);
  }
}
