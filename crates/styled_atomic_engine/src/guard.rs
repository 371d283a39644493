use swc_core::ecma::ast::Expr;

use crate::css::CompiledRules;
use crate::diagnostics::{Diagnostics, Warning, WarningCategory};
use crate::template::{slot_token, SplitTemplate};
use crate::types::{EngineOptions, FileFacts, StyledDefinition};

/// Structural fail-fast checks with no faithful static representation. Each
/// check that fires records exactly one categorized warning and forces a
/// whole-definition bail; attempted partial conversion risks shipping
/// behavior-changing output.
pub fn check_definition(
  definition: &StyledDefinition,
  split: &SplitTemplate,
  facts: &FileFacts,
  diagnostics: &mut Diagnostics,
) -> bool {
  if definition.wrapped_in_factory {
    diagnostics.push(
      Warning::new(
        WarningCategory::HigherOrderFactory,
        format!(
          "`{}` wraps the styled factory in another function; the wrapper's effect on props \
           cannot be analyzed",
          definition.name
        ),
      )
      .with_span(definition.span),
    );
    return true;
  }
  if definition.has_static_members {
    diagnostics.push(
      Warning::new(
        WarningCategory::StaticPropertyOnComponent,
        format!(
          "`{}` has static properties attached to the component reference",
          definition.name
        ),
      )
      .with_span(definition.span),
    );
    return true;
  }
  if let Some(at) = find_specificity_hack(&split.css) {
    diagnostics.push(
      Warning::new(
        WarningCategory::SpecificityHack,
        format!(
          "specificity hack (`&&`) at byte {at}; collapsing it would silently change \
           author intent"
        ),
      )
      .with_span(definition.span),
    );
    return true;
  }
  if let Some(slot_id) = find_parent_state_reference(split, facts) {
    let span = split
      .slots
      .get(slot_id)
      .map(|slot| slot.span)
      .unwrap_or(definition.span);
    diagnostics.push(
      Warning::new(
        WarningCategory::UnsupportedSelector,
        "cross-component parent selector cannot be converted; a manual bridge strategy is \
         required",
      )
      .with_span(span),
    );
    return true;
  }
  false
}

/// Universal-selector policy check, applied to the compiled result because
/// the compiler records the condition instead of raising it.
pub fn check_universal(
  definition: &StyledDefinition,
  compiled: &CompiledRules,
  options: &EngineOptions,
  diagnostics: &mut Diagnostics,
) -> bool {
  if compiled.saw_universal && !options.allow_universal_selector {
    diagnostics.push(
      Warning::new(
        WarningCategory::UniversalSelector,
        format!(
          "`{}` uses a universal selector, which has no atomic equivalent",
          definition.name
        ),
      )
      .with_span(definition.span),
    );
    return true;
  }
  false
}

/// Locate a `&&` specificity hack outside strings and comments.
pub fn find_specificity_hack(css: &str) -> Option<usize> {
  let bytes = css.as_bytes();
  let mut i = 0usize;
  let mut in_str: u8 = 0;
  while i < bytes.len() {
    let b = bytes[i];
    if in_str != 0 {
      if b == in_str {
        in_str = 0;
      } else if b == b'\\' {
        i += 1;
      }
      i += 1;
      continue;
    }
    if b == b'\'' || b == b'"' {
      in_str = b;
      i += 1;
      continue;
    }
    if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
      i += 2;
      while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
        i += 1;
      }
      i = (i + 2).min(bytes.len());
      continue;
    }
    if b == b'&' && bytes.get(i + 1) == Some(&b'&') {
      return Some(i);
    }
    i += 1;
  }
  None
}

/// Detect the `${Other}:hover &` shape: a component-reference slot opening a
/// selector prelude whose remainder (up to the `{`) still references `&`.
fn find_parent_state_reference(split: &SplitTemplate, facts: &FileFacts) -> Option<usize> {
  for slot in &split.slots {
    if !expr_is_component_ref(&slot.expr, facts) {
      continue;
    }
    let token = slot_token(slot.id);
    for (start, _) in split.css.match_indices(&token) {
      let rest = &split.css[start + token.len()..];
      let end = rest
        .find(|c| matches!(c, '{' | ';' | '}'))
        .unwrap_or(rest.len());
      if rest[..end].contains('&') && rest[end..].starts_with('{') {
        return Some(slot.id);
      }
    }
  }
  None
}

fn expr_is_component_ref(expr: &Expr, facts: &FileFacts) -> bool {
  match expr {
    Expr::Ident(ident) => facts.components.contains(&*ident.sym),
    Expr::Paren(paren) => expr_is_component_ref(&paren.expr, facts),
    _ => false,
  }
}
