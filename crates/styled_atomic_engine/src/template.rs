use swc_core::common::{Span, Spanned};
use swc_core::ecma::ast::{Expr, Tpl};

const SLOT_PREFIX: &str = "__styled_slot_";
const SLOT_SUFFIX: &str = "__";

/// A placeholder and the original dynamic expression it stands for.
///
/// The expression is opaque to the splitter and the rule compiler; only the
/// dynamic node resolver ever inspects its shape.
#[derive(Clone, Debug)]
pub struct TemplateSlot {
  pub id: usize,
  pub expr: Box<Expr>,
  pub span: Span,
}

/// A CSS-in-JS block separated into raw CSS text (placeholders intact) and
/// the parallel slot list.
#[derive(Clone, Debug, Default)]
pub struct SplitTemplate {
  pub css: String,
  pub slots: Vec<TemplateSlot>,
}

impl SplitTemplate {
  pub fn slot(&self, id: usize) -> Option<&TemplateSlot> {
    self.slots.get(id).filter(|slot| slot.id == id)
  }
}

/// Token restored into selectors and declaration values in place of slot `id`.
pub fn slot_token(id: usize) -> String {
  format!("{SLOT_PREFIX}{id}{SLOT_SUFFIX}")
}

/// Parse a string that is exactly one slot token.
pub fn parse_slot_token(s: &str) -> Option<usize> {
  let rest = s.strip_prefix(SLOT_PREFIX)?;
  let digits = rest.strip_suffix(SLOT_SUFFIX)?;
  if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  digits.parse().ok()
}

/// Slot ids embedded anywhere in `s`, in textual order.
pub fn find_slots(s: &str) -> Vec<usize> {
  let mut out = Vec::new();
  let mut rest = s;
  while let Some(start) = rest.find(SLOT_PREFIX) {
    let after = &rest[start + SLOT_PREFIX.len()..];
    let digits_len = after.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits_len > 0 && after[digits_len..].starts_with(SLOT_SUFFIX) {
      if let Ok(id) = after[..digits_len].parse() {
        out.push(id);
      }
      rest = &after[digits_len + SLOT_SUFFIX.len()..];
    } else {
      rest = &rest[start + SLOT_PREFIX.len()..];
    }
  }
  out
}

/// Some(id) iff the trimmed string is exactly one slot token.
pub fn only_slot(s: &str) -> Option<usize> {
  parse_slot_token(s.trim())
}

/// Split a leading slot token off `s`, returning its id and the remainder.
pub fn leading_slot(s: &str) -> Option<(usize, &str)> {
  let rest = s.strip_prefix(SLOT_PREFIX)?;
  let digits_len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
  if digits_len == 0 {
    return None;
  }
  let after = rest[digits_len..].strip_prefix(SLOT_SUFFIX)?;
  let id = rest[..digits_len].parse().ok()?;
  Some((id, after))
}

/// Split a value containing exactly one slot token into (prefix, id, suffix).
/// Returns None when the string holds zero or several slots.
pub fn split_around_slot(s: &str) -> Option<(String, usize, String)> {
  let ids = find_slots(s);
  if ids.len() != 1 {
    return None;
  }
  let id = ids[0];
  let token = slot_token(id);
  let start = s.find(&token)?;
  Some((
    s[..start].to_string(),
    id,
    s[start + token.len()..].to_string(),
  ))
}

/// Separate a CSS-in-JS template literal into raw CSS text with positional
/// placeholders and the parallel slot list.
pub fn split_template(tpl: &Tpl) -> SplitTemplate {
  let approx_cap: usize = tpl
    .quasis
    .iter()
    .map(|q| q.raw.as_ref().len())
    .sum::<usize>()
    + tpl.exprs.len() * (SLOT_PREFIX.len() + SLOT_SUFFIX.len() + 2);
  let mut css = String::with_capacity(approx_cap);
  let mut slots = Vec::with_capacity(tpl.exprs.len());
  for (idx, quasi) in tpl.quasis.iter().enumerate() {
    css.push_str(quasi.raw.as_ref());
    if let Some(expr) = tpl.exprs.get(idx) {
      css.push_str(&slot_token(idx));
      slots.push(TemplateSlot {
        id: idx,
        expr: expr.clone(),
        span: expr.span(),
      });
    }
  }
  SplitTemplate { css, slots }
}
