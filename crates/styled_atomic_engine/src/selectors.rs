use serde::Serialize;

use crate::css::{normalize_selector, split_top_level_commas};
use crate::utils::strip_quotes;

/// Closed catalog of attribute-selector patterns with a static counterpart.
///
/// `[disabled]` never appears here: it folds into the `:disabled` pseudo
/// during classification. `[readonly]` is deliberately *not* folded into
/// `:read-only` — that pseudo-class matches more elements than the attribute
/// does, so the attribute is surfaced for a prop-driven conditional instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttributeKind {
  TypeCheckbox,
  TypeRadio,
  HrefPrefix,
  HrefSuffix,
  ReadOnly,
  TargetBlank,
}

/// Classification of one Rule IR selector. A selector is wholly one variant;
/// classification never partially succeeds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum SelectorKind {
  /// Selector is exactly `&`.
  Base,
  /// One chained pseudo-class expression on `&` (single element), or
  /// multiple comma-separated single simple pseudo-classes (one element per
  /// comma part). Each entry keeps its leading `:`.
  Pseudo { pseudos: Vec<String> },
  /// Exactly one pseudo-element, no co-occurring pseudo-class.
  PseudoElement { element: String },
  Attribute {
    kind: AttributeKind,
    value: Option<String>,
    pseudo_element: Option<String>,
  },
  /// `&<arg> + &` — both sides the same component, the left side carrying
  /// only classes/pseudos (possibly none).
  AdjacentSibling { selector_arg: String },
  /// `&<arg> ~ &`.
  GeneralSibling { selector_arg: String },
  Unsupported { reason: String },
}

/// Reconstruct a selector string from a `Pseudo` classification. Round-trips
/// with [`classify_selector`] up to whitespace.
pub fn pseudo_selector(pseudos: &[String]) -> String {
  pseudos
    .iter()
    .map(|p| format!("&{p}"))
    .collect::<Vec<_>>()
    .join(", ")
}

/// True when the selector carries a specificity hack (`&&`, `&&&`, ...).
/// Collapsing would silently change author intent, so any occurrence is a
/// whole-definition bail upstream; this check exists so classification stays
/// total even if one slips through.
pub fn has_specificity_hack(selector: &str) -> bool {
  selector.contains("&&")
}

pub fn classify_selector(selector: &str) -> SelectorKind {
  let sel = normalize_selector(selector);
  if sel.is_empty() {
    return SelectorKind::Unsupported {
      reason: "empty selector".to_string(),
    };
  }
  if has_specificity_hack(&sel) {
    return SelectorKind::Unsupported {
      reason: "specificity hack".to_string(),
    };
  }
  if crate::template::find_slots(&sel).first().is_some() {
    return SelectorKind::Unsupported {
      reason: "cross-component selector".to_string(),
    };
  }

  let parts = split_top_level_commas(&sel);
  if parts.len() > 1 {
    return classify_selector_list(&parts);
  }
  classify_single(&sel)
}

fn classify_selector_list(parts: &[String]) -> SelectorKind {
  // A selector list is supported only as a list of single simple
  // pseudo-classes on `&`.
  let mut pseudos = Vec::with_capacity(parts.len());
  for part in parts {
    let Some(rest) = part.strip_prefix('&') else {
      return SelectorKind::Unsupported {
        reason: "selector list with non-pseudo parts".to_string(),
      };
    };
    match parse_pseudo_chain(rest) {
      Ok(pieces) if pieces.len() == 1 && !pieces[0].is_element() && pieces[0].args.is_none() => {
        pseudos.push(pieces[0].text());
      }
      _ => {
        return SelectorKind::Unsupported {
          reason: "selector list with non-pseudo parts".to_string(),
        };
      }
    }
  }
  SelectorKind::Pseudo { pseudos }
}

fn classify_single(sel: &str) -> SelectorKind {
  if sel == "&" {
    return SelectorKind::Base;
  }
  if let Some(kind) = classify_sibling(sel) {
    return kind;
  }
  let Some(rest) = sel.strip_prefix('&') else {
    return SelectorKind::Unsupported {
      reason: head_reason(sel),
    };
  };
  if rest.starts_with(' ') {
    return SelectorKind::Unsupported {
      reason: combinator_reason(rest.trim_start()),
    };
  }
  if rest.starts_with(':') {
    return classify_pseudo_tail(rest);
  }
  if rest.starts_with('[') {
    return classify_attribute(rest);
  }
  SelectorKind::Unsupported {
    reason: head_reason(rest),
  }
}

fn head_reason(head: &str) -> String {
  match head.chars().next() {
    Some('.') => "class selector".to_string(),
    Some('#') => "id selector".to_string(),
    Some('*') => "universal selector".to_string(),
    Some(c) if c.is_ascii_alphabetic() => "tag selector".to_string(),
    _ => format!("unsupported selector `{head}`"),
  }
}

fn combinator_reason(tail: &str) -> String {
  match tail.chars().next() {
    Some('>') => "child combinator".to_string(),
    Some('+') | Some('~') => "sibling selector outside the supported shape".to_string(),
    _ => "descendant combinator".to_string(),
  }
}

fn classify_sibling(sel: &str) -> Option<SelectorKind> {
  for (token, general) in [(" + ", false), (" ~ ", true)] {
    if let Some(idx) = sel.find(token) {
      let left = sel[..idx].trim();
      let right = sel[idx + token.len()..].trim();
      if right != "&" || !left.starts_with('&') {
        return Some(SelectorKind::Unsupported {
          reason: "sibling selector outside the supported shape".to_string(),
        });
      }
      let arg = &left[1..];
      if !sibling_arg_is_supported(arg) {
        return Some(SelectorKind::Unsupported {
          reason: "sibling selector outside the supported shape".to_string(),
        });
      }
      let selector_arg = arg.to_string();
      return Some(if general {
        SelectorKind::GeneralSibling { selector_arg }
      } else {
        SelectorKind::AdjacentSibling { selector_arg }
      });
    }
  }
  None
}

fn sibling_arg_is_supported(arg: &str) -> bool {
  // The left side may carry only classes and pseudo-classes.
  if arg.is_empty() {
    return true;
  }
  if !arg.starts_with('.') && !arg.starts_with(':') {
    return false;
  }
  arg
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '-' | '_' | '(' | ')'))
}

struct PseudoPiece {
  colons: usize,
  name: String,
  args: Option<String>,
}

impl PseudoPiece {
  fn is_element(&self) -> bool {
    self.colons == 2 || matches!(self.name.as_str(), "before" | "after")
  }

  fn text(&self) -> String {
    let mut out = String::with_capacity(self.name.len() + 4);
    for _ in 0..self.colons {
      out.push(':');
    }
    out.push_str(&self.name);
    if let Some(args) = &self.args {
      out.push('(');
      out.push_str(args);
      out.push(')');
    }
    out
  }
}

fn parse_pseudo_chain(s: &str) -> Result<Vec<PseudoPiece>, String> {
  let bytes = s.as_bytes();
  let mut pieces = Vec::new();
  let mut i = 0usize;
  while i < bytes.len() {
    if bytes[i] != b':' {
      return Err(format!("unexpected `{}` in pseudo selector", &s[i..]));
    }
    let mut colons = 1;
    i += 1;
    if i < bytes.len() && bytes[i] == b':' {
      colons = 2;
      i += 1;
    }
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
      i += 1;
    }
    if i == name_start {
      return Err("missing pseudo name".to_string());
    }
    let name = s[name_start..i].to_string();
    let mut args = None;
    if i < bytes.len() && bytes[i] == b'(' {
      let args_start = i + 1;
      let mut depth = 1usize;
      i += 1;
      while i < bytes.len() && depth > 0 {
        match bytes[i] {
          b'(' => depth += 1,
          b')' => depth -= 1,
          _ => {}
        }
        i += 1;
      }
      if depth > 0 {
        return Err("unbalanced parens in pseudo arguments".to_string());
      }
      args = Some(s[args_start..i - 1].to_string());
    }
    pieces.push(PseudoPiece { colons, name, args });
  }
  Ok(pieces)
}

fn classify_pseudo_tail(rest: &str) -> SelectorKind {
  let pieces = match parse_pseudo_chain(rest) {
    Ok(pieces) => pieces,
    Err(reason) => return SelectorKind::Unsupported { reason },
  };
  let element_count = pieces.iter().filter(|p| p.is_element()).count();
  if element_count > 1 {
    return SelectorKind::Unsupported {
      reason: "multiple pseudo-elements".to_string(),
    };
  }
  if element_count == 1 {
    if pieces.len() > 1 {
      return SelectorKind::Unsupported {
        reason: "pseudo-class combined with pseudo-element".to_string(),
      };
    }
    let piece = &pieces[0];
    if piece.args.is_some() {
      return SelectorKind::Unsupported {
        reason: "pseudo-element with arguments".to_string(),
      };
    }
    return SelectorKind::PseudoElement {
      element: piece.name.clone(),
    };
  }
  // All pseudo-classes: the chain is one expression on `&`.
  let chain: String = pieces.iter().map(|p| p.text()).collect();
  SelectorKind::Pseudo {
    pseudos: vec![chain],
  }
}

fn classify_attribute(rest: &str) -> SelectorKind {
  let Some(close) = rest.find(']') else {
    return SelectorKind::Unsupported {
      reason: "unterminated attribute selector".to_string(),
    };
  };
  let content = &rest[1..close];
  let remainder = &rest[close + 1..];
  let unsupported = || SelectorKind::Unsupported {
    reason: "attribute selector outside supported catalog".to_string(),
  };

  let (key, op, raw_value) = match content.find(|c| matches!(c, '^' | '$' | '*' | '=')) {
    Some(idx) => {
      let (key, op_and_value) = content.split_at(idx);
      let (op, value) = if let Some(v) = op_and_value.strip_prefix("^=") {
        ("^=", v)
      } else if let Some(v) = op_and_value.strip_prefix("$=") {
        ("$=", v)
      } else if let Some(v) = op_and_value.strip_prefix('=') {
        ("=", v)
      } else {
        return unsupported();
      };
      (key.trim(), op, Some(strip_quotes(value).to_string()))
    }
    None => (content.trim(), "", None),
  };

  match (key, op, raw_value.as_deref()) {
    ("disabled", "", None) => {
      if !remainder.is_empty() {
        return unsupported();
      }
      // The attribute and the pseudo-class agree exactly for form elements.
      SelectorKind::Pseudo {
        pseudos: vec![":disabled".to_string()],
      }
    }
    ("readonly", "", None) => {
      if !remainder.is_empty() {
        return unsupported();
      }
      SelectorKind::Attribute {
        kind: AttributeKind::ReadOnly,
        value: None,
        pseudo_element: None,
      }
    }
    ("type", "=", Some("checkbox")) if remainder.is_empty() => SelectorKind::Attribute {
      kind: AttributeKind::TypeCheckbox,
      value: Some("checkbox".to_string()),
      pseudo_element: None,
    },
    ("type", "=", Some("radio")) if remainder.is_empty() => SelectorKind::Attribute {
      kind: AttributeKind::TypeRadio,
      value: Some("radio".to_string()),
      pseudo_element: None,
    },
    ("href", "^=", Some(value)) if remainder.is_empty() => SelectorKind::Attribute {
      kind: AttributeKind::HrefPrefix,
      value: Some(value.to_string()),
      pseudo_element: None,
    },
    ("href", "$=", Some(value)) if remainder.is_empty() => SelectorKind::Attribute {
      kind: AttributeKind::HrefSuffix,
      value: Some(value.to_string()),
      pseudo_element: None,
    },
    ("target", "=", Some("_blank")) => {
      let pseudo_element = match remainder {
        "" => None,
        "::after" | ":after" => Some("after".to_string()),
        _ => return unsupported(),
      };
      SelectorKind::Attribute {
        kind: AttributeKind::TargetBlank,
        value: Some("_blank".to_string()),
        pseudo_element,
      }
    }
    _ => unsupported(),
  }
}
