use serde::Serialize;

use crate::diagnostics::CssParseError;
use crate::template::{leading_slot, only_slot, slot_token};
use crate::utils::normalize_at_query;

/// One `property: value` pair. A declaration whose `property` is empty is a
/// standalone statement (a helper-call mixin restored as a bare slot token).
/// `offset` is the byte offset of the declaration within the raw block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Declaration {
  pub property: String,
  pub value: String,
  pub offset: usize,
}

impl Declaration {
  pub fn is_mixin(&self) -> bool {
    self.property.is_empty()
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RulePrelude {
  Selector(String),
  AtRule { name: String, params: String },
}

/// A node in the compiled rule tree, nesting intact. Produced by the
/// injected [`CssCompiler`]; the flattener resolves nesting into [`CssRule`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleNode {
  pub prelude: RulePrelude,
  pub declarations: Vec<Declaration>,
  pub children: Vec<RuleNode>,
  pub offset: usize,
}

/// Flat Rule IR entry: the nesting chain is already substituted into
/// `selector` (always expressed relative to `&`), and enclosing at-rule
/// preludes are carried outermost-first in `at_rules`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CssRule {
  pub selector: String,
  pub at_rules: Vec<String>,
  pub declarations: Vec<Declaration>,
  /// Set when the rule sits under an at-rule with no static counterpart
  /// (anything other than `@media`/`@supports`).
  pub unsupported_at_rule: Option<String>,
  pub offset: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledRules {
  pub rules: Vec<CssRule>,
  /// Top-level universal-selector usage anywhere in the compiled tree.
  /// Recorded, not raised; the caller decides per policy whether it is fatal.
  pub saw_universal: bool,
}

/// Narrow interface over the concrete CSS-nesting compiler so it can be
/// swapped or pooled without touching the Rule-IR normalization logic.
/// Implementations must be reentrant: `compile` takes `&self` and holds no
/// mutable state across calls.
pub trait CssCompiler {
  fn compile(&self, css: &str) -> Result<Vec<RuleNode>, CssParseError>;
}

/// Default compiler: a byte-level scanner aware of CSS nesting, comments,
/// strings, and paren/bracket depth. Placeholder tokens pass through intact
/// in both selector and value positions, which is the reason this engine
/// scans text instead of round-tripping through a stylesheet parser.
#[derive(Clone, Copy, Debug, Default)]
pub struct NestedCssCompiler;

impl CssCompiler for NestedCssCompiler {
  fn compile(&self, css: &str) -> Result<Vec<RuleNode>, CssParseError> {
    let mut scanner = Scanner::new(css);
    let (decls, children) = parse_nodes(&mut scanner, true)?;
    if !decls.is_empty() {
      // Bare declarations outside any rule: synthesize a `&` root so the
      // helper-snippet case and the wrapped case compile identically.
      let mut nodes = vec![RuleNode {
        prelude: RulePrelude::Selector("&".to_string()),
        declarations: decls,
        children: Vec::new(),
        offset: 0,
      }];
      nodes.extend(children);
      return Ok(nodes);
    }
    Ok(children)
  }
}

/// Compile an unwrapped CSS-in-JS body (declarations and nested rules as they
/// appear inside a template literal) into the flat Rule IR.
pub fn compile_block(
  compiler: &dyn CssCompiler,
  body: &str,
) -> Result<CompiledRules, CssParseError> {
  let wrapped = format!("& {{{body}}}");
  let nodes = compiler.compile(&wrapped)?;
  let mut out = CompiledRules::default();
  for node in &nodes {
    flatten_node(node, "&", &[], &mut out);
  }
  Ok(out)
}

fn flatten_node(node: &RuleNode, parent: &str, at_chain: &[String], out: &mut CompiledRules) {
  match &node.prelude {
    RulePrelude::Selector(raw) => {
      let selector = resolve_nested_selector(parent, raw);
      if selector_has_top_level_universal(&selector) {
        out.saw_universal = true;
      }
      if !node.declarations.is_empty() {
        out.rules.push(CssRule {
          selector: selector.clone(),
          at_rules: at_chain.to_vec(),
          declarations: node.declarations.clone(),
          unsupported_at_rule: None,
          offset: node.offset,
        });
      }
      for child in &node.children {
        flatten_node(child, &selector, at_chain, out);
      }
    }
    RulePrelude::AtRule { name, params } => {
      if name == "media" || name == "supports" {
        let mut chain = at_chain.to_vec();
        chain.push(format!("@{} {}", name, normalize_at_query(params)));
        if !node.declarations.is_empty() {
          out.rules.push(CssRule {
            selector: parent.to_string(),
            at_rules: chain.clone(),
            declarations: node.declarations.clone(),
            unsupported_at_rule: None,
            offset: node.offset,
          });
        }
        for child in &node.children {
          flatten_node(child, parent, &chain, out);
        }
      } else {
        out.rules.push(CssRule {
          selector: parent.to_string(),
          at_rules: at_chain.to_vec(),
          declarations: node.declarations.clone(),
          unsupported_at_rule: Some(format!("@{name}")),
          offset: node.offset,
        });
      }
    }
  }
}

/// Resolve a nested selector against its immediate parent. Both sides may be
/// comma-separated lists; the product distributes. A nested selector without
/// `&` is normalized by prefixing `&` (directly for pseudo/attribute/class/id
/// heads and sibling/child combinators, with a descendant space otherwise).
pub fn resolve_nested_selector(parent: &str, child: &str) -> String {
  let parents = split_top_level_commas(parent);
  let children = split_top_level_commas(child);
  let mut parts = Vec::with_capacity(parents.len() * children.len());
  for c in &children {
    let c = normalize_selector(c);
    for p in &parents {
      if c.contains('&') {
        parts.push(c.replace('&', p));
      } else if c.starts_with(':')
        || c.starts_with('[')
        || c.starts_with('.')
        || c.starts_with('#')
        || c.starts_with('+')
        || c.starts_with('~')
        || c.starts_with('>')
      {
        parts.push(format!("{p}{c}"));
      } else {
        parts.push(format!("{p} {c}"));
      }
    }
  }
  parts.join(", ")
}

/// Collapse whitespace and remove spaces around the `>`, `+`, `~` combinators
/// (outside strings, parens and brackets).
pub fn normalize_selector(sel: &str) -> String {
  let bytes = sel.as_bytes();
  let n = bytes.len();
  let mut out = String::with_capacity(n);
  let mut i = 0usize;
  let mut pending_space = false;
  let mut in_str: u8 = 0;
  let mut paren = 0usize;
  let mut bracket = 0usize;
  while i < n {
    let b = bytes[i];
    if in_str != 0 {
      out.push(b as char);
      if b == in_str {
        in_str = 0;
      } else if b == b'\\' && i + 1 < n {
        out.push(bytes[i + 1] as char);
        i += 1;
      }
      i += 1;
      continue;
    }
    if b == b'\'' || b == b'"' {
      in_str = b;
      out.push(b as char);
      i += 1;
      continue;
    }
    if b.is_ascii_whitespace() {
      pending_space = true;
      i += 1;
      continue;
    }
    if b == b'(' {
      paren += 1;
    }
    if b == b')' && paren > 0 {
      paren -= 1;
    }
    if b == b'[' {
      bracket += 1;
    }
    if b == b']' && bracket > 0 {
      bracket -= 1;
    }
    let is_combinator = (b == b'>' || b == b'+' || b == b'~') && paren == 0 && bracket == 0;
    if is_combinator {
      if out.ends_with(' ') {
        out.pop();
      }
      out.push(' ');
      out.push(b as char);
      out.push(' ');
      i += 1;
      while i < n && bytes[i].is_ascii_whitespace() {
        i += 1;
      }
      pending_space = false;
      continue;
    }
    if pending_space {
      out.push(' ');
      pending_space = false;
    }
    out.push(b as char);
    i += 1;
  }
  out.trim().to_string()
}

pub fn split_top_level_commas(s: &str) -> Vec<String> {
  let bytes = s.as_bytes();
  let mut parts = Vec::new();
  let mut depth = 0usize;
  let mut in_str: u8 = 0;
  let mut start = 0usize;
  for (i, &b) in bytes.iter().enumerate() {
    if in_str != 0 {
      if b == in_str {
        in_str = 0;
      }
      continue;
    }
    match b {
      b'\'' | b'"' => in_str = b,
      b'(' | b'[' => depth += 1,
      b')' | b']' => depth = depth.saturating_sub(1),
      b',' if depth == 0 => {
        parts.push(s[start..i].trim().to_string());
        start = i + 1;
      }
      _ => {}
    }
  }
  parts.push(s[start..].trim().to_string());
  parts.retain(|p| !p.is_empty());
  parts
}

fn selector_has_top_level_universal(sel: &str) -> bool {
  let bytes = sel.as_bytes();
  let mut depth = 0usize;
  let mut in_str: u8 = 0;
  for &b in bytes {
    if in_str != 0 {
      if b == in_str {
        in_str = 0;
      }
      continue;
    }
    match b {
      b'\'' | b'"' => in_str = b,
      b'(' | b'[' => depth += 1,
      b')' | b']' => depth = depth.saturating_sub(1),
      b'*' if depth == 0 => return true,
      _ => {}
    }
  }
  false
}

// Scanner internals.

struct Scanner<'a> {
  bytes: &'a [u8],
  pos: usize,
}

enum StatementEnd {
  Block,
  Semi,
  CloseBrace,
  Eof,
}

impl<'a> Scanner<'a> {
  fn new(src: &'a str) -> Self {
    Self {
      bytes: src.as_bytes(),
      pos: 0,
    }
  }

  fn eof(&self) -> bool {
    self.pos >= self.bytes.len()
  }

  fn peek(&self) -> u8 {
    self.bytes[self.pos]
  }

  fn advance(&mut self) {
    self.pos += 1;
  }

  fn skip_ws_and_comments(&mut self) -> Result<(), CssParseError> {
    loop {
      while !self.eof() && self.peek().is_ascii_whitespace() {
        self.advance();
      }
      if !self.eof() && self.peek() == b'/' && self.bytes.get(self.pos + 1) == Some(&b'*') {
        let start = self.pos;
        self.pos += 2;
        loop {
          if self.pos + 1 >= self.bytes.len() {
            return Err(CssParseError::Unterminated {
              what: "comment",
              at: start,
            });
          }
          if self.bytes[self.pos] == b'*' && self.bytes[self.pos + 1] == b'/' {
            self.pos += 2;
            break;
          }
          self.advance();
        }
        continue;
      }
      return Ok(());
    }
  }

  /// Collect statement text up to (not consuming) a top-level `;`, `{`, `}`
  /// or end of input. Comments are dropped; strings are copied verbatim.
  fn scan_statement(&mut self) -> Result<(String, StatementEnd), CssParseError> {
    let mut out = String::new();
    let mut paren = 0usize;
    let mut bracket = 0usize;
    loop {
      if self.eof() {
        return Ok((out, StatementEnd::Eof));
      }
      let b = self.peek();
      if b == b'/' && self.bytes.get(self.pos + 1) == Some(&b'*') {
        self.skip_ws_and_comments()?;
        out.push(' ');
        continue;
      }
      if b == b'\'' || b == b'"' {
        let start = self.pos;
        out.push(b as char);
        self.advance();
        loop {
          if self.eof() {
            return Err(CssParseError::Unterminated {
              what: "string",
              at: start,
            });
          }
          let c = self.peek();
          out.push(c as char);
          self.advance();
          if c == b'\\' && !self.eof() {
            out.push(self.peek() as char);
            self.advance();
            continue;
          }
          if c == b {
            break;
          }
        }
        continue;
      }
      match b {
        b'(' => paren += 1,
        b')' => paren = paren.saturating_sub(1),
        b'[' => bracket += 1,
        b']' => bracket = bracket.saturating_sub(1),
        b'{' if paren == 0 && bracket == 0 => return Ok((out, StatementEnd::Block)),
        b'}' if paren == 0 && bracket == 0 => return Ok((out, StatementEnd::CloseBrace)),
        b';' if paren == 0 && bracket == 0 => return Ok((out, StatementEnd::Semi)),
        _ => {}
      }
      out.push(b as char);
      self.advance();
    }
  }
}

fn parse_nodes(
  sc: &mut Scanner<'_>,
  top_level: bool,
) -> Result<(Vec<Declaration>, Vec<RuleNode>), CssParseError> {
  let mut decls = Vec::new();
  let mut children = Vec::new();
  loop {
    sc.skip_ws_and_comments()?;
    if sc.eof() {
      if top_level {
        return Ok((decls, children));
      }
      return Err(CssParseError::UnbalancedBraces {
        depth: 1,
        at: sc.pos,
      });
    }
    if sc.peek() == b'}' {
      if top_level {
        return Err(CssParseError::UnbalancedBraces {
          depth: 0,
          at: sc.pos,
        });
      }
      sc.advance();
      return Ok((decls, children));
    }
    let offset = sc.pos;
    let (text, end) = sc.scan_statement()?;
    match end {
      StatementEnd::Block => {
        sc.advance();
        let (inner_decls, inner_children) = parse_nodes(sc, false)?;
        children.push(RuleNode {
          prelude: parse_prelude(text.trim()),
          declarations: inner_decls,
          children: inner_children,
          offset,
        });
      }
      StatementEnd::Semi | StatementEnd::CloseBrace | StatementEnd::Eof => {
        if matches!(end, StatementEnd::Semi) {
          sc.advance();
        }
        let mut trimmed = text.trim();
        // Standalone interpolations (helper-call mixins) may run into the
        // next declaration without a separating semicolon; peel them off.
        while let Some((id, rest)) = leading_slot(trimmed) {
          if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace()) {
            // Token glued to more text (e.g. an interpolated property name):
            // not a standalone mixin.
            break;
          }
          decls.push(Declaration {
            property: String::new(),
            value: slot_token(id),
            offset,
          });
          trimmed = rest.trim_start();
        }
        if !trimmed.is_empty() {
          if trimmed.starts_with('@') {
            // Block-less at-rule statement (e.g. `@import`): surfaced as a
            // rule node so the flattener can mark it unsupported.
            children.push(RuleNode {
              prelude: parse_prelude(trimmed),
              declarations: Vec::new(),
              children: Vec::new(),
              offset,
            });
          } else {
            decls.push(parse_declaration(trimmed, offset)?);
          }
        }
      }
    }
  }
}

fn parse_prelude(text: &str) -> RulePrelude {
  if let Some(rest) = text.strip_prefix('@') {
    let split = rest
      .find(|c: char| c.is_whitespace() || c == '(')
      .unwrap_or(rest.len());
    let (name, params) = rest.split_at(split);
    return RulePrelude::AtRule {
      name: name.to_string(),
      params: params.trim().to_string(),
    };
  }
  RulePrelude::Selector(text.to_string())
}

fn parse_declaration(text: &str, offset: usize) -> Result<Declaration, CssParseError> {
  match text.find(':') {
    Some(idx) => Ok(Declaration {
      property: text[..idx].trim().to_string(),
      value: text[idx + 1..].trim().to_string(),
      offset,
    }),
    None => {
      if only_slot(text).is_some() {
        // Standalone interpolation (helper-call mixin).
        return Ok(Declaration {
          property: String::new(),
          value: text.to_string(),
          offset,
        });
      }
      Err(CssParseError::MissingColon {
        text: text.to_string(),
      })
    }
  }
}

/// True when any selector part of the rule still contains a slot token, i.e.
/// an interpolated component reference survived into the selector.
pub fn selector_slot_ids(selector: &str) -> Vec<usize> {
  crate::template::find_slots(selector)
}

/// Fold `<token> &`-style self references: a slot token standing alone where
/// the rule's own component is meant is rewritten to `&`. Used before
/// classification so a self-reference is distinguished from a genuine
/// cross-component selector.
pub fn fold_self_reference(selector: &str, self_slot_ids: &[usize]) -> String {
  let mut out = selector.to_string();
  for id in self_slot_ids {
    out = out.replace(&crate::template::slot_token(*id), "&");
  }
  out
}

#[cfg(test)]
mod tests {
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use super::*;

  fn compile(body: &str) -> CompiledRules {
    compile_block(&NestedCssCompiler, body).expect("compile")
  }

  #[test]
  fn compiles_flat_declarations() {
    let rules = compile("color: red; padding: 4px 8px;");
    assert_eq!(rules.rules.len(), 1);
    assert_eq!(rules.rules[0].selector, "&");
    assert_eq!(rules.rules[0].declarations.len(), 2);
    assert_eq!(rules.rules[0].declarations[0].property, "color");
    assert_eq!(rules.rules[0].declarations[1].value, "4px 8px");
  }

  #[test]
  fn resolves_nesting_against_immediate_parent() {
    let rules = compile(indoc! {"
      color: red;
      &:hover {
        color: blue;
        & span {
          color: green;
        }
      }
    "});
    let selectors: Vec<&str> = rules.rules.iter().map(|r| r.selector.as_str()).collect();
    assert_eq!(selectors, vec!["&", "&:hover", "&:hover span"]);
  }

  #[test]
  fn prefixes_parentless_nested_selectors() {
    let rules = compile(":focus { outline: none; } span { color: red; }");
    let selectors: Vec<&str> = rules.rules.iter().map(|r| r.selector.as_str()).collect();
    assert_eq!(selectors, vec!["&:focus", "& span"]);
  }

  #[test]
  fn distributes_comma_lists() {
    let rules = compile("&:hover, &:focus { & b { color: red; } }");
    assert_eq!(rules.rules.len(), 1);
    assert_eq!(rules.rules[0].selector, "&:hover b, &:focus b");
  }

  #[test]
  fn records_universal_selector_without_raising() {
    let rules = compile("& * { margin: 0; }");
    assert!(rules.saw_universal);
    assert_eq!(rules.rules.len(), 1);
  }

  #[test]
  fn carries_media_context() {
    let rules = compile("@media ( max-width : 600px ) { color: red; &:hover { color: blue; } }");
    assert_eq!(rules.rules.len(), 2);
    assert_eq!(rules.rules[0].at_rules, vec!["@media (max-width:600px)"]);
    assert_eq!(rules.rules[0].selector, "&");
    assert_eq!(rules.rules[1].selector, "&:hover");
    assert_eq!(rules.rules[1].at_rules, vec!["@media (max-width:600px)"]);
  }

  #[test]
  fn marks_unknown_at_rules_unsupported() {
    let rules = compile("@page { margin: 1cm; }");
    assert_eq!(rules.rules.len(), 1);
    assert_eq!(rules.rules[0].unsupported_at_rule.as_deref(), Some("@page"));
  }

  #[test]
  fn ignores_comments_and_strings() {
    let rules = compile(indoc! {r#"
      /* lead */
      content: "a;b{c}";
      color: red; /* trailing */
    "#});
    assert_eq!(rules.rules[0].declarations[0].value, r#""a;b{c}""#);
    assert_eq!(rules.rules[0].declarations[1].property, "color");
  }

  #[test]
  fn keeps_mixin_statements() {
    let token = crate::template::slot_token(0);
    let rules = compile(&format!("color: red; {token};"));
    let decls = &rules.rules[0].declarations;
    assert_eq!(decls.len(), 2);
    assert!(decls[1].is_mixin());
    assert_eq!(decls[1].value, token);
  }

  #[test]
  fn missing_colon_is_fatal() {
    let err = compile_block(&NestedCssCompiler, "color red;").unwrap_err();
    assert!(matches!(err, CssParseError::MissingColon { .. }));
  }

  #[test]
  fn unbalanced_braces_are_fatal() {
    let err = compile_block(&NestedCssCompiler, "&:hover { color: red;").unwrap_err();
    assert!(matches!(err, CssParseError::UnbalancedBraces { .. }));
  }

  #[test]
  fn unterminated_comment_is_fatal() {
    let err = compile_block(&NestedCssCompiler, "color: red; /* open").unwrap_err();
    assert!(matches!(
      err,
      CssParseError::Unterminated { what: "comment", .. }
    ));
  }

  #[test]
  fn compile_is_deterministic() {
    let body = indoc! {"
      color: red;
      &:hover, &:focus { color: blue; }
      @media (min-width: 30em) { padding: 8px; }
    "};
    let first = compile(body);
    let second = compile(body);
    assert_eq!(first, second);
  }

  #[test]
  fn normalizes_combinator_spacing() {
    assert_eq!(normalize_selector("&  +   &"), "& + &");
    assert_eq!(normalize_selector("& ~\t&.x"), "& ~ &.x");
    assert_eq!(normalize_selector("&:not( .a )"), "&:not( .a )");
  }
}
