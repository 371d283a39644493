//! Style-resolution engine for migrating dynamic CSS-in-JS component
//! definitions to a static atomic styling model.
//!
//! One call processes one styled-component definition (or CSS-helper
//! snippet) and returns either a fully resolved [`StyleRecord`] ready for an
//! emitter, or a categorized bail recorded in the caller-owned
//! [`Diagnostics`] sink. The engine is synchronous and stateless between
//! invocations; independent definitions may be processed concurrently, each
//! with its own diagnostics accumulator.

pub mod adapter;
pub mod builder;
pub mod context;
pub mod css;
pub mod diagnostics;
pub mod guard;
pub mod handlers;
pub mod selectors;
pub mod template;
pub mod types;
pub mod utils;

use swc_core::common::Spanned;
use swc_core::ecma::ast::Tpl;

pub use crate::adapter::{Adapter, ConsumerStatus, CrossFileFacts, DefaultAdapter, StyleMerger};
pub use crate::builder::{
  CompoundVariant, DeclScope, GlobalRule, MixinRef, ResolvedDeclaration, SelectorBucket,
  StyleRecord, VariantBucket,
};
pub use crate::context::{DynamicNodeContext, ExpressionShape};
pub use crate::css::{
  compile_block, CompiledRules, CssCompiler, CssRule, Declaration, NestedCssCompiler,
};
pub use crate::diagnostics::{CssParseError, Diagnostics, Severity, Warning, WarningCategory};
pub use crate::handlers::{
  resolve_dynamic_node, BailInfo, Decision, DynamicFnDescriptor, PropCondition, ResolveEnv,
  VariantDef,
};
pub use crate::selectors::{classify_selector, pseudo_selector, AttributeKind, SelectorKind};
pub use crate::template::{split_template, SplitTemplate, TemplateSlot};
pub use crate::types::{EngineOptions, FileFacts, StyledDefinition};

use crate::context::{build_context, Occurrence};
use crate::css::fold_self_reference;
use crate::diagnostics::WarningCategory as Category;
use crate::template::{find_slots, slot_token, split_around_slot};

/// The style-resolution and compilation engine. Holds only immutable
/// configuration and injected collaborators, so one engine can serve
/// concurrent callers processing independent definitions.
pub struct StyleEngine<'a> {
  options: EngineOptions,
  adapter: &'a dyn Adapter,
  cross_file: &'a CrossFileFacts,
  compiler: Box<dyn CssCompiler + Send + Sync>,
}

impl<'a> StyleEngine<'a> {
  pub fn new(
    options: EngineOptions,
    adapter: &'a dyn Adapter,
    cross_file: &'a CrossFileFacts,
  ) -> Self {
    Self {
      options,
      adapter,
      cross_file,
      compiler: Box::new(NestedCssCompiler),
    }
  }

  /// Swap in a different CSS-nesting compiler implementation.
  pub fn with_compiler(mut self, compiler: Box<dyn CssCompiler + Send + Sync>) -> Self {
    self.compiler = compiler;
    self
  }

  pub fn options(&self) -> &EngineOptions {
    &self.options
  }

  /// Resolve one styled-component definition.
  ///
  /// `Ok(Some(record))` — fully built; `Ok(None)` — bailed, with exactly one
  /// categorized warning per bail reason pushed into `diagnostics`;
  /// `Err` — malformed CSS reached the rule compiler (an upstream contract
  /// violation, never an expected unsupported pattern).
  pub fn resolve_definition(
    &self,
    definition: &StyledDefinition,
    facts: &FileFacts,
    diagnostics: &mut Diagnostics,
  ) -> Result<Option<StyleRecord>, CssParseError> {
    let split = split_template(&definition.template);
    if guard::check_definition(definition, &split, facts, diagnostics) {
      return Ok(None);
    }
    let compiled = compile_block(self.compiler.as_ref(), &split.css)?;
    if guard::check_universal(definition, &compiled, &self.options, diagnostics) {
      return Ok(None);
    }

    let env = ResolveEnv {
      adapter: self.adapter,
      facts,
      cross_file: self.cross_file,
      options: &self.options,
      compiler: self.compiler.as_ref(),
    };

    let mut resolved = Vec::new();
    for rule in &compiled.rules {
      self.resolve_rule(definition, &split, rule, &env, &mut resolved);
    }
    Ok(builder::build_style_record(
      &definition.name,
      resolved,
      diagnostics,
    ))
  }

  /// Resolve a standalone CSS-helper snippet (the unwrapped case). The same
  /// pipeline applies; the snippet is rooted at `&`.
  pub fn resolve_helper_snippet(
    &self,
    name: &str,
    template: &Tpl,
    facts: &FileFacts,
    diagnostics: &mut Diagnostics,
  ) -> Result<Option<StyleRecord>, CssParseError> {
    let definition = StyledDefinition::new(name, template.clone(), template.span());
    self.resolve_definition(&definition, facts, diagnostics)
  }

  fn resolve_rule(
    &self,
    definition: &StyledDefinition,
    split: &SplitTemplate,
    rule: &CssRule,
    env: &ResolveEnv<'_>,
    out: &mut Vec<ResolvedDeclaration>,
  ) {
    if let Some(at_rule) = &rule.unsupported_at_rule {
      out.push(bail_declaration(
        Category::UnsupportedSelector,
        format!("`{at_rule}` has no static counterpart"),
      ));
      return;
    }

    let scope = match self.resolve_rule_scope(definition, split, rule, env) {
      Ok(scope) => scope,
      Err(decl) => {
        out.push(decl);
        return;
      }
    };

    for declaration in &rule.declarations {
      if find_slots(&declaration.property).first().is_some() {
        out.push(bail_declaration(
          Category::UnsupportedCssHelper,
          "interpolated property names cannot be resolved statically",
        ));
        return;
      }
      let decision = self.resolve_declaration_value(split, declaration, env);
      out.push(ResolvedDeclaration {
        scope: scope.clone(),
        property: declaration.property.clone(),
        decision,
        span: None,
      });
    }
  }

  /// Resolve the rule's selector — fold self references, run remaining
  /// placeholders through the dynamic node resolver, classify — and map it
  /// to a builder scope.
  fn resolve_rule_scope(
    &self,
    definition: &StyledDefinition,
    split: &SplitTemplate,
    rule: &CssRule,
    env: &ResolveEnv<'_>,
  ) -> Result<DeclScope, ResolvedDeclaration> {
    let self_ids: Vec<usize> = split
      .slots
      .iter()
      .filter(|slot| {
        matches!(&*slot.expr, swc_core::ecma::ast::Expr::Ident(ident) if *ident.sym == *definition.name)
      })
      .map(|slot| slot.id)
      .collect();
    let mut selector = fold_self_reference(&rule.selector, &self_ids);

    let mut crossed_component = false;
    loop {
      let ids = find_slots(&selector);
      let Some(&id) = ids.first() else {
        break;
      };
      let token = slot_token(id);
      let start = selector.find(&token).unwrap_or_default();
      let prefix = selector[..start].to_string();
      let suffix = selector[start + token.len()..].to_string();
      let Some(slot) = split.slot(id) else {
        break;
      };
      let occurrence = Occurrence {
        css_property: None,
        in_selector: true,
        prefix: &prefix,
        suffix: &suffix,
      };
      let cx = build_context(&slot.expr, &occurrence, env.facts);
      let was_component = cx.shape == ExpressionShape::ComponentRef;
      match resolve_dynamic_node(&cx, env) {
        Decision::Convert(text) => {
          crossed_component |= was_component;
          selector = format!("{prefix}{text}{suffix}");
        }
        Decision::Bail(bail) => {
          return Err(ResolvedDeclaration {
            scope: DeclScope::Base,
            property: String::new(),
            decision: Decision::Bail(bail),
            span: Some(slot.span),
          });
        }
        _ => {
          return Err(bail_declaration(
            Category::UnsupportedSelector,
            "interpolated selector resolved to a non-static construct",
          ));
        }
      }
    }

    if crossed_component {
      // Bridge/marker-resolved cross-component target: handed to the emitter
      // as a global rule rather than classified against the closed set.
      return Ok(DeclScope::Global { selector });
    }

    match classify_selector(&selector) {
      SelectorKind::Base if rule.at_rules.is_empty() => Ok(DeclScope::Base),
      SelectorKind::Unsupported { reason } => Err(bail_declaration(
        Category::UnsupportedSelector,
        format!("unsupported selector `{selector}`: {reason}"),
      )),
      kind => {
        let canonical = match &kind {
          SelectorKind::Pseudo { pseudos } => pseudo_selector(pseudos),
          SelectorKind::Base => "&".to_string(),
          _ => selector.clone(),
        };
        let key = if rule.at_rules.is_empty() {
          canonical
        } else {
          format!("{} {}", rule.at_rules.join(" "), canonical)
        };
        Ok(DeclScope::Selector {
          key,
          kind,
          at_rules: rule.at_rules.clone(),
        })
      }
    }
  }

  fn resolve_declaration_value(
    &self,
    split: &SplitTemplate,
    declaration: &Declaration,
    env: &ResolveEnv<'_>,
  ) -> Decision {
    let ids = find_slots(&declaration.value);
    if ids.is_empty() {
      return Decision::Convert(declaration.value.clone());
    }

    let css_property = if declaration.is_mixin() {
      None
    } else {
      Some(declaration.property.as_str())
    };

    if ids.len() == 1 {
      let Some((prefix, id, suffix)) = split_around_slot(&declaration.value) else {
        return Decision::Convert(declaration.value.clone());
      };
      let Some(slot) = split.slot(id) else {
        return bail_decision(
          Category::UnsupportedCssHelper,
          "declaration references an unknown interpolation slot",
        );
      };
      let occurrence = Occurrence {
        css_property,
        in_selector: false,
        prefix: &prefix,
        suffix: &suffix,
      };
      let cx = build_context(&slot.expr, &occurrence, env.facts);
      return match resolve_dynamic_node(&cx, env) {
        Decision::Convert(text) => {
          Decision::Convert(format!("{prefix}{text}{suffix}").trim().to_string())
        }
        other => other,
      };
    }

    // Several interpolations in one value: every one of them must resolve to
    // static text, spliced in place.
    let mut value = declaration.value.clone();
    for id in ids {
      let Some(slot) = split.slot(id) else {
        return bail_decision(
          Category::UnsupportedCssHelper,
          "declaration references an unknown interpolation slot",
        );
      };
      let occurrence = Occurrence {
        css_property,
        in_selector: false,
        prefix: "",
        suffix: "",
      };
      let cx = build_context(&slot.expr, &occurrence, env.facts);
      match resolve_dynamic_node(&cx, env) {
        Decision::Convert(text) => {
          value = value.replace(&slot_token(id), &text);
        }
        Decision::Bail(bail) => return Decision::Bail(bail),
        _ => {
          return bail_decision(
            Category::UnsupportedCssHelper,
            "multiple interpolations in one value require static resolutions",
          );
        }
      }
    }
    Decision::Convert(value)
  }
}

fn bail_declaration(category: WarningCategory, message: impl Into<String>) -> ResolvedDeclaration {
  ResolvedDeclaration {
    scope: DeclScope::Base,
    property: String::new(),
    decision: bail_decision(category, message),
    span: None,
  }
}

fn bail_decision(category: WarningCategory, message: impl Into<String>) -> Decision {
  Decision::Bail(BailInfo {
    category,
    message: message.into(),
    span: None,
  })
}
