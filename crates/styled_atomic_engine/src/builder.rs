use indexmap::IndexMap;
use serde::Serialize;
use swc_core::common::Span;

use crate::diagnostics::{Diagnostics, Warning};
use crate::handlers::{variant_name, Decision, DynamicFnDescriptor, PropCondition, VariantDef};
use crate::selectors::SelectorKind;

/// Where a resolved declaration lands inside the style record.
#[derive(Clone, Debug, PartialEq)]
pub enum DeclScope {
  Base,
  Selector {
    key: String,
    kind: SelectorKind,
    at_rules: Vec<String>,
  },
  /// A bridge-resolved cross-component rule; emitted as a global selector by
  /// the emitter.
  Global { selector: String },
}

/// One per-declaration decision, positioned for the IR builder.
#[derive(Clone, Debug)]
pub struct ResolvedDeclaration {
  pub scope: DeclScope,
  pub property: String,
  pub decision: Decision,
  pub span: Option<Span>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SelectorBucket {
  pub kind: SelectorKind,
  pub at_rules: Vec<String>,
  pub styles: IndexMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantBucket {
  pub name: String,
  pub prop: String,
  pub truthy: bool,
  pub styles: IndexMap<String, String>,
  /// Styles scoped to a named selector inside this variant.
  pub selector_styles: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompoundVariant {
  pub name: String,
  pub conditions: Vec<PropCondition>,
  pub selector: Option<String>,
  pub styles: IndexMap<String, String>,
}

/// A helper-call mixin preserved for the emitter to re-target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MixinRef {
  pub call: String,
  pub selector: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GlobalRule {
  pub selector: String,
  pub styles: IndexMap<String, String>,
}

/// Canonical per-definition style record, the engine's sole output contract
/// besides warnings. Consumed read-only by the emitter; two records never
/// share mutable state.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StyleRecord {
  pub component: String,
  pub base: IndexMap<String, String>,
  pub selectors: IndexMap<String, SelectorBucket>,
  pub variants: IndexMap<String, VariantBucket>,
  /// Sorted by descending specificity: more constraining prop combinations
  /// first, so emitted conditional chains evaluate narrower cases before
  /// broader ones.
  pub compound_variants: Vec<CompoundVariant>,
  pub dynamic_fns: Vec<DynamicFnDescriptor>,
  pub helper_mixins: Vec<MixinRef>,
  pub global_rules: Vec<GlobalRule>,
}

/// Fold all per-declaration decisions for one styled-component definition
/// into one style record. Any single bail aborts the entire definition:
/// partial styling is never emitted.
pub fn build_style_record(
  component: &str,
  declarations: Vec<ResolvedDeclaration>,
  diagnostics: &mut Diagnostics,
) -> Option<StyleRecord> {
  let mut record = StyleRecord {
    component: component.to_string(),
    ..StyleRecord::default()
  };

  for decl in declarations {
    match decl.decision {
      Decision::Bail(bail) => {
        let mut warning = Warning::new(bail.category, bail.message);
        warning.span = bail.span.or(decl.span);
        diagnostics.push(warning);
        tracing::debug!(component, "definition bailed; discarding partial record");
        return None;
      }
      Decision::Convert(value) => {
        if decl.property.is_empty() {
          record.helper_mixins.push(MixinRef {
            call: value,
            selector: scope_selector(&decl.scope),
          });
        } else {
          insert_scoped(&mut record, &decl.scope, &decl.property, value);
        }
      }
      Decision::ConvertDeclarations(styles) => {
        for (property, value) in styles {
          insert_scoped(&mut record, &decl.scope, &property, value);
        }
      }
      Decision::Variant { base, variants, .. } => {
        for (property, value) in base {
          insert_scoped(&mut record, &decl.scope, &property, value);
        }
        for variant in variants {
          insert_variant(&mut record, &decl.scope, variant);
        }
      }
      Decision::DynamicStyleFn(descriptor) => {
        // Deduplicate per (prop, css property).
        let exists = record.dynamic_fns.iter().any(|existing| {
          existing.prop == descriptor.prop && existing.css_property == descriptor.css_property
        });
        if !exists {
          record.dynamic_fns.push(descriptor);
        }
      }
    }
  }

  synthesize_overlap_compounds(&mut record);
  record
    .compound_variants
    .sort_by_key(|compound| std::cmp::Reverse(compound.conditions.len()));
  Some(record)
}

fn scope_selector(scope: &DeclScope) -> Option<String> {
  match scope {
    DeclScope::Base => None,
    DeclScope::Selector { key, .. } => Some(key.clone()),
    DeclScope::Global { selector } => Some(selector.clone()),
  }
}

fn insert_scoped(record: &mut StyleRecord, scope: &DeclScope, property: &str, value: String) {
  match scope {
    DeclScope::Base => {
      record.base.insert(property.to_string(), value);
    }
    DeclScope::Selector {
      key,
      kind,
      at_rules,
    } => {
      let bucket = record
        .selectors
        .entry(key.clone())
        .or_insert_with(|| SelectorBucket {
          kind: kind.clone(),
          at_rules: at_rules.clone(),
          styles: IndexMap::new(),
        });
      bucket.styles.insert(property.to_string(), value);
    }
    DeclScope::Global { selector } => {
      let idx = record
        .global_rules
        .iter()
        .position(|rule| rule.selector == *selector);
      match idx {
        Some(idx) => {
          record.global_rules[idx]
            .styles
            .insert(property.to_string(), value);
        }
        None => {
          let mut styles = IndexMap::new();
          styles.insert(property.to_string(), value);
          record.global_rules.push(GlobalRule {
            selector: selector.clone(),
            styles,
          });
        }
      }
    }
  }
}

fn insert_variant(record: &mut StyleRecord, scope: &DeclScope, variant: VariantDef) {
  if variant.conditions.len() >= 2 {
    let selector = scope_selector(scope);
    let idx = record.compound_variants.iter().position(|existing| {
      existing.conditions == variant.conditions && existing.selector == selector
    });
    match idx {
      Some(idx) => record.compound_variants[idx].styles.extend(variant.styles),
      None => record.compound_variants.push(CompoundVariant {
        name: variant.name,
        conditions: variant.conditions,
        selector,
        styles: variant.styles,
      }),
    }
    return;
  }
  let Some(condition) = variant.conditions.first() else {
    return;
  };
  let key = format!("{}={}", condition.prop, condition.truthy);
  let bucket = record
    .variants
    .entry(key)
    .or_insert_with(|| VariantBucket {
      name: variant.name.clone(),
      prop: condition.prop.clone(),
      truthy: condition.truthy,
      styles: IndexMap::new(),
      selector_styles: IndexMap::new(),
    });
  match scope {
    DeclScope::Base | DeclScope::Global { .. } => bucket.styles.extend(variant.styles),
    DeclScope::Selector { key, .. } => {
      bucket
        .selector_styles
        .entry(key.clone())
        .or_default()
        .extend(variant.styles);
    }
  }
}

/// Rule (d): when two single-prop variants touch the same CSS property under
/// different prop conditions, pin the override order with a compound variant
/// instead of leaving two independent buckets to race.
fn synthesize_overlap_compounds(record: &mut StyleRecord) {
  let buckets: Vec<(usize, String)> = record
    .variants
    .values()
    .enumerate()
    .flat_map(|(i, bucket)| {
      bucket
        .styles
        .keys()
        .map(move |property| (i, property.clone()))
    })
    .collect();

  let mut new_compounds: Vec<CompoundVariant> = Vec::new();
  for (a_idx, property) in &buckets {
    for (b_idx, other_property) in &buckets {
      if b_idx <= a_idx || property != other_property {
        continue;
      }
      let a = &record.variants[*a_idx];
      let b = &record.variants[*b_idx];
      if a.prop == b.prop {
        continue;
      }
      let conditions = vec![
        PropCondition {
          prop: a.prop.clone(),
          truthy: a.truthy,
        },
        PropCondition {
          prop: b.prop.clone(),
          truthy: b.truthy,
        },
      ];
      let already = record
        .compound_variants
        .iter()
        .chain(new_compounds.iter())
        .any(|existing| existing.conditions == conditions && existing.selector.is_none());
      if already {
        continue;
      }
      // Later declaration wins when both flags are set (source order).
      let value = b.styles[property.as_str()].clone();
      let mut styles = IndexMap::new();
      styles.insert(property.clone(), value);
      new_compounds.push(CompoundVariant {
        name: variant_name(&conditions),
        conditions,
        selector: None,
        styles,
      });
    }
  }
  record.compound_variants.extend(new_compounds);
}

#[cfg(test)]
mod tests {
  use indexmap::IndexMap;
  use pretty_assertions::assert_eq;

  use super::*;
  use crate::diagnostics::{Diagnostics, WarningCategory};
  use crate::handlers::BailInfo;

  fn convert(property: &str, value: &str) -> ResolvedDeclaration {
    ResolvedDeclaration {
      scope: DeclScope::Base,
      property: property.to_string(),
      decision: Decision::Convert(value.to_string()),
      span: None,
    }
  }

  fn variant_decl(property: &str, prop: &str, value: &str, base: &str) -> ResolvedDeclaration {
    let conditions = vec![PropCondition {
      prop: prop.to_string(),
      truthy: true,
    }];
    let mut styles = IndexMap::new();
    styles.insert(property.to_string(), value.to_string());
    let mut base_styles = IndexMap::new();
    base_styles.insert(property.to_string(), base.to_string());
    ResolvedDeclaration {
      scope: DeclScope::Base,
      property: property.to_string(),
      decision: Decision::Variant {
        base: base_styles,
        prop: prop.to_string(),
        variants: vec![VariantDef {
          name: variant_name(&conditions),
          conditions,
          styles,
        }],
      },
      span: None,
    }
  }

  #[test]
  fn converts_land_in_the_base_bucket() {
    let mut diagnostics = Diagnostics::new();
    let record = build_style_record(
      "Button",
      vec![convert("color", "red"), convert("padding", "4px")],
      &mut diagnostics,
    )
    .expect("record");
    assert_eq!(record.base["color"], "red");
    assert_eq!(record.base["padding"], "4px");
    assert!(diagnostics.is_empty());
  }

  #[test]
  fn variants_sharing_a_condition_merge_into_one_bucket() {
    let mut diagnostics = Diagnostics::new();
    let record = build_style_record(
      "Button",
      vec![
        variant_decl("color", "$on", "red", "blue"),
        variant_decl("background", "$on", "black", "white"),
      ],
      &mut diagnostics,
    )
    .expect("record");
    assert_eq!(record.variants.len(), 1);
    let bucket = &record.variants["$on=true"];
    assert_eq!(bucket.styles.len(), 2);
    assert_eq!(bucket.styles["color"], "red");
    assert_eq!(bucket.styles["background"], "black");
  }

  #[test]
  fn overlapping_variants_spawn_a_compound() {
    let mut diagnostics = Diagnostics::new();
    let record = build_style_record(
      "Button",
      vec![
        variant_decl("color", "$a", "red", "gray"),
        variant_decl("color", "$b", "green", "gray"),
      ],
      &mut diagnostics,
    )
    .expect("record");
    assert_eq!(record.compound_variants.len(), 1);
    let compound = &record.compound_variants[0];
    assert_eq!(compound.conditions.len(), 2);
    // Source order: the later declaration's value wins when both flags hold.
    assert_eq!(compound.styles["color"], "green");
  }

  #[test]
  fn compounds_sort_narrower_first() {
    let mut diagnostics = Diagnostics::new();
    let two = vec![
      PropCondition {
        prop: "$a".to_string(),
        truthy: true,
      },
      PropCondition {
        prop: "$b".to_string(),
        truthy: true,
      },
    ];
    let mut styles = IndexMap::new();
    styles.insert("color".to_string(), "x".to_string());
    let compound_decl = ResolvedDeclaration {
      scope: DeclScope::Base,
      property: "color".to_string(),
      decision: Decision::Variant {
        base: IndexMap::new(),
        prop: "$a".to_string(),
        variants: vec![VariantDef {
          name: variant_name(&two),
          conditions: two.clone(),
          styles,
        }],
      },
      span: None,
    };
    let record = build_style_record(
      "Button",
      vec![variant_decl("color", "$a", "red", "gray"), compound_decl],
      &mut diagnostics,
    )
    .expect("record");
    assert_eq!(record.compound_variants[0].conditions.len(), 2);
  }

  #[test]
  fn any_bail_discards_the_whole_record() {
    let mut diagnostics = Diagnostics::new();
    let record = build_style_record(
      "Button",
      vec![
        convert("color", "red"),
        ResolvedDeclaration {
          scope: DeclScope::Base,
          property: "background".to_string(),
          decision: Decision::Bail(BailInfo {
            category: WarningCategory::AdapterReturnedUnresolved,
            message: "unresolvable".to_string(),
            span: None,
          }),
          span: None,
        },
      ],
      &mut diagnostics,
    );
    assert!(record.is_none());
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(
      diagnostics.warnings()[0].category,
      WarningCategory::AdapterReturnedUnresolved
    );
  }

  #[test]
  fn dynamic_fns_deduplicate_per_prop_and_property() {
    let mut diagnostics = Diagnostics::new();
    let descriptor = DynamicFnDescriptor {
      prop: "size".to_string(),
      css_property: "width".to_string(),
      value_path: vec!["$size".to_string()],
      prefix: String::new(),
      suffix: "px".to_string(),
    };
    let decl = |d: DynamicFnDescriptor| ResolvedDeclaration {
      scope: DeclScope::Base,
      property: "width".to_string(),
      decision: Decision::DynamicStyleFn(d),
      span: None,
    };
    let record = build_style_record(
      "Box",
      vec![decl(descriptor.clone()), decl(descriptor)],
      &mut diagnostics,
    )
    .expect("record");
    assert_eq!(record.dynamic_fns.len(), 1);
  }
}
