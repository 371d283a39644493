mod support;

use indoc::indoc;
use pretty_assertions::assert_eq;

use styled_atomic_engine::{
  compile_block, AttributeKind, ConsumerStatus, CrossFileFacts, EngineOptions, FileFacts,
  NestedCssCompiler, SelectorKind, WarningCategory,
};
use support::{resolve, resolve_with};

#[test]
fn static_declarations_build_a_base_record() {
  let resolved = resolve("color: red; padding: 4px 8px;");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "red");
  assert_eq!(record.base["padding"], "4px 8px");
  assert!(resolved.warnings.is_empty());
}

#[test]
fn resolvable_conditional_becomes_a_variant() {
  let resolved = resolve(r"color: ${(p) => p.$on ? 'red' : 'blue'};");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "blue");
  assert_eq!(record.variants.len(), 1);
  let bucket = &record.variants["$on=true"];
  assert_eq!(bucket.name, "On");
  assert_eq!(bucket.prop, "$on");
  assert_eq!(bucket.styles["color"], "red");
}

#[test]
fn chained_pseudo_classes_scope_a_bucket() {
  let resolved = resolve("&:focus:not(:disabled) { outline: none; }");
  let record = resolved.record.expect("record");
  let bucket = &record.selectors["&:focus:not(:disabled)"];
  assert_eq!(
    bucket.kind,
    SelectorKind::Pseudo {
      pseudos: vec![":focus:not(:disabled)".to_string()],
    }
  );
  assert_eq!(bucket.styles["outline"], "none");
}

#[test]
fn class_selectors_bail_the_definition() {
  let resolved = resolve("&.active { color: red; }");
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::UnsupportedSelector
  );
  assert!(resolved.warnings[0].message.contains("class selector"));
}

#[test]
fn boolean_branch_bails_instead_of_stringifying() {
  let resolved = resolve(r#"cursor: ${(p) => p.disabled ? true : "pointer"};"#);
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::BooleanCssValue
  );
}

#[test]
fn specificity_hack_bails_the_whole_definition() {
  // The hack is fatal regardless of the valid declarations
  // around it.
  let resolved = resolve(indoc! {"
    color: green;
    &&:hover { color: red; }
  "});
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::SpecificityHack
  );
}

#[test]
fn one_bailing_declaration_discards_the_entire_definition() {
  // The record is absent, not merely missing one rule.
  let resolved = resolve(indoc! {r"
    background: ${(p) => p.$a && p.$b ? 'x' : undefined};
    color: red;
  "});
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::AdapterReturnedUnresolved
  );
}

#[test]
fn logical_with_snippet_builds_a_multi_property_variant() {
  let resolved = resolve(r"${(p) => p.$active && css`color: red; font-weight: bold;`}");
  let record = resolved.record.expect("record");
  let bucket = &record.variants["$active=true"];
  assert_eq!(bucket.name, "Active");
  assert_eq!(bucket.styles["color"], "red");
  assert_eq!(bucket.styles["font-weight"], "bold");
  assert!(record.base.is_empty());
}

#[test]
fn logical_without_resolvable_prop_bails() {
  let resolved = resolve(r"${(p) => p.$a && p.$b && css`color: red;`}");
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
}

#[test]
fn theme_access_converts_to_a_token_reference() {
  let resolved = resolve(r"color: ${(p) => p.theme.colors.primary};");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "colors-primary");
}

#[test]
fn prop_access_becomes_a_dynamic_style_fn() {
  let resolved = resolve(r"width: ${(p) => p.$width}px;");
  let record = resolved.record.expect("record");
  assert!(record.base.is_empty());
  assert_eq!(record.dynamic_fns.len(), 1);
  let descriptor = &record.dynamic_fns[0];
  assert_eq!(descriptor.prop, "width");
  assert_eq!(descriptor.css_property, "width");
  assert_eq!(descriptor.value_path, vec!["$width".to_string()]);
  assert_eq!(descriptor.suffix, "px");
}

#[test]
fn keyframes_reference_converts_to_the_animation_name() {
  let facts = FileFacts::new().with_keyframes("pulse", Some("pulseAnim".to_string()));
  let resolved = resolve_with(
    r"animation: ${pulse} 2s linear infinite;",
    facts,
    EngineOptions::default(),
    CrossFileFacts::new(),
  );
  let record = resolved.record.expect("record");
  assert_eq!(record.base["animation"], "pulseAnim 2s linear infinite");
}

#[test]
fn helper_call_text_is_preserved() {
  let resolved = resolve(r"padding: ${spacing(2)};");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["padding"], "spacing(2)");
}

#[test]
fn helper_call_capturing_props_bails() {
  let resolved = resolve(r"padding: ${(p) => spacing(p.$size)};");
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::HelperCallUnresolved
  );
}

#[test]
fn static_snippet_mixin_inlines_declarations() {
  let resolved = resolve(r"${css`color: blue; margin: 0;`} padding: 4px;");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "blue");
  assert_eq!(record.base["margin"], "0");
  assert_eq!(record.base["padding"], "4px");
}

#[test]
fn snippet_with_interpolations_bails_as_a_closure() {
  let resolved = resolve(r"${css`color: ${accent};`}");
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::ClosureVariableInStaticHelper
  );
}

#[test]
fn helper_reference_is_kept_as_a_mixin() {
  let resolved = resolve(r"color: red; ${resetStyles};");
  let record = resolved.record.expect("record");
  assert_eq!(record.helper_mixins.len(), 1);
  assert_eq!(record.helper_mixins[0].call, "resetStyles");
}

#[test]
fn cross_component_parent_selector_always_bails() {
  let facts = FileFacts::new().with_component("Other");
  let resolved = resolve_with(
    r"${Other}:hover & { color: red; }",
    facts,
    EngineOptions::default(),
    CrossFileFacts::new(),
  );
  assert!(resolved.record.is_none());
  assert_eq!(resolved.warnings.len(), 1);
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::UnsupportedSelector
  );
}

#[test]
fn bridged_component_target_becomes_a_global_rule() {
  let facts = FileFacts::new().with_component("Icon");
  let mut cross_file = CrossFileFacts::new();
  cross_file.insert(
    "Icon",
    ConsumerStatus::NeedsBridge {
      bridge_class: "icon-b1c2".to_string(),
    },
  );
  let resolved = resolve_with(
    r"${Icon} { color: red; }",
    facts,
    EngineOptions::default(),
    cross_file,
  );
  let record = resolved.record.expect("record");
  assert_eq!(record.global_rules.len(), 1);
  assert_eq!(record.global_rules[0].selector, "& .icon-b1c2");
  assert_eq!(record.global_rules[0].styles["color"], "red");
}

#[test]
fn unbridged_component_target_bails() {
  let facts = FileFacts::new().with_component("Icon");
  let resolved = resolve_with(
    r"${Icon} { color: red; }",
    facts,
    EngineOptions::default(),
    CrossFileFacts::new(),
  );
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::UnsupportedSelector
  );
}

#[test]
fn component_reference_outside_a_selector_is_benign() {
  let facts = FileFacts::new().with_component("Icon");
  let resolved = resolve_with(
    r"content: ${Icon};",
    facts,
    EngineOptions::default(),
    CrossFileFacts::new(),
  );
  let record = resolved.record.expect("record");
  assert_eq!(record.base["content"], "Icon");
}

#[test]
fn universal_selector_bails_by_default() {
  let resolved = resolve("& * { margin: 0; }");
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::UniversalSelector
  );
}

#[test]
fn universal_selector_policy_can_be_relaxed() {
  let options = EngineOptions {
    allow_universal_selector: true,
    ..EngineOptions::default()
  };
  let resolved = resolve_with(
    "color: red; & * { margin: 0; }",
    FileFacts::new(),
    options,
    CrossFileFacts::new(),
  );
  // The universal rule itself still classifies as unsupported, but the
  // policy no longer makes its mere presence fatal up front.
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::UnsupportedSelector
  );
}

#[test]
fn unresolvable_conditional_degrades_to_the_falsy_branch() {
  let resolved = resolve(r"color: ${(p) => p.$a && p.$b ? 'x' : 'y'};");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "y");
  assert!(resolved.warnings.is_empty());
}

#[test]
fn strict_conditionals_bail_instead_of_degrading() {
  let options = EngineOptions {
    strict_conditionals: true,
    ..EngineOptions::default()
  };
  let resolved = resolve_with(
    r"color: ${(p) => p.$a && p.$b ? 'x' : 'y'};",
    FileFacts::new(),
    options,
    CrossFileFacts::new(),
  );
  assert!(resolved.record.is_none());
  assert_eq!(
    resolved.warnings[0].category,
    WarningCategory::AdapterReturnedUnresolved
  );
}

#[test]
fn nested_conditional_produces_compound_variants() {
  let resolved = resolve(r"color: ${(p) => p.$a ? (p.$b ? 'x' : 'y') : 'z'};");
  let record = resolved.record.expect("record");
  assert_eq!(record.base["color"], "z");
  assert_eq!(record.compound_variants.len(), 2);
  for compound in &record.compound_variants {
    assert_eq!(compound.conditions.len(), 2);
  }
  let narrow = record
    .compound_variants
    .iter()
    .find(|c| c.conditions.iter().all(|cond| cond.truthy))
    .expect("both-true compound");
  assert_eq!(narrow.styles["color"], "x");
}

#[test]
fn overlapping_variants_pin_override_order_with_a_compound() {
  let resolved = resolve(indoc! {r"
    color: ${(p) => p.$a ? 'red' : 'gray'};
    color: ${(p) => p.$b ? 'green' : 'gray'};
  "});
  let record = resolved.record.expect("record");
  assert_eq!(record.compound_variants.len(), 1);
  let compound = &record.compound_variants[0];
  assert_eq!(compound.conditions.len(), 2);
  assert_eq!(compound.styles["color"], "green");
}

#[test]
fn media_rules_carry_their_context() {
  let resolved = resolve("@media (min-width: 30em) { color: red; }");
  let record = resolved.record.expect("record");
  let bucket = &record.selectors["@media (min-width:30em) &"];
  assert_eq!(bucket.kind, SelectorKind::Base);
  assert_eq!(bucket.at_rules, vec!["@media (min-width:30em)".to_string()]);
  assert_eq!(bucket.styles["color"], "red");
}

#[test]
fn attribute_catalog_survives_the_pipeline() {
  let resolved = resolve("&[href^='https']::placeholder { color: red; }");
  // Attribute plus pseudo-element is outside the catalog.
  assert!(resolved.record.is_none());

  let resolved = resolve("&[href^='https'] { color: red; }");
  let record = resolved.record.expect("record");
  let bucket = record.selectors.values().next().expect("bucket");
  assert_eq!(
    bucket.kind,
    SelectorKind::Attribute {
      kind: AttributeKind::HrefPrefix,
      value: Some("https".to_string()),
      pseudo_element: None,
    }
  );
}

#[test]
fn sibling_rules_are_scoped() {
  let resolved = resolve("& + & { margin-top: 8px; }");
  let record = resolved.record.expect("record");
  let bucket = &record.selectors["& + &"];
  assert_eq!(
    bucket.kind,
    SelectorKind::AdjacentSibling {
      selector_arg: String::new(),
    }
  );
  assert_eq!(bucket.styles["margin-top"], "8px");
}

#[test]
fn resolution_is_deterministic() {
  let body = indoc! {r"
    color: ${(p) => p.$on ? 'red' : 'blue'};
    &:hover { color: ${(p) => p.theme.colors.hover}; }
    @media (min-width: 30em) { padding: 8px; }
  "};
  let first = resolve(body);
  let second = resolve(body);
  assert_eq!(first.record, second.record);
  assert_eq!(first.warnings, second.warnings);
}

#[test]
fn compiling_generated_blocks_twice_is_byte_identical() {
  // Deterministic pseudo-random corpus: a small LCG drives block shape.
  let properties = ["color", "margin", "padding", "display", "opacity"];
  let values = ["red", "0", "4px 8px", "flex", "0.5"];
  let selectors = ["&:hover", "&:focus", "& span", "&::before", "&[disabled]"];
  let mut state: u64 = 0x5DEECE66D;
  let mut next = move |bound: usize| {
    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (state >> 33) as usize % bound
  };
  for _ in 0..50 {
    let mut block = String::new();
    for _ in 0..next(4) + 1 {
      block.push_str(&format!(
        "{}: {};",
        properties[next(properties.len())],
        values[next(values.len())]
      ));
    }
    for _ in 0..next(3) {
      block.push_str(&format!(
        "{} {{ {}: {}; }}",
        selectors[next(selectors.len())],
        properties[next(properties.len())],
        values[next(values.len())]
      ));
    }
    let first = compile_block(&NestedCssCompiler, &block).expect("compile");
    let second = compile_block(&NestedCssCompiler, &block).expect("compile");
    assert_eq!(first, second, "block: {block}");
  }
}

#[test]
fn malformed_css_is_a_fatal_error_not_a_warning() {
  let template = support::parse_template("color red;");
  let definition = styled_atomic_engine::StyledDefinition::new(
    "Broken",
    template,
    swc_core::common::DUMMY_SP,
  );
  let adapter = styled_atomic_engine::DefaultAdapter;
  let cross_file = CrossFileFacts::new();
  let engine = styled_atomic_engine::StyleEngine::new(EngineOptions::default(), &adapter, &cross_file);
  let mut diagnostics = styled_atomic_engine::Diagnostics::new();
  let result = engine.resolve_definition(&definition, &FileFacts::new(), &mut diagnostics);
  assert!(result.is_err());
  assert!(diagnostics.is_empty());
}
