use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap};
use swc_core::ecma::ast::{EsVersion, Expr, Tpl};
use swc_core::ecma::parser::{lexer::Lexer, EsSyntax, Parser, StringInput, Syntax};

use styled_atomic_engine::{
  CrossFileFacts, DefaultAdapter, Diagnostics, EngineOptions, FileFacts, StyleEngine, StyleRecord,
  StyledDefinition, Warning,
};

pub fn parse_expr(source: &str) -> Box<Expr> {
  let cm: Lrc<SourceMap> = Default::default();
  let fm = cm.new_source_file(
    FileName::Custom("fixture.js".into()).into(),
    source.to_string(),
  );
  let lexer = Lexer::new(
    Syntax::Es(EsSyntax::default()),
    EsVersion::Es2022,
    StringInput::from(&*fm),
    None,
  );
  let mut parser = Parser::new_from(lexer);
  parser.parse_expr().expect("failed to parse expression")
}

/// Parse a CSS-in-JS body as a template literal, exactly as it appears
/// between the backticks of a styled call.
pub fn parse_template(css_in_js: &str) -> Tpl {
  let source = format!("`{css_in_js}`");
  match *parse_expr(&source) {
    Expr::Tpl(tpl) => tpl,
    other => panic!("expected a template literal, got {other:?}"),
  }
}

pub struct Resolved {
  pub record: Option<StyleRecord>,
  pub warnings: Vec<Warning>,
}

pub fn resolve(css_in_js: &str) -> Resolved {
  resolve_with(
    css_in_js,
    FileFacts::new(),
    EngineOptions::default(),
    CrossFileFacts::new(),
  )
}

pub fn resolve_with(
  css_in_js: &str,
  facts: FileFacts,
  options: EngineOptions,
  cross_file: CrossFileFacts,
) -> Resolved {
  let template = parse_template(css_in_js);
  let span = swc_core::common::DUMMY_SP;
  let definition = StyledDefinition::new("Component", template, span);
  let adapter = DefaultAdapter;
  let engine = StyleEngine::new(options, &adapter, &cross_file);
  let mut diagnostics = Diagnostics::new();
  let record = engine
    .resolve_definition(&definition, &facts, &mut diagnostics)
    .expect("CSS should compile");
  Resolved {
    record,
    warnings: diagnostics.into_warnings(),
  }
}
