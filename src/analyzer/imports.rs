//! Module references in script sources.
//!
//! Sources are parsed with oxc and the AST is walked for static imports,
//! re-exports, `import()` and `require()` calls whose specifier is a string
//! literal. Single-file components contribute their `<script>` blocks.
//! Each [`ImportRef`] carries the byte span of the specifier text, without
//! its quotes, so the rewriter can splice it.

use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, ExportAllDeclaration, ExportNamedDeclaration, Expression,
    ImportDeclaration, ImportExpression, StringLiteral,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::SourceType;
use regex::Regex;

/// How a module is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import x from '...'`
    Static,
    /// `import type { X } from '...'`
    TypeOnly,
    /// `import '...'`
    SideEffect,
    /// `import('...')`
    Dynamic,
    /// `require('...')`
    Require,
    /// `export { x } from '...'`, `export * from '...'`
    ReExport,
}

/// A module specifier found in source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub specifier: String,
    /// Byte range of the specifier, excluding quotes
    pub span: Range<usize>,
    pub kind: ImportKind,
}

/// `<script>` blocks of a single-file component. The tag name must end at
/// whitespace or `>` so elements like `<scripts-panel>` are not scripts.
static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script(\s[^>]*)?>(.*?)</script\s*>"#).unwrap()
});

static LANG_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\blang\s*=\s*["']?([A-Za-z]+)"#).unwrap());

/// Collects module references from one parsed script.
struct Collector {
    /// Position of the script inside the file
    offset: usize,
    imports: Vec<ImportRef>,
}

impl Collector {
    fn push(&mut self, literal: &StringLiteral<'_>, kind: ImportKind) {
        let start = literal.span.start as usize + 1;
        let end = (literal.span.end as usize).saturating_sub(1).max(start);
        self.imports.push(ImportRef {
            specifier: literal.value.to_string(),
            span: self.offset + start..self.offset + end,
            kind,
        });
    }
}

impl<'a> Visit<'a> for Collector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        let kind = if decl.import_kind.is_type() {
            ImportKind::TypeOnly
        } else if decl.specifiers.is_none() {
            ImportKind::SideEffect
        } else {
            ImportKind::Static
        };
        self.push(&decl.source, kind);
    }

    fn visit_export_named_declaration(&mut self, decl: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &decl.source {
            self.push(source, ImportKind::ReExport);
        }
        walk::walk_export_named_declaration(self, decl);
    }

    fn visit_export_all_declaration(&mut self, decl: &ExportAllDeclaration<'a>) {
        self.push(&decl.source, ImportKind::ReExport);
    }

    fn visit_import_expression(&mut self, expr: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &expr.source {
            self.push(literal, ImportKind::Dynamic);
        }
        walk::walk_import_expression(self, expr);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(callee) = &call.callee {
            if callee.name == "require" && call.arguments.len() == 1 {
                if let Some(Argument::StringLiteral(literal)) = call.arguments.first() {
                    self.push(literal, ImportKind::Require);
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

fn source_type(typescript: bool, jsx: bool) -> SourceType {
    SourceType::default()
        .with_module(true)
        .with_typescript(typescript)
        .with_jsx(jsx)
}

/// Parser settings for a script file, by extension.
fn source_type_for(path: &Path) -> SourceType {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ts" | "mts" | "cts") => source_type(true, false),
        Some("tsx") => source_type(true, true),
        _ => source_type(false, true),
    }
}

/// Parser settings for an SFC script block, by its `lang` attribute.
fn source_type_for_lang(lang: Option<&str>) -> SourceType {
    match lang {
        Some("ts") => source_type(true, false),
        Some("tsx") => source_type(true, true),
        _ => source_type(false, true),
    }
}

fn parse_script(path: &Path, code: &str, offset: usize, source_type: SourceType) -> Vec<ImportRef> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, code, source_type).parse();
    if ret.panicked {
        tracing::warn!(
            "failed to parse {} ({} error(s)), no imports taken from it",
            path.display(),
            ret.errors.len()
        );
        return Vec::new();
    }
    if !ret.errors.is_empty() {
        tracing::debug!("{}: {} recoverable parse error(s)", path.display(), ret.errors.len());
    }

    let mut collector = Collector {
        offset,
        imports: Vec::new(),
    };
    collector.visit_program(&ret.program);
    collector.imports
}

/// Script blocks of a single-file component: body range and `lang`.
fn script_blocks(source: &str) -> Vec<(Range<usize>, Option<&str>)> {
    SCRIPT_BLOCK
        .captures_iter(source)
        .filter_map(|caps| {
            let body = caps.get(2)?;
            let lang = caps
                .get(1)
                .and_then(|attrs| LANG_ATTR.captures(attrs.as_str()))
                .and_then(|lang| lang.get(1))
                .map(|m| m.as_str());
            Some((body.range(), lang))
        })
        .collect()
}

/// Extract module references from a file, honoring its type.
///
/// References come back in source order.
pub fn extract_imports_for(path: &Path, source: &str) -> Vec<ImportRef> {
    let mut imports: Vec<ImportRef> = if path.extension().is_some_and(|ext| ext == "vue") {
        script_blocks(source)
            .into_iter()
            .flat_map(|(body, lang)| {
                let offset = body.start;
                parse_script(path, &source[body], offset, source_type_for_lang(lang))
            })
            .collect()
    } else {
        parse_script(path, source, 0, source_type_for(path))
    };
    imports.sort_by_key(|import| import.span.start);
    imports.dedup_by_key(|import| import.span.start);
    imports
}
