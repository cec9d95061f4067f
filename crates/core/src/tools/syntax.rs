//! # Syntax Validator
//!
//! Decides whether generated source would be accepted by the target
//! language's compiler. Nothing is ever executed.
//!
//! For Python the verdict comes from `rustpython-parser`, which follows the
//! CPython grammar including indentation, plus the checks CPython's
//! `compile()` applies after parsing (`return` outside a function, `break`
//! outside a loop, duplicate argument names). Tree-sitter then adds the
//! positions of every error node it can recover around, so whoever fixes
//! the file sees more than the first failure.

use rustpython_parser::{ast, Parse};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tree_sitter::{Node, Parser};

use crate::schema::TargetLanguage;

/// Source name reported by the parser, as in `compile(code, '<string>', 'exec')`
const SOURCE_PATH: &str = "<string>";

/// Pure syntax check for one target language
pub trait SyntaxValidator: Send + Sync {
    /// `true` when `source` parses without errors
    fn validate(&self, source: &str) -> bool;

    /// Location of each parse problem, empty when `validate` is `true`
    fn issues(&self, source: &str) -> Vec<SyntaxIssue>;
}

/// Validator for generated sources in `language`
pub fn validator_for(language: TargetLanguage) -> Box<dyn SyntaxValidator> {
    match language {
        TargetLanguage::Python => Box::new(PythonValidator::new()),
    }
}

/// A single parse problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Rejected by the compiler's grammar or post-parse checks
    Rejected,
    /// Tokens the error-recovering grammar could not place
    Unexpected,
    /// A token the error-recovering parser had to invent, e.g. a closing paren
    Missing,
}

impl std::fmt::Display for SyntaxIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at line {}, column {}", self.message, self.line, self.column)
    }
}

/// CPython-grammar validator with tree-sitter error positions
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonValidator;

impl PythonValidator {
    pub fn new() -> Self {
        Self
    }

    /// Problems that make `compile()` fail; the first parse error or every
    /// post-parse rejection
    fn rejections(&self, source: &str) -> Vec<SyntaxIssue> {
        match ast::Suite::parse(source, SOURCE_PATH) {
            Ok(suite) => {
                let mut found = Vec::new();
                check_block(&suite, Scope::default(), &mut found);
                found
                    .into_iter()
                    .map(|(offset, message)| issue_at(source, offset, IssueKind::Rejected, message))
                    .collect()
            }
            Err(e) => vec![issue_at(
                source,
                u32::from(e.offset),
                IssueKind::Rejected,
                e.error.to_string(),
            )],
        }
    }
}

impl SyntaxValidator for PythonValidator {
    fn validate(&self, source: &str) -> bool {
        self.rejections(source).is_empty()
    }

    fn issues(&self, source: &str) -> Vec<SyntaxIssue> {
        let mut issues = self.rejections(source);
        if issues.is_empty() {
            return issues;
        }
        for extra in tree_sitter_issues(source) {
            if !issues
                .iter()
                .any(|i| i.line == extra.line && i.column == extra.column)
            {
                issues.push(extra);
            }
        }
        issues
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Scope {
    in_function: bool,
    in_loop: bool,
}

fn check_block(body: &[ast::Stmt], scope: Scope, found: &mut Vec<(u32, String)>) {
    for stmt in body {
        check_stmt(stmt, scope, found);
    }
}

fn check_stmt(stmt: &ast::Stmt, scope: Scope, found: &mut Vec<(u32, String)>) {
    use ast::Stmt;

    match stmt {
        Stmt::FunctionDef(ast::StmtFunctionDef { args, body, .. })
        | Stmt::AsyncFunctionDef(ast::StmtAsyncFunctionDef { args, body, .. }) => {
            check_arguments(args, found);
            let inner = Scope {
                in_function: true,
                in_loop: false,
            };
            check_block(body, inner, found);
        }
        // A class body is its own scope: no enclosing function or loop.
        Stmt::ClassDef(ast::StmtClassDef { body, .. }) => {
            check_block(body, Scope::default(), found);
        }
        Stmt::For(ast::StmtFor { body, orelse, .. })
        | Stmt::AsyncFor(ast::StmtAsyncFor { body, orelse, .. })
        | Stmt::While(ast::StmtWhile { body, orelse, .. }) => {
            let inner = Scope {
                in_loop: true,
                ..scope
            };
            check_block(body, inner, found);
            check_block(orelse, scope, found);
        }
        Stmt::If(ast::StmtIf { body, orelse, .. }) => {
            check_block(body, scope, found);
            check_block(orelse, scope, found);
        }
        Stmt::With(ast::StmtWith { body, .. })
        | Stmt::AsyncWith(ast::StmtAsyncWith { body, .. }) => {
            check_block(body, scope, found);
        }
        Stmt::Try(ast::StmtTry {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        })
        | Stmt::TryStar(ast::StmtTryStar {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        }) => {
            check_block(body, scope, found);
            for handler in handlers {
                if let ast::ExceptHandler::ExceptHandler(handler) = handler {
                    check_block(&handler.body, scope, found);
                }
            }
            check_block(orelse, scope, found);
            check_block(finalbody, scope, found);
        }
        Stmt::Match(ast::StmtMatch { cases, .. }) => {
            for case in cases {
                check_block(&case.body, scope, found);
            }
        }
        Stmt::Return(ast::StmtReturn { range, .. }) if !scope.in_function => {
            found.push((u32::from(range.start()), "'return' outside function".to_string()));
        }
        Stmt::Break(ast::StmtBreak { range, .. }) if !scope.in_loop => {
            found.push((u32::from(range.start()), "'break' outside loop".to_string()));
        }
        Stmt::Continue(ast::StmtContinue { range, .. }) if !scope.in_loop => {
            found.push((
                u32::from(range.start()),
                "'continue' not properly in loop".to_string(),
            ));
        }
        _ => {}
    }
}

fn check_arguments(args: &ast::Arguments, found: &mut Vec<(u32, String)>) {
    let named = args
        .posonlyargs
        .iter()
        .chain(&args.args)
        .chain(&args.kwonlyargs)
        .map(|a| &a.def);
    let starred = args.vararg.iter().chain(&args.kwarg).map(|a| a.as_ref());

    let mut seen = HashSet::new();
    for arg in named.chain(starred) {
        let name = arg.arg.as_str();
        if !seen.insert(name) {
            found.push((
                u32::from(arg.range.start()),
                format!("duplicate argument '{}' in function definition", name),
            ));
        }
    }
}

fn issue_at(source: &str, offset: u32, kind: IssueKind, message: String) -> SyntaxIssue {
    let before = source.get(..offset as usize).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    SyntaxIssue {
        line,
        column,
        kind,
        message,
    }
}

fn tree_sitter_issues(source: &str) -> Vec<SyntaxIssue> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        tracing::warn!(error = %e, "Failed to load Python grammar");
        return Vec::new();
    }
    let Some(tree) = parser.parse(source, None) else {
        return Vec::new();
    };
    let mut issues = Vec::new();
    collect_issues(tree.root_node(), &mut issues);
    issues
}

fn collect_issues(node: Node<'_>, issues: &mut Vec<SyntaxIssue>) {
    if !node.has_error() {
        return;
    }
    let kind = if node.is_missing() {
        Some(IssueKind::Missing)
    } else if node.is_error() {
        Some(IssueKind::Unexpected)
    } else {
        None
    };
    if let Some(kind) = kind {
        let position = node.start_position();
        let message = match kind {
            IssueKind::Missing => format!("missing {}", node.kind()),
            _ => "syntax error".to_string(),
        };
        issues.push(SyntaxIssue {
            line: position.row + 1,
            column: position.column + 1,
            kind,
            message,
        });
        // Children of an error node are the tokens it swallowed.
        if node.is_error() {
            return;
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_issues(child, issues);
    }
}
