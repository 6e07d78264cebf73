use std::cell::RefCell;

use crate::ast::{Ast, Bindings};
use crate::lexer::TokenTree;

pub const MAX_DEPTH: usize = 128;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("{node} expects {expected}, found {found}")]
    Arity {
        node: &'static str,
        expected: &'static str,
        found: usize,
    },
    #[error("{node} expects an identifier symbol first, found {found}")]
    ExpectedIdentifier {
        node: &'static str,
        found: &'static str,
    },
    #[error("list expects its argument to parse to a sequence, found {found}")]
    ListShape { found: &'static str },
    #[error("{node} binder must be a (name expression) pair, found {found}")]
    MalformedBinder { node: &'static str, found: String },
    #[error("form nesting exceeds the maximum depth of {limit}")]
    TooDeep { limit: usize },
}

#[derive(Debug, PartialEq)]
pub struct ParseErrorWithContext {
    pub error: ParseError,
    path: Vec<&'static str>,
}

impl std::error::Error for ParseErrorWithContext {}

impl std::fmt::Display for ParseErrorWithContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "while parsing {}: {}", self.path.join(" > "), self.error)
    }
}

#[derive(Debug)]
struct ParseContext {
    stack: RefCell<Vec<&'static str>>,
}

impl ParseContext {
    fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, name: &'static str) -> ParseContextGuard {
        self.stack.borrow_mut().push(name);
        ParseContextGuard::new(self)
    }

    fn pop(&self) {
        self.stack.borrow_mut().pop();
    }

    fn error(&self, error: ParseError) -> ParseErrorWithContext {
        ParseErrorWithContext {
            error,
            path: self.stack.borrow().clone(),
        }
    }
}

struct ParseContextGuard<'a> {
    context: &'a ParseContext,
}

impl<'a> ParseContextGuard<'a> {
    fn new(context: &'a ParseContext) -> Self {
        Self { context }
    }
}

impl<'a> Drop for ParseContextGuard<'a> {
    fn drop(&mut self) {
        self.context.pop();
    }
}

#[derive(Debug, Clone, Copy)]
enum Keyword {
    Table,
    Fields,
    Transform,
    Renderer,
    Let,
    List,
    Import,
    Bind,
    Pull,
}

impl Keyword {
    // The reserved heads. `push` is deliberately not among them: Push
    // nodes are built by consumers of the tree, never dispatched from
    // source text.
    fn lookup(name: &str) -> Option<Keyword> {
        match name {
            "table" => Some(Keyword::Table),
            "fields" => Some(Keyword::Fields),
            "transform" => Some(Keyword::Transform),
            "renderer" => Some(Keyword::Renderer),
            "let" => Some(Keyword::Let),
            "list" => Some(Keyword::List),
            "import" => Some(Keyword::Import),
            "bind" => Some(Keyword::Bind),
            "pull" => Some(Keyword::Pull),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Keyword::Table => "table",
            Keyword::Fields => "fields",
            Keyword::Transform => "transform",
            Keyword::Renderer => "renderer",
            Keyword::Let => "let",
            Keyword::List => "list",
            Keyword::Import => "import",
            Keyword::Bind => "bind",
            Keyword::Pull => "pull",
        }
    }
}

pub fn parse(tree: &TokenTree) -> Result<Ast, ParseErrorWithContext> {
    let context = ParseContext::new();
    let _guard = context.push("program");
    parse_form(&context, tree, 0)
}

fn parse_form(
    context: &ParseContext,
    tree: &TokenTree,
    depth: usize,
) -> Result<Ast, ParseErrorWithContext> {
    if depth > MAX_DEPTH {
        return Err(context.error(ParseError::TooDeep { limit: MAX_DEPTH }));
    }
    match tree {
        TokenTree::Symbol(name) => Ok(Ast::Symbol(name.clone())),
        TokenTree::String(text) => Ok(Ast::String(text.clone())),
        TokenTree::Number(number) => Ok(Ast::Number(*number)),
        TokenTree::List(items) => match items.first() {
            Some(TokenTree::Symbol(head)) => match Keyword::lookup(head) {
                Some(keyword) => {
                    let _guard = context.push(keyword.name());
                    let args = parse_each(context, &items[1..], depth + 1)?;
                    construct(context, keyword, args)
                }
                // an unrecognized head is not an error: the whole form
                // passes through, head included
                None => passthrough(context, items, depth),
            },
            _ => passthrough(context, items, depth),
        },
    }
}

fn passthrough(
    context: &ParseContext,
    items: &[TokenTree],
    depth: usize,
) -> Result<Ast, ParseErrorWithContext> {
    Ok(Ast::Seq(parse_each(context, items, depth + 1)?))
}

fn parse_each(
    context: &ParseContext,
    items: &[TokenTree],
    depth: usize,
) -> Result<Vec<Ast>, ParseErrorWithContext> {
    items
        .iter()
        .map(|item| parse_form(context, item, depth))
        .collect()
}

fn construct(
    context: &ParseContext,
    keyword: Keyword,
    args: Vec<Ast>,
) -> Result<Ast, ParseErrorWithContext> {
    match keyword {
        Keyword::Table => {
            let (id, policy) = identified(context, "table", args)?;
            Ok(Ast::Table { id, policy })
        }
        Keyword::Transform => {
            let (id, policy) = identified(context, "transform", args)?;
            Ok(Ast::Transform { id, policy })
        }
        Keyword::Renderer => {
            let (id, expr) = identified(context, "renderer", args)?;
            Ok(Ast::Renderer { id, expr })
        }
        Keyword::Fields => Ok(Ast::Fields(args)),
        Keyword::Import => Ok(Ast::Import(args)),
        Keyword::List => list_node(context, args),
        Keyword::Let => let_node(context, args),
        Keyword::Bind => Ok(Ast::Bind(binder_map(context, "bind", args)?)),
        Keyword::Pull => {
            let [source, expr] = fixed(context, "pull", "exactly 2 arguments", args)?;
            Ok(Ast::Pull {
                source: Box::new(source),
                expr: Box::new(expr),
            })
        }
    }
}

fn identified(
    context: &ParseContext,
    node: &'static str,
    args: Vec<Ast>,
) -> Result<(String, Vec<Ast>), ParseErrorWithContext> {
    let mut args = args.into_iter();
    match args.next() {
        Some(Ast::Symbol(id)) => Ok((id, args.collect())),
        Some(other) => Err(context.error(ParseError::ExpectedIdentifier {
            node,
            found: other.kind(),
        })),
        None => Err(context.error(ParseError::Arity {
            node,
            expected: "an identifier first",
            found: 0,
        })),
    }
}

fn fixed<const N: usize>(
    context: &ParseContext,
    node: &'static str,
    expected: &'static str,
    args: Vec<Ast>,
) -> Result<[Ast; N], ParseErrorWithContext> {
    let found = args.len();
    args.try_into()
        .map_err(|_| context.error(ParseError::Arity {
            node,
            expected,
            found,
        }))
}

fn list_node(context: &ParseContext, args: Vec<Ast>) -> Result<Ast, ParseErrorWithContext> {
    let [arg] = fixed(context, "list", "exactly 1 argument", args)?;
    match arg {
        Ast::Seq(elts) => Ok(Ast::List(elts)),
        other => Err(context.error(ParseError::ListShape {
            found: other.kind(),
        })),
    }
}

fn let_node(context: &ParseContext, mut args: Vec<Ast>) -> Result<Ast, ParseErrorWithContext> {
    let Some(body) = args.pop() else {
        return Err(context.error(ParseError::Arity {
            node: "let",
            expected: "at least a body",
            found: 0,
        }));
    };
    let bindings = binder_map(context, "let", args)?;
    Ok(Ast::Let {
        bindings,
        body: Box::new(body),
    })
}

fn binder_map(
    context: &ParseContext,
    node: &'static str,
    forms: Vec<Ast>,
) -> Result<Bindings, ParseErrorWithContext> {
    let mut bindings = Bindings::new();
    for form in forms {
        let elts = match form {
            Ast::Seq(elts) => elts,
            other => {
                return Err(context.error(ParseError::MalformedBinder {
                    node,
                    found: other.kind().to_string(),
                }))
            }
        };
        let found = elts.len();
        let Ok([name, expr]) = <[Ast; 2]>::try_from(elts) else {
            return Err(context.error(ParseError::MalformedBinder {
                node,
                found: format!("a sequence of {} elements", found),
            }));
        };
        let name = match name {
            Ast::Symbol(name) => name,
            other => {
                return Err(context.error(ParseError::MalformedBinder {
                    node,
                    found: other.kind().to_string(),
                }))
            }
        };
        bindings.insert(name, expr);
    }
    Ok(bindings)
}
