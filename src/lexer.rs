use std::fmt::Display;
use std::mem;

use crate::span::Pos;

pub const MAX_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    List(Vec<TokenTree>),
    Symbol(String),
    String(String),
    Number(Number),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum LexError {
    #[error("unterminated list opened at {0}")]
    UnterminatedList(Pos),
    #[error("unterminated string literal opened at {0}")]
    UnterminatedString(Pos),
    #[error("unmatched closing parenthesis at {0}")]
    UnmatchedClose(Pos),
    #[error("quote at {0} is not followed by a form")]
    DanglingQuote(Pos),
    #[error("malformed number \"{text}\" at {at}")]
    MalformedNumber { text: String, at: Pos },
    #[error("nesting deeper than {limit} levels at {at}")]
    NestingTooDeep { at: Pos, limit: usize },
}

pub fn lex(source: &str) -> Result<TokenTree, LexError> {
    let mut lexer = Lexer::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        if lexer.step(c)? {
            lexer.pos.advance(c);
            chars.next();
        }
    }

    lexer.finish()
}

struct Frame {
    items: Vec<TokenTree>,
    quoted: bool,
    open: Option<Pos>,
}

enum Mode {
    Forms,
    Str {
        text: String,
        open: Pos,
        escaped: bool,
    },
    Symbol {
        text: String,
        start: Pos,
    },
}

struct Lexer {
    frames: Vec<Frame>,
    mode: Mode,
    pos: Pos,
}

impl Lexer {
    fn new() -> Lexer {
        Lexer {
            frames: vec![Frame {
                items: Vec::new(),
                quoted: false,
                open: None,
            }],
            mode: Mode::Forms,
            pos: Pos::start(),
        }
    }

    // Returns false when `c` was a boundary that must be reprocessed by
    // the enclosing context.
    fn step(&mut self, c: char) -> Result<bool, LexError> {
        match self.mode {
            Mode::Forms => self.form_char(c),
            Mode::Str { .. } => self.string_char(c),
            Mode::Symbol { .. } => self.symbol_char(c),
        }
    }

    fn form_char(&mut self, c: char) -> Result<bool, LexError> {
        match c {
            '(' => self.open_list(false)?,
            ')' => self.close_list()?,
            '"' => {
                self.mode = Mode::Str {
                    text: String::new(),
                    open: self.pos,
                    escaped: false,
                }
            }
            // a quote opens a frame that captures exactly the next form
            '\'' => self.open_list(true)?,
            c if c.is_whitespace() => {}
            _ => {
                self.mode = Mode::Symbol {
                    text: String::from(c),
                    start: self.pos,
                }
            }
        }
        Ok(true)
    }

    fn string_char(&mut self, c: char) -> Result<bool, LexError> {
        let Mode::Str { text, escaped, .. } = &mut self.mode else {
            unreachable!("string_char is only called in string mode");
        };
        if *escaped {
            // the escaped character is copied verbatim, even `"` and `\`
            text.push(c);
            *escaped = false;
        } else if c == '\\' {
            *escaped = true;
        } else if c == '"' {
            let Mode::Str { text, .. } = mem::replace(&mut self.mode, Mode::Forms) else {
                unreachable!("mode was checked above");
            };
            self.append(TokenTree::String(text));
        } else {
            text.push(c);
        }
        Ok(true)
    }

    fn symbol_char(&mut self, c: char) -> Result<bool, LexError> {
        if is_boundary(c) {
            self.finish_symbol()?;
            return Ok(false);
        }
        if let Mode::Symbol { text, .. } = &mut self.mode {
            text.push(c);
        }
        Ok(true)
    }

    fn finish_symbol(&mut self) -> Result<(), LexError> {
        let Mode::Symbol { text, start } = mem::replace(&mut self.mode, Mode::Forms) else {
            return Ok(());
        };
        match text.chars().next() {
            // pair separators and stencil markers vanish, one token each
            Some(':') | Some('#') => {}
            Some(c) if c.is_ascii_digit() => {
                let number = number(&text, start)?;
                self.append(TokenTree::Number(number));
            }
            _ => self.append(TokenTree::Symbol(text)),
        }
        Ok(())
    }

    fn open_list(&mut self, quoted: bool) -> Result<(), LexError> {
        if self.frames.len() >= MAX_DEPTH {
            return Err(LexError::NestingTooDeep {
                at: self.pos,
                limit: MAX_DEPTH,
            });
        }
        self.frames.push(Frame {
            items: Vec::new(),
            quoted,
            open: Some(self.pos),
        });
        Ok(())
    }

    fn close_list(&mut self) -> Result<(), LexError> {
        let frame = match self.frames.pop() {
            Some(frame) if !self.frames.is_empty() => frame,
            _ => return Err(LexError::UnmatchedClose(self.pos)),
        };
        if frame.quoted {
            return Err(LexError::DanglingQuote(frame.open.unwrap_or(self.pos)));
        }
        self.append(TokenTree::List(frame.items));
        Ok(())
    }

    fn append(&mut self, form: TokenTree) {
        if let Some(top) = self.frames.last_mut() {
            top.items.push(form);
        }
        // a quoted frame holds exactly one form, then dissolves into its
        // parent: 'x and x lex identically
        loop {
            let splice = match self.frames.last() {
                Some(frame) => {
                    self.frames.len() > 1 && frame.quoted && frame.items.len() == 1
                }
                None => false,
            };
            if !splice {
                break;
            }
            if let Some(frame) = self.frames.pop() {
                if let Some(parent) = self.frames.last_mut() {
                    parent.items.extend(frame.items);
                }
            }
        }
    }

    fn finish(mut self) -> Result<TokenTree, LexError> {
        if let Mode::Str { open, .. } = self.mode {
            return Err(LexError::UnterminatedString(open));
        }
        // a trailing bare token is complete at end of input
        self.finish_symbol()?;
        match self.frames.pop() {
            Some(Frame {
                open: Some(open),
                quoted,
                ..
            }) => Err(if quoted {
                LexError::DanglingQuote(open)
            } else {
                LexError::UnterminatedList(open)
            }),
            Some(Frame { items, .. }) => Ok(TokenTree::List(items)),
            None => unreachable!("the root frame is never popped"),
        }
    }
}

fn is_boundary(c: char) -> bool {
    matches!(c, '(' | ')' | '"' | '\'' | '#') || c.is_whitespace()
}

fn number(text: &str, at: Pos) -> Result<Number, LexError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Number::Integer(n));
    }
    if let Ok(n) = text.parse::<f64>() {
        return Ok(Number::Float(n));
    }
    Err(LexError::MalformedNumber {
        text: text.to_string(),
        at,
    })
}

impl Display for TokenTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenTree::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    write!(f, "{}", item)?;
                    if i != items.len() - 1 {
                        write!(f, " ")?;
                    }
                }
                write!(f, ")")
            }
            TokenTree::Symbol(name) => write!(f, "{}", name),
            TokenTree::String(text) => {
                write!(f, "\"")?;
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")
            }
            TokenTree::Number(number) => write!(f, "{}", number),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Number::Integer(n) => write!(f, "{}", n),
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn symbol(name: &str) -> TokenTree {
        TokenTree::Symbol(name.to_string())
    }

    fn forms(tree: TokenTree) -> Vec<TokenTree> {
        match tree {
            TokenTree::List(items) => items,
            other => panic!("root should be a list, got {:?}", other),
        }
    }

    #[test]
    fn test_balanced_nesting() {
        let tree = lex("(a b)").unwrap();
        assert_eq!(
            tree,
            TokenTree::List(vec![TokenTree::List(vec![symbol("a"), symbol("b")])])
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(lex("").unwrap(), TokenTree::List(vec![]));
    }

    #[test]
    fn test_top_level_order() {
        let tree = lex("(a) b (c)").unwrap();
        assert_eq!(
            tree,
            TokenTree::List(vec![
                TokenTree::List(vec![symbol("a")]),
                symbol("b"),
                TokenTree::List(vec![symbol("c")]),
            ])
        );
    }

    #[test]
    fn test_quote_is_invisible() {
        assert_eq!(lex("'(a b)").unwrap(), lex("(a b)").unwrap());
    }

    #[test]
    fn test_quoted_symbol() {
        assert_eq!(lex("(shape 'Circle)").unwrap(), lex("(shape Circle)").unwrap());
    }

    #[test]
    fn test_quoted_string() {
        assert_eq!(lex("'\"abc\"").unwrap(), lex("\"abc\"").unwrap());
    }

    #[test]
    fn test_double_quote_collapses() {
        assert_eq!(lex("''(a)").unwrap(), lex("(a)").unwrap());
    }

    #[test]
    fn test_string_escape_keeps_quote() {
        let tree = lex(r#""a\"b""#).unwrap();
        assert_eq!(forms(tree), vec![TokenTree::String("a\"b".to_string())]);
    }

    #[test]
    fn test_string_escape_is_verbatim() {
        // no escape-code interpretation: \n is just n
        let tree = lex(r#""a\nb""#).unwrap();
        assert_eq!(forms(tree), vec![TokenTree::String("anb".to_string())]);
    }

    #[test]
    fn test_integer() {
        let tree = lex("42").unwrap();
        assert_eq!(forms(tree), vec![TokenTree::Number(Number::Integer(42))]);
    }

    #[test]
    fn test_float() {
        let tree = lex("3.14").unwrap();
        assert_eq!(forms(tree), vec![TokenTree::Number(Number::Float(3.14))]);
    }

    #[test]
    fn test_malformed_number() {
        assert_eq!(
            lex("12ab"),
            Err(LexError::MalformedNumber {
                text: "12ab".to_string(),
                at: Pos { line: 1, column: 1 },
            })
        );
    }

    #[test]
    fn test_stencil_marker_scope() {
        // the marker erases one token, not the rest of the line
        let tree = lex("#foo bar").unwrap();
        assert_eq!(forms(tree), vec![symbol("bar")]);
    }

    #[test]
    fn test_adjacent_stencil_markers() {
        let tree = lex("##(a b)").unwrap();
        assert_eq!(
            forms(tree),
            vec![TokenTree::List(vec![symbol("a"), symbol("b")])]
        );
    }

    #[test]
    fn test_colon_elision() {
        let tree = lex("(x : 5)").unwrap();
        assert_eq!(
            forms(tree),
            vec![TokenTree::List(vec![
                symbol("x"),
                TokenTree::Number(Number::Integer(5)),
            ])]
        );
    }

    #[test]
    fn test_trailing_colon_is_kept() {
        // only a token that starts with `:` is elided
        let tree = lex("(x: 5)").unwrap();
        assert_eq!(
            forms(tree),
            vec![TokenTree::List(vec![
                symbol("x:"),
                TokenTree::Number(Number::Integer(5)),
            ])]
        );
    }

    #[test]
    fn test_symbol_ends_at_string() {
        let tree = lex("a\"b\"").unwrap();
        assert_eq!(
            forms(tree),
            vec![symbol("a"), TokenTree::String("b".to_string())]
        );
    }

    #[test]
    fn test_unterminated_list() {
        assert_eq!(
            lex("(a (b)"),
            Err(LexError::UnterminatedList(Pos { line: 1, column: 1 }))
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(
            lex("(a \"bc"),
            Err(LexError::UnterminatedString(Pos { line: 1, column: 4 }))
        );
    }

    #[test]
    fn test_trailing_escape_is_unterminated() {
        assert_eq!(
            lex("\"a\\"),
            Err(LexError::UnterminatedString(Pos { line: 1, column: 1 }))
        );
    }

    #[test]
    fn test_unmatched_close() {
        assert_eq!(
            lex("(a))"),
            Err(LexError::UnmatchedClose(Pos { line: 1, column: 4 }))
        );
    }

    #[test]
    fn test_dangling_quote() {
        assert_eq!(
            lex("'"),
            Err(LexError::DanglingQuote(Pos { line: 1, column: 1 }))
        );
    }

    #[test]
    fn test_quote_closed_by_paren() {
        assert_eq!(
            lex("(')"),
            Err(LexError::DanglingQuote(Pos { line: 1, column: 2 }))
        );
    }

    #[test]
    fn test_depth_limit() {
        let source = "(".repeat(MAX_DEPTH + 1);
        assert!(matches!(
            lex(&source),
            Err(LexError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_error_position_spans_lines() {
        assert_eq!(
            lex("(a)\n  (b"),
            Err(LexError::UnterminatedList(Pos { line: 2, column: 3 }))
        );
    }

    #[test]
    fn test_display_round_trip() {
        let tree = lex(r#"(a "x\"y" 3 'b)"#).unwrap();
        let form = forms(tree).remove(0);
        assert_eq!(form.to_string(), r#"(a "x\"y" 3 b)"#);
    }
}
