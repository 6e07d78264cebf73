use std::fmt::Display;

use rustc_hash::FxHashMap;

use crate::lexer::Number;

#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Table { id: String, policy: Vec<Ast> },
    Transform { id: String, policy: Vec<Ast> },
    Fields(Vec<Ast>),
    List(Vec<Ast>),
    Let { bindings: Bindings, body: Box<Ast> },
    Renderer { id: String, expr: Vec<Ast> },
    Import(Vec<Ast>),
    Bind(Bindings),
    Pull { source: Box<Ast>, expr: Box<Ast> },
    Push { schema: Box<Ast>, expr: Box<Ast> },
    Symbol(String),
    String(String),
    Number(Number),
    Seq(Vec<Ast>),
}

impl Ast {
    pub fn kind(&self) -> &'static str {
        match self {
            Ast::Table { .. } => "table",
            Ast::Transform { .. } => "transform",
            Ast::Fields(_) => "fields",
            Ast::List(_) => "list",
            Ast::Let { .. } => "let",
            Ast::Renderer { .. } => "renderer",
            Ast::Import(_) => "import",
            Ast::Bind(_) => "bind",
            Ast::Pull { .. } => "pull",
            Ast::Push { .. } => "push",
            Ast::Symbol(_) => "symbol",
            Ast::String(_) => "string",
            Ast::Number(_) => "number",
            Ast::Seq(_) => "sequence",
        }
    }
}

// Binder map for `let` and `bind`. The last binding of a repeated name
// wins; iteration stays in first-occurrence order so renderings are
// deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    order: Vec<String>,
    map: FxHashMap<String, Ast>,
}

impl Bindings {
    pub fn new() -> Bindings {
        Bindings::default()
    }

    pub fn insert(&mut self, name: String, expr: Ast) {
        if !self.map.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.map.insert(name, expr);
    }

    pub fn get(&self, name: &str) -> Option<&Ast> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Ast)> {
        self.order
            .iter()
            .filter_map(|name| self.map.get(name).map(|expr| (name.as_str(), expr)))
    }
}

impl Display for Ast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ast::Table { id, policy } => {
                write!(f, "Table(id={}, policy=", id)?;
                write_seq(f, policy)?;
                write!(f, ")")
            }
            Ast::Transform { id, policy } => {
                write!(f, "Transform(id={}, policy=", id)?;
                write_seq(f, policy)?;
                write!(f, ")")
            }
            Ast::Fields(elts) => {
                write!(f, "Fields(elts=")?;
                write_seq(f, elts)?;
                write!(f, ")")
            }
            Ast::List(elts) => {
                write!(f, "List(elts=")?;
                write_seq(f, elts)?;
                write!(f, ")")
            }
            Ast::Let { bindings, body } => {
                write!(f, "Let(bindings={}, body={})", bindings, body)
            }
            Ast::Renderer { id, expr } => {
                write!(f, "Renderer(id={}, expr=", id)?;
                write_seq(f, expr)?;
                write!(f, ")")
            }
            Ast::Import(module) => {
                write!(f, "Import(module=")?;
                write_seq(f, module)?;
                write!(f, ")")
            }
            Ast::Bind(map) => write!(f, "Bind(map={})", map),
            Ast::Pull { source, expr } => write!(f, "Pull(source={}, expr={})", source, expr),
            Ast::Push { schema, expr } => write!(f, "Push(schema={}, expr={})", schema, expr),
            Ast::Symbol(name) => write!(f, "{}", name),
            Ast::String(text) => {
                write!(f, "\"")?;
                for c in text.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")
            }
            Ast::Number(number) => write!(f, "{}", number),
            Ast::Seq(elts) => write_seq(f, elts),
        }
    }
}

impl Display for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (i, (name, expr)) in self.iter().enumerate() {
            write!(f, "{}: {}", name, expr)?;
            if i != self.len() - 1 {
                write!(f, ", ")?;
            }
        }
        write!(f, "}}")
    }
}

fn write_seq(f: &mut std::fmt::Formatter<'_>, items: &[Ast]) -> std::fmt::Result {
    write!(f, "[")?;
    for (i, item) in items.iter().enumerate() {
        write!(f, "{}", item)?;
        if i != items.len() - 1 {
            write!(f, ", ")?;
        }
    }
    write!(f, "]")
}
