use std::io::Write;

use clap::{Args, Parser, Subcommand};

use stencil::lexer::TokenTree;

#[derive(Debug, Parser)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Repl)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    Run(RunArgs),
    Lex(LexArgs),
    Repl,
    Demo,
}

#[derive(Debug, Args)]
struct RunArgs {
    file: String,
}

#[derive(Debug, Args)]
struct LexArgs {
    file: String,
}

fn main() {
    let args = Cli::parse();

    match args.command() {
        Command::Repl => {
            repl_command();
        }
        Command::Run(args) => {
            run_command(args);
        }
        Command::Lex(args) => {
            lex_command(args);
        }
        Command::Demo => {
            demo_command();
        }
    }
}

fn repl_command() {
    println!("Welcome to the stencil REPL!");
    println!("EOF to exit. (Ctrl+D on *nix, Ctrl+Z on Windows)");

    loop {
        let mut input = String::new();

        print!("> ");
        std::io::stdout()
            .flush()
            .expect("should be able to flush stdout");

        let read = std::io::stdin()
            .read_line(&mut input)
            .expect("should be able to read line from stdin");

        if read == 0 {
            break;
        }

        let source = input.trim();
        match run(source) {
            Ok(()) => {}
            Err(e) => {
                println!("Error: {}", e)
            }
        }

        input.clear()
    }
}

fn run_command(args: &RunArgs) {
    let source = std::fs::read_to_string(&args.file).expect("should be able to read source file");
    if let Err(e) = run(&source) {
        println!("{e}");
    }
}

fn lex_command(args: &LexArgs) {
    let source = std::fs::read_to_string(&args.file).expect("should be able to read source file");
    match stencil::lexer::lex(&source) {
        Ok(tree) => {
            for form in top_level(&tree) {
                println!("{form}");
            }
        }
        Err(e) => println!("{e}"),
    }
}

fn demo_command() {
    let source = demo_source();
    let tree = match stencil::lexer::lex(source) {
        Ok(tree) => tree,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    for form in top_level(&tree) {
        println!("{form}");
        match stencil::parser::parse(form) {
            Ok(ast) => println!("  => {ast}"),
            Err(e) => println!("  => {e}"),
        }
    }
}

fn run(source: &str) -> Result<(), FrontendError> {
    let tree = stencil::lexer::lex(source)?;
    for form in top_level(&tree) {
        let ast = stencil::parser::parse(form)?;
        println!("{ast}");
    }
    Ok(())
}

fn top_level(tree: &TokenTree) -> &[TokenTree] {
    match tree {
        TokenTree::List(forms) => forms,
        _ => std::slice::from_ref(tree),
    }
}

fn demo_source() -> &'static str {
    r#"
    (import BokehRuntime)
    (import py-numpy (as np))

    (table plot
      (renderer shapes)
      (data
       (pull flowers
        (let (x : petalL)
             (y : petalW)
             (fillC : (ColorBy Species))
             (shape : 'Circle)))))

    (table dataset
      (fields a b c)
      (data (init (let (x : (np.arange 100))
                       (y : (np.sin x))
                       (z : (np.cos x))
                    ##(a:x, b:y, c:z))))
      (render table (fields a b c))
      (render scatter (bind (x: a) (y: b) (color: "orange")))
      (render plot (bind (x: a) (y: c) (color: "black"))))
    "#
}

#[derive(Debug, thiserror::Error)]
enum FrontendError {
    #[error(transparent)]
    Lex(#[from] stencil::lexer::LexError),
    #[error(transparent)]
    Parse(#[from] stencil::parser::ParseErrorWithContext),
}
