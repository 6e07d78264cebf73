use stencil::lexer::TokenTree;

fn render_stencil(source: &str) -> String {
    let tree = stencil::lexer::lex(source).expect("lex should work on valid stencil");
    let TokenTree::List(forms) = &tree else {
        panic!("lexer root should be a list");
    };
    let rendered: Vec<String> = forms
        .iter()
        .map(|form| {
            stencil::parser::parse(form)
                .expect("parse should work on valid stencil")
                .to_string()
        })
        .collect();
    rendered.join("\n")
}

fn test_valid_stencil(source: &str, expected_output: &str) {
    assert_eq!(render_stencil(source), expected_output);
}

#[test]
fn test_table_with_data_binding() {
    let source = r#"
    (table plot
      (renderer shapes)
      (data
       (pull flowers
        (let (x : petalL)
             (y : petalW)
             (shape : 'Circle)))))
    "#;
    let expected_output = "Table(id=plot, policy=[Renderer(id=shapes, expr=[]), \
        [data, Pull(source=flowers, expr=Let(bindings={x: petalL, y: petalW}, \
        body=[shape, Circle]))]])";
    test_valid_stencil(source, expected_output);
}

#[test]
fn test_imports() {
    let source = r#"
    (import BokehRuntime)
    (import py-numpy (as np))
    "#;
    let expected_output = "Import(module=[BokehRuntime])\nImport(module=[py-numpy, [as, np]])";
    test_valid_stencil(source, expected_output);
}

#[test]
fn test_numeric_fields() {
    test_valid_stencil("(fields 3.14 42)", "Fields(elts=[3.14, 42])");
}

#[test]
fn test_unquoted_and_quoted_forms_render_alike() {
    assert_eq!(
        render_stencil("(table t '(fields a))"),
        render_stencil("(table t (fields a))"),
    );
}

#[test]
fn test_stencil_marker_erases_one_token() {
    test_valid_stencil("#hidden (fields a)", "Fields(elts=[a])");
}

#[test]
fn test_render_clause_with_bind() {
    let source = r#"(render scatter (bind (x : a) (color : "orange")))"#;
    let expected_output = r#"[render, scatter, Bind(map={x: a, color: "orange"})]"#;
    test_valid_stencil(source, expected_output);
}

#[test]
fn test_transform_pipeline() {
    let source = "(transform smooth (list (1 2 3)) (pull raw (fields a)))";
    let expected_output = "Transform(id=smooth, policy=[List(elts=[1, 2, 3]), \
        Pull(source=raw, expr=Fields(elts=[a]))])";
    test_valid_stencil(source, expected_output);
}

#[test]
fn test_unterminated_input_is_rejected() {
    let err = stencil::lexer::lex("(table t (fields a)").unwrap_err();
    assert_eq!(err.to_string(), "unterminated list opened at 1:1");
}

#[test]
fn test_unterminated_string_is_rejected() {
    let err = stencil::lexer::lex("(bind (color : \"orange))").unwrap_err();
    assert_eq!(err.to_string(), "unterminated string literal opened at 1:16");
}

#[test]
fn test_arity_error_names_the_form() {
    let tree = stencil::lexer::lex("(data (pull onlyone))").unwrap();
    let TokenTree::List(forms) = &tree else {
        panic!("lexer root should be a list");
    };
    let err = stencil::parser::parse(&forms[0]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "while parsing program > pull: pull expects exactly 2 arguments, found 1"
    );
}
