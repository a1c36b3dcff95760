use crate::parse_string;
use bolt_lex::token::Data;
use bolt_syntax::{
    ConstraintExpression, Element, Expression, IfBody, LetBody, LetBodyValue, Pattern,
    TypeExpression,
};
use pretty_assertions::assert_eq;
use std::rc::Rc;

fn parse_ok(input: &str) -> bolt_syntax::SourceFile {
    let (file, errors) = parse_string(input);
    assert_eq!(errors, vec![], "unexpected parse errors for {:?}", input);
    file
}

fn only_let(file: &bolt_syntax::SourceFile) -> &bolt_syntax::LetDeclaration {
    match &file.elements[..] {
        [Element::Let(decl)] => decl,
        other => panic!("expected a single let declaration, got {:?}", other),
    }
}

fn let_body_expression(decl: &bolt_syntax::LetDeclaration) -> &Expression {
    match &decl.body {
        Some(LetBody::Expr(body)) => match &body.value {
            LetBodyValue::Expression(expression) => expression,
            other => panic!("expected an expression body, got {:?}", other),
        },
        other => panic!("expected an expression body, got {:?}", other),
    }
}

fn reference_name(expression: &Expression) -> Rc<str> {
    match expression {
        Expression::Reference(reference) => reference.name.name_text(),
        other => panic!("expected a reference, got {:?}", other),
    }
}

#[test]
fn parse_simple_let() {
    let file = parse_ok("let add x y = x");
    let decl = only_let(&file);
    assert_eq!(decl.name(), Some(Rc::from("add")));
    assert_eq!(decl.params.len(), 2);
    assert!(decl.type_assert.is_none());
    assert_eq!(reference_name(let_body_expression(decl)), Rc::from("x"));
}

#[test]
fn parse_operator_precedence() {
    let file = parse_ok("let r = 1 + 2 * 3");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Infix(add) => {
            assert_eq!(add.operator.data, Data::CustomOperator(Rc::from("+")));
            match add.rhs.as_ref() {
                Expression::Infix(mul) => {
                    assert_eq!(mul.operator.data, Data::CustomOperator(Rc::from("*")));
                }
                other => panic!("expected multiplication on the right, got {:?}", other),
            }
        }
        other => panic!("expected an infix expression, got {:?}", other),
    }
}

#[test]
fn parse_left_associativity() {
    // `1 - 2 - 3` parses as `(1 - 2) - 3`.
    let file = parse_ok("let r = 1 - 2 - 3");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Infix(outer) => match outer.lhs.as_ref() {
            Expression::Infix(_) => {}
            other => panic!("expected nested infix on the left, got {:?}", other),
        },
        other => panic!("expected an infix expression, got {:?}", other),
    }
}

#[test]
fn parse_right_associative_operator() {
    // `2 ** 3 ** 4` parses as `2 ** (3 ** 4)`.
    let file = parse_ok("let r = 2 ** 3 ** 4");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Infix(outer) => match outer.rhs.as_ref() {
            Expression::Infix(_) => {}
            other => panic!("expected nested infix on the right, got {:?}", other),
        },
        other => panic!("expected an infix expression, got {:?}", other),
    }
}

#[test]
fn parse_call_juxtaposition() {
    let file = parse_ok("let r = f x y");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Call(call) => {
            assert_eq!(reference_name(&call.function), Rc::from("f"));
            assert_eq!(call.args.len(), 2);
        }
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn parse_call_argument_is_atomic() {
    // `f g x` applies f to two arguments; it is not `f (g x)`.
    let file = parse_ok("let r = f g x");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Call(call) => assert_eq!(call.args.len(), 2),
        other => panic!("expected a call, got {:?}", other),
    }
}

#[test]
fn parse_prefix_operator() {
    let file = parse_ok("let r = !b");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Prefix(prefix) => {
            assert_eq!(prefix.operator.data, Data::CustomOperator(Rc::from("!")));
        }
        other => panic!("expected a prefix expression, got {:?}", other),
    }
}

#[test]
fn parse_member_access() {
    let file = parse_ok("let r = point.x");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Member(member) => {
            assert_eq!(reference_name(&member.expression), Rc::from("point"));
            assert_eq!(member.name.data, Data::Identifier(Rc::from("x")));
        }
        other => panic!("expected a member access, got {:?}", other),
    }
}

#[test]
fn parse_dotted_reference() {
    let file = parse_ok("let r = List.map");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Reference(reference) => {
            let path = reference.name.path();
            assert_eq!(path.modules, vec![Rc::from("List")]);
            assert_eq!(path.name, Rc::from("map"));
        }
        other => panic!("expected a reference, got {:?}", other),
    }
}

#[test]
fn parse_tuple_and_nested() {
    let file = parse_ok("let r = (1, 2)\nlet s = (1)\nlet u = ()");
    match &file.elements[..] {
        [Element::Let(r), Element::Let(s), Element::Let(u)] => {
            assert!(matches!(let_body_expression(r), Expression::Tuple(_)));
            assert!(matches!(let_body_expression(s), Expression::Nested(_)));
            match let_body_expression(u) {
                Expression::Tuple(tuple) => assert!(tuple.elements.is_empty()),
                other => panic!("expected the unit tuple, got {:?}", other),
            }
        }
        other => panic!("expected three declarations, got {:?}", other),
    }
}

#[test]
fn parse_record_expression() {
    let file = parse_ok("let p = { x = 1, y = 2 }");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Record(record) => {
            assert_eq!(record.fields.len(), 2);
            assert_eq!(record.fields[0].0.name_text(), Rc::from("x"));
        }
        other => panic!("expected a record expression, got {:?}", other),
    }
}

#[test]
fn parse_match_expression() {
    let file = parse_ok("let f m = match m .\n  Just x => x\n  Nothing => 0");
    let decl = only_let(&file);
    match let_body_expression(decl) {
        Expression::Match(match_expression) => {
            assert_eq!(match_expression.cases.len(), 2);
            match &match_expression.cases[0].pattern {
                Pattern::Named(named) => {
                    assert_eq!(named.name_text(), Rc::from("Just"));
                    assert_eq!(named.patterns.len(), 1);
                }
                other => panic!("expected a constructor pattern, got {:?}", other),
            }
        }
        other => panic!("expected a match expression, got {:?}", other),
    }
}

#[test]
fn parse_inline_if_as_let_body() {
    let file = parse_ok("let even n = if n == 0 . True else . odd (n - 1)");
    let decl = only_let(&file);
    match &decl.body {
        Some(LetBody::Expr(body)) => match &body.value {
            LetBodyValue::If(if_statement) => {
                assert_eq!(if_statement.parts.len(), 2);
                assert!(if_statement.parts[0].test.is_some());
                assert!(if_statement.parts[1].test.is_none());
                assert!(matches!(if_statement.parts[0].body, IfBody::Inline(_)));
            }
            other => panic!("expected an if body, got {:?}", other),
        },
        other => panic!("expected an expression body, got {:?}", other),
    }
}

#[test]
fn parse_block_if_statement() {
    let file = parse_ok("if ready .\n  go\nelse .\n  stop");
    match &file.elements[..] {
        [Element::If(stmt)] => {
            assert_eq!(stmt.parts.len(), 2);
            assert!(matches!(stmt.parts[0].body, IfBody::Block { .. }));
        }
        other => panic!("expected an if statement, got {:?}", other),
    }
}

#[test]
fn parse_qualified_type_signature() {
    let file = parse_ok("let f x y : (Eq a) => a -> a -> Bool = eq x y");
    let decl = only_let(&file);
    let assert = decl.type_assert.as_ref().expect("missing type assert");
    match &assert.type_expression {
        TypeExpression::Qualified(qualified) => {
            assert_eq!(qualified.constraints.len(), 1);
            match &qualified.constraints[0].0 {
                ConstraintExpression::Typeclass(constraint) => {
                    assert_eq!(
                        constraint.name.data,
                        Data::IdentifierAlt(Rc::from("Eq"))
                    );
                    assert_eq!(constraint.types.len(), 1);
                }
                other => panic!("expected a typeclass constraint, got {:?}", other),
            }
            match qualified.ty.as_ref() {
                TypeExpression::Arrow(arrow) => {
                    assert_eq!(arrow.param_types.len(), 2);
                }
                other => panic!("expected an arrow type, got {:?}", other),
            }
        }
        other => panic!("expected a qualified type, got {:?}", other),
    }
}

#[test]
fn parse_equality_constraint() {
    let file = parse_ok("let f x : (a ~ Int) => a -> a = x");
    let decl = only_let(&file);
    let assert = decl.type_assert.as_ref().expect("missing type assert");
    match &assert.type_expression {
        TypeExpression::Qualified(qualified) => {
            assert!(matches!(
                qualified.constraints[0].0,
                ConstraintExpression::Equality(_)
            ));
        }
        other => panic!("expected a qualified type, got {:?}", other),
    }
}

#[test]
fn parse_class_and_instance() {
    let file = parse_ok(
        "class Eq a.\n  let eq : a -> a -> Bool\ninstance Eq String.\n  let eq x y = True",
    );
    match &file.elements[..] {
        [Element::Class(class), Element::Instance(instance)] => {
            assert_eq!(class.name_text(), Rc::from("Eq"));
            assert_eq!(class.type_vars.len(), 1);
            assert_eq!(class.elements.len(), 1);
            assert_eq!(instance.type_exprs.len(), 1);
            assert_eq!(instance.elements.len(), 1);
        }
        other => panic!("expected a class and an instance, got {:?}", other),
    }
}

#[test]
fn parse_inline_class_element() {
    let file = parse_ok("class Eq a. let eq : a -> a -> Bool");
    match &file.elements[..] {
        [Element::Class(class)] => {
            assert_eq!(class.elements.len(), 1);
            assert!(class.block_start.is_none());
        }
        other => panic!("expected a class declaration, got {:?}", other),
    }
}

#[test]
fn parse_struct_declaration() {
    let file = parse_ok("struct Point.\n  x: Int\n  y: Int");
    match &file.elements[..] {
        [Element::Record(decl)] => {
            assert_eq!(decl.name_text(), Rc::from("Point"));
            assert_eq!(decl.fields.len(), 2);
        }
        other => panic!("expected a struct declaration, got {:?}", other),
    }
}

#[test]
fn parse_enum_declaration() {
    let file = parse_ok("enum Maybe a.\n  Just a\n  Nothing");
    match &file.elements[..] {
        [Element::Variant(decl)] => {
            assert_eq!(decl.type_vars.len(), 1);
            assert_eq!(decl.members.len(), 2);
        }
        other => panic!("expected an enum declaration, got {:?}", other),
    }
}

#[test]
fn parse_return_statement() {
    let file = parse_ok("let f x =\n  return x");
    let decl = only_let(&file);
    match &decl.body {
        Some(LetBody::Block(body)) => {
            assert!(matches!(body.elements[..], [Element::Return(_)]));
        }
        other => panic!("expected a block body, got {:?}", other),
    }
}

#[test]
fn recovery_produces_one_error_per_bad_line() {
    let (file, errors) = parse_string("let = =\nlet ! !\nlet ok = 1");
    assert_eq!(errors.len(), 2);
    assert_eq!(file.elements.len(), 1);
    match &file.elements[0] {
        Element::Let(decl) => assert_eq!(decl.name(), Some(Rc::from("ok"))),
        other => panic!("expected the recovered declaration, got {:?}", other),
    }
}

#[test]
fn recovery_inside_block() {
    let (file, errors) = parse_string("let f =\n  let = =\n  2\nlet g = 3");
    assert_eq!(errors.len(), 1);
    assert_eq!(file.elements.len(), 2);
}

#[test]
fn unexpected_token_reports_expected_set() {
    let (_, errors) = parse_string("let ) = 2");
    assert_eq!(errors.len(), 1);
    assert!(!errors[0].expecting.is_empty());
    assert_eq!(errors[0].loc.line, 1);
}

#[test]
fn node_range_covers_first_to_last_token() {
    let file = parse_ok("let add x y = x + y");
    let decl = &file.elements[0];
    let range = decl.range();
    assert_eq!(range.start, bolt_diagnostic::TextLoc::new(1, 1));
    assert_eq!(range.end, bolt_diagnostic::TextLoc::new(1, 20));
}

#[test]
fn every_node_has_one_parent() {
    let file = parse_ok(
        "struct Point.\n  x: Int\nlet norm p = p.x * p.x\nlet main =\n  norm { x = 3 }",
    );
    let parents = file.set_parents();
    for element in &file.elements {
        assert_eq!(parents.parent(element.id()), Some(file.id));
    }
    assert_eq!(parents.parent(file.id), None);
    assert!(parents.len() > file.elements.len());
}

#[test]
fn keywords_do_not_parse_as_identifiers() {
    let (_, errors) = parse_string("let let = 1");
    assert_eq!(errors.len(), 1);
}
