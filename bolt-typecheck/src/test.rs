use crate::{
    check_source_file,
    metavariables::Solutions,
    types::Type,
    unification::{unify, zonk},
    Checker, TypeError,
};
use bolt_diagnostic::Source;
use bolt_parse::parse_string;
use bolt_syntax::{Element, Expression, LetBody, LetBodyValue, SourceFile};
use pretty_assertions::assert_eq;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use std::rc::Rc;

fn with_checked(input: &str, f: impl FnOnce(&SourceFile, &Checker)) {
    let (file, parse_errors) = parse_string(input);
    assert_eq!(parse_errors, vec![], "parse errors for {:?}", input);
    let source = Source::Interactive {
        label: String::from("test"),
    };
    let checker = check_source_file(source, &file);
    f(&file, &checker)
}

fn first_expression(file: &SourceFile) -> &Expression {
    match &file.elements[0] {
        Element::Expression(stmt) => &stmt.expression,
        other => panic!("expected an expression statement, got {:?}", other),
    }
}

fn let_scheme<'c>(file: &SourceFile, checker: &'c Checker, ix: usize) -> &'c crate::types::Scheme {
    match &file.elements[ix] {
        Element::Let(decl) => checker
            .scheme_of(decl.id)
            .unwrap_or_else(|| panic!("declaration {} has no scheme", ix)),
        other => panic!("expected a let declaration, got {:?}", other),
    }
}

fn int_to_int_to_bool() -> Type {
    Type::arrow(vec![Type::int(), Type::int()], Type::bool())
}

#[test]
fn infers_int_from_integer_literal() {
    with_checked("1", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let expression = first_expression(file);
        assert_eq!(checker.type_of(expression.id()), Some(&Type::int()));
    });
}

#[test]
fn infers_string_from_string_literal() {
    with_checked("\"hello\"", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let expression = first_expression(file);
        assert_eq!(checker.type_of(expression.id()), Some(&Type::string()));
    });
}

#[test]
fn illegal_typing_variable() {
    with_checked("let a: Int = \"foo\"", |_, checker| {
        match checker.errors() {
            [TypeError::UnificationError {
                expected, actual, ..
            }] => {
                assert_eq!(expected, &Type::int());
                assert_eq!(actual, &Type::string());
            }
            other => panic!("expected one unification error, got {:?}", other),
        }
    });
}

#[test]
fn mutual_recursion_generalizes_together() {
    let input = "\
let even n = if n == 0 . True else . odd (n - 1)
let odd n = if n == 0 . False else . even (n - 1)
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let expected = Type::arrow(vec![Type::int()], Type::bool());
        let even = let_scheme(file, checker, 0);
        let odd = let_scheme(file, checker, 1);
        assert_eq!(even.vars, Vec::<Rc<str>>::new());
        assert_eq!(even.ty, expected);
        assert_eq!(odd.ty, expected);
    });
}

#[test]
fn class_constraint_satisfied_by_signature() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq String.
  let eq a b = True
let f x y : (Eq a) => a -> a -> Bool = eq x y
";
    with_checked(input, |_, checker| {
        assert_eq!(checker.errors(), &[]);
    });
}

#[test]
fn missing_class_constraint_in_signature() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq String.
  let eq a b = True
let f x y : a -> a -> Bool = eq x y
";
    with_checked(input, |_, checker| {
        match checker.errors() {
            [error @ TypeError::TypeSignatureMismatch { .. }] => {
                assert_eq!(error.code(), 2201);
            }
            other => panic!("expected one signature mismatch, got {:?}", other),
        }
    });
}

#[test]
fn occurs_check_self_application() {
    with_checked("let loop f = f f", |_, checker| {
        match checker.errors() {
            [error @ TypeError::OccursCheck { .. }] => {
                assert_eq!(error.code(), 2015);
            }
            other => panic!("expected one occurs check error, got {:?}", other),
        }
    });
}

#[test]
fn unsatisfied_constraint_on_concrete_type() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq String.
  let eq a b = True
let b = eq 1 2
";
    with_checked(input, |_, checker| {
        match checker.errors() {
            [error @ TypeError::InstanceNotFound { .. }] => {
                assert_eq!(error.code(), 2101);
            }
            other => panic!("expected one missing instance error, got {:?}", other),
        }
    });
}

#[test]
fn residual_constraint_is_generalized() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
let g x y = eq x y
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 1);
        assert_eq!(scheme.vars.len(), 1);
        assert_eq!(scheme.constraints.len(), 1);
        assert_eq!(scheme.render(), "(Eq a) => a -> a -> Bool");
    });
}

#[test]
fn instance_discharges_constraint() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq Int.
  let eq a b = True
let b = eq 1 2
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 2);
        assert_eq!(scheme.ty, Type::bool());
    });
}

#[test]
fn multi_parameter_class() {
    let input = "\
class Convert a b.
  let convert : a -> b
instance Convert Int String.
  let convert x = \"n\"
let s : String = convert 1
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 2);
        assert_eq!(scheme.ty, Type::string());
    });
}

#[test]
fn overlapping_instances_are_rejected() {
    let input = "\
class Eq a.
  let eq : a -> a -> Bool
instance Eq Int.
  let eq x y = True
instance Eq Int.
  let eq x y = False
";
    with_checked(input, |_, checker| {
        match checker.errors() {
            [error @ TypeError::OverlappingInstances { .. }] => {
                assert_eq!(error.code(), 2101);
            }
            other => panic!("expected one overlap error, got {:?}", other),
        }
    });
}

#[test]
fn enum_constructor_and_match() {
    let input = "\
enum Maybe a.
  Just a
  Nothing
let d m = match m .
  Just x => x
  Nothing => 0
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 1);
        assert_eq!(
            scheme.ty,
            Type::arrow(
                vec![Type::app(Type::Con(Rc::from("Maybe")), vec![Type::int()])],
                Type::int()
            )
        );
    });
}

#[test]
fn two_argument_constructor_round_trips() {
    let input = "\
enum Pair a b.
  MkPair a b
let swap p = match p .
  MkPair x y => MkPair y x
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 1);
        assert_eq!(scheme.vars.len(), 2);
        assert_eq!(scheme.render(), "Pair a b -> Pair b a");
    });
}

#[test]
fn constructor_pattern_arity_mismatch() {
    let input = "\
enum Maybe a.
  Just a
  Nothing
let d m = match m .
  Just x y => x
  Nothing => 0
";
    with_checked(input, |_, checker| {
        assert!(checker
            .errors()
            .iter()
            .any(|error| matches!(error, TypeError::ArityMismatch { .. })));
    });
}

#[test]
fn type_constructor_arity_mismatch() {
    let input = "\
enum Maybe a.
  Just a
  Nothing
let x : Maybe Int Int = Nothing
";
    with_checked(input, |_, checker| {
        assert!(checker
            .errors()
            .iter()
            .any(|error| error.code() == 2020));
    });
}

#[test]
fn binding_not_found() {
    with_checked("let x = mystery", |_, checker| {
        match checker.errors() {
            [error @ TypeError::BindingNotFound { .. }] => {
                assert_eq!(error.code(), 2010);
            }
            other => panic!("expected one missing binding error, got {:?}", other),
        }
    });
}

#[test]
fn record_construction_and_projection() {
    let input = "\
struct Point.
  x: Int
  y: Int
let p = { x = 1, y = 2 }
let q = p.x
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let p = let_scheme(file, checker, 1);
        assert!(matches!(p.ty, Type::Record { .. }));
        let q = let_scheme(file, checker, 2);
        assert_eq!(q.ty, Type::int());
    });
}

#[test]
fn record_with_missing_field() {
    let input = "\
struct Point.
  x: Int
  y: Int
let p = { x = 1 }
";
    with_checked(input, |_, checker| {
        match checker.errors() {
            [error @ TypeError::MissingRecordField { .. }] => {
                assert_eq!(error.code(), 2014);
            }
            other => panic!("expected one record field error, got {:?}", other),
        }
    });
}

#[test]
fn record_field_type_mismatch() {
    let input = "\
struct Point.
  x: Int
  y: Int
let p = { x = 1, y = \"two\" }
";
    with_checked(input, |_, checker| {
        assert!(checker
            .errors()
            .iter()
            .any(|error| error.code() == 2014));
    });
}

#[test]
fn nested_block_binding() {
    let input = "\
let outer =
  let inner x = x
  inner 1
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.ty, Type::int());
    });
}

#[test]
fn inner_binding_generalizes() {
    let input = "\
let pair =
  let id x = x
  (id 1, id \"s\")
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.ty, Type::Tuple(vec![Type::int(), Type::string()]));
    });
}

#[test]
fn if_branches_unify() {
    with_checked("let f b = if b . 1 else . 2", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.ty, Type::arrow(vec![Type::bool()], Type::int()));
    });
}

#[test]
fn if_test_must_be_bool() {
    with_checked("let f = if 1 . 2 else . 3", |_, checker| {
        assert!(checker
            .errors()
            .iter()
            .any(|error| error.code() == 2014));
    });
}

#[test]
fn return_statement_unifies_with_result() {
    let input = "\
let f x : Int -> Int =
  return x
";
    with_checked(input, |_, checker| {
        assert_eq!(checker.errors(), &[]);
    });
}

#[test]
fn return_statement_type_mismatch() {
    let input = "\
let f x : Int -> Int =
  return \"no\"
";
    with_checked(input, |_, checker| {
        assert!(checker
            .errors()
            .iter()
            .any(|error| error.code() == 2014));
    });
}

#[test]
fn equality_constraint_in_signature() {
    let input = "\
let f x : (a ~ Int) => a -> a = x
let y = f 1
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 1);
        assert_eq!(scheme.ty, Type::int());
    });
}

#[test]
fn explicit_signature_is_kept() {
    with_checked("let id x : a -> a = x", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.vars.len(), 1);
        assert_eq!(scheme.render(), "a -> a");
    });
}

#[test]
fn unsigned_binding_generalizes() {
    with_checked("let id x = x", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.vars.len(), 1);
        assert_eq!(scheme.render(), "a -> a");
    });
}

#[test]
fn every_expression_has_a_type_after_checking() {
    let input = "\
let add x y = x + y
let r = add 1 2
";
    with_checked(input, |file, checker| {
        assert_eq!(checker.errors(), &[]);
        for element in &file.elements {
            if let Element::Let(decl) = element {
                if let Some(LetBody::Expr(body)) = &decl.body {
                    if let LetBodyValue::Expression(expression) = &body.value {
                        assert!(checker.type_of(expression.id()).is_some());
                    }
                }
            }
        }
    });
}

#[test]
fn operators_use_builtin_types() {
    with_checked("let lt = 1 < 2", |file, checker| {
        assert_eq!(checker.errors(), &[]);
        let scheme = let_scheme(file, checker, 0);
        assert_eq!(scheme.ty, Type::bool());
    });
}

/* -------------------------------------------------------------------------
 * Unification properties
 * ---------------------------------------------------------------------- */

/// A small ground type for property tests.
#[derive(Clone, Debug)]
struct GroundType(Type);

fn arbitrary_type(g: &mut Gen, depth: usize) -> Type {
    let choice = if depth == 0 {
        u8::arbitrary(g) % 3
    } else {
        u8::arbitrary(g) % 5
    };
    match choice {
        0 => Type::int(),
        1 => Type::bool(),
        2 => Type::string(),
        3 => Type::arrow(
            vec![arbitrary_type(g, depth - 1)],
            arbitrary_type(g, depth - 1),
        ),
        _ => Type::Tuple(vec![
            arbitrary_type(g, depth - 1),
            arbitrary_type(g, depth - 1),
        ]),
    }
}

impl Arbitrary for GroundType {
    fn arbitrary(g: &mut Gen) -> Self {
        GroundType(arbitrary_type(g, 2))
    }
}

#[quickcheck]
fn prop_unify_is_reflexive(ty: GroundType) -> bool {
    let mut solutions: Solutions<Type> = Solutions::new();
    unify(&mut solutions, &ty.0, &ty.0).is_ok()
}

#[quickcheck]
fn prop_unify_is_symmetric(a: GroundType, b: GroundType) -> bool {
    let mut left: Solutions<Type> = Solutions::new();
    let mut right: Solutions<Type> = Solutions::new();
    unify(&mut left, &a.0, &b.0).is_ok() == unify(&mut right, &b.0, &a.0).is_ok()
}

#[quickcheck]
fn prop_solved_meta_zonks_to_target(ty: GroundType) -> bool {
    let mut solutions: Solutions<Type> = Solutions::new();
    let meta = solutions.fresh_meta(0);
    if unify(&mut solutions, &Type::Meta(meta), &ty.0).is_err() {
        return false;
    }
    // Unifying again with the same target is a no-op that still succeeds.
    unify(&mut solutions, &Type::Meta(meta), &ty.0).is_ok()
        && zonk(&solutions, &Type::Meta(meta)) == ty.0
}
