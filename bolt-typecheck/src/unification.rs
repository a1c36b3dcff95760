//! Type unification.

use crate::{
    metavariables::{Meta, Solution, Solutions},
    types::Type,
};
use std::rc::Rc;

/// A unification failure, carrying the zonked mismatching subterms.
#[derive(PartialEq, Eq, Debug)]
pub enum Error {
    Mismatch { expected: Type, actual: Type },
    Occurs { meta: Meta, ty: Type },
}

/**
Substitute all solved metavariables in a type.

# Laws

* All solved metavariables are substituted: every metavariable remaining in
  `zonk(solutions, ty)` is unsolved in `solutions`.
*/
pub fn zonk(solutions: &Solutions<Type>, ty: &Type) -> Type {
    match ty {
        Type::Meta(meta) => match solutions.get(*meta) {
            Solution::Unsolved => Type::Meta(*meta),
            Solution::Solved(solved) => zonk(solutions, solved),
        },
        Type::Rigid(name) => Type::Rigid(name.clone()),
        Type::Con(name) => Type::Con(name.clone()),
        Type::App(head, args) => Type::app(
            zonk(solutions, head),
            args.iter().map(|arg| zonk(solutions, arg)).collect(),
        ),
        Type::Arrow(params, result) => Type::arrow(
            params.iter().map(|param| zonk(solutions, param)).collect(),
            zonk(solutions, result),
        ),
        Type::Tuple(elements) => Type::Tuple(
            elements
                .iter()
                .map(|element| zonk(solutions, element))
                .collect(),
        ),
        Type::Record { name, fields } => Type::Record {
            name: name.clone(),
            fields: Rc::new(
                fields
                    .iter()
                    .map(|(field, ty)| (field.clone(), zonk(solutions, ty)))
                    .collect(),
            ),
        },
    }
}

/// Check whether `meta` occurs in `ty` and, on the way, demote every
/// unsolved metavariable in `ty` to `level` so that it cannot later be
/// generalized past the binding `meta` belongs to.
pub fn occurs_and_demote(
    solutions: &mut Solutions<Type>,
    meta: Meta,
    level: usize,
    ty: &Type,
) -> bool {
    match ty {
        Type::Rigid(_) | Type::Con(_) => false,
        Type::App(head, args) => {
            occurs_and_demote(solutions, meta, level, head)
                || args
                    .iter()
                    .any(|arg| occurs_and_demote(solutions, meta, level, arg))
        }
        Type::Arrow(params, result) => {
            params
                .iter()
                .any(|param| occurs_and_demote(solutions, meta, level, param))
                || occurs_and_demote(solutions, meta, level, result)
        }
        Type::Tuple(elements) => elements
            .iter()
            .any(|element| occurs_and_demote(solutions, meta, level, element)),
        Type::Record { fields, .. } => fields
            .iter()
            .any(|(_, field)| occurs_and_demote(solutions, meta, level, field)),
        Type::Meta(other) => match solutions.get(*other).clone() {
            Solution::Solved(solved) => occurs_and_demote(solutions, meta, level, &solved),
            Solution::Unsolved => {
                if meta == *other {
                    true
                } else {
                    solutions.demote(*other, level);
                    false
                }
            }
        },
    }
}

fn solve(solutions: &mut Solutions<Type>, meta: Meta, ty: &Type) -> Result<(), Error> {
    // `meta ~ meta` is a no-op, not a cycle.
    if let Type::Meta(other) = ty {
        if *other == meta {
            return Ok(());
        }
    }
    let level = solutions.level(meta);
    if occurs_and_demote(solutions, meta, level, ty) {
        Err(Error::Occurs {
            meta,
            ty: zonk(solutions, ty),
        })
    } else {
        solutions.set(meta, ty);
        Ok(())
    }
}

fn mismatch(solutions: &Solutions<Type>, expected: &Type, actual: &Type) -> Error {
    Error::Mismatch {
        expected: zonk(solutions, expected),
        actual: zonk(solutions, actual),
    }
}

/// Unify two types. Metavariable solutions accumulate in `solutions`;
/// unification is symmetric and idempotent with respect to them.
pub fn unify(
    solutions: &mut Solutions<Type>,
    expected: &Type,
    actual: &Type,
) -> Result<(), Error> {
    match (expected, actual) {
        (Type::Meta(meta), _) => match solutions.get(*meta).clone() {
            Solution::Solved(solved) => unify(solutions, &solved, actual),
            Solution::Unsolved => solve(solutions, *meta, actual),
        },
        (_, Type::Meta(meta)) => match solutions.get(*meta).clone() {
            Solution::Solved(solved) => unify(solutions, expected, &solved),
            Solution::Unsolved => solve(solutions, *meta, expected),
        },
        (Type::Con(a), Type::Con(b)) if a == b => Ok(()),
        (Type::Rigid(a), Type::Rigid(b)) if a == b => Ok(()),
        (Type::App(head_a, args_a), Type::App(head_b, args_b))
            if args_a.len() == args_b.len() =>
        {
            unify(solutions, head_a, head_b)?;
            for (a, b) in args_a.iter().zip(args_b.iter()) {
                unify(solutions, a, b)?;
            }
            Ok(())
        }
        (Type::Arrow(params_a, result_a), Type::Arrow(params_b, result_b)) => {
            unify_arrow(solutions, params_a, result_a, params_b, result_b)
        }
        (Type::Tuple(elements_a), Type::Tuple(elements_b))
            if elements_a.len() == elements_b.len() =>
        {
            for (a, b) in elements_a.iter().zip(elements_b.iter()) {
                unify(solutions, a, b)?;
            }
            Ok(())
        }
        (
            Type::Record {
                name: name_a,
                fields: fields_a,
            },
            Type::Record {
                name: name_b,
                fields: fields_b,
            },
        ) if name_a == name_b && fields_a.len() == fields_b.len() => {
            for ((_, a), (_, b)) in fields_a.iter().zip(fields_b.iter()) {
                unify(solutions, a, b)?;
            }
            Ok(())
        }
        _ => Err(mismatch(solutions, expected, actual)),
    }
}

/// Arrows are kept flattened, but two flattened arrows can still disagree
/// on arity when one side is partially applied: `a -> r` against
/// `a -> b -> c` means `r ~ b -> c`.
fn unify_arrow(
    solutions: &mut Solutions<Type>,
    params_a: &[Type],
    result_a: &Type,
    params_b: &[Type],
    result_b: &Type,
) -> Result<(), Error> {
    if params_a.len() == params_b.len() {
        for (a, b) in params_a.iter().zip(params_b.iter()) {
            unify(solutions, a, b)?;
        }
        unify(solutions, result_a, result_b)
    } else if params_a.len() < params_b.len() {
        let n = params_a.len();
        for (a, b) in params_a.iter().zip(params_b[..n].iter()) {
            unify(solutions, a, b)?;
        }
        let rest = Type::Arrow(params_b[n..].to_vec(), Rc::new(result_b.clone()));
        unify(solutions, result_a, &rest)
    } else {
        unify_arrow(solutions, params_b, result_b, params_a, result_a)
    }
}
