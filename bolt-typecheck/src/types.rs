//! The checker-internal type representation.

use crate::metavariables::Meta;
use std::rc::Rc;

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Type {
    /// A unification variable, indexed into the solution store.
    Meta(Meta),
    /// A rigid variable: a quantifier from a signature or a scheme.
    Rigid(Rc<str>),
    /// A nullary type constructor.
    Con(Rc<str>),
    /// Application of a type constructor (or a higher-kinded variable).
    App(Rc<Type>, Vec<Type>),
    /// An n-ary function type, kept flattened: the result is never itself
    /// an arrow.
    Arrow(Vec<Type>, Rc<Type>),
    Tuple(Vec<Type>),
    /// A nominal record with named, ordered fields.
    Record {
        name: Rc<str>,
        fields: Rc<Vec<(Rc<str>, Type)>>,
    },
}

impl Type {
    pub fn int() -> Type {
        Type::Con(Rc::from("Int"))
    }

    pub fn bool() -> Type {
        Type::Con(Rc::from("Bool"))
    }

    pub fn string() -> Type {
        Type::Con(Rc::from("String"))
    }

    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    /// Build an arrow, flattening a result that is itself an arrow so that
    /// `a -> (b -> c)` and `a -> b -> c` are the same type.
    pub fn arrow(mut params: Vec<Type>, result: Type) -> Type {
        if params.is_empty() {
            return result;
        }
        match result {
            Type::Arrow(inner_params, inner_result) => {
                params.extend(inner_params);
                Type::Arrow(params, inner_result)
            }
            _ => Type::Arrow(params, Rc::new(result)),
        }
    }

    /// Build an application, flattening an applied head so that
    /// `(f a) b` and `f a b` are the same type.
    pub fn app(head: Type, args: Vec<Type>) -> Type {
        if args.is_empty() {
            return head;
        }
        match head {
            Type::App(inner_head, mut inner_args) => {
                inner_args.extend(args);
                Type::App(inner_head, inner_args)
            }
            _ => Type::App(Rc::new(head), args),
        }
    }

    /// Collect every metavariable occurring in the type, first occurrence
    /// first.
    pub fn iter_metas(&self, out: &mut Vec<Meta>) {
        match self {
            Type::Meta(meta) => {
                if !out.contains(meta) {
                    out.push(*meta);
                }
            }
            Type::Rigid(_) | Type::Con(_) => {}
            Type::App(head, args) => {
                head.iter_metas(out);
                for arg in args {
                    arg.iter_metas(out);
                }
            }
            Type::Arrow(params, result) => {
                for param in params {
                    param.iter_metas(out);
                }
                result.iter_metas(out);
            }
            Type::Tuple(elements) => {
                for element in elements {
                    element.iter_metas(out);
                }
            }
            Type::Record { fields, .. } => {
                for (_, field) in fields.iter() {
                    field.iter_metas(out);
                }
            }
        }
    }

    /// Replace rigid variables by name.
    pub fn substitute_rigid(&self, subst: &dyn Fn(&str) -> Option<Type>) -> Type {
        match self {
            Type::Meta(meta) => Type::Meta(*meta),
            Type::Rigid(name) => subst(name).unwrap_or_else(|| Type::Rigid(name.clone())),
            Type::Con(name) => Type::Con(name.clone()),
            Type::App(head, args) => Type::app(
                head.substitute_rigid(subst),
                args.iter().map(|arg| arg.substitute_rigid(subst)).collect(),
            ),
            Type::Arrow(params, result) => Type::arrow(
                params
                    .iter()
                    .map(|param| param.substitute_rigid(subst))
                    .collect(),
                result.substitute_rigid(subst),
            ),
            Type::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|element| element.substitute_rigid(subst))
                    .collect(),
            ),
            Type::Record { name, fields } => Type::Record {
                name: name.clone(),
                fields: Rc::new(
                    fields
                        .iter()
                        .map(|(field, ty)| (field.clone(), ty.substitute_rigid(subst)))
                        .collect(),
                ),
            },
        }
    }

    /// Replace metavariables by index.
    pub fn substitute_meta(&self, subst: &dyn Fn(Meta) -> Option<Type>) -> Type {
        match self {
            Type::Meta(meta) => subst(*meta).unwrap_or(Type::Meta(*meta)),
            Type::Rigid(name) => Type::Rigid(name.clone()),
            Type::Con(name) => Type::Con(name.clone()),
            Type::App(head, args) => Type::app(
                head.substitute_meta(subst),
                args.iter().map(|arg| arg.substitute_meta(subst)).collect(),
            ),
            Type::Arrow(params, result) => Type::arrow(
                params
                    .iter()
                    .map(|param| param.substitute_meta(subst))
                    .collect(),
                result.substitute_meta(subst),
            ),
            Type::Tuple(elements) => Type::Tuple(
                elements
                    .iter()
                    .map(|element| element.substitute_meta(subst))
                    .collect(),
            ),
            Type::Record { name, fields } => Type::Record {
                name: name.clone(),
                fields: Rc::new(
                    fields
                        .iter()
                        .map(|(field, ty)| (field.clone(), ty.substitute_meta(subst)))
                        .collect(),
                ),
            },
        }
    }

    pub fn render(&self) -> String {
        self.render_prec(0)
    }

    /// `prec` 0: top level; 1: arrow parameter; 2: application argument.
    fn render_prec(&self, prec: u8) -> String {
        match self {
            Type::Meta(meta) => format!("?{}", meta),
            Type::Rigid(name) => String::from(name.as_ref()),
            Type::Con(name) => String::from(name.as_ref()),
            Type::Record { name, .. } => String::from(name.as_ref()),
            Type::App(head, args) => {
                let mut out = head.render_prec(2);
                for arg in args {
                    out.push(' ');
                    out.push_str(&arg.render_prec(2));
                }
                if prec >= 2 {
                    format!("({})", out)
                } else {
                    out
                }
            }
            Type::Arrow(params, result) => {
                let mut out = String::new();
                for param in params {
                    out.push_str(&param.render_prec(1));
                    out.push_str(" -> ");
                }
                out.push_str(&result.render_prec(0));
                if prec >= 1 {
                    format!("({})", out)
                } else {
                    out
                }
            }
            Type::Tuple(elements) => {
                let mut out = String::from("(");
                for (ix, element) in elements.iter().enumerate() {
                    if ix > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&element.render_prec(0));
                }
                out.push(')');
                out
            }
        }
    }
}

/// A type-class membership requirement: `C t1 ... tn`.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Predicate {
    pub class: Rc<str>,
    pub args: Vec<Type>,
}

impl Predicate {
    pub fn render(&self) -> String {
        let mut out = String::from(self.class.as_ref());
        for arg in &self.args {
            out.push(' ');
            out.push_str(&arg.render_prec(2));
        }
        out
    }

    pub fn substitute_rigid(&self, subst: &dyn Fn(&str) -> Option<Type>) -> Predicate {
        Predicate {
            class: self.class.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.substitute_rigid(subst))
                .collect(),
        }
    }

    pub fn substitute_meta(&self, subst: &dyn Fn(Meta) -> Option<Type>) -> Predicate {
        Predicate {
            class: self.class.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.substitute_meta(subst))
                .collect(),
        }
    }

    pub fn iter_metas(&self, out: &mut Vec<Meta>) {
        for arg in &self.args {
            arg.iter_metas(out);
        }
    }
}

/// A constraint a scheme carries: class membership, or an equality to be
/// discharged at instantiation.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum SchemeConstraint {
    Class(Predicate),
    Equal(Type, Type),
}

/// `forall vars. constraints => ty`.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Scheme {
    pub vars: Vec<Rc<str>>,
    pub constraints: Vec<SchemeConstraint>,
    pub ty: Type,
}

impl Scheme {
    pub fn monomorphic(ty: Type) -> Scheme {
        Scheme {
            vars: Vec::new(),
            constraints: Vec::new(),
            ty,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let class_constraints: Vec<&Predicate> = self
            .constraints
            .iter()
            .filter_map(|constraint| match constraint {
                SchemeConstraint::Class(predicate) => Some(predicate),
                SchemeConstraint::Equal(..) => None,
            })
            .collect();
        if !class_constraints.is_empty() {
            out.push('(');
            for (ix, predicate) in class_constraints.iter().enumerate() {
                if ix > 0 {
                    out.push_str(", ");
                }
                out.push_str(&predicate.render());
            }
            out.push_str(") => ");
        }
        out.push_str(&self.ty.render());
        out
    }
}
