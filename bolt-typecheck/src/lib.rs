pub mod graph;
pub mod metavariables;
#[cfg(test)]
mod test;
pub mod types;
pub mod unification;

use bolt_diagnostic::{code, Diagnostic, Diagnostics, NodeId, Severity, Source, TextLoc};
use bolt_syntax::{
    scope::{ScopeOwner, ScopeTable, SymbolKind},
    ConstraintExpression, Element, Expression, IfBody, IfStatement, InstanceDeclaration, LetBody,
    LetBodyValue, LetDeclaration, Pattern, QualifiedName, SourceFile, SymbolPath, TypeExpression,
    VariantDeclarationMember,
};
use fnv::{FnvHashMap, FnvHashSet};
use metavariables::Meta;
use std::{collections::VecDeque, rc::Rc};
use types::{Predicate, Scheme, SchemeConstraint, Type};
use unification::zonk;

#[derive(PartialEq, Eq, Debug)]
pub enum TypeError {
    BindingNotFound {
        loc: TextLoc,
        node: NodeId,
        name: Rc<str>,
    },
    UnificationError {
        loc: TextLoc,
        node: NodeId,
        expected: Type,
        actual: Type,
    },
    OccursCheck {
        loc: TextLoc,
        node: NodeId,
        meta: Meta,
        ty: Type,
    },
    ArityMismatch {
        loc: TextLoc,
        node: NodeId,
        expected: usize,
        actual: usize,
    },
    InstanceNotFound {
        loc: TextLoc,
        node: NodeId,
        constraint: Predicate,
    },
    OverlappingInstances {
        loc: TextLoc,
        node: NodeId,
        constraint: Predicate,
    },
    TypeSignatureMismatch {
        loc: TextLoc,
        node: NodeId,
        constraint: Predicate,
    },
    MissingRecordField {
        loc: TextLoc,
        node: NodeId,
        record: Rc<str>,
        field: Rc<str>,
    },
    NoMatchingRecord {
        loc: TextLoc,
        node: NodeId,
        fields: Vec<Rc<str>>,
    },
}

impl TypeError {
    pub fn code(&self) -> u16 {
        match self {
            TypeError::BindingNotFound { .. } => code::BINDING_NOT_FOUND,
            TypeError::UnificationError { .. } => code::UNIFICATION_ERROR,
            TypeError::OccursCheck { .. } => code::OCCURS_CHECK,
            TypeError::ArityMismatch { .. } => code::ARITY_MISMATCH,
            TypeError::InstanceNotFound { .. } => code::INSTANCE_NOT_FOUND,
            TypeError::OverlappingInstances { .. } => code::INSTANCE_NOT_FOUND,
            TypeError::TypeSignatureMismatch { .. } => code::TYPE_SIGNATURE_MISMATCH,
            TypeError::MissingRecordField { .. } => code::UNIFICATION_ERROR,
            TypeError::NoMatchingRecord { .. } => code::UNIFICATION_ERROR,
        }
    }

    pub fn loc(&self) -> TextLoc {
        match self {
            TypeError::BindingNotFound { loc, .. }
            | TypeError::UnificationError { loc, .. }
            | TypeError::OccursCheck { loc, .. }
            | TypeError::ArityMismatch { loc, .. }
            | TypeError::InstanceNotFound { loc, .. }
            | TypeError::OverlappingInstances { loc, .. }
            | TypeError::TypeSignatureMismatch { loc, .. }
            | TypeError::MissingRecordField { loc, .. }
            | TypeError::NoMatchingRecord { loc, .. } => *loc,
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            TypeError::BindingNotFound { node, .. }
            | TypeError::UnificationError { node, .. }
            | TypeError::OccursCheck { node, .. }
            | TypeError::ArityMismatch { node, .. }
            | TypeError::InstanceNotFound { node, .. }
            | TypeError::OverlappingInstances { node, .. }
            | TypeError::TypeSignatureMismatch { node, .. }
            | TypeError::MissingRecordField { node, .. }
            | TypeError::NoMatchingRecord { node, .. } => *node,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TypeError::BindingNotFound { name, .. } => format!("binding \"{}\" not found", name),
            TypeError::UnificationError {
                expected, actual, ..
            } => format!(
                "expected type \"{}\", got type \"{}\"",
                expected.render(),
                actual.render()
            ),
            TypeError::OccursCheck { meta, ty, .. } => format!(
                "infinite type from equating ?{} with \"{}\"",
                meta,
                ty.render()
            ),
            TypeError::ArityMismatch {
                expected, actual, ..
            } => format!("expected {} type argument(s), got {}", expected, actual),
            TypeError::InstanceNotFound { constraint, .. } => {
                format!("no instance for \"{}\"", constraint.render())
            }
            TypeError::OverlappingInstances { constraint, .. } => {
                format!(
                    "instance \"{}\" overlaps a previously declared instance",
                    constraint.render()
                )
            }
            TypeError::TypeSignatureMismatch { constraint, .. } => format!(
                "cannot deduce \"{}\" from the type signature",
                constraint.render()
            ),
            TypeError::MissingRecordField { record, field, .. } => {
                format!("record \"{}\" has no field \"{}\"", record, field)
            }
            TypeError::NoMatchingRecord { fields, .. } => {
                let mut out = String::from("no record type with fields ");
                for (ix, field) in fields.iter().enumerate() {
                    if ix > 0 {
                        out.push_str(", ");
                    }
                    out.push('"');
                    out.push_str(field);
                    out.push('"');
                }
                out
            }
        }
    }

    pub fn report(&self, source: &Source, diagnostics: &mut Diagnostics) {
        diagnostics.item(Diagnostic {
            code: self.code(),
            severity: Severity::Error,
            source: source.clone(),
            loc: Some(self.loc()),
            node: Some(self.node()),
            message: self.message(),
            addendum: None,
        });
    }
}

struct ClassInfo {
    params: Vec<Rc<str>>,
    methods: Vec<(Rc<str>, NodeId)>,
}

struct Instance {
    node: NodeId,
    types: Vec<Type>,
    context: Vec<Predicate>,
}

#[derive(Clone)]
struct RecordInfo {
    name: Rc<str>,
    fields: Rc<Vec<(Rc<str>, Type)>>,
}

/// A class constraint awaiting discharge, remembered together with the
/// context it was generated in.
struct Deferred {
    predicate: Predicate,
    node: NodeId,
    loc: TextLoc,
    assumptions: Vec<Predicate>,
    signed: bool,
}

struct ReturnTarget {
    ty: Type,
    used: bool,
}

pub struct Checker<'a> {
    source: Source,
    file: &'a SourceFile,
    solutions: metavariables::Solutions<Type>,
    level: usize,
    scopes: ScopeTable,
    scope_stack: Vec<ScopeOwner<'a>>,
    locals: Vec<(Rc<str>, Type)>,
    schemes: FnvHashMap<NodeId, Scheme>,
    monotypes: FnvHashMap<NodeId, Type>,
    signed: FnvHashSet<NodeId>,
    node_types: FnvHashMap<NodeId, Type>,
    records: Vec<RecordInfo>,
    classes: FnvHashMap<Rc<str>, ClassInfo>,
    instances: FnvHashMap<Rc<str>, Vec<Instance>>,
    type_arities: FnvHashMap<Rc<str>, usize>,
    builtins: FnvHashMap<Rc<str>, Scheme>,
    prefix_builtins: FnvHashMap<Rc<str>, Type>,
    assumptions: Vec<Predicate>,
    deferred: Vec<Deferred>,
    return_targets: Vec<ReturnTarget>,
    current_signed: bool,
    errors: Vec<TypeError>,
}

/// Parse-independent entry point: check a parsed source file.
pub fn check_source_file<'a>(source: Source, file: &'a SourceFile) -> Checker<'a> {
    let mut checker = Checker::new(source, file);
    checker.check();
    checker
}

fn builtin_schemes() -> FnvHashMap<Rc<str>, Scheme> {
    let mut builtins = FnvHashMap::default();
    let a = || Type::Rigid(Rc::from("a"));
    let compare = Scheme {
        vars: vec![Rc::from("a")],
        constraints: Vec::new(),
        ty: Type::arrow(vec![a(), a()], Type::bool()),
    };
    let int_binop = Scheme::monomorphic(Type::arrow(vec![Type::int(), Type::int()], Type::int()));
    let int_compare =
        Scheme::monomorphic(Type::arrow(vec![Type::int(), Type::int()], Type::bool()));
    let bool_binop =
        Scheme::monomorphic(Type::arrow(vec![Type::bool(), Type::bool()], Type::bool()));

    builtins.insert(Rc::from("True"), Scheme::monomorphic(Type::bool()));
    builtins.insert(Rc::from("False"), Scheme::monomorphic(Type::bool()));
    for op in ["==", "!=", "/="] {
        builtins.insert(Rc::from(op), compare.clone());
    }
    for op in ["<", ">", "<=", ">="] {
        builtins.insert(Rc::from(op), int_compare.clone());
    }
    for op in ["+", "-", "*", "/", "%", "**"] {
        builtins.insert(Rc::from(op), int_binop.clone());
    }
    for op in ["&&", "||"] {
        builtins.insert(Rc::from(op), bool_binop.clone());
    }
    builtins
}

fn builtin_prefix_operators() -> FnvHashMap<Rc<str>, Type> {
    let mut prefix = FnvHashMap::default();
    prefix.insert(Rc::from("-"), Type::arrow(vec![Type::int()], Type::int()));
    prefix.insert(Rc::from("!"), Type::arrow(vec![Type::bool()], Type::bool()));
    prefix
}

impl<'a> Checker<'a> {
    pub fn new(source: Source, file: &'a SourceFile) -> Self {
        let mut type_arities = FnvHashMap::default();
        type_arities.insert(Rc::from("Int"), 0);
        type_arities.insert(Rc::from("Bool"), 0);
        type_arities.insert(Rc::from("String"), 0);
        Checker {
            source,
            file,
            solutions: metavariables::Solutions::new(),
            level: 0,
            scopes: ScopeTable::new(),
            scope_stack: Vec::new(),
            locals: Vec::new(),
            schemes: FnvHashMap::default(),
            monotypes: FnvHashMap::default(),
            signed: FnvHashSet::default(),
            node_types: FnvHashMap::default(),
            records: Vec::new(),
            classes: FnvHashMap::default(),
            instances: FnvHashMap::default(),
            type_arities,
            builtins: builtin_schemes(),
            prefix_builtins: builtin_prefix_operators(),
            assumptions: Vec::new(),
            deferred: Vec::new(),
            return_targets: Vec::new(),
            current_signed: false,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[TypeError] {
        &self.errors
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.node_types.get(&node)
    }

    pub fn scheme_of(&self, node: NodeId) -> Option<&Scheme> {
        self.schemes.get(&node)
    }

    pub fn report_errors(&self, diagnostics: &mut Diagnostics) {
        for error in &self.errors {
            error.report(&self.source, diagnostics);
        }
    }

    /// Run both phases over the source file.
    pub fn check(&mut self) {
        let file = self.file;
        self.scope_stack.push(ScopeOwner::File(file));

        self.collect_elements(&file.elements);

        // Phase 2a: value bindings, one strongly connected component at a
        // time, dependencies first.
        let lets: Vec<&'a LetDeclaration> = file
            .elements
            .iter()
            .filter_map(|element| match element {
                Element::Let(decl) => Some(decl),
                _ => None,
            })
            .collect();
        let components = self.binding_components(&lets);
        let by_id: FnvHashMap<NodeId, &'a LetDeclaration> =
            lets.iter().map(|decl| (decl.id, *decl)).collect();
        for component in components {
            let decls: Vec<&'a LetDeclaration> = component
                .iter()
                .filter_map(|id| by_id.get(id).copied())
                .collect();
            if !decls.is_empty() {
                self.check_binding_group(&decls);
            }
        }

        // Phase 2b: the remaining elements in source order.
        for element in &file.elements {
            match element {
                Element::Let(_) => {}
                _ => self.infer_element(element),
            }
        }

        self.scope_stack.pop();

        // Invariant: after checking, every recorded node type is zonked.
        let keys: Vec<NodeId> = self.node_types.keys().copied().collect();
        for key in keys {
            let ty = zonk(&self.solutions, &self.node_types[&key]);
            self.node_types.insert(key, ty);
        }
    }

    fn fresh(&mut self) -> Type {
        Type::Meta(self.solutions.fresh_meta(self.level))
    }

    fn unify(&mut self, expected: &Type, actual: &Type, node: NodeId, loc: TextLoc) -> bool {
        match unification::unify(&mut self.solutions, expected, actual) {
            Ok(()) => true,
            Err(unification::Error::Mismatch { expected, actual }) => {
                self.errors.push(TypeError::UnificationError {
                    loc,
                    node,
                    expected,
                    actual,
                });
                false
            }
            Err(unification::Error::Occurs { meta, ty }) => {
                self.errors
                    .push(TypeError::OccursCheck { loc, node, meta, ty });
                false
            }
        }
    }

    /* ---------------------------------------------------------------------
     * Phase 1: collection
     * ------------------------------------------------------------------ */

    fn collect_elements(&mut self, elements: &'a [Element]) {
        // Type constructors first, so signatures can mention any of them
        // regardless of declaration order.
        for element in elements {
            match element {
                Element::Record(decl) => {
                    self.type_arities.insert(decl.name_text(), 0);
                    self.records.push(RecordInfo {
                        name: decl.name_text(),
                        fields: Rc::new(Vec::new()),
                    });
                }
                Element::Variant(decl) => {
                    self.type_arities
                        .insert(decl.name_text(), decl.type_vars.len());
                }
                _ => {}
            }
        }

        for element in elements {
            match element {
                Element::Record(decl) => self.collect_record(decl),
                Element::Variant(decl) => self.collect_variant(decl),
                Element::Class(decl) => self.collect_class(decl),
                _ => {}
            }
        }

        for element in elements {
            match element {
                Element::Instance(decl) => self.collect_instance(decl),
                Element::Let(decl) => self.collect_let_signature(decl),
                _ => {}
            }
        }
    }

    fn collect_record(&mut self, decl: &'a bolt_syntax::RecordDeclaration) {
        let name = decl.name_text();
        let mut fields = Vec::new();
        for field in &decl.fields {
            let mut constraints = Vec::new();
            let ty = self.convert_type(&field.type_expression, &mut constraints);
            fields.push((field.name_text(), ty));
        }
        let info = RecordInfo {
            name: name.clone(),
            fields: Rc::new(fields),
        };
        match self.records.iter_mut().find(|info| info.name == name) {
            Some(existing) => *existing = info,
            None => self.records.push(info),
        }
    }

    fn record_type(&self, name: &str) -> Option<Type> {
        self.records
            .iter()
            .find(|info| info.name.as_ref() == name)
            .map(|info| Type::Record {
                name: info.name.clone(),
                fields: info.fields.clone(),
            })
    }

    fn collect_variant(&mut self, decl: &'a bolt_syntax::VariantDeclaration) {
        let name = decl.name_text();
        let vars: Vec<Rc<str>> = decl
            .type_vars
            .iter()
            .map(|var| var.name_text())
            .collect();
        let result = Type::app(
            Type::Con(name),
            vars.iter().map(|var| Type::Rigid(var.clone())).collect(),
        );
        for member in &decl.members {
            let args: Vec<Type> = match member {
                VariantDeclarationMember::Tuple(member) => member
                    .elements
                    .iter()
                    .map(|element| {
                        let mut constraints = Vec::new();
                        self.convert_type(element, &mut constraints)
                    })
                    .collect(),
                VariantDeclarationMember::Record(member) => member
                    .fields
                    .iter()
                    .map(|field| {
                        let mut constraints = Vec::new();
                        self.convert_type(&field.type_expression, &mut constraints)
                    })
                    .collect(),
            };
            let scheme = Scheme {
                vars: vars.clone(),
                constraints: Vec::new(),
                ty: Type::arrow(args, result.clone()),
            };
            self.schemes.insert(member.id(), scheme);
        }
    }

    fn collect_class(&mut self, decl: &'a bolt_syntax::ClassDeclaration) {
        let class_name = decl.name_text();
        let params: Vec<Rc<str>> = decl
            .type_vars
            .iter()
            .map(|var| var.name_text())
            .collect();
        let class_predicate = Predicate {
            class: class_name.clone(),
            args: params
                .iter()
                .map(|param| Type::Rigid(param.clone()))
                .collect(),
        };

        let mut methods = Vec::new();
        for element in &decl.elements {
            let method = match element {
                Element::Let(method) => method,
                _ => continue,
            };
            let method_name = match method.name() {
                Some(name) => name,
                None => continue,
            };
            let assert = match &method.type_assert {
                Some(assert) => assert,
                None => continue,
            };
            let mut constraints = vec![SchemeConstraint::Class(class_predicate.clone())];
            let ty = self.convert_type(&assert.type_expression, &mut constraints);

            let mut vars = params.clone();
            for var in free_rigids(&ty) {
                if !vars.contains(&var) {
                    vars.push(var);
                }
            }
            self.schemes.insert(
                method.id,
                Scheme {
                    vars,
                    constraints,
                    ty,
                },
            );
            methods.push((method_name, method.id));
        }

        self.classes
            .insert(class_name, ClassInfo { params, methods });
    }

    fn collect_instance(&mut self, decl: &'a InstanceDeclaration) {
        let class_name = decl.name_text();
        let loc = decl.name.start;
        let params_len = match self.classes.get(&class_name) {
            Some(info) => info.params.len(),
            None => {
                self.errors.push(TypeError::BindingNotFound {
                    loc,
                    node: decl.id,
                    name: class_name,
                });
                return;
            }
        };
        if decl.type_exprs.len() != params_len {
            self.errors.push(TypeError::ArityMismatch {
                loc,
                node: decl.id,
                expected: params_len,
                actual: decl.type_exprs.len(),
            });
            return;
        }

        let types: Vec<Type> = decl
            .type_exprs
            .iter()
            .map(|ty| {
                let mut constraints = Vec::new();
                self.convert_type(ty, &mut constraints)
            })
            .collect();

        let overlaps = self
            .instances
            .get(&class_name)
            .map_or(false, |existing| {
                existing
                    .iter()
                    .any(|instance| heads_overlap(&instance.types, &types))
            });
        if overlaps {
            self.errors.push(TypeError::OverlappingInstances {
                loc,
                node: decl.id,
                constraint: Predicate {
                    class: class_name,
                    args: types,
                },
            });
            return;
        }
        self.instances.entry(class_name).or_default().push(Instance {
            node: decl.id,
            types,
            context: Vec::new(),
        });
    }

    fn collect_let_signature(&mut self, decl: &'a LetDeclaration) {
        let assert = match &decl.type_assert {
            Some(assert) => assert,
            None => return,
        };
        let scheme = self.convert_scheme(&assert.type_expression);
        self.schemes.insert(decl.id, scheme);
        self.signed.insert(decl.id);
    }

    /* ---------------------------------------------------------------------
     * Syntax-to-type conversion
     * ------------------------------------------------------------------ */

    fn convert_scheme(&mut self, ty: &TypeExpression) -> Scheme {
        let mut constraints = Vec::new();
        let body = self.convert_type(ty, &mut constraints);
        let mut vars = Vec::new();
        for constraint in &constraints {
            let tys: Vec<&Type> = match constraint {
                SchemeConstraint::Class(predicate) => predicate.args.iter().collect(),
                SchemeConstraint::Equal(left, right) => vec![left, right],
            };
            for ty in tys {
                for var in free_rigids(ty) {
                    if !vars.contains(&var) {
                        vars.push(var);
                    }
                }
            }
        }
        for var in free_rigids(&body) {
            if !vars.contains(&var) {
                vars.push(var);
            }
        }
        Scheme {
            vars,
            constraints,
            ty: body,
        }
    }

    fn convert_type(
        &mut self,
        ty: &TypeExpression,
        constraints: &mut Vec<SchemeConstraint>,
    ) -> Type {
        let converted = match ty {
            TypeExpression::Var(var) => Type::Rigid(var.name_text()),
            TypeExpression::Reference(reference) => {
                self.convert_type_reference(&reference.name, reference.id)
            }
            TypeExpression::App(app) => {
                let head = self.convert_type(&app.op, constraints);
                let args: Vec<Type> = app
                    .args
                    .iter()
                    .map(|arg| self.convert_type(arg, constraints))
                    .collect();
                if let Type::Con(name) = &head {
                    if let Some(arity) = self.type_arities.get(name.as_ref()).copied() {
                        if arity != args.len() {
                            self.errors.push(TypeError::ArityMismatch {
                                loc: ty.first_token().start,
                                node: ty.id(),
                                expected: arity,
                                actual: args.len(),
                            });
                        }
                    }
                }
                if let Type::Record { .. } = &head {
                    self.errors.push(TypeError::ArityMismatch {
                        loc: ty.first_token().start,
                        node: ty.id(),
                        expected: 0,
                        actual: args.len(),
                    });
                }
                Type::app(head, args)
            }
            TypeExpression::Arrow(arrow) => {
                let params: Vec<Type> = arrow
                    .param_types
                    .iter()
                    .map(|param| self.convert_type(param, constraints))
                    .collect();
                let result = self.convert_type(&arrow.return_type, constraints);
                Type::arrow(params, result)
            }
            TypeExpression::Nested(nested) => self.convert_type(&nested.ty, constraints),
            TypeExpression::Tuple(tuple) => Type::Tuple(
                tuple
                    .elements
                    .iter()
                    .map(|(element, _)| self.convert_type(element, constraints))
                    .collect(),
            ),
            TypeExpression::Qualified(qualified) => {
                for (constraint, _) in &qualified.constraints {
                    let converted = self.convert_constraint(constraint, constraints);
                    constraints.push(converted);
                }
                self.convert_type(&qualified.ty, constraints)
            }
        };
        self.node_types.insert(ty.id(), converted.clone());
        converted
    }

    fn convert_type_reference(&mut self, name: &QualifiedName, node: NodeId) -> Type {
        let path = name.path();
        if !path.modules.is_empty() {
            self.errors.push(TypeError::BindingNotFound {
                loc: name.first_token().start,
                node,
                name: path.name,
            });
            return self.fresh();
        }
        if let Some(record) = self.record_type(&path.name) {
            return record;
        }
        if self.type_arities.contains_key(&path.name) {
            return Type::Con(path.name);
        }
        self.errors.push(TypeError::BindingNotFound {
            loc: name.first_token().start,
            node,
            name: path.name,
        });
        self.fresh()
    }

    fn convert_constraint(
        &mut self,
        constraint: &ConstraintExpression,
        constraints: &mut Vec<SchemeConstraint>,
    ) -> SchemeConstraint {
        match constraint {
            ConstraintExpression::Typeclass(typeclass) => {
                let class = match &typeclass.name.data {
                    bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
                    _ => panic!("typeclass constraint name is not a constructor identifier"),
                };
                let args: Vec<Type> = typeclass
                    .types
                    .iter()
                    .map(|ty| self.convert_type(ty, constraints))
                    .collect();
                match self.classes.get(&class) {
                    None => {
                        self.errors.push(TypeError::BindingNotFound {
                            loc: typeclass.name.start,
                            node: typeclass.id,
                            name: class.clone(),
                        });
                    }
                    Some(info) if info.params.len() != args.len() => {
                        self.errors.push(TypeError::ArityMismatch {
                            loc: typeclass.name.start,
                            node: typeclass.id,
                            expected: info.params.len(),
                            actual: args.len(),
                        });
                    }
                    Some(_) => {}
                }
                SchemeConstraint::Class(Predicate { class, args })
            }
            ConstraintExpression::Equality(equality) => {
                let left = self.convert_type(&equality.left, constraints);
                let right = self.convert_type(&equality.right, constraints);
                SchemeConstraint::Equal(left, right)
            }
        }
    }

    /* ---------------------------------------------------------------------
     * Schemes: instantiation, skolemization, generalization
     * ------------------------------------------------------------------ */

    /// Instantiate a scheme with fresh metavariables at the current level.
    /// The scheme's class constraints are deferred; its equality
    /// constraints are discharged immediately.
    fn instantiate(&mut self, scheme: &Scheme, node: NodeId, loc: TextLoc) -> Type {
        let subst: FnvHashMap<Rc<str>, Type> = scheme
            .vars
            .iter()
            .map(|var| {
                (
                    var.clone(),
                    Type::Meta(self.solutions.fresh_meta(self.level)),
                )
            })
            .collect();
        let apply = |name: &str| subst.get(name).cloned();
        for constraint in &scheme.constraints {
            match constraint {
                SchemeConstraint::Class(predicate) => {
                    let predicate = predicate.substitute_rigid(&apply);
                    let assumptions = self.assumptions.clone();
                    let signed = self.current_signed;
                    self.deferred.push(Deferred {
                        predicate,
                        node,
                        loc,
                        assumptions,
                        signed,
                    });
                }
                SchemeConstraint::Equal(left, right) => {
                    let left = left.substitute_rigid(&apply);
                    let right = right.substitute_rigid(&apply);
                    self.unify(&left, &right, node, loc);
                }
            }
        }
        scheme.ty.substitute_rigid(&apply)
    }

    /// Prepare the declared type of a signed binding for checking its
    /// body: quantified variables stay rigid, class constraints become
    /// local assumptions, and equality constraints are applied as a
    /// substitution where one side is a quantified variable.
    fn skolemize(&mut self, scheme: &Scheme, node: NodeId, loc: TextLoc) -> Type {
        let mut eq_subst: FnvHashMap<Rc<str>, Type> = FnvHashMap::default();
        for constraint in &scheme.constraints {
            if let SchemeConstraint::Equal(left, right) = constraint {
                match (left, right) {
                    (Type::Rigid(var), other) | (other, Type::Rigid(var)) => {
                        eq_subst.insert(var.clone(), other.clone());
                    }
                    (left, right) => {
                        let left = left.clone();
                        let right = right.clone();
                        self.unify(&left, &right, node, loc);
                    }
                }
            }
        }
        let apply = |name: &str| eq_subst.get(name).cloned();
        for constraint in &scheme.constraints {
            if let SchemeConstraint::Class(predicate) = constraint {
                self.assumptions.push(predicate.substitute_rigid(&apply));
            }
        }
        scheme.ty.substitute_rigid(&apply)
    }

    /// Quantify the metavariables above `gen_level`, attaching the
    /// residual class constraints that mention them.
    fn generalize(&mut self, ty: Type, residual: &[Predicate], gen_level: usize) -> Scheme {
        let ty = zonk(&self.solutions, &ty);
        let mut metas = Vec::new();
        ty.iter_metas(&mut metas);
        let mut gen_metas: Vec<Meta> = metas
            .into_iter()
            .filter(|meta| self.solutions.level(*meta) > gen_level)
            .collect();

        let mut attached: Vec<Predicate> = Vec::new();
        loop {
            let mut changed = false;
            for predicate in residual {
                if attached.contains(predicate) {
                    continue;
                }
                let mut predicate_metas = Vec::new();
                predicate.iter_metas(&mut predicate_metas);
                if predicate_metas.iter().any(|meta| gen_metas.contains(meta)) {
                    for meta in predicate_metas {
                        if self.solutions.level(meta) > gen_level && !gen_metas.contains(&meta) {
                            gen_metas.push(meta);
                            changed = true;
                        }
                    }
                    attached.push(predicate.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let names: Vec<Rc<str>> = gen_metas
            .iter()
            .enumerate()
            .map(|(ix, _)| quantifier_name(ix))
            .collect();
        let subst: FnvHashMap<Meta, Type> = gen_metas
            .iter()
            .zip(names.iter())
            .map(|(meta, name)| (*meta, Type::Rigid(name.clone())))
            .collect();
        let apply = |meta: Meta| subst.get(&meta).cloned();
        Scheme {
            vars: names,
            constraints: attached
                .iter()
                .map(|predicate| SchemeConstraint::Class(predicate.substitute_meta(&apply)))
                .collect(),
            ty: ty.substitute_meta(&apply),
        }
    }

    /* ---------------------------------------------------------------------
     * Phase 2: binding groups
     * ------------------------------------------------------------------ */

    fn binding_components(&mut self, lets: &[&'a LetDeclaration]) -> Vec<Vec<NodeId>> {
        let nodes: Vec<NodeId> = lets.iter().map(|decl| decl.id).collect();
        let node_set: FnvHashSet<NodeId> = nodes.iter().copied().collect();
        let mut edges: FnvHashMap<NodeId, Vec<NodeId>> = FnvHashMap::default();
        for decl in lets {
            let mut names = FnvHashSet::default();
            let mut bound: Vec<Rc<str>> = Vec::new();
            for param in &decl.params {
                for (name, _) in param.pattern.bound_names() {
                    bound.push(name);
                }
            }
            free_names_in_let_body(decl, &mut bound, &mut names);
            let mut successors = Vec::new();
            for name in names {
                let path = SymbolPath::plain(name);
                if let Some(target) =
                    self.scopes
                        .lookup(&self.scope_stack, &path, SymbolKind::Var)
                {
                    if node_set.contains(&target) && !successors.contains(&target) {
                        successors.push(target);
                    }
                }
            }
            edges.insert(decl.id, successors);
        }
        graph::strongly_connected_components(&nodes, &edges)
    }

    fn check_binding_group(&mut self, decls: &[&'a LetDeclaration]) {
        let gen_level = self.level;
        self.level += 1;
        let saved_deferred = std::mem::take(&mut self.deferred);

        for decl in decls {
            if !self.signed.contains(&decl.id) && !self.monotypes.contains_key(&decl.id) {
                let alpha = self.fresh();
                self.monotypes.insert(decl.id, alpha);
            }
        }
        for decl in decls {
            self.check_let_body(decl);
        }

        let (residual, keep) = self.discharge_deferred(gen_level);
        for decl in decls {
            if self.signed.contains(&decl.id) {
                continue;
            }
            let ty = self
                .monotypes
                .remove(&decl.id)
                .expect("binding lost its monotype");
            let scheme = self.generalize(ty, &residual, gen_level);
            self.schemes.insert(decl.id, scheme);
        }

        self.deferred = saved_deferred;
        self.deferred.extend(keep);
        self.level = gen_level;
    }

    /// A let declaration nested in a block body: a binding group of one.
    fn check_nested_let(&mut self, decl: &'a LetDeclaration) {
        if decl.type_assert.is_some() && !self.schemes.contains_key(&decl.id) {
            self.collect_let_signature(decl);
        }
        self.check_binding_group(&[decl]);
    }

    fn check_let_body(&mut self, decl: &'a LetDeclaration) {
        let loc = decl.let_keyword.start;
        let node = decl.id;
        self.scope_stack.push(ScopeOwner::Let(decl));
        let locals_len = self.locals.len();
        let assumptions_len = self.assumptions.len();
        let saved_signed = self.current_signed;

        let expected = if self.signed.contains(&decl.id) {
            self.current_signed = true;
            let scheme = self.schemes[&decl.id].clone();
            self.skolemize(&scheme, node, loc)
        } else {
            self.current_signed = false;
            self.monotypes[&decl.id].clone()
        };
        self.node_types.insert(decl.pattern.id(), expected.clone());

        let mut param_types = Vec::new();
        for param in &decl.params {
            param_types.push(self.infer_pattern(&param.pattern));
        }
        let result = if param_types.is_empty() {
            expected.clone()
        } else {
            let result = self.fresh();
            let arrow = Type::arrow(param_types, result.clone());
            self.unify(&expected, &arrow, node, loc);
            result
        };

        self.return_targets.push(ReturnTarget {
            ty: result.clone(),
            used: false,
        });
        match &decl.body {
            None => {}
            Some(LetBody::Expr(body)) => match &body.value {
                LetBodyValue::Expression(expression) => {
                    let ty = self.infer_expression(expression);
                    self.unify(
                        &result,
                        &ty,
                        expression.id(),
                        expression.first_token().start,
                    );
                }
                LetBodyValue::If(if_statement) => {
                    self.infer_if_value(if_statement, &result);
                }
            },
            Some(LetBody::Block(body)) => {
                self.infer_block_value(&body.elements, &result, node, loc);
            }
        }
        self.return_targets.pop();

        self.current_signed = saved_signed;
        self.assumptions.truncate(assumptions_len);
        self.locals.truncate(locals_len);
        self.scope_stack.pop();
    }

    /// A block in value position: the last expression statement is the
    /// block's value; `return` statements target the same type.
    fn infer_block_value(
        &mut self,
        elements: &'a [Element],
        result: &Type,
        node: NodeId,
        loc: TextLoc,
    ) {
        self.collect_elements(elements);
        let last_is_expression = matches!(elements.last(), Some(Element::Expression(_)));
        let count = elements.len();
        for (ix, element) in elements.iter().enumerate() {
            if ix + 1 == count {
                if let Element::Expression(stmt) = element {
                    let ty = self.infer_expression(&stmt.expression);
                    self.unify(
                        result,
                        &ty,
                        stmt.expression.id(),
                        stmt.expression.first_token().start,
                    );
                    continue;
                }
            }
            self.infer_element(element);
        }
        let used_return = self
            .return_targets
            .last()
            .map(|target| target.used)
            .unwrap_or(false);
        if !last_is_expression && !used_return {
            let unit = Type::unit();
            self.unify(result, &unit, node, loc);
        }
    }

    /// An `if` in value position: every branch's tail must produce the
    /// result type; a missing `else` makes the statement's value unit.
    fn infer_if_value(&mut self, statement: &'a IfStatement, result: &Type) {
        for part in &statement.parts {
            if let Some(test) = &part.test {
                let ty = self.infer_expression(test);
                self.unify(&Type::bool(), &ty, test.id(), test.first_token().start);
            }
            self.scope_stack.push(ScopeOwner::IfPart(part));
            match &part.body {
                IfBody::Inline(element) => match element.as_ref() {
                    Element::Expression(stmt) => {
                        let ty = self.infer_expression(&stmt.expression);
                        self.unify(
                            result,
                            &ty,
                            stmt.expression.id(),
                            stmt.expression.first_token().start,
                        );
                    }
                    element => self.infer_element(element),
                },
                IfBody::Block { elements, .. } => {
                    self.infer_block_value(elements, result, part.id, part.keyword.start);
                }
            }
            self.scope_stack.pop();
        }
        let has_else = statement
            .parts
            .last()
            .map(|part| part.test.is_none())
            .unwrap_or(false);
        if !has_else {
            let unit = Type::unit();
            let part = &statement.parts[0];
            self.unify(result, &unit, statement.id, part.keyword.start);
        }
    }

    /* ---------------------------------------------------------------------
     * Statements
     * ------------------------------------------------------------------ */

    fn infer_element(&mut self, element: &'a Element) {
        match element {
            Element::Let(decl) => self.check_nested_let(decl),
            Element::Expression(stmt) => {
                self.infer_expression(&stmt.expression);
            }
            Element::If(stmt) => {
                for part in &stmt.parts {
                    if let Some(test) = &part.test {
                        let ty = self.infer_expression(test);
                        self.unify(&Type::bool(), &ty, test.id(), test.first_token().start);
                    }
                    self.scope_stack.push(ScopeOwner::IfPart(part));
                    match &part.body {
                        IfBody::Inline(element) => self.infer_element(element),
                        IfBody::Block { elements, .. } => {
                            self.collect_elements(elements);
                            for element in elements {
                                self.infer_element(element);
                            }
                        }
                    }
                    self.scope_stack.pop();
                }
            }
            Element::Return(stmt) => {
                let ty = match &stmt.expression {
                    Some(expression) => self.infer_expression(expression),
                    None => Type::unit(),
                };
                if let Some(target) = self.return_targets.last_mut() {
                    target.used = true;
                    let expected = target.ty.clone();
                    self.unify(&expected, &ty, stmt.id, stmt.return_keyword.start);
                }
            }
            Element::Instance(decl) => self.check_instance_methods(decl),
            // Collected during phase 1; nothing left to infer.
            Element::Record(_) | Element::Variant(_) | Element::Class(_) => {}
        }
    }

    /// Check each instance method body against the class method's scheme,
    /// specialized to the instance head.
    fn check_instance_methods(&mut self, decl: &'a InstanceDeclaration) {
        let class_name = decl.name_text();
        let (params, methods) = match self.classes.get(&class_name) {
            Some(info) => (info.params.clone(), info.methods.clone()),
            None => return,
        };
        let instance_types: Vec<Type> = match self
            .instances
            .get(&class_name)
            .and_then(|instances| instances.iter().find(|instance| instance.node == decl.id))
        {
            Some(instance) => instance.types.clone(),
            // Rejected at collection (overlap); don't check the bodies.
            None => return,
        };
        let head_subst: FnvHashMap<Rc<str>, Type> = params
            .iter()
            .cloned()
            .zip(instance_types.iter().cloned())
            .collect();

        self.scope_stack.push(ScopeOwner::Instance(decl));
        for element in &decl.elements {
            let method = match element {
                Element::Let(method) => method,
                _ => continue,
            };
            let method_name = match method.name() {
                Some(name) => name,
                None => continue,
            };
            let class_method = methods
                .iter()
                .find(|(name, _)| *name == method_name)
                .map(|(_, node)| *node);
            let class_scheme = match class_method.and_then(|node| self.schemes.get(&node)) {
                Some(scheme) => scheme.clone(),
                None => {
                    self.errors.push(TypeError::BindingNotFound {
                        loc: method.let_keyword.start,
                        node: method.id,
                        name: method_name,
                    });
                    continue;
                }
            };

            let apply = |name: &str| head_subst.get(name).cloned();
            let specialized = Scheme {
                vars: class_scheme
                    .vars
                    .iter()
                    .filter(|var| !params.contains(*var))
                    .cloned()
                    .collect(),
                constraints: class_scheme
                    .constraints
                    .iter()
                    .filter(|constraint| match constraint {
                        // Defining the class's own instance: drop the
                        // class-membership constraint.
                        SchemeConstraint::Class(predicate) => predicate.class != class_name,
                        SchemeConstraint::Equal(..) => true,
                    })
                    .map(|constraint| match constraint {
                        SchemeConstraint::Class(predicate) => {
                            SchemeConstraint::Class(predicate.substitute_rigid(&apply))
                        }
                        SchemeConstraint::Equal(left, right) => SchemeConstraint::Equal(
                            left.substitute_rigid(&apply),
                            right.substitute_rigid(&apply),
                        ),
                    })
                    .collect(),
                ty: class_scheme.ty.substitute_rigid(&apply),
            };
            self.schemes.insert(method.id, specialized);
            self.signed.insert(method.id);
            self.check_binding_group(&[method]);
        }
        self.scope_stack.pop();
    }

    /* ---------------------------------------------------------------------
     * Expressions and patterns
     * ------------------------------------------------------------------ */

    fn infer_expression(&mut self, expression: &'a Expression) -> Type {
        let ty = self.infer_expression_inner(expression);
        self.node_types.insert(expression.id(), ty.clone());
        ty
    }

    fn infer_expression_inner(&mut self, expression: &'a Expression) -> Type {
        let loc = expression.first_token().start;
        match expression {
            Expression::Constant(constant) => match &constant.token.data {
                bolt_lex::token::Data::IntegerLiteral(_) => Type::int(),
                bolt_lex::token::Data::StringLiteral { .. } => Type::string(),
                _ => panic!("constant expression holds a non-literal token"),
            },
            Expression::Reference(reference) => {
                self.resolve_reference(&reference.name, reference.id)
            }
            Expression::Call(call) => {
                let function_ty = self.infer_expression(&call.function);
                let arg_types: Vec<Type> = call
                    .args
                    .iter()
                    .map(|arg| self.infer_expression(arg))
                    .collect();
                let result = self.fresh();
                let arrow = Type::arrow(arg_types, result.clone());
                if self.unify(&function_ty, &arrow, call.id, loc) {
                    result
                } else {
                    self.fresh()
                }
            }
            Expression::Infix(infix) => {
                let operator_ty = self.resolve_operator(&infix.operator, infix.id);
                let lhs = self.infer_expression(&infix.lhs);
                let rhs = self.infer_expression(&infix.rhs);
                let result = self.fresh();
                let arrow = Type::arrow(vec![lhs, rhs], result.clone());
                if self.unify(&operator_ty, &arrow, infix.id, infix.operator.start) {
                    result
                } else {
                    self.fresh()
                }
            }
            Expression::Prefix(prefix) => {
                let operator_ty = self.resolve_prefix_operator(&prefix.operator, prefix.id);
                let argument = self.infer_expression(&prefix.argument);
                let result = self.fresh();
                let arrow = Type::arrow(vec![argument], result.clone());
                if self.unify(&operator_ty, &arrow, prefix.id, prefix.operator.start) {
                    result
                } else {
                    self.fresh()
                }
            }
            Expression::Nested(nested) => self.infer_expression(&nested.inner),
            Expression::Tuple(tuple) => Type::Tuple(
                tuple
                    .elements
                    .iter()
                    .map(|(element, _)| self.infer_expression(element))
                    .collect(),
            ),
            Expression::Record(record) => self.infer_record_expression(record),
            Expression::Member(member) => {
                let ty = self.infer_expression(&member.expression);
                let ty = zonk(&self.solutions, &ty);
                let field_name: Rc<str> = match &member.name.data {
                    bolt_lex::token::Data::Identifier(name) => name.clone(),
                    _ => panic!("member name is not an identifier"),
                };
                match &ty {
                    Type::Record { name, fields } => {
                        match fields.iter().find(|(field, _)| *field == field_name) {
                            Some((_, field_ty)) => field_ty.clone(),
                            None => {
                                self.errors.push(TypeError::MissingRecordField {
                                    loc: member.name.start,
                                    node: member.id,
                                    record: name.clone(),
                                    field: field_name,
                                });
                                self.fresh()
                            }
                        }
                    }
                    _ => {
                        self.errors.push(TypeError::NoMatchingRecord {
                            loc: member.name.start,
                            node: member.id,
                            fields: vec![field_name],
                        });
                        self.fresh()
                    }
                }
            }
            Expression::Match(match_expression) => {
                let scrutinee_ty = self.infer_expression(&match_expression.scrutinee);
                let result = self.fresh();
                for case in &match_expression.cases {
                    let locals_len = self.locals.len();
                    let pattern_ty = self.infer_pattern(&case.pattern);
                    self.unify(
                        &scrutinee_ty,
                        &pattern_ty,
                        case.pattern.id(),
                        case.pattern.first_token().start,
                    );
                    let body_ty = self.infer_expression(&case.expression);
                    self.unify(
                        &result,
                        &body_ty,
                        case.expression.id(),
                        case.expression.first_token().start,
                    );
                    self.locals.truncate(locals_len);
                }
                result
            }
        }
    }

    fn infer_record_expression(&mut self, record: &'a bolt_syntax::RecordExpression) -> Type {
        let loc = record.lbrace.start;
        let mut names: Vec<Rc<str>> = Vec::new();
        let mut value_types: Vec<(Rc<str>, Type, NodeId, TextLoc)> = Vec::new();
        for (field, _) in &record.fields {
            let name = field.name_text();
            let ty = self.infer_expression(&field.value);
            names.push(name.clone());
            value_types.push((name, ty, field.id, field.name.start));
        }

        let exact = self
            .records
            .iter()
            .find(|info| {
                info.fields.len() == names.len()
                    && names
                        .iter()
                        .all(|name| info.fields.iter().any(|(field, _)| field == name))
            })
            .cloned();
        match exact {
            Some(info) => {
                for (name, actual, node, field_loc) in value_types {
                    let declared = info
                        .fields
                        .iter()
                        .find(|(field, _)| *field == name)
                        .map(|(_, ty)| ty.clone())
                        .expect("field vanished between matching and lookup");
                    self.unify(&declared, &actual, node, field_loc);
                }
                Type::Record {
                    name: info.name,
                    fields: info.fields,
                }
            }
            None => {
                // Report against the record sharing the most field names,
                // naming the first missing field.
                let closest = self
                    .records
                    .iter()
                    .max_by_key(|info| {
                        names
                            .iter()
                            .filter(|name| {
                                info.fields.iter().any(|(field, _)| field == *name)
                            })
                            .count()
                    })
                    .cloned();
                match closest {
                    Some(info)
                        if names
                            .iter()
                            .any(|name| info.fields.iter().any(|(field, _)| field == name)) =>
                    {
                        let missing = info
                            .fields
                            .iter()
                            .map(|(field, _)| field.clone())
                            .find(|field| !names.contains(field));
                        let extra = names
                            .iter()
                            .find(|name| {
                                !info.fields.iter().any(|(field, _)| field == *name)
                            })
                            .cloned();
                        let field = missing.or(extra).unwrap_or_else(|| Rc::from(""));
                        self.errors.push(TypeError::MissingRecordField {
                            loc,
                            node: record.id,
                            record: info.name,
                            field,
                        });
                    }
                    _ => {
                        self.errors.push(TypeError::NoMatchingRecord {
                            loc,
                            node: record.id,
                            fields: names,
                        });
                    }
                }
                self.fresh()
            }
        }
    }

    fn infer_pattern(&mut self, pattern: &'a Pattern) -> Type {
        let ty = self.infer_pattern_inner(pattern);
        self.node_types.insert(pattern.id(), ty.clone());
        ty
    }

    fn infer_pattern_inner(&mut self, pattern: &'a Pattern) -> Type {
        match pattern {
            Pattern::Bind(bind) => {
                let ty = self.fresh();
                self.locals.push((bind.name_text(), ty.clone()));
                ty
            }
            Pattern::Literal(literal) => match &literal.literal.data {
                bolt_lex::token::Data::IntegerLiteral(_) => Type::int(),
                bolt_lex::token::Data::StringLiteral { .. } => Type::string(),
                _ => panic!("literal pattern holds a non-literal token"),
            },
            Pattern::Nested(nested) => self.infer_pattern(&nested.pattern),
            Pattern::Named(named) => {
                let name = named.name_text();
                let loc = named.name.start;
                let ctor_ty = match self.resolve_constructor(&name, named.id, loc) {
                    Some(ty) => ty,
                    None => {
                        for child in &named.patterns {
                            self.infer_pattern(child);
                        }
                        return self.fresh();
                    }
                };
                let ctor_ty = zonk(&self.solutions, &ctor_ty);
                match ctor_ty {
                    Type::Arrow(params, result) => {
                        if params.len() != named.patterns.len() {
                            self.errors.push(TypeError::ArityMismatch {
                                loc,
                                node: named.id,
                                expected: params.len(),
                                actual: named.patterns.len(),
                            });
                        }
                        for (child, param) in named.patterns.iter().zip(params.iter()) {
                            let child_ty = self.infer_pattern(child);
                            self.unify(param, &child_ty, child.id(), child.first_token().start);
                        }
                        for child in named.patterns.iter().skip(params.len()) {
                            self.infer_pattern(child);
                        }
                        result.as_ref().clone()
                    }
                    ty => {
                        if !named.patterns.is_empty() {
                            self.errors.push(TypeError::ArityMismatch {
                                loc,
                                node: named.id,
                                expected: 0,
                                actual: named.patterns.len(),
                            });
                            for child in &named.patterns {
                                self.infer_pattern(child);
                            }
                        }
                        ty
                    }
                }
            }
        }
    }

    /* ---------------------------------------------------------------------
     * Name resolution
     * ------------------------------------------------------------------ */

    fn resolve_reference(&mut self, name: &QualifiedName, node: NodeId) -> Type {
        let loc = name.first_token().start;
        let path = name.path();
        if path.modules.is_empty() {
            let local = self
                .locals
                .iter()
                .rev()
                .find(|(local_name, _)| local_name.as_ref() == path.name.as_ref())
                .map(|(_, ty)| ty.clone());
            if let Some(ty) = local {
                return ty;
            }
        }
        match self
            .scopes
            .lookup(&self.scope_stack, &path, SymbolKind::Var)
        {
            Some(decl) => {
                if let Some(ty) = self.monotypes.get(&decl) {
                    return ty.clone();
                }
                if let Some(scheme) = self.schemes.get(&decl).cloned() {
                    return self.instantiate(&scheme, node, loc);
                }
                // A forward reference inside a block: monomorphic until the
                // declaration itself is reached.
                let ty = self.fresh();
                self.monotypes.insert(decl, ty.clone());
                ty
            }
            None => {
                let builtin = if path.modules.is_empty() {
                    self.builtins.get(&path.name).cloned()
                } else {
                    None
                };
                match builtin {
                    Some(scheme) => self.instantiate(&scheme, node, loc),
                    None => {
                        self.errors.push(TypeError::BindingNotFound {
                            loc,
                            node,
                            name: path.name,
                        });
                        self.fresh()
                    }
                }
            }
        }
    }

    fn resolve_operator(&mut self, token: &bolt_lex::token::Token, node: NodeId) -> Type {
        let name: Rc<str> = match &token.data {
            bolt_lex::token::Data::CustomOperator(text) => text.clone(),
            _ => panic!("infix operator is not an operator token"),
        };
        match self.builtins.get(&name).cloned() {
            Some(scheme) => self.instantiate(&scheme, node, token.start),
            None => {
                self.errors.push(TypeError::BindingNotFound {
                    loc: token.start,
                    node,
                    name,
                });
                self.fresh()
            }
        }
    }

    fn resolve_prefix_operator(&mut self, token: &bolt_lex::token::Token, node: NodeId) -> Type {
        let name: Rc<str> = match &token.data {
            bolt_lex::token::Data::CustomOperator(text) => text.clone(),
            _ => panic!("prefix operator is not an operator token"),
        };
        match self.prefix_builtins.get(&name).cloned() {
            Some(ty) => ty,
            None => {
                self.errors.push(TypeError::BindingNotFound {
                    loc: token.start,
                    node,
                    name,
                });
                self.fresh()
            }
        }
    }

    fn resolve_constructor(&mut self, name: &Rc<str>, node: NodeId, loc: TextLoc) -> Option<Type> {
        let path = SymbolPath::plain(name.clone());
        match self
            .scopes
            .lookup(&self.scope_stack, &path, SymbolKind::Var)
        {
            Some(decl) => match self.schemes.get(&decl).cloned() {
                Some(scheme) => Some(self.instantiate(&scheme, node, loc)),
                None => {
                    self.errors.push(TypeError::BindingNotFound {
                        loc,
                        node,
                        name: name.clone(),
                    });
                    None
                }
            },
            None => match self.builtins.get(name).cloned() {
                Some(scheme) => Some(self.instantiate(&scheme, node, loc)),
                None => {
                    self.errors.push(TypeError::BindingNotFound {
                        loc,
                        node,
                        name: name.clone(),
                    });
                    None
                }
            },
        }
    }

    /* ---------------------------------------------------------------------
     * Class constraint solving
     * ------------------------------------------------------------------ */

    /// Discharge the deferred class constraints accumulated for a binding
    /// group. Returns the residual predicates to quantify over and the
    /// constraints that belong to an enclosing group.
    fn discharge_deferred(&mut self, gen_level: usize) -> (Vec<Predicate>, Vec<Deferred>) {
        let mut queue: VecDeque<Deferred> = std::mem::take(&mut self.deferred).into();
        let mut residual: Vec<Predicate> = Vec::new();
        let mut keep: Vec<Deferred> = Vec::new();

        while let Some(deferred) = queue.pop_front() {
            let predicate = Predicate {
                class: deferred.predicate.class.clone(),
                args: deferred
                    .predicate
                    .args
                    .iter()
                    .map(|arg| zonk(&self.solutions, arg))
                    .collect(),
            };

            // Entailed by a local assumption?
            let assumed = deferred.assumptions.iter().any(|assumption| {
                assumption.class == predicate.class
                    && assumption.args.len() == predicate.args.len()
                    && assumption
                        .args
                        .iter()
                        .zip(predicate.args.iter())
                        .all(|(a, b)| zonk(&self.solutions, a) == *b)
            });
            if assumed {
                continue;
            }

            // Discharged by an instance? Matching, not unification: the
            // instance head's variables bind, the goal's types do not.
            if let Some(context) = self.match_instance(&predicate) {
                for predicate in context {
                    queue.push_back(Deferred {
                        predicate,
                        node: deferred.node,
                        loc: deferred.loc,
                        assumptions: deferred.assumptions.clone(),
                        signed: deferred.signed,
                    });
                }
                continue;
            }

            let mut metas = Vec::new();
            predicate.iter_metas(&mut metas);
            let generalizable = metas
                .iter()
                .any(|meta| self.solutions.level(*meta) > gen_level);
            let outer = metas
                .iter()
                .any(|meta| self.solutions.level(*meta) <= gen_level);
            if generalizable && !deferred.signed {
                residual.push(predicate);
            } else if generalizable {
                // A pinned signature cannot quantify new constraints.
                self.errors.push(TypeError::TypeSignatureMismatch {
                    loc: deferred.loc,
                    node: deferred.node,
                    constraint: predicate,
                });
            } else if outer {
                keep.push(Deferred {
                    predicate,
                    ..deferred
                });
            } else if deferred.signed {
                self.errors.push(TypeError::TypeSignatureMismatch {
                    loc: deferred.loc,
                    node: deferred.node,
                    constraint: predicate,
                });
            } else {
                self.errors.push(TypeError::InstanceNotFound {
                    loc: deferred.loc,
                    node: deferred.node,
                    constraint: predicate,
                });
            }
        }

        (residual, keep)
    }

    /// Find an instance whose head matches the predicate, and return its
    /// context specialized by the matching substitution.
    fn match_instance(&self, predicate: &Predicate) -> Option<Vec<Predicate>> {
        let instances = self.instances.get(&predicate.class)?;
        for instance in instances {
            let mut subst: FnvHashMap<Rc<str>, Type> = FnvHashMap::default();
            if instance.types.len() == predicate.args.len()
                && instance
                    .types
                    .iter()
                    .zip(predicate.args.iter())
                    .all(|(pattern, target)| match_type(pattern, target, &mut subst))
            {
                let apply = |name: &str| subst.get(name).cloned();
                return Some(
                    instance
                        .context
                        .iter()
                        .map(|predicate| predicate.substitute_rigid(&apply))
                        .collect(),
                );
            }
        }
        None
    }
}

/// One-way matching: variables on the instance side bind, the target is
/// taken as-is. An unsolved metavariable in the target never matches.
fn match_type(pattern: &Type, target: &Type, subst: &mut FnvHashMap<Rc<str>, Type>) -> bool {
    match (pattern, target) {
        (Type::Rigid(var), _) => match subst.get(var.as_ref()) {
            Some(bound) => bound == target,
            None => {
                subst.insert(var.clone(), target.clone());
                true
            }
        },
        (Type::Con(a), Type::Con(b)) => a == b,
        (Type::App(head_a, args_a), Type::App(head_b, args_b)) => {
            args_a.len() == args_b.len()
                && match_type(head_a, head_b, subst)
                && args_a
                    .iter()
                    .zip(args_b.iter())
                    .all(|(a, b)| match_type(a, b, subst))
        }
        (Type::Arrow(params_a, result_a), Type::Arrow(params_b, result_b)) => {
            params_a.len() == params_b.len()
                && params_a
                    .iter()
                    .zip(params_b.iter())
                    .all(|(a, b)| match_type(a, b, subst))
                && match_type(result_a, result_b, subst)
        }
        (Type::Tuple(elements_a), Type::Tuple(elements_b)) => {
            elements_a.len() == elements_b.len()
                && elements_a
                    .iter()
                    .zip(elements_b.iter())
                    .all(|(a, b)| match_type(a, b, subst))
        }
        (Type::Record { name: name_a, .. }, Type::Record { name: name_b, .. }) => {
            name_a == name_b
        }
        _ => false,
    }
}

/// Two instance heads overlap when some substitution for the variables of
/// either side makes them equal.
fn heads_overlap(a: &[Type], b: &[Type]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| types_overlap(a, b))
}

fn types_overlap(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Rigid(_), _) | (_, Type::Rigid(_)) => true,
        (Type::Con(a), Type::Con(b)) => a == b,
        (Type::App(head_a, args_a), Type::App(head_b, args_b)) => {
            args_a.len() == args_b.len()
                && types_overlap(head_a, head_b)
                && args_a
                    .iter()
                    .zip(args_b.iter())
                    .all(|(a, b)| types_overlap(a, b))
        }
        (Type::Arrow(params_a, result_a), Type::Arrow(params_b, result_b)) => {
            params_a.len() == params_b.len()
                && params_a
                    .iter()
                    .zip(params_b.iter())
                    .all(|(a, b)| types_overlap(a, b))
                && types_overlap(result_a, result_b)
        }
        (Type::Tuple(elements_a), Type::Tuple(elements_b)) => {
            elements_a.len() == elements_b.len()
                && elements_a
                    .iter()
                    .zip(elements_b.iter())
                    .all(|(a, b)| types_overlap(a, b))
        }
        (Type::Record { name: name_a, .. }, Type::Record { name: name_b, .. }) => {
            name_a == name_b
        }
        _ => false,
    }
}

fn free_rigids(ty: &Type) -> Vec<Rc<str>> {
    let mut out = Vec::new();
    collect_free_rigids(ty, &mut out);
    out
}

fn collect_free_rigids(ty: &Type, out: &mut Vec<Rc<str>>) {
    match ty {
        Type::Rigid(name) => {
            if !out.contains(name) {
                out.push(name.clone());
            }
        }
        Type::Meta(_) | Type::Con(_) => {}
        Type::App(head, args) => {
            collect_free_rigids(head, out);
            for arg in args {
                collect_free_rigids(arg, out);
            }
        }
        Type::Arrow(params, result) => {
            for param in params {
                collect_free_rigids(param, out);
            }
            collect_free_rigids(result, out);
        }
        Type::Tuple(elements) => {
            for element in elements {
                collect_free_rigids(element, out);
            }
        }
        Type::Record { fields, .. } => {
            for (_, field) in fields.iter() {
                collect_free_rigids(field, out);
            }
        }
    }
}

fn quantifier_name(ix: usize) -> Rc<str> {
    let letters = b"abcdefghijklmnopqrstuvwxyz";
    if ix < letters.len() {
        Rc::from((letters[ix] as char).to_string())
    } else {
        Rc::from(format!("t{}", ix - letters.len()))
    }
}

/* -------------------------------------------------------------------------
 * Free names of a let body, for the dependency graph
 * ---------------------------------------------------------------------- */

fn free_names_in_let_body(
    decl: &LetDeclaration,
    bound: &mut Vec<Rc<str>>,
    out: &mut FnvHashSet<Rc<str>>,
) {
    match &decl.body {
        None => {}
        Some(LetBody::Expr(body)) => match &body.value {
            LetBodyValue::Expression(expression) => {
                free_names_in_expression(expression, bound, out)
            }
            LetBodyValue::If(statement) => free_names_in_if(statement, bound, out),
        },
        Some(LetBody::Block(body)) => free_names_in_block(&body.elements, bound, out),
    }
}

fn free_names_in_block(elements: &[Element], bound: &mut Vec<Rc<str>>, out: &mut FnvHashSet<Rc<str>>) {
    let base = bound.len();
    // Sibling bindings shadow outer names for the whole block.
    for element in elements {
        if let Element::Let(decl) = element {
            for (name, _) in decl.pattern.bound_names() {
                bound.push(name);
            }
        }
    }
    for element in elements {
        free_names_in_element(element, bound, out);
    }
    bound.truncate(base);
}

fn free_names_in_element(
    element: &Element,
    bound: &mut Vec<Rc<str>>,
    out: &mut FnvHashSet<Rc<str>>,
) {
    match element {
        Element::Let(decl) => {
            let base = bound.len();
            for param in &decl.params {
                for (name, _) in param.pattern.bound_names() {
                    bound.push(name);
                }
            }
            free_names_in_let_body(decl, bound, out);
            bound.truncate(base);
        }
        Element::Expression(stmt) => free_names_in_expression(&stmt.expression, bound, out),
        Element::If(stmt) => free_names_in_if(stmt, bound, out),
        Element::Return(stmt) => {
            if let Some(expression) = &stmt.expression {
                free_names_in_expression(expression, bound, out);
            }
        }
        Element::Record(_) | Element::Variant(_) | Element::Class(_) | Element::Instance(_) => {}
    }
}

fn free_names_in_if(
    statement: &IfStatement,
    bound: &mut Vec<Rc<str>>,
    out: &mut FnvHashSet<Rc<str>>,
) {
    for part in &statement.parts {
        if let Some(test) = &part.test {
            free_names_in_expression(test, bound, out);
        }
        match &part.body {
            IfBody::Inline(element) => free_names_in_element(element, bound, out),
            IfBody::Block { elements, .. } => free_names_in_block(elements, bound, out),
        }
    }
}

fn free_names_in_expression(
    expression: &Expression,
    bound: &mut Vec<Rc<str>>,
    out: &mut FnvHashSet<Rc<str>>,
) {
    match expression {
        Expression::Reference(reference) => {
            if reference.name.modules.is_empty() {
                let name = reference.name.name_text();
                if !bound.contains(&name) {
                    out.insert(name);
                }
            }
        }
        Expression::Constant(_) => {}
        Expression::Call(call) => {
            free_names_in_expression(&call.function, bound, out);
            for arg in &call.args {
                free_names_in_expression(arg, bound, out);
            }
        }
        Expression::Infix(infix) => {
            free_names_in_expression(&infix.lhs, bound, out);
            free_names_in_expression(&infix.rhs, bound, out);
        }
        Expression::Prefix(prefix) => free_names_in_expression(&prefix.argument, bound, out),
        Expression::Nested(nested) => free_names_in_expression(&nested.inner, bound, out),
        Expression::Tuple(tuple) => {
            for (element, _) in &tuple.elements {
                free_names_in_expression(element, bound, out);
            }
        }
        Expression::Record(record) => {
            for (field, _) in &record.fields {
                free_names_in_expression(&field.value, bound, out);
            }
        }
        Expression::Member(member) => free_names_in_expression(&member.expression, bound, out),
        Expression::Match(match_expression) => {
            free_names_in_expression(&match_expression.scrutinee, bound, out);
            for case in &match_expression.cases {
                let base = bound.len();
                for (name, _) in case.pattern.bound_names() {
                    bound.push(name);
                }
                free_names_in_expression(&case.expression, bound, out);
                bound.truncate(base);
            }
        }
    }
}
