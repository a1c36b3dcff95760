pub mod directive;
pub mod scope;
#[cfg(test)]
mod test;

pub use bolt_diagnostic::NodeId;

use bolt_diagnostic::TextRange;
use bolt_lex::token::Token;
use fnv::FnvHashMap;
use std::rc::Rc;

/// A dotted name: zero or more module segments followed by the symbol name.
/// Module prefixes are preserved even though a single-file program never
/// has any.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct SymbolPath {
    pub modules: Vec<Rc<str>>,
    pub name: Rc<str>,
}

impl SymbolPath {
    pub fn plain(name: Rc<str>) -> Self {
        SymbolPath {
            modules: Vec::new(),
            name,
        }
    }
}

/// The tokens of a possibly-qualified reference, as in `A.B.name`.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct QualifiedName {
    /// `(segment, dot)` pairs preceding the final name.
    pub modules: Vec<(Token, Token)>,
    pub name: Token,
}

impl QualifiedName {
    pub fn path(&self) -> SymbolPath {
        SymbolPath {
            modules: self
                .modules
                .iter()
                .map(|(segment, _)| match &segment.data {
                    bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
                    _ => panic!("module segment is not a constructor identifier"),
                })
                .collect(),
            name: self.name_text(),
        }
    }

    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::Identifier(name)
            | bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("reference name is not an identifier"),
        }
    }

    pub fn first_token(&self) -> &Token {
        self.modules
            .first()
            .map(|(segment, _)| segment)
            .unwrap_or(&self.name)
    }

    pub fn last_token(&self) -> &Token {
        &self.name
    }
}

/* -------------------------------------------------------------------------
 * Type expressions
 * ---------------------------------------------------------------------- */

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum TypeExpression {
    Qualified(QualifiedTypeExpression),
    Reference(ReferenceTypeExpression),
    App(AppTypeExpression),
    Var(VarTypeExpression),
    Arrow(ArrowTypeExpression),
    Nested(NestedTypeExpression),
    Tuple(TupleTypeExpression),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum ConstraintExpression {
    Typeclass(TypeclassConstraintExpression),
    Equality(EqualityConstraintExpression),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TypeclassConstraintExpression {
    pub id: NodeId,
    pub name: Token,
    pub types: Vec<TypeExpression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct EqualityConstraintExpression {
    pub id: NodeId,
    pub left: TypeExpression,
    pub tilde: Token,
    pub right: TypeExpression,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct QualifiedTypeExpression {
    pub id: NodeId,
    pub lparen: Token,
    /// `(constraint, comma)` pairs; the last constraint has no comma.
    pub constraints: Vec<(ConstraintExpression, Option<Token>)>,
    pub rparen: Token,
    pub rarrow_alt: Token,
    pub ty: Box<TypeExpression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ReferenceTypeExpression {
    pub id: NodeId,
    pub name: QualifiedName,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct AppTypeExpression {
    pub id: NodeId,
    pub op: Box<TypeExpression>,
    pub args: Vec<TypeExpression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct VarTypeExpression {
    pub id: NodeId,
    pub name: Token,
}

impl VarTypeExpression {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::Identifier(name) => name.clone(),
            _ => panic!("type variable is not an identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ArrowTypeExpression {
    pub id: NodeId,
    pub param_types: Vec<TypeExpression>,
    pub return_type: Box<TypeExpression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NestedTypeExpression {
    pub id: NodeId,
    pub lparen: Token,
    pub ty: Box<TypeExpression>,
    pub rparen: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TupleTypeExpression {
    pub id: NodeId,
    pub lparen: Token,
    pub elements: Vec<(TypeExpression, Option<Token>)>,
    pub rparen: Token,
}

impl TypeExpression {
    pub fn id(&self) -> NodeId {
        match self {
            TypeExpression::Qualified(ty) => ty.id,
            TypeExpression::Reference(ty) => ty.id,
            TypeExpression::App(ty) => ty.id,
            TypeExpression::Var(ty) => ty.id,
            TypeExpression::Arrow(ty) => ty.id,
            TypeExpression::Nested(ty) => ty.id,
            TypeExpression::Tuple(ty) => ty.id,
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            TypeExpression::Qualified(ty) => &ty.lparen,
            TypeExpression::Reference(ty) => ty.name.first_token(),
            TypeExpression::App(ty) => ty.op.first_token(),
            TypeExpression::Var(ty) => &ty.name,
            TypeExpression::Arrow(ty) => ty
                .param_types
                .first()
                .map(|param| param.first_token())
                .unwrap_or_else(|| ty.return_type.first_token()),
            TypeExpression::Nested(ty) => &ty.lparen,
            TypeExpression::Tuple(ty) => &ty.lparen,
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            TypeExpression::Qualified(ty) => ty.ty.last_token(),
            TypeExpression::Reference(ty) => ty.name.last_token(),
            TypeExpression::App(ty) => ty
                .args
                .last()
                .map(|arg| arg.last_token())
                .unwrap_or_else(|| ty.op.last_token()),
            TypeExpression::Var(ty) => &ty.name,
            TypeExpression::Arrow(ty) => ty.return_type.last_token(),
            TypeExpression::Nested(ty) => &ty.rparen,
            TypeExpression::Tuple(ty) => &ty.rparen,
        }
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.first_token().start,
            end: self.last_token().end(),
        }
    }
}

impl ConstraintExpression {
    pub fn id(&self) -> NodeId {
        match self {
            ConstraintExpression::Typeclass(c) => c.id,
            ConstraintExpression::Equality(c) => c.id,
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            ConstraintExpression::Typeclass(c) => &c.name,
            ConstraintExpression::Equality(c) => c.left.first_token(),
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            ConstraintExpression::Typeclass(c) => c
                .types
                .last()
                .map(|ty| ty.last_token())
                .unwrap_or(&c.name),
            ConstraintExpression::Equality(c) => c.right.last_token(),
        }
    }
}

/* -------------------------------------------------------------------------
 * Patterns
 * ---------------------------------------------------------------------- */

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Pattern {
    Bind(BindPattern),
    Literal(LiteralPattern),
    Named(NamedPattern),
    Nested(NestedPattern),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct BindPattern {
    pub id: NodeId,
    pub name: Token,
}

impl BindPattern {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::Identifier(name) => name.clone(),
            _ => panic!("bind pattern name is not an identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct LiteralPattern {
    pub id: NodeId,
    pub literal: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NamedPattern {
    pub id: NodeId,
    pub name: Token,
    pub patterns: Vec<Pattern>,
}

impl NamedPattern {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("named pattern name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NestedPattern {
    pub id: NodeId,
    pub lparen: Token,
    pub pattern: Box<Pattern>,
    pub rparen: Token,
}

impl Pattern {
    pub fn id(&self) -> NodeId {
        match self {
            Pattern::Bind(pattern) => pattern.id,
            Pattern::Literal(pattern) => pattern.id,
            Pattern::Named(pattern) => pattern.id,
            Pattern::Nested(pattern) => pattern.id,
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            Pattern::Bind(pattern) => &pattern.name,
            Pattern::Literal(pattern) => &pattern.literal,
            Pattern::Named(pattern) => &pattern.name,
            Pattern::Nested(pattern) => &pattern.lparen,
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Pattern::Bind(pattern) => &pattern.name,
            Pattern::Literal(pattern) => &pattern.literal,
            Pattern::Named(pattern) => pattern
                .patterns
                .last()
                .map(|child| child.last_token())
                .unwrap_or(&pattern.name),
            Pattern::Nested(pattern) => &pattern.rparen,
        }
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.first_token().start,
            end: self.last_token().end(),
        }
    }

    /// The names this pattern binds, leftmost first.
    pub fn bound_names(&self) -> Vec<(Rc<str>, NodeId)> {
        let mut names = Vec::new();
        self.collect_bound_names(&mut names);
        names
    }

    fn collect_bound_names(&self, names: &mut Vec<(Rc<str>, NodeId)>) {
        match self {
            Pattern::Bind(pattern) => names.push((pattern.name_text(), pattern.id)),
            Pattern::Literal(_) => {}
            Pattern::Named(pattern) => {
                for child in &pattern.patterns {
                    child.collect_bound_names(names);
                }
            }
            Pattern::Nested(pattern) => pattern.pattern.collect_bound_names(names),
        }
    }
}

/* -------------------------------------------------------------------------
 * Expressions
 * ---------------------------------------------------------------------- */

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Expression {
    Reference(ReferenceExpression),
    Constant(ConstantExpression),
    Call(CallExpression),
    Infix(InfixExpression),
    Prefix(PrefixExpression),
    Nested(NestedExpression),
    Tuple(TupleExpression),
    Record(RecordExpression),
    Member(MemberExpression),
    Match(MatchExpression),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ReferenceExpression {
    pub id: NodeId,
    pub name: QualifiedName,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ConstantExpression {
    pub id: NodeId,
    pub token: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct CallExpression {
    pub id: NodeId,
    pub function: Box<Expression>,
    pub args: Vec<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct InfixExpression {
    pub id: NodeId,
    pub lhs: Box<Expression>,
    pub operator: Token,
    pub rhs: Box<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct PrefixExpression {
    pub id: NodeId,
    pub operator: Token,
    pub argument: Box<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct NestedExpression {
    pub id: NodeId,
    pub lparen: Token,
    pub inner: Box<Expression>,
    pub rparen: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TupleExpression {
    pub id: NodeId,
    pub lparen: Token,
    pub elements: Vec<(Expression, Option<Token>)>,
    pub rparen: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RecordExpressionField {
    pub id: NodeId,
    pub name: Token,
    pub equals: Token,
    pub value: Expression,
}

impl RecordExpressionField {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::Identifier(name) => name.clone(),
            _ => panic!("record field name is not an identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RecordExpression {
    pub id: NodeId,
    pub lbrace: Token,
    pub fields: Vec<(RecordExpressionField, Option<Token>)>,
    pub rbrace: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct MemberExpression {
    pub id: NodeId,
    pub expression: Box<Expression>,
    pub dot: Token,
    pub name: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct MatchCase {
    pub id: NodeId,
    pub pattern: Pattern,
    pub rarrow_alt: Token,
    pub expression: Expression,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct MatchExpression {
    pub id: NodeId,
    pub match_keyword: Token,
    pub scrutinee: Box<Expression>,
    pub dot: Token,
    pub block_start: Token,
    pub cases: Vec<MatchCase>,
    pub block_end: Token,
}

impl Expression {
    pub fn id(&self) -> NodeId {
        match self {
            Expression::Reference(expression) => expression.id,
            Expression::Constant(expression) => expression.id,
            Expression::Call(expression) => expression.id,
            Expression::Infix(expression) => expression.id,
            Expression::Prefix(expression) => expression.id,
            Expression::Nested(expression) => expression.id,
            Expression::Tuple(expression) => expression.id,
            Expression::Record(expression) => expression.id,
            Expression::Member(expression) => expression.id,
            Expression::Match(expression) => expression.id,
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            Expression::Reference(expression) => expression.name.first_token(),
            Expression::Constant(expression) => &expression.token,
            Expression::Call(expression) => expression.function.first_token(),
            Expression::Infix(expression) => expression.lhs.first_token(),
            Expression::Prefix(expression) => &expression.operator,
            Expression::Nested(expression) => &expression.lparen,
            Expression::Tuple(expression) => &expression.lparen,
            Expression::Record(expression) => &expression.lbrace,
            Expression::Member(expression) => expression.expression.first_token(),
            Expression::Match(expression) => &expression.match_keyword,
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Expression::Reference(expression) => expression.name.last_token(),
            Expression::Constant(expression) => &expression.token,
            Expression::Call(expression) => expression
                .args
                .last()
                .map(|arg| arg.last_token())
                .unwrap_or_else(|| expression.function.last_token()),
            Expression::Infix(expression) => expression.rhs.last_token(),
            Expression::Prefix(expression) => expression.argument.last_token(),
            Expression::Nested(expression) => &expression.rparen,
            Expression::Tuple(expression) => &expression.rparen,
            Expression::Record(expression) => &expression.rbrace,
            Expression::Member(expression) => &expression.name,
            Expression::Match(expression) => &expression.block_end,
        }
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.first_token().start,
            end: self.last_token().end(),
        }
    }
}

/* -------------------------------------------------------------------------
 * Statements and declarations
 * ---------------------------------------------------------------------- */

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Element {
    Let(LetDeclaration),
    Record(RecordDeclaration),
    Variant(VariantDeclaration),
    Class(ClassDeclaration),
    Instance(InstanceDeclaration),
    Expression(ExpressionStatement),
    If(IfStatement),
    Return(ReturnStatement),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ExpressionStatement {
    pub id: NodeId,
    pub expression: Expression,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ReturnStatement {
    pub id: NodeId,
    pub return_keyword: Token,
    pub expression: Option<Expression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum IfBody {
    Block {
        block_start: Token,
        elements: Vec<Element>,
        block_end: Token,
    },
    Inline(Box<Element>),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct IfStatementPart {
    pub id: NodeId,
    pub keyword: Token,
    /// `None` for the `else` part.
    pub test: Option<Expression>,
    pub dot: Token,
    pub body: IfBody,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct IfStatement {
    pub id: NodeId,
    pub parts: Vec<IfStatementPart>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TypeAssert {
    pub id: NodeId,
    pub colon: Token,
    pub type_expression: TypeExpression,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Parameter {
    pub id: NodeId,
    pub pattern: Pattern,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum LetBodyValue {
    Expression(Expression),
    If(IfStatement),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct LetExprBody {
    pub id: NodeId,
    pub equals: Token,
    pub value: LetBodyValue,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct LetBlockBody {
    pub id: NodeId,
    pub block_start: Token,
    pub elements: Vec<Element>,
    pub block_end: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum LetBody {
    Expr(LetExprBody),
    Block(LetBlockBody),
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct LetDeclaration {
    pub id: NodeId,
    pub pub_keyword: Option<Token>,
    pub let_keyword: Token,
    pub mut_keyword: Option<Token>,
    pub pattern: Pattern,
    pub params: Vec<Parameter>,
    pub type_assert: Option<TypeAssert>,
    pub body: Option<LetBody>,
}

impl LetDeclaration {
    /// The declaration's name when it binds a single identifier.
    pub fn name(&self) -> Option<Rc<str>> {
        match &self.pattern {
            Pattern::Bind(pattern) => Some(pattern.name_text()),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RecordDeclarationField {
    pub id: NodeId,
    pub name: Token,
    pub colon: Token,
    pub type_expression: TypeExpression,
}

impl RecordDeclarationField {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::Identifier(name) => name.clone(),
            _ => panic!("record field name is not an identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RecordDeclaration {
    pub id: NodeId,
    pub pub_keyword: Option<Token>,
    pub struct_keyword: Token,
    pub name: Token,
    pub dot: Token,
    pub block_start: Option<Token>,
    pub fields: Vec<RecordDeclarationField>,
    pub block_end: Option<Token>,
}

impl RecordDeclaration {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("record name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TupleVariantDeclarationMember {
    pub id: NodeId,
    pub name: Token,
    pub elements: Vec<TypeExpression>,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct RecordVariantDeclarationMember {
    pub id: NodeId,
    pub name: Token,
    pub block_start: Token,
    pub fields: Vec<RecordDeclarationField>,
    pub block_end: Token,
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum VariantDeclarationMember {
    Tuple(TupleVariantDeclarationMember),
    Record(RecordVariantDeclarationMember),
}

impl VariantDeclarationMember {
    pub fn id(&self) -> NodeId {
        match self {
            VariantDeclarationMember::Tuple(member) => member.id,
            VariantDeclarationMember::Record(member) => member.id,
        }
    }

    pub fn name_token(&self) -> &Token {
        match self {
            VariantDeclarationMember::Tuple(member) => &member.name,
            VariantDeclarationMember::Record(member) => &member.name,
        }
    }

    pub fn name_text(&self) -> Rc<str> {
        match &self.name_token().data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("variant member name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct VariantDeclaration {
    pub id: NodeId,
    pub pub_keyword: Option<Token>,
    pub enum_keyword: Token,
    pub name: Token,
    pub type_vars: Vec<VarTypeExpression>,
    pub dot: Token,
    pub block_start: Option<Token>,
    pub members: Vec<VariantDeclarationMember>,
    pub block_end: Option<Token>,
}

impl VariantDeclaration {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("variant name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ClassDeclaration {
    pub id: NodeId,
    pub pub_keyword: Option<Token>,
    pub class_keyword: Token,
    pub name: Token,
    pub type_vars: Vec<VarTypeExpression>,
    pub dot: Token,
    pub block_start: Option<Token>,
    pub elements: Vec<Element>,
    pub block_end: Option<Token>,
}

impl ClassDeclaration {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("class name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct InstanceDeclaration {
    pub id: NodeId,
    pub instance_keyword: Token,
    pub name: Token,
    pub type_exprs: Vec<TypeExpression>,
    pub dot: Token,
    pub block_start: Option<Token>,
    pub elements: Vec<Element>,
    pub block_end: Option<Token>,
}

impl InstanceDeclaration {
    pub fn name_text(&self) -> Rc<str> {
        match &self.name.data {
            bolt_lex::token::Data::IdentifierAlt(name) => name.clone(),
            _ => panic!("instance class name is not a constructor identifier"),
        }
    }
}

#[derive(PartialEq, Eq, Debug)]
pub struct SourceFile {
    pub id: NodeId,
    pub elements: Vec<Element>,
    pub eof: Token,
}

impl Element {
    pub fn id(&self) -> NodeId {
        match self {
            Element::Let(decl) => decl.id,
            Element::Record(decl) => decl.id,
            Element::Variant(decl) => decl.id,
            Element::Class(decl) => decl.id,
            Element::Instance(decl) => decl.id,
            Element::Expression(stmt) => stmt.id,
            Element::If(stmt) => stmt.id,
            Element::Return(stmt) => stmt.id,
        }
    }

    pub fn first_token(&self) -> &Token {
        match self {
            Element::Let(decl) => decl
                .pub_keyword
                .as_ref()
                .unwrap_or(&decl.let_keyword),
            Element::Record(decl) => decl
                .pub_keyword
                .as_ref()
                .unwrap_or(&decl.struct_keyword),
            Element::Variant(decl) => decl.pub_keyword.as_ref().unwrap_or(&decl.enum_keyword),
            Element::Class(decl) => decl.pub_keyword.as_ref().unwrap_or(&decl.class_keyword),
            Element::Instance(decl) => &decl.instance_keyword,
            Element::Expression(stmt) => stmt.expression.first_token(),
            Element::If(stmt) => &stmt.parts[0].keyword,
            Element::Return(stmt) => &stmt.return_keyword,
        }
    }

    pub fn last_token(&self) -> &Token {
        match self {
            Element::Let(decl) => match &decl.body {
                Some(LetBody::Expr(body)) => match &body.value {
                    LetBodyValue::Expression(expression) => expression.last_token(),
                    LetBodyValue::If(if_statement) => if_statement_last_token(if_statement),
                },
                Some(LetBody::Block(body)) => &body.block_end,
                None => match &decl.type_assert {
                    Some(assert) => assert.type_expression.last_token(),
                    None => decl
                        .params
                        .last()
                        .map(|param| param.pattern.last_token())
                        .unwrap_or_else(|| decl.pattern.last_token()),
                },
            },
            Element::Record(decl) => decl.block_end.as_ref().unwrap_or(&decl.dot),
            Element::Variant(decl) => decl.block_end.as_ref().unwrap_or(&decl.dot),
            Element::Class(decl) => match (&decl.block_end, decl.elements.last()) {
                (Some(block_end), _) => block_end,
                (None, Some(element)) => element.last_token(),
                (None, None) => &decl.dot,
            },
            Element::Instance(decl) => match (&decl.block_end, decl.elements.last()) {
                (Some(block_end), _) => block_end,
                (None, Some(element)) => element.last_token(),
                (None, None) => &decl.dot,
            },
            Element::Expression(stmt) => stmt.expression.last_token(),
            Element::If(stmt) => if_statement_last_token(stmt),
            Element::Return(stmt) => stmt
                .expression
                .as_ref()
                .map(|expression| expression.last_token())
                .unwrap_or(&stmt.return_keyword),
        }
    }

    pub fn range(&self) -> TextRange {
        TextRange {
            start: self.first_token().start,
            end: self.last_token().end(),
        }
    }
}

fn if_statement_last_token(stmt: &IfStatement) -> &Token {
    let part = stmt.parts.last().expect("if statement with no parts");
    match &part.body {
        IfBody::Block { block_end, .. } => block_end,
        IfBody::Inline(element) => element.last_token(),
    }
}

impl SourceFile {
    pub fn range(&self) -> TextRange {
        match (self.elements.first(), self.elements.last()) {
            (Some(first), Some(last)) => TextRange {
                start: first.first_token().start,
                end: last.last_token().end(),
            },
            _ => TextRange {
                start: self.eof.start,
                end: self.eof.start,
            },
        }
    }

    /// Build the parent table in a single post-parse pass. Every node except
    /// the source file itself ends up with exactly one parent.
    pub fn set_parents(&self) -> Parents {
        let mut parents = Parents::default();
        for element in &self.elements {
            walk_element(self.id, element, &mut parents);
        }
        parents
    }
}

/// Parent back-references, held outside the tree so the tree itself stays
/// acyclic and uniquely owned.
#[derive(Default)]
pub struct Parents {
    map: FnvHashMap<NodeId, NodeId>,
}

impl Parents {
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.map.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn set(&mut self, child: NodeId, parent: NodeId) {
        let previous = self.map.insert(child, parent);
        debug_assert!(previous.is_none(), "node {:?} has two parents", child);
    }
}

fn walk_element(parent: NodeId, element: &Element, parents: &mut Parents) {
    let id = element.id();
    parents.set(id, parent);
    match element {
        Element::Let(decl) => {
            walk_pattern(id, &decl.pattern, parents);
            for param in &decl.params {
                parents.set(param.id, id);
                walk_pattern(param.id, &param.pattern, parents);
            }
            if let Some(assert) = &decl.type_assert {
                parents.set(assert.id, id);
                walk_type(assert.id, &assert.type_expression, parents);
            }
            match &decl.body {
                Some(LetBody::Expr(body)) => {
                    parents.set(body.id, id);
                    match &body.value {
                        LetBodyValue::Expression(expression) => {
                            walk_expression(body.id, expression, parents)
                        }
                        LetBodyValue::If(if_statement) => {
                            parents.set(if_statement.id, body.id);
                            walk_if_parts(if_statement, parents);
                        }
                    }
                }
                Some(LetBody::Block(body)) => {
                    parents.set(body.id, id);
                    for element in &body.elements {
                        walk_element(body.id, element, parents);
                    }
                }
                None => {}
            }
        }
        Element::Record(decl) => {
            for field in &decl.fields {
                parents.set(field.id, id);
                walk_type(field.id, &field.type_expression, parents);
            }
        }
        Element::Variant(decl) => {
            for var in &decl.type_vars {
                parents.set(var.id, id);
            }
            for member in &decl.members {
                parents.set(member.id(), id);
                match member {
                    VariantDeclarationMember::Tuple(member) => {
                        for element in &member.elements {
                            walk_type(member.id, element, parents);
                        }
                    }
                    VariantDeclarationMember::Record(member) => {
                        for field in &member.fields {
                            parents.set(field.id, member.id);
                            walk_type(field.id, &field.type_expression, parents);
                        }
                    }
                }
            }
        }
        Element::Class(decl) => {
            for var in &decl.type_vars {
                parents.set(var.id, id);
            }
            for element in &decl.elements {
                walk_element(id, element, parents);
            }
        }
        Element::Instance(decl) => {
            for ty in &decl.type_exprs {
                walk_type(id, ty, parents);
            }
            for element in &decl.elements {
                walk_element(id, element, parents);
            }
        }
        Element::Expression(stmt) => {
            walk_expression(id, &stmt.expression, parents);
        }
        Element::If(stmt) => {
            walk_if_parts(stmt, parents);
        }
        Element::Return(stmt) => {
            if let Some(expression) = &stmt.expression {
                walk_expression(id, expression, parents);
            }
        }
    }
}

fn walk_if_parts(stmt: &IfStatement, parents: &mut Parents) {
    for part in &stmt.parts {
        parents.set(part.id, stmt.id);
        if let Some(test) = &part.test {
            walk_expression(part.id, test, parents);
        }
        match &part.body {
            IfBody::Block { elements, .. } => {
                for element in elements {
                    walk_element(part.id, element, parents);
                }
            }
            IfBody::Inline(element) => {
                walk_element(part.id, element, parents);
            }
        }
    }
}

fn walk_pattern(parent: NodeId, pattern: &Pattern, parents: &mut Parents) {
    let id = pattern.id();
    parents.set(id, parent);
    match pattern {
        Pattern::Bind(_) | Pattern::Literal(_) => {}
        Pattern::Named(pattern) => {
            for child in &pattern.patterns {
                walk_pattern(id, child, parents);
            }
        }
        Pattern::Nested(pattern) => {
            walk_pattern(id, &pattern.pattern, parents);
        }
    }
}

fn walk_type(parent: NodeId, ty: &TypeExpression, parents: &mut Parents) {
    let id = ty.id();
    parents.set(id, parent);
    match ty {
        TypeExpression::Qualified(ty) => {
            for (constraint, _) in &ty.constraints {
                parents.set(constraint.id(), id);
                match constraint {
                    ConstraintExpression::Typeclass(constraint) => {
                        for child in &constraint.types {
                            walk_type(constraint.id, child, parents);
                        }
                    }
                    ConstraintExpression::Equality(constraint) => {
                        walk_type(constraint.id, &constraint.left, parents);
                        walk_type(constraint.id, &constraint.right, parents);
                    }
                }
            }
            walk_type(id, &ty.ty, parents);
        }
        TypeExpression::Reference(_) | TypeExpression::Var(_) => {}
        TypeExpression::App(ty) => {
            walk_type(id, &ty.op, parents);
            for arg in &ty.args {
                walk_type(id, arg, parents);
            }
        }
        TypeExpression::Arrow(ty) => {
            for param in &ty.param_types {
                walk_type(id, param, parents);
            }
            walk_type(id, &ty.return_type, parents);
        }
        TypeExpression::Nested(ty) => {
            walk_type(id, &ty.ty, parents);
        }
        TypeExpression::Tuple(ty) => {
            for (element, _) in &ty.elements {
                walk_type(id, element, parents);
            }
        }
    }
}

fn walk_expression(parent: NodeId, expression: &Expression, parents: &mut Parents) {
    let id = expression.id();
    parents.set(id, parent);
    match expression {
        Expression::Reference(_) | Expression::Constant(_) => {}
        Expression::Call(expression) => {
            walk_expression(id, &expression.function, parents);
            for arg in &expression.args {
                walk_expression(id, arg, parents);
            }
        }
        Expression::Infix(expression) => {
            walk_expression(id, &expression.lhs, parents);
            walk_expression(id, &expression.rhs, parents);
        }
        Expression::Prefix(expression) => {
            walk_expression(id, &expression.argument, parents);
        }
        Expression::Nested(expression) => {
            walk_expression(id, &expression.inner, parents);
        }
        Expression::Tuple(expression) => {
            for (element, _) in &expression.elements {
                walk_expression(id, element, parents);
            }
        }
        Expression::Record(expression) => {
            for (field, _) in &expression.fields {
                parents.set(field.id, id);
                walk_expression(field.id, &field.value, parents);
            }
        }
        Expression::Member(expression) => {
            walk_expression(id, &expression.expression, parents);
        }
        Expression::Match(expression) => {
            walk_expression(id, &expression.scrutinee, parents);
            for case in &expression.cases {
                parents.set(case.id, id);
                walk_pattern(case.id, &case.pattern, parents);
                walk_expression(case.id, &case.expression, parents);
            }
        }
    }
}
