pub mod operator;
#[cfg(test)]
mod test;

use bolt_diagnostic::{code, Diagnostic, Diagnostics, NodeId, Severity, Source, TextLoc};
use bolt_lex::{
    token::{Data, Keyword, Name, Token},
    Lexer, Punctuator,
};
use bolt_syntax::{
    AppTypeExpression, ArrowTypeExpression, BindPattern, CallExpression, ClassDeclaration,
    ConstantExpression, ConstraintExpression, Element, EqualityConstraintExpression, Expression,
    ExpressionStatement, IfBody, IfStatement, IfStatementPart, InfixExpression,
    InstanceDeclaration, LetBlockBody, LetBody, LetBodyValue, LetDeclaration, LetExprBody,
    LiteralPattern, MatchCase, MatchExpression, MemberExpression, NamedPattern, NestedExpression,
    NestedPattern, NestedTypeExpression, Parameter, Pattern, PrefixExpression, QualifiedName,
    QualifiedTypeExpression, RecordDeclaration, RecordDeclarationField, RecordExpression,
    RecordExpressionField, RecordVariantDeclarationMember, ReferenceExpression,
    ReferenceTypeExpression, ReturnStatement, SourceFile, TupleExpression,
    TupleTypeExpression, TupleVariantDeclarationMember, TypeAssert, TypeExpression,
    TypeclassConstraintExpression, VarTypeExpression, VariantDeclaration,
    VariantDeclarationMember,
};
use fixedbitset::FixedBitSet;
use operator::OperatorTable;
use std::collections::{BTreeSet, VecDeque};

#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub source: Source,
    pub loc: TextLoc,
    pub expecting: BTreeSet<Name>,
    pub got: Data,
}

impl ParseError {
    pub fn message(&self) -> String {
        let mut str = String::from("expected one of: ");
        let mut iter = self.expecting.iter();
        match iter.next() {
            None => str,
            Some(token) => {
                str.push_str(token.render().as_str());
                for token in iter {
                    str.push_str(", ");
                    str.push_str(token.render().as_str());
                }
                str
            }
        }
    }

    pub fn report(&self, diagnostics: &mut Diagnostics) {
        diagnostics.item(Diagnostic {
            code: code::UNEXPECTED_TOKEN,
            severity: Severity::Error,
            source: self.source.clone(),
            loc: Some(self.loc),
            node: None,
            message: self.message(),
            addendum: Some(format!("found {}", self.got.render())),
        });
    }
}

/// The parser lost sync; the error itself has already been recorded.
#[derive(Debug)]
pub struct Desync;

type Parsed<A> = Result<A, Desync>;

/// The set of token kinds the parser would have accepted at the current
/// position, accumulated between consumes.
struct Expecting {
    bitset: FixedBitSet,
}

impl Expecting {
    fn new() -> Self {
        Expecting {
            bitset: FixedBitSet::with_capacity(Name::num_variants()),
        }
    }

    fn clear(&mut self) {
        self.bitset.clear();
    }

    fn insert(&mut self, name: Name) {
        self.bitset.insert(name.to_int());
    }

    fn to_btreeset(&self) -> BTreeSet<Name> {
        self.bitset
            .ones()
            .filter_map(Name::from_int)
            .collect()
    }
}

pub struct Parser<'input> {
    source: Source,
    tokens: Punctuator<Lexer<'input>>,
    current: Token,
    lookahead: VecDeque<Token>,
    expecting: Expecting,
    operators: OperatorTable,
    errors: Vec<ParseError>,
    next_id: u32,
}

/// Parse a whole source file, recovering at line-fold boundaries. Parse
/// errors come back alongside the tree; the tree contains every element
/// that parsed cleanly.
pub fn parse_source(source: Source, input: &str) -> (SourceFile, Vec<ParseError>) {
    let mut parser = Parser::new(source, input);
    let file = parser.parse_source_file();
    (file, parser.into_errors())
}

/// Convenience entry point for tests and tools.
pub fn parse_string(input: &str) -> (SourceFile, Vec<ParseError>) {
    parse_source(
        Source::Interactive {
            label: String::from("(string)"),
        },
        input,
    )
}

impl<'input> Parser<'input> {
    pub fn new(source: Source, input: &'input str) -> Self {
        let mut tokens = Punctuator::new(Lexer::new(input));
        let current = tokens
            .next()
            .unwrap_or_else(|| Token::new(TextLoc::new(1, 1), Data::EndOfFile));
        Parser {
            source,
            tokens,
            current,
            lookahead: VecDeque::new(),
            expecting: Expecting::new(),
            operators: OperatorTable::default(),
            errors: Vec::new(),
            next_id: 0,
        }
    }

    pub fn operators_mut(&mut self) -> &mut OperatorTable {
        &mut self.operators
    }

    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn next_token(&mut self) -> Token {
        self.lookahead.pop_front().unwrap_or_else(|| {
            self.tokens
                .next()
                .unwrap_or_else(|| Token::new(self.current.end(), Data::EndOfFile))
        })
    }

    /// Consume the current token and return it.
    fn advance(&mut self) -> Token {
        let next = self.next_token();
        let token = std::mem::replace(&mut self.current, next);
        self.expecting.clear();
        token
    }

    /// The `k`-th token after the current one, `k >= 1`.
    fn peek(&mut self, k: usize) -> &Token {
        while self.lookahead.len() < k {
            let token = self
                .tokens
                .next()
                .unwrap_or_else(|| Token::new(self.current.end(), Data::EndOfFile));
            self.lookahead.push_back(token);
        }
        &self.lookahead[k - 1]
    }

    /// Record an `UnexpectedToken` error at the current token and signal
    /// desynchronization.
    fn unexpected<A>(&mut self) -> Parsed<A> {
        self.errors.push(ParseError {
            source: self.source.clone(),
            loc: self.current.start,
            expecting: self.expecting.to_btreeset(),
            got: self.current.data.clone(),
        });
        self.expecting.clear();
        Err(Desync)
    }

    /// Does the current token have the given kind? Records the expectation
    /// either way, so a later error lists it.
    fn check(&mut self, name: Name) -> bool {
        self.expecting.insert(name);
        self.current.data.name() == name
    }

    fn check_keyword(&mut self, keyword: Keyword) -> bool {
        self.check(Name::Keyword(keyword))
    }

    fn expect(&mut self, name: Name) -> Parsed<Token> {
        if self.check(name) {
            Ok(self.advance())
        } else {
            self.unexpected()
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Parsed<Token> {
        self.expect(Name::Keyword(keyword))
    }

    fn optional(&mut self, name: Name) -> Option<Token> {
        if self.check(name) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Skip to the next `LineFoldEnd` at the current block depth. A
    /// `BlockEnd` belonging to an enclosing block is left unconsumed so the
    /// enclosing loop can close its block.
    fn recover_to_line_fold(&mut self) {
        let mut depth: usize = 0;
        loop {
            match self.current.data {
                Data::EndOfFile => return,
                Data::LineFoldEnd if depth == 0 => {
                    self.advance();
                    return;
                }
                Data::BlockStart => {
                    depth += 1;
                    self.advance();
                }
                Data::BlockEnd => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    /* ---------------------------------------------------------------------
     * Source files and elements
     * ------------------------------------------------------------------ */

    pub fn parse_source_file(&mut self) -> SourceFile {
        let mut elements = Vec::new();
        loop {
            match self.current.data {
                Data::EndOfFile => break,
                Data::LineFoldEnd => {
                    self.advance();
                }
                _ => match self.parse_element() {
                    Ok(element) => elements.push(element),
                    Err(Desync) => self.recover_to_line_fold(),
                },
            }
        }
        let eof = self.current.clone();
        let id = self.fresh_id();
        SourceFile { id, elements, eof }
    }

    fn parse_element(&mut self) -> Parsed<Element> {
        let head = if self.check_keyword(Keyword::Pub) {
            self.peek(1).data.clone()
        } else {
            self.current.data.clone()
        };
        match head {
            Data::Keyword(Keyword::Let) => self.parse_let_declaration().map(Element::Let),
            Data::Keyword(Keyword::Struct) => {
                self.parse_record_declaration().map(Element::Record)
            }
            Data::Keyword(Keyword::Enum) => {
                self.parse_variant_declaration().map(Element::Variant)
            }
            Data::Keyword(Keyword::Class) => self.parse_class_declaration().map(Element::Class),
            Data::Keyword(Keyword::Instance) => self
                .parse_instance_declaration()
                .map(Element::Instance),
            Data::Keyword(Keyword::If) => self.parse_if_statement(true).map(Element::If),
            Data::Keyword(Keyword::Return) => self.parse_return_statement().map(Element::Return),
            _ => self.parse_expression_statement().map(Element::Expression),
        }
    }

    /// `BlockStart element* BlockEnd`, recovering inside the block.
    fn parse_block_elements(&mut self) -> Parsed<(Token, Vec<Element>, Token)> {
        let block_start = self.expect(Name::BlockStart)?;
        let mut elements = Vec::new();
        loop {
            match self.current.data {
                Data::BlockEnd => {
                    let block_end = self.advance();
                    return Ok((block_start, elements, block_end));
                }
                Data::EndOfFile => return self.unexpected(),
                Data::LineFoldEnd => {
                    self.advance();
                }
                _ => match self.parse_element() {
                    Ok(element) => elements.push(element),
                    Err(Desync) => self.recover_to_line_fold(),
                },
            }
        }
    }

    /// A class or instance body: an indented block, an inline element on
    /// the header's line, or nothing.
    fn parse_declaration_body(
        &mut self,
    ) -> Parsed<(Option<Token>, Vec<Element>, Option<Token>)> {
        if self.check(Name::BlockStart) {
            let (block_start, elements, block_end) = self.parse_block_elements()?;
            self.expect(Name::LineFoldEnd)?;
            Ok((Some(block_start), elements, Some(block_end)))
        } else if self.check(Name::LineFoldEnd) {
            self.advance();
            Ok((None, Vec::new(), None))
        } else {
            // An inline element consumes the header's fold end itself.
            let element = self.parse_element()?;
            Ok((None, vec![element], None))
        }
    }

    fn parse_expression_statement(&mut self) -> Parsed<ExpressionStatement> {
        let expression = self.parse_expression(0)?;
        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(ExpressionStatement { id, expression })
    }

    fn parse_return_statement(&mut self) -> Parsed<ReturnStatement> {
        let return_keyword = self.expect_keyword(Keyword::Return)?;
        let expression = if self.check(Name::LineFoldEnd) {
            None
        } else {
            Some(self.parse_expression(0)?)
        };
        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(ReturnStatement {
            id,
            return_keyword,
            expression,
        })
    }

    fn parse_if_statement(&mut self, consume_fold: bool) -> Parsed<IfStatement> {
        let mut parts = Vec::new();

        let keyword = self.expect_keyword(Keyword::If)?;
        let test = self.parse_expression(0)?;
        let dot = self.expect(Name::Dot)?;
        let body = self.parse_if_body()?;
        let id = self.fresh_id();
        parts.push(IfStatementPart {
            id,
            keyword,
            test: Some(test),
            dot,
            body,
        });

        loop {
            // A block body leaves the header's fold end in front of a
            // following `elif`/`else`.
            if self.current.data == Data::LineFoldEnd
                && matches!(
                    self.peek(1).data,
                    Data::Keyword(Keyword::Elif) | Data::Keyword(Keyword::Else)
                )
            {
                self.advance();
            }
            if self.check_keyword(Keyword::Elif) {
                let keyword = self.advance();
                let test = self.parse_expression(0)?;
                let dot = self.expect(Name::Dot)?;
                let body = self.parse_if_body()?;
                let id = self.fresh_id();
                parts.push(IfStatementPart {
                    id,
                    keyword,
                    test: Some(test),
                    dot,
                    body,
                });
            } else if self.check_keyword(Keyword::Else) {
                let keyword = self.advance();
                let dot = self.expect(Name::Dot)?;
                let body = self.parse_if_body()?;
                let id = self.fresh_id();
                parts.push(IfStatementPart {
                    id,
                    keyword,
                    test: None,
                    dot,
                    body,
                });
                break;
            } else {
                break;
            }
        }

        if consume_fold {
            self.expect(Name::LineFoldEnd)?;
        }
        let id = self.fresh_id();
        Ok(IfStatement { id, parts })
    }

    fn parse_if_body(&mut self) -> Parsed<IfBody> {
        if self.check(Name::BlockStart) {
            let (block_start, elements, block_end) = self.parse_block_elements()?;
            Ok(IfBody::Block {
                block_start,
                elements,
                block_end,
            })
        } else {
            let expression = self.parse_expression(0)?;
            let id = self.fresh_id();
            Ok(IfBody::Inline(Box::new(Element::Expression(
                ExpressionStatement { id, expression },
            ))))
        }
    }

    /* ---------------------------------------------------------------------
     * Declarations
     * ------------------------------------------------------------------ */

    fn parse_let_declaration(&mut self) -> Parsed<LetDeclaration> {
        let pub_keyword = self.optional(Name::Keyword(Keyword::Pub));
        let let_keyword = self.expect_keyword(Keyword::Let)?;
        let mut_keyword = self.optional(Name::Keyword(Keyword::Mut));
        let pattern = self.parse_pattern_atom()?;

        let mut params = Vec::new();
        while self.can_start_pattern_atom() {
            let pattern = self.parse_pattern_atom()?;
            let id = self.fresh_id();
            params.push(Parameter { id, pattern });
        }

        let type_assert = if self.check(Name::Colon) {
            let colon = self.advance();
            let type_expression = self.parse_qual_type()?;
            let id = self.fresh_id();
            Some(TypeAssert {
                id,
                colon,
                type_expression,
            })
        } else {
            None
        };

        let body = if self.check(Name::BlockStart) {
            let (block_start, elements, block_end) = self.parse_block_elements()?;
            let id = self.fresh_id();
            Some(LetBody::Block(LetBlockBody {
                id,
                block_start,
                elements,
                block_end,
            }))
        } else if self.check(Name::Equals) {
            let equals = self.advance();
            if self.check(Name::BlockStart) {
                // `=` at the end of the line opened an indented block body.
                let (block_start, elements, block_end) = self.parse_block_elements()?;
                let id = self.fresh_id();
                Some(LetBody::Block(LetBlockBody {
                    id,
                    block_start,
                    elements,
                    block_end,
                }))
            } else {
                let value = if self.check_keyword(Keyword::If) {
                    LetBodyValue::If(self.parse_if_statement(false)?)
                } else {
                    LetBodyValue::Expression(self.parse_expression(0)?)
                };
                let id = self.fresh_id();
                Some(LetBody::Expr(LetExprBody { id, equals, value }))
            }
        } else if self.check(Name::LineFoldEnd) {
            None
        } else {
            return self.unexpected();
        };

        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(LetDeclaration {
            id,
            pub_keyword,
            let_keyword,
            mut_keyword,
            pattern,
            params,
            type_assert,
            body,
        })
    }

    fn parse_record_declaration(&mut self) -> Parsed<RecordDeclaration> {
        let pub_keyword = self.optional(Name::Keyword(Keyword::Pub));
        let struct_keyword = self.expect_keyword(Keyword::Struct)?;
        let name = self.expect(Name::IdentifierAlt)?;
        let dot = self.expect(Name::Dot)?;

        let mut fields = Vec::new();
        let (block_start, block_end) = if self.check(Name::BlockStart) {
            let block_start = self.advance();
            let block_end = loop {
                if self.check(Name::BlockEnd) {
                    break self.advance();
                }
                match self.parse_record_declaration_field() {
                    Ok(field) => fields.push(field),
                    Err(Desync) => self.recover_to_line_fold(),
                }
                if self.current.data == Data::EndOfFile {
                    return self.unexpected();
                }
            };
            (Some(block_start), Some(block_end))
        } else {
            (None, None)
        };

        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(RecordDeclaration {
            id,
            pub_keyword,
            struct_keyword,
            name,
            dot,
            block_start,
            fields,
            block_end,
        })
    }

    fn parse_record_declaration_field(&mut self) -> Parsed<RecordDeclarationField> {
        let name = self.expect(Name::Identifier)?;
        let colon = self.expect(Name::Colon)?;
        let type_expression = self.parse_qual_type()?;
        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(RecordDeclarationField {
            id,
            name,
            colon,
            type_expression,
        })
    }

    fn parse_variant_declaration(&mut self) -> Parsed<VariantDeclaration> {
        let pub_keyword = self.optional(Name::Keyword(Keyword::Pub));
        let enum_keyword = self.expect_keyword(Keyword::Enum)?;
        let name = self.expect(Name::IdentifierAlt)?;

        let mut type_vars = Vec::new();
        while self.check(Name::Identifier) {
            let name = self.advance();
            let id = self.fresh_id();
            type_vars.push(VarTypeExpression { id, name });
        }

        let dot = self.expect(Name::Dot)?;

        let mut members = Vec::new();
        let (block_start, block_end) = if self.check(Name::BlockStart) {
            let block_start = self.advance();
            let block_end = loop {
                if self.check(Name::BlockEnd) {
                    break self.advance();
                }
                match self.parse_variant_declaration_member() {
                    Ok(member) => members.push(member),
                    Err(Desync) => self.recover_to_line_fold(),
                }
                if self.current.data == Data::EndOfFile {
                    return self.unexpected();
                }
            };
            (Some(block_start), Some(block_end))
        } else {
            (None, None)
        };

        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(VariantDeclaration {
            id,
            pub_keyword,
            enum_keyword,
            name,
            type_vars,
            dot,
            block_start,
            members,
            block_end,
        })
    }

    fn parse_variant_declaration_member(&mut self) -> Parsed<VariantDeclarationMember> {
        let name = self.expect(Name::IdentifierAlt)?;
        if self.check(Name::Dot) {
            self.advance();
            let block_start = self.expect(Name::BlockStart)?;
            let mut fields = Vec::new();
            let block_end = loop {
                if self.check(Name::BlockEnd) {
                    break self.advance();
                }
                match self.parse_record_declaration_field() {
                    Ok(field) => fields.push(field),
                    Err(Desync) => self.recover_to_line_fold(),
                }
                if self.current.data == Data::EndOfFile {
                    return self.unexpected();
                }
            };
            self.expect(Name::LineFoldEnd)?;
            let id = self.fresh_id();
            Ok(VariantDeclarationMember::Record(
                RecordVariantDeclarationMember {
                    id,
                    name,
                    block_start,
                    fields,
                    block_end,
                },
            ))
        } else {
            let mut elements = Vec::new();
            while self.can_start_type_atom() {
                elements.push(self.parse_type_atom()?);
            }
            self.expect(Name::LineFoldEnd)?;
            let id = self.fresh_id();
            Ok(VariantDeclarationMember::Tuple(
                TupleVariantDeclarationMember { id, name, elements },
            ))
        }
    }

    fn parse_class_declaration(&mut self) -> Parsed<ClassDeclaration> {
        let pub_keyword = self.optional(Name::Keyword(Keyword::Pub));
        let class_keyword = self.expect_keyword(Keyword::Class)?;
        let name = self.expect(Name::IdentifierAlt)?;

        let mut type_vars = Vec::new();
        while self.check(Name::Identifier) {
            let name = self.advance();
            let id = self.fresh_id();
            type_vars.push(VarTypeExpression { id, name });
        }
        if type_vars.is_empty() {
            return self.unexpected();
        }

        let dot = self.expect(Name::Dot)?;
        let (block_start, elements, block_end) = self.parse_declaration_body()?;
        let id = self.fresh_id();
        Ok(ClassDeclaration {
            id,
            pub_keyword,
            class_keyword,
            name,
            type_vars,
            dot,
            block_start,
            elements,
            block_end,
        })
    }

    fn parse_instance_declaration(&mut self) -> Parsed<InstanceDeclaration> {
        let instance_keyword = self.expect_keyword(Keyword::Instance)?;
        let name = self.expect(Name::IdentifierAlt)?;

        let mut type_exprs = Vec::new();
        while self.can_start_type_atom() {
            type_exprs.push(self.parse_type_atom()?);
        }
        if type_exprs.is_empty() {
            return self.unexpected();
        }

        let dot = self.expect(Name::Dot)?;
        let (block_start, elements, block_end) = self.parse_declaration_body()?;
        let id = self.fresh_id();
        Ok(InstanceDeclaration {
            id,
            instance_keyword,
            name,
            type_exprs,
            dot,
            block_start,
            elements,
            block_end,
        })
    }

    /* ---------------------------------------------------------------------
     * Patterns
     * ------------------------------------------------------------------ */

    fn can_start_pattern_atom(&mut self) -> bool {
        self.check(Name::Identifier)
            || self.check(Name::IdentifierAlt)
            || self.check(Name::IntegerLiteral)
            || self.check(Name::StringLiteral)
            || self.check(Name::LParen)
    }

    /// A full pattern; constructor patterns may take argument patterns.
    fn parse_pattern(&mut self) -> Parsed<Pattern> {
        if self.check(Name::IdentifierAlt) {
            let name = self.advance();
            let mut patterns = Vec::new();
            while self.can_start_pattern_atom() {
                patterns.push(self.parse_pattern_atom()?);
            }
            let id = self.fresh_id();
            Ok(Pattern::Named(NamedPattern { id, name, patterns }))
        } else {
            self.parse_pattern_atom()
        }
    }

    fn parse_pattern_atom(&mut self) -> Parsed<Pattern> {
        if self.check(Name::Identifier) {
            let name = self.advance();
            let id = self.fresh_id();
            Ok(Pattern::Bind(BindPattern { id, name }))
        } else if self.check(Name::IntegerLiteral) || self.check(Name::StringLiteral) {
            let literal = self.advance();
            let id = self.fresh_id();
            Ok(Pattern::Literal(LiteralPattern { id, literal }))
        } else if self.check(Name::IdentifierAlt) {
            let name = self.advance();
            let id = self.fresh_id();
            Ok(Pattern::Named(NamedPattern {
                id,
                name,
                patterns: Vec::new(),
            }))
        } else if self.check(Name::LParen) {
            let lparen = self.advance();
            let pattern = self.parse_pattern()?;
            let rparen = self.expect(Name::RParen)?;
            let id = self.fresh_id();
            Ok(Pattern::Nested(NestedPattern {
                id,
                lparen,
                pattern: Box::new(pattern),
                rparen,
            }))
        } else {
            self.unexpected()
        }
    }

    /* ---------------------------------------------------------------------
     * Type expressions
     * ------------------------------------------------------------------ */

    fn can_start_type_atom(&mut self) -> bool {
        self.check(Name::Identifier)
            || self.check(Name::IdentifierAlt)
            || self.check(Name::LParen)
    }

    /// Entry point for annotation positions: an optional parenthesised
    /// constraint list followed by `=>`, then an arrow type.
    fn parse_qual_type(&mut self) -> Parsed<TypeExpression> {
        if self.check(Name::LParen) {
            let group = self.parse_paren_type_group()?;
            if self.check(Name::RArrowAlt) {
                let rarrow_alt = self.advance();
                let ty = self.parse_qual_type()?;
                let mut constraints = Vec::new();
                for (item, comma) in group.items {
                    constraints.push((self.group_item_to_constraint(item)?, comma));
                }
                let id = self.fresh_id();
                Ok(TypeExpression::Qualified(QualifiedTypeExpression {
                    id,
                    lparen: group.lparen,
                    constraints,
                    rparen: group.rparen,
                    rarrow_alt,
                    ty: Box::new(ty),
                }))
            } else {
                let atom = self.group_into_type(group)?;
                let first = self.parse_type_app_from(atom)?;
                self.parse_arrow_tail(first)
            }
        } else {
            self.parse_type_arrow()
        }
    }

    fn parse_type_arrow(&mut self) -> Parsed<TypeExpression> {
        let first = self.parse_type_app()?;
        self.parse_arrow_tail(first)
    }

    fn parse_arrow_tail(&mut self, first: TypeExpression) -> Parsed<TypeExpression> {
        let mut types = vec![first];
        while self.check(Name::RArrow) {
            self.advance();
            types.push(self.parse_type_app()?);
        }
        if types.len() == 1 {
            Ok(types.pop().unwrap())
        } else {
            let return_type = types.pop().unwrap();
            let id = self.fresh_id();
            Ok(TypeExpression::Arrow(ArrowTypeExpression {
                id,
                param_types: types,
                return_type: Box::new(return_type),
            }))
        }
    }

    fn parse_type_app(&mut self) -> Parsed<TypeExpression> {
        let first = self.parse_type_atom()?;
        self.parse_type_app_from(first)
    }

    fn parse_type_app_from(&mut self, first: TypeExpression) -> Parsed<TypeExpression> {
        let mut args = Vec::new();
        while self.can_start_type_atom() {
            args.push(self.parse_type_atom()?);
        }
        if args.is_empty() {
            Ok(first)
        } else {
            let id = self.fresh_id();
            Ok(TypeExpression::App(AppTypeExpression {
                id,
                op: Box::new(first),
                args,
            }))
        }
    }

    fn parse_type_atom(&mut self) -> Parsed<TypeExpression> {
        if self.check(Name::Identifier) {
            let name = self.advance();
            let id = self.fresh_id();
            Ok(TypeExpression::Var(VarTypeExpression { id, name }))
        } else if self.check(Name::IdentifierAlt) {
            let name = self.parse_qualified_name_alt()?;
            let id = self.fresh_id();
            Ok(TypeExpression::Reference(ReferenceTypeExpression {
                id,
                name,
            }))
        } else if self.check(Name::LParen) {
            let group = self.parse_paren_type_group()?;
            self.group_into_type(group)
        } else {
            self.unexpected()
        }
    }

    /// A dotted constructor path: `A.B.C`.
    fn parse_qualified_name_alt(&mut self) -> Parsed<QualifiedName> {
        let mut modules = Vec::new();
        loop {
            let is_segment = self.current.data.name() == Name::IdentifierAlt
                && self.peek(1).data == Data::Dot
                && self.peek(2).data.name() == Name::IdentifierAlt;
            if !is_segment {
                break;
            }
            let segment = self.advance();
            let dot = self.advance();
            modules.push((segment, dot));
        }
        let name = self.expect(Name::IdentifierAlt)?;
        Ok(QualifiedName { modules, name })
    }

    fn parse_paren_type_group(&mut self) -> Parsed<ParenTypeGroup> {
        let lparen = self.expect(Name::LParen)?;
        let mut items = Vec::new();
        if !self.check(Name::RParen) {
            loop {
                let ty = self.parse_type_arrow()?;
                let item = if self.check(Name::Tilde) {
                    let tilde = self.advance();
                    let right = self.parse_type_arrow()?;
                    GroupItem::Equality(ty, tilde, right)
                } else {
                    GroupItem::Type(ty)
                };
                if self.check(Name::Comma) {
                    let comma = self.advance();
                    items.push((item, Some(comma)));
                } else {
                    items.push((item, None));
                    break;
                }
            }
        }
        let rparen = self.expect(Name::RParen)?;
        Ok(ParenTypeGroup {
            lparen,
            items,
            rparen,
        })
    }

    /// Reinterpret a parenthesised group as a nested or tuple type. An
    /// equality item is only meaningful in constraint position.
    fn group_into_type(&mut self, group: ParenTypeGroup) -> Parsed<TypeExpression> {
        let ParenTypeGroup {
            lparen,
            items,
            rparen,
        } = group;
        let mut elements = Vec::new();
        let mut had_comma = false;
        for (item, comma) in items {
            had_comma = had_comma || comma.is_some();
            match item {
                GroupItem::Type(ty) => elements.push((ty, comma)),
                GroupItem::Equality(..) => {
                    self.expecting.insert(Name::RArrowAlt);
                    return self.unexpected();
                }
            }
        }
        if elements.len() == 1 && !had_comma {
            let (ty, _) = elements.pop().unwrap();
            let id = self.fresh_id();
            Ok(TypeExpression::Nested(NestedTypeExpression {
                id,
                lparen,
                ty: Box::new(ty),
                rparen,
            }))
        } else {
            let id = self.fresh_id();
            Ok(TypeExpression::Tuple(TupleTypeExpression {
                id,
                lparen,
                elements,
                rparen,
            }))
        }
    }

    fn group_item_to_constraint(&mut self, item: GroupItem) -> Parsed<ConstraintExpression> {
        match item {
            GroupItem::Equality(left, tilde, right) => {
                let id = self.fresh_id();
                Ok(ConstraintExpression::Equality(EqualityConstraintExpression {
                    id,
                    left,
                    tilde,
                    right,
                }))
            }
            GroupItem::Type(TypeExpression::App(app)) => match *app.op {
                TypeExpression::Reference(reference) if reference.name.modules.is_empty() => {
                    Ok(ConstraintExpression::Typeclass(
                        TypeclassConstraintExpression {
                            id: app.id,
                            name: reference.name.name,
                            types: app.args,
                        },
                    ))
                }
                _ => {
                    self.expecting.insert(Name::IdentifierAlt);
                    self.unexpected()
                }
            },
            GroupItem::Type(TypeExpression::Reference(reference))
                if reference.name.modules.is_empty() =>
            {
                Ok(ConstraintExpression::Typeclass(
                    TypeclassConstraintExpression {
                        id: reference.id,
                        name: reference.name.name,
                        types: Vec::new(),
                    },
                ))
            }
            GroupItem::Type(_) => {
                self.expecting.insert(Name::IdentifierAlt);
                self.unexpected()
            }
        }
    }

    /* ---------------------------------------------------------------------
     * Expressions
     * ------------------------------------------------------------------ */

    fn can_start_call_arg(&mut self) -> bool {
        self.check(Name::Identifier)
            || self.check(Name::IdentifierAlt)
            || self.check(Name::IntegerLiteral)
            || self.check(Name::StringLiteral)
            || self.check(Name::LParen)
            || self.check(Name::LBrace)
    }

    /// Precedence-climbing expression parser driven by the operator table.
    fn parse_expression(&mut self, min_precedence: i32) -> Parsed<Expression> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.expecting.insert(Name::CustomOperator);
            let info = match self.operators.infix(&self.current) {
                Some(info) if info.precedence >= min_precedence => info,
                _ => return Ok(lhs),
            };
            let operator = self.advance();
            let next_min = if info.is_right_assoc() {
                info.precedence
            } else {
                info.precedence + 1
            };
            let rhs = self.parse_expression(next_min)?;
            let id = self.fresh_id();
            lhs = Expression::Infix(InfixExpression {
                id,
                lhs: Box::new(lhs),
                operator,
                rhs: Box::new(rhs),
            });
        }
    }

    fn parse_unary(&mut self) -> Parsed<Expression> {
        if let Some(info) = self.operators.prefix(&self.current) {
            let operator = self.advance();
            let argument = self.parse_expression(info.precedence)?;
            let id = self.fresh_id();
            return Ok(Expression::Prefix(PrefixExpression {
                id,
                operator,
                argument: Box::new(argument),
            }));
        }
        self.parse_call()
    }

    /// Juxtaposition is application: consume argument atoms greedily until
    /// a token that cannot start an expression.
    fn parse_call(&mut self) -> Parsed<Expression> {
        let function = self.parse_primary()?;
        let mut args = Vec::new();
        while self.can_start_call_arg() {
            args.push(self.parse_primary()?);
        }
        if args.is_empty() {
            Ok(function)
        } else {
            let id = self.fresh_id();
            Ok(Expression::Call(CallExpression {
                id,
                function: Box::new(function),
                args,
            }))
        }
    }

    fn parse_primary(&mut self) -> Parsed<Expression> {
        let mut expression = self.parse_primary_no_postfix()?;
        // Member access: `.` followed by a field name.
        while self.current.data == Data::Dot && self.peek(1).data.name() == Name::Identifier {
            let dot = self.advance();
            let name = self.advance();
            let id = self.fresh_id();
            expression = Expression::Member(MemberExpression {
                id,
                expression: Box::new(expression),
                dot,
                name,
            });
        }
        Ok(expression)
    }

    fn parse_primary_no_postfix(&mut self) -> Parsed<Expression> {
        if self.check(Name::Identifier) {
            let name = self.advance();
            let id = self.fresh_id();
            Ok(Expression::Reference(ReferenceExpression {
                id,
                name: QualifiedName {
                    modules: Vec::new(),
                    name,
                },
            }))
        } else if self.check(Name::IdentifierAlt) {
            let name = self.parse_qualified_reference_name()?;
            let id = self.fresh_id();
            Ok(Expression::Reference(ReferenceExpression { id, name }))
        } else if self.check(Name::IntegerLiteral) || self.check(Name::StringLiteral) {
            let token = self.advance();
            let id = self.fresh_id();
            Ok(Expression::Constant(ConstantExpression { id, token }))
        } else if self.check(Name::LParen) {
            self.parse_paren_expression()
        } else if self.check(Name::LBrace) {
            self.parse_record_expression()
        } else if self.check_keyword(Keyword::Match) {
            self.parse_match_expression()
        } else {
            self.unexpected()
        }
    }

    /// A reference whose head is a constructor identifier: either a bare
    /// constructor or a dotted path ending in any identifier.
    fn parse_qualified_reference_name(&mut self) -> Parsed<QualifiedName> {
        let mut modules = Vec::new();
        loop {
            let is_segment = self.current.data.name() == Name::IdentifierAlt
                && self.peek(1).data == Data::Dot
                && matches!(
                    self.peek(2).data.name(),
                    Name::Identifier | Name::IdentifierAlt
                );
            if !is_segment {
                break;
            }
            let segment = self.advance();
            let dot = self.advance();
            modules.push((segment, dot));
        }
        self.expecting.insert(Name::Identifier);
        self.expecting.insert(Name::IdentifierAlt);
        match self.current.data.name() {
            Name::Identifier | Name::IdentifierAlt => {
                let name = self.advance();
                Ok(QualifiedName { modules, name })
            }
            _ => self.unexpected(),
        }
    }

    fn parse_paren_expression(&mut self) -> Parsed<Expression> {
        let lparen = self.expect(Name::LParen)?;
        if self.check(Name::RParen) {
            let rparen = self.advance();
            let id = self.fresh_id();
            return Ok(Expression::Tuple(TupleExpression {
                id,
                lparen,
                elements: Vec::new(),
                rparen,
            }));
        }
        let mut elements = Vec::new();
        let mut had_comma = false;
        loop {
            let expression = self.parse_expression(0)?;
            if self.check(Name::Comma) {
                let comma = self.advance();
                had_comma = true;
                elements.push((expression, Some(comma)));
            } else {
                elements.push((expression, None));
                break;
            }
        }
        let rparen = self.expect(Name::RParen)?;
        if elements.len() == 1 && !had_comma {
            let (inner, _) = elements.pop().unwrap();
            let id = self.fresh_id();
            Ok(Expression::Nested(NestedExpression {
                id,
                lparen,
                inner: Box::new(inner),
                rparen,
            }))
        } else {
            let id = self.fresh_id();
            Ok(Expression::Tuple(TupleExpression {
                id,
                lparen,
                elements,
                rparen,
            }))
        }
    }

    fn parse_record_expression(&mut self) -> Parsed<Expression> {
        let lbrace = self.expect(Name::LBrace)?;
        let mut fields = Vec::new();
        if !self.check(Name::RBrace) {
            loop {
                let name = self.expect(Name::Identifier)?;
                let equals = self.expect(Name::Equals)?;
                let value = self.parse_expression(0)?;
                let id = self.fresh_id();
                let field = RecordExpressionField {
                    id,
                    name,
                    equals,
                    value,
                };
                if self.check(Name::Comma) {
                    let comma = self.advance();
                    fields.push((field, Some(comma)));
                } else {
                    fields.push((field, None));
                    break;
                }
            }
        }
        let rbrace = self.expect(Name::RBrace)?;
        let id = self.fresh_id();
        Ok(Expression::Record(RecordExpression {
            id,
            lbrace,
            fields,
            rbrace,
        }))
    }

    fn parse_match_expression(&mut self) -> Parsed<Expression> {
        let match_keyword = self.expect_keyword(Keyword::Match)?;
        let scrutinee = self.parse_expression(0)?;
        let dot = self.expect(Name::Dot)?;
        let block_start = self.expect(Name::BlockStart)?;
        let mut cases = Vec::new();
        let block_end = loop {
            if self.check(Name::BlockEnd) {
                break self.advance();
            }
            match self.parse_match_case() {
                Ok(case) => cases.push(case),
                Err(Desync) => self.recover_to_line_fold(),
            }
            if self.current.data == Data::EndOfFile {
                return self.unexpected();
            }
        };
        let id = self.fresh_id();
        Ok(Expression::Match(MatchExpression {
            id,
            match_keyword,
            scrutinee: Box::new(scrutinee),
            dot,
            block_start,
            cases,
            block_end,
        }))
    }

    fn parse_match_case(&mut self) -> Parsed<MatchCase> {
        let pattern = self.parse_pattern()?;
        let rarrow_alt = self.expect(Name::RArrowAlt)?;
        let expression = self.parse_expression(0)?;
        self.expect(Name::LineFoldEnd)?;
        let id = self.fresh_id();
        Ok(MatchCase {
            id,
            pattern,
            rarrow_alt,
            expression,
        })
    }
}

struct ParenTypeGroup {
    lparen: Token,
    items: Vec<(GroupItem, Option<Token>)>,
    rparen: Token,
}

enum GroupItem {
    Type(TypeExpression),
    Equality(TypeExpression, Token, TypeExpression),
}
