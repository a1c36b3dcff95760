//! The operator table.
//!
//! Infix and prefix operators are not baked into the grammar; the parser
//! consults a table of `(precedence, fixity)` entries while climbing
//! precedences. The table is seeded with the built-in operators and can be
//! extended through [`OperatorTable::add`].

use bolt_lex::token::{Data, Token};
use fnv::FnvHashMap;
use lazy_static::lazy_static;
use std::rc::Rc;

pub const OPERATOR_PREFIX: u8 = 1;
pub const OPERATOR_INFIX_LEFT: u8 = 2;
pub const OPERATOR_INFIX_RIGHT: u8 = 4;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct OperatorInfo {
    pub precedence: i32,
    pub flags: u8,
}

impl OperatorInfo {
    pub fn is_prefix(&self) -> bool {
        self.flags & OPERATOR_PREFIX != 0
    }

    pub fn is_infix(&self) -> bool {
        self.flags & (OPERATOR_INFIX_LEFT | OPERATOR_INFIX_RIGHT) != 0
    }

    pub fn is_right_assoc(&self) -> bool {
        self.flags & OPERATOR_INFIX_RIGHT != 0
    }
}

lazy_static! {
    static ref DEFAULT_OPERATORS: Vec<(&'static str, u8, i32)> = vec![
        ("**", OPERATOR_INFIX_RIGHT, 10),
        ("*", OPERATOR_INFIX_LEFT, 8),
        ("/", OPERATOR_INFIX_LEFT, 8),
        ("%", OPERATOR_INFIX_LEFT, 8),
        ("+", OPERATOR_INFIX_LEFT | OPERATOR_PREFIX, 7),
        ("-", OPERATOR_INFIX_LEFT | OPERATOR_PREFIX, 7),
        ("==", OPERATOR_INFIX_LEFT, 5),
        ("!=", OPERATOR_INFIX_LEFT, 5),
        ("/=", OPERATOR_INFIX_LEFT, 5),
        ("<", OPERATOR_INFIX_LEFT, 5),
        (">", OPERATOR_INFIX_LEFT, 5),
        ("<=", OPERATOR_INFIX_LEFT, 5),
        (">=", OPERATOR_INFIX_LEFT, 5),
        ("&&", OPERATOR_INFIX_LEFT, 3),
        ("||", OPERATOR_INFIX_LEFT, 2),
        ("!", OPERATOR_PREFIX, 9),
    ];
}

pub struct OperatorTable {
    mapping: FnvHashMap<Rc<str>, OperatorInfo>,
}

impl OperatorTable {
    pub fn empty() -> Self {
        OperatorTable {
            mapping: FnvHashMap::default(),
        }
    }

    pub fn add(&mut self, name: &str, flags: u8, precedence: i32) {
        self.mapping
            .insert(Rc::from(name), OperatorInfo { precedence, flags });
    }

    fn info(&self, token: &Token) -> Option<OperatorInfo> {
        match &token.data {
            Data::CustomOperator(text) => self.mapping.get(text.as_ref()).copied(),
            _ => None,
        }
    }

    pub fn infix(&self, token: &Token) -> Option<OperatorInfo> {
        self.info(token).filter(|info| info.is_infix())
    }

    pub fn prefix(&self, token: &Token) -> Option<OperatorInfo> {
        self.info(token).filter(|info| info.is_prefix())
    }

    pub fn is_infix(&self, token: &Token) -> bool {
        self.infix(token).is_some()
    }

    pub fn is_prefix(&self, token: &Token) -> bool {
        self.prefix(token).is_some()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        let mut table = OperatorTable::empty();
        for (name, flags, precedence) in DEFAULT_OPERATORS.iter() {
            table.add(name, *flags, *precedence);
        }
        table
    }
}
