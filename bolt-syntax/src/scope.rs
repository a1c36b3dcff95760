//! Symbol scopes.
//!
//! A scope maps names to the declarations that introduce them. Scopes are
//! created lazily: nothing is scanned until a lookup reaches the owning
//! node, and a scan only covers the owner's direct children. Nested scope
//! owners build their own scopes on demand.

use crate::{
    ClassDeclaration, Element, IfBody, IfStatementPart, InstanceDeclaration, LetBody,
    LetDeclaration, NodeId, SourceFile, SymbolPath,
};
use bolt_util::fnv_hash_multi_map::FnvHashMultimap;
use fnv::FnvHashMap;
use std::rc::Rc;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SymbolKind {
    Var,
    Class,
    Type,
}

/// The declarations directly visible at one scope-owning node.
#[derive(Default)]
pub struct Scope {
    symbols: FnvHashMultimap<Rc<str>, (NodeId, SymbolKind)>,
}

impl Scope {
    fn add_symbol(&mut self, name: Rc<str>, decl: NodeId, kind: SymbolKind) {
        self.symbols.insert(name, (decl, kind));
    }

    /// Look the name up in this scope only; never consults parents.
    pub fn lookup_direct(&self, name: &str, kind: SymbolKind) -> Option<NodeId> {
        self.symbols
            .get_all(name)
            .find(|(_, symbol_kind)| *symbol_kind == kind)
            .map(|(decl, _)| *decl)
    }

    fn scan_elements(&mut self, elements: &[Element]) {
        for element in elements {
            match element {
                Element::Let(decl) => {
                    for (name, _) in decl.pattern.bound_names() {
                        self.add_symbol(name, decl.id, SymbolKind::Var);
                    }
                }
                Element::Record(decl) => {
                    self.add_symbol(decl.name_text(), decl.id, SymbolKind::Type);
                }
                Element::Variant(decl) => {
                    self.add_symbol(decl.name_text(), decl.id, SymbolKind::Type);
                    for member in &decl.members {
                        self.add_symbol(member.name_text(), member.id(), SymbolKind::Var);
                    }
                }
                Element::Class(decl) => {
                    self.add_symbol(decl.name_text(), decl.id, SymbolKind::Class);
                    // Class methods are callable from the enclosing scope.
                    for element in &decl.elements {
                        if let Element::Let(method) = element {
                            for (name, _) in method.pattern.bound_names() {
                                self.add_symbol(name, method.id, SymbolKind::Var);
                            }
                        }
                    }
                }
                Element::Instance(_)
                | Element::Expression(_)
                | Element::If(_)
                | Element::Return(_) => {}
            }
        }
    }

    fn scan(owner: ScopeOwner) -> Scope {
        let mut scope = Scope::default();
        match owner {
            ScopeOwner::File(file) => scope.scan_elements(&file.elements),
            ScopeOwner::Let(decl) => {
                for param in &decl.params {
                    for (name, node) in param.pattern.bound_names() {
                        scope.add_symbol(name, node, SymbolKind::Var);
                    }
                }
                if let Some(LetBody::Block(body)) = &decl.body {
                    scope.scan_elements(&body.elements);
                }
            }
            ScopeOwner::IfPart(part) => {
                if let IfBody::Block { elements, .. } = &part.body {
                    scope.scan_elements(elements);
                }
            }
            ScopeOwner::Class(decl) => scope.scan_elements(&decl.elements),
            ScopeOwner::Instance(decl) => scope.scan_elements(&decl.elements),
        }
        scope
    }
}

/// A borrowed reference to a scope-owning node.
#[derive(Clone, Copy)]
pub enum ScopeOwner<'a> {
    File(&'a SourceFile),
    Let(&'a LetDeclaration),
    IfPart(&'a IfStatementPart),
    Class(&'a ClassDeclaration),
    Instance(&'a InstanceDeclaration),
}

impl<'a> ScopeOwner<'a> {
    pub fn id(&self) -> NodeId {
        match self {
            ScopeOwner::File(file) => file.id,
            ScopeOwner::Let(decl) => decl.id,
            ScopeOwner::IfPart(part) => part.id,
            ScopeOwner::Class(decl) => decl.id,
            ScopeOwner::Instance(decl) => decl.id,
        }
    }
}

/// Lazily built scopes, keyed by the owning node.
#[derive(Default)]
pub struct ScopeTable {
    scopes: FnvHashMap<NodeId, Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        ScopeTable::default()
    }

    /// The scope owned by `owner`, scanned on first use.
    pub fn scope_of(&mut self, owner: ScopeOwner) -> &Scope {
        self.scopes
            .entry(owner.id())
            .or_insert_with(|| Scope::scan(owner))
    }

    /// Resolve a name against a stack of enclosing scope owners, innermost
    /// last. Walks outward when a direct lookup fails.
    pub fn lookup(
        &mut self,
        stack: &[ScopeOwner],
        path: &SymbolPath,
        kind: SymbolKind,
    ) -> Option<NodeId> {
        if !path.modules.is_empty() {
            // Single-file programs have no module namespaces to consult.
            return None;
        }
        for owner in stack.iter().rev() {
            if let Some(decl) = self.scope_of(*owner).lookup_direct(&path.name, kind) {
                return Some(decl);
            }
        }
        None
    }
}
