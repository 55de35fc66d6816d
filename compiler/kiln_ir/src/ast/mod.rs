//! The syntax tree handed to the lowering engine.
//!
//! The tree is produced by an external parser and never mutated afterwards.
//! Every node is a rule tag, an optional literal payload and an ordered list
//! of children; what the children mean is decided by the visitor registered
//! for the rule in its syntactic context.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::Span;

/// Syntactic category of an AST node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Rule {
    // Items
    Module,
    Namespace,
    Class,
    Field,
    Function,
    Params,
    Param,
    Type,
    Destructor,
    Global,

    // Statements
    Block,
    Let,
    Assign,
    SetField,
    Return,
    If,
    While,
    Break,
    Continue,
    Assert,
    Destroy,

    // Expressions
    Int,
    Float,
    Bool,
    Str,
    Ident,
    Binary,
    Unary,
    And,
    Or,
    Call,
    Method,
    Intrinsic,
    Cast,
    New,
    GetField,
    Closure,
}

impl Rule {
    pub const ALL: &'static [Rule] = &[
        Rule::Module,
        Rule::Namespace,
        Rule::Class,
        Rule::Field,
        Rule::Function,
        Rule::Params,
        Rule::Param,
        Rule::Type,
        Rule::Destructor,
        Rule::Global,
        Rule::Block,
        Rule::Let,
        Rule::Assign,
        Rule::SetField,
        Rule::Return,
        Rule::If,
        Rule::While,
        Rule::Break,
        Rule::Continue,
        Rule::Assert,
        Rule::Destroy,
        Rule::Int,
        Rule::Float,
        Rule::Bool,
        Rule::Str,
        Rule::Ident,
        Rule::Binary,
        Rule::Unary,
        Rule::And,
        Rule::Or,
        Rule::Call,
        Rule::Method,
        Rule::Intrinsic,
        Rule::Cast,
        Rule::New,
        Rule::GetField,
        Rule::Closure,
    ];

    /// The rule's spelling in the tree text format and in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            Rule::Module => "module",
            Rule::Namespace => "namespace",
            Rule::Class => "class",
            Rule::Field => "field",
            Rule::Function => "fn",
            Rule::Params => "params",
            Rule::Param => "param",
            Rule::Type => "type",
            Rule::Destructor => "dtor",
            Rule::Global => "global",
            Rule::Block => "block",
            Rule::Let => "let",
            Rule::Assign => "assign",
            Rule::SetField => "set",
            Rule::Return => "return",
            Rule::If => "if",
            Rule::While => "while",
            Rule::Break => "break",
            Rule::Continue => "continue",
            Rule::Assert => "assert",
            Rule::Destroy => "destroy",
            Rule::Int => "int",
            Rule::Float => "float",
            Rule::Bool => "bool",
            Rule::Str => "str",
            Rule::Ident => "ident",
            Rule::Binary => "binary",
            Rule::Unary => "unary",
            Rule::And => "and",
            Rule::Or => "or",
            Rule::Call => "call",
            Rule::Method => "method",
            Rule::Intrinsic => "intrinsic",
            Rule::Cast => "cast",
            Rule::New => "new",
            Rule::GetField => "get",
            Rule::Closure => "closure",
        }
    }

    pub fn from_name(name: &str) -> Option<Rule> {
        Rule::ALL.iter().copied().find(|rule| rule.name() == name)
    }

    /// Whether the rule produces a value when lowered.
    pub const fn is_expression(self) -> bool {
        matches!(
            self,
            Rule::Int
                | Rule::Float
                | Rule::Bool
                | Rule::Str
                | Rule::Ident
                | Rule::Binary
                | Rule::Unary
                | Rule::And
                | Rule::Or
                | Rule::Call
                | Rule::Method
                | Rule::Intrinsic
                | Rule::Cast
                | Rule::New
                | Rule::GetField
                | Rule::Closure
        )
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Literal payload carried by leaf-ish nodes (names, numbers, operators).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Bool(bool),
    Str(String),
    /// Bare word: identifiers, qualified names, operator spellings, type names.
    Symbol(String),
}

impl Literal {
    /// The text of a symbol or string payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Symbol(s) | Literal::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Equality as seen by [`AstNode::fingerprint`]: floats compare by bits.
    pub fn same_as(&self, other: &Literal) -> bool {
        match (self, other) {
            (Literal::Float(a), Literal::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    fn hash_into(&self, state: &mut FxHasher) {
        std::mem::discriminant(self).hash(state);
        match self {
            Literal::Int(v) => v.hash(state),
            Literal::Float(v) => v.to_bits().hash(state),
            Literal::Bool(v) => v.hash(state),
            Literal::Str(s) | Literal::Symbol(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v:?}"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Str(s) => write!(f, "{s:?}"),
            Literal::Symbol(s) => f.write_str(s),
        }
    }
}

/// Structural hash of a subtree, ignoring spans.
///
/// Two subtrees with the same rules, literals and shape have the same
/// fingerprint wherever they appear in the source.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Fingerprint(pub u64);

/// One node of the immutable syntax tree.
#[derive(Clone, Debug, PartialEq)]
pub struct AstNode {
    pub rule: Rule,
    pub literal: Option<Literal>,
    pub children: Vec<AstNode>,
    pub span: Span,
}

impl AstNode {
    pub fn new(rule: Rule, span: Span) -> Self {
        AstNode {
            rule,
            literal: None,
            children: Vec::new(),
            span,
        }
    }

    /// Node with no source location, for synthesized fragments and tests.
    pub fn synthetic(rule: Rule) -> Self {
        Self::new(rule, Span::DUMMY)
    }

    #[must_use]
    pub fn with_literal(mut self, literal: Literal) -> Self {
        self.literal = Some(literal);
        self
    }

    #[must_use]
    pub fn with_symbol(self, symbol: impl Into<String>) -> Self {
        self.with_literal(Literal::Symbol(symbol.into()))
    }

    #[must_use]
    pub fn with_child(mut self, child: AstNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = AstNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Symbol or string payload, if any.
    pub fn text(&self) -> Option<&str> {
        self.literal.as_ref().and_then(Literal::as_text)
    }

    /// First child with the given rule.
    pub fn child(&self, rule: Rule) -> Option<&AstNode> {
        self.children.iter().find(|c| c.rule == rule)
    }

    /// Children with the given rule, in order.
    pub fn children_of(&self, rule: Rule) -> impl Iterator<Item = &AstNode> {
        self.children.iter().filter(move |c| c.rule == rule)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = FxHasher::default();
        self.hash_structure(&mut hasher);
        Fingerprint(hasher.finish())
    }

    fn hash_structure(&self, state: &mut FxHasher) {
        self.rule.hash(state);
        match &self.literal {
            Some(lit) => {
                1u8.hash(state);
                lit.hash_into(state);
            }
            None => 0u8.hash(state),
        }
        self.children.len().hash(state);
        for child in &self.children {
            child.hash_structure(state);
        }
    }

    /// Same rules, literals and shape, ignoring spans.
    pub fn same_structure(&self, other: &AstNode) -> bool {
        let literals_match = match (&self.literal, &other.literal) {
            (Some(a), Some(b)) => a.same_as(b),
            (None, None) => true,
            _ => false,
        };
        self.rule == other.rule
            && literals_match
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.same_structure(b))
    }

    /// Number of nodes in the subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(AstNode::size).sum::<usize>()
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.rule)?;
        if let Some(lit) = &self.literal {
            write!(f, " {lit}")?;
        }
        for child in &self.children {
            write!(f, " {child}")?;
        }
        f.write_str(")")
    }
}
