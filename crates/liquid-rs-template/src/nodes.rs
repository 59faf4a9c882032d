//! The compiled form of a template.
//!
//! A template is a sequence of [`Node`]s. Container tags (`for`, `if`,
//! `capture`) own their bodies, so the whole thing is a plain tree with no
//! sharing.

use crate::value::Value;

/// A binary operator in an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `<`
    Less,
    /// `<=`
    Leq,
    /// `>`
    Greater,
    /// `>=`
    Geq,
    /// `==`
    Equal,
    /// `!=` or `<>`
    Inequal,
    /// `and`
    And,
    /// `or`
    Or,
    /// `xor`
    Xor,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinaryOperator {
    /// Looks up an operator by its source spelling.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "<" => Self::Less,
            "<=" => Self::Leq,
            ">" => Self::Greater,
            ">=" => Self::Geq,
            "==" => Self::Equal,
            "!=" | "<>" => Self::Inequal,
            "and" => Self::And,
            "or" => Self::Or,
            "xor" => Self::Xor,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            _ => return None,
        })
    }

    /// Binding strength; a higher number binds looser.
    pub fn precedence(self) -> i8 {
        match self {
            Self::Or | Self::Xor => 4,
            Self::And => 3,
            Self::Equal | Self::Inequal => 2,
            Self::Less | Self::Leq | Self::Greater | Self::Geq => 1,
            Self::Add | Self::Sub => 0,
            Self::Mul | Self::Div => -1,
        }
    }

    /// The canonical source spelling.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::Leq => "<=",
            Self::Greater => ">",
            Self::Geq => ">=",
            Self::Equal => "==",
            Self::Inequal => "!=",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// A value-producing expression, as found inside `{{ }}` and tag arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant.
    Literal { value: Value, offset: usize },
    /// `[a, b, ...]`
    ArrayLiteral { items: Vec<Expr>, offset: usize },
    /// A bare name looked up through the scope stack.
    Variable { name: String, offset: usize },
    /// `target.name`
    MemberAccess {
        target: Box<Expr>,
        name: String,
        offset: usize,
    },
    /// `target[index]`
    ArrayAccess {
        target: Box<Expr>,
        index: Box<Expr>,
        offset: usize,
    },
    /// `lhs op rhs`
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        offset: usize,
    },
    /// `not operand` / `!operand`
    Not { operand: Box<Expr>, offset: usize },
    /// `target | filter: args...`
    Pipe {
        target: Box<Expr>,
        filter: String,
        args: Vec<Value>,
        offset: usize,
    },
}

impl Expr {
    /// Byte offset of this expression in the template source.
    pub fn offset(&self) -> usize {
        match self {
            Self::Literal { offset, .. }
            | Self::ArrayLiteral { offset, .. }
            | Self::Variable { offset, .. }
            | Self::MemberAccess { offset, .. }
            | Self::ArrayAccess { offset, .. }
            | Self::Binary { offset, .. }
            | Self::Not { offset, .. }
            | Self::Pipe { offset, .. } => *offset,
        }
    }
}

/// Where `assign` stores its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignTarget {
    /// The innermost file scope (the default).
    #[default]
    Local,
    /// The file scope of the template that included the current one.
    ParentScope,
    /// The global frame.
    Global,
}

/// One `if` / `elsif` / `else` arm.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    /// The condition; `else` arms hold a constant `true`.
    pub condition: Expr,
    /// Nodes rendered when this arm is taken.
    pub body: Vec<Node>,
}

/// A `{% ... %}` control construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    Assign {
        name: String,
        value: Expr,
        target: AssignTarget,
    },
    Capture {
        name: String,
        body: Vec<Node>,
    },
    For {
        variable: String,
        iterable: Expr,
        body: Vec<Node>,
    },
    If {
        blocks: Vec<IfBlock>,
    },
    Break,
    Continue,
    Eject,
    Discard,
    Include {
        name: String,
        args: Vec<(String, Expr)>,
    },
    Comment,
    Newline,
}

impl Tag {
    /// The keyword that opens this tag.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Assign { .. } => "assign",
            Self::Capture { .. } => "capture",
            Self::For { .. } => "for",
            Self::If { .. } => "if",
            Self::Break => "break",
            Self::Continue => "continue",
            Self::Eject => "eject",
            Self::Discard => "discard",
            Self::Include { .. } => "include",
            Self::Comment => "comment",
            Self::Newline => "newline",
        }
    }

    /// Mutable access to every child body this tag owns.
    pub fn bodies_mut(&mut self) -> Vec<&mut Vec<Node>> {
        match self {
            Self::Capture { body, .. } | Self::For { body, .. } => vec![body],
            Self::If { blocks } => blocks.iter_mut().map(|b| &mut b.body).collect(),
            _ => Vec::new(),
        }
    }
}

/// A tag plus the offset of its keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub tag: Tag,
    pub offset: usize,
}

/// Literal template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNode {
    pub text: String,
    pub offset: usize,
}

/// One element of a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(TextNode),
    Expression(Expr),
    Tag(TagNode),
}

impl Node {
    /// Byte offset of this node in the template source.
    pub fn offset(&self) -> usize {
        match self {
            Self::Text(t) => t.offset,
            Self::Expression(e) => e.offset(),
            Self::Tag(t) => t.offset,
        }
    }

    /// Returns `true` for tag nodes.
    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }
}
