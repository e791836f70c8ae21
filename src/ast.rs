//! Abstract syntax tree for Lox programs.
//!
//! Two closed node families, [`Expr`] and [`Stmt`], immutable once the
//! parser has built them. Reference-like expressions (variable reads,
//! assignments, `this`, `super`) carry a parser-assigned [`ExprId`] so the
//! resolver can attach binding distances to a *node*, not a name: two
//! syntactically identical references at different source positions are
//! distinct nodes and may resolve to different scopes.

use std::rc::Rc;

use crate::token::Token;

/// Identity of a reference-like AST node, assigned by the parser from a
/// monotonic counter. Keys the resolution map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

/// A literal constant that appears directly in the source code.
///
/// These are the terminal leaves of the expression tree; the parser copies
/// the value out of the token at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal, stored as IEEE-754 `f64`. Integral lexemes such as
    /// `"3"` are still parsed as `3.0`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// Expression nodes. The lifetime `'a` ties token references back to the
/// scanner's token buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// `name = value`
    Assign {
        id: ExprId,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// Infix binary operator expression: `a + b`, `x <= y`, ...
    Binary {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Function or method call. `paren` is the closing `)` token, retained
    /// for error reporting.
    Call {
        callee: Box<Expr<'a>>,
        paren: &'a Token<'a>,
        arguments: Vec<Expr<'a>>,
    },

    /// Property read: `object.name`
    Get {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
    },

    /// Parenthesised sub-expression.
    Grouping(Box<Expr<'a>>),

    /// A literal constant.
    Literal(LiteralValue),

    /// Short-circuiting `and` / `or`.
    Logical {
        left: Box<Expr<'a>>,
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Property write: `object.name = value`
    Set {
        object: Box<Expr<'a>>,
        name: &'a Token<'a>,
        value: Box<Expr<'a>>,
    },

    /// `super.method` inside a subclass method body.
    Super {
        id: ExprId,
        keyword: &'a Token<'a>,
        method: &'a Token<'a>,
    },

    /// The `this` keyword inside a method body.
    This {
        id: ExprId,
        keyword: &'a Token<'a>,
    },

    /// Prefix unary operator expression: `!ready`, `-42`.
    Unary {
        operator: &'a Token<'a>,
        right: Box<Expr<'a>>,
    },

    /// Variable read.
    Variable {
        id: ExprId,
        name: &'a Token<'a>,
    },
}

impl Expr<'_> {
    /// Source line of the node, for diagnostics.
    pub fn line(&self) -> usize {
        match self {
            Expr::Assign { name, .. } => name.line,
            Expr::Binary { operator, .. } => operator.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } => name.line,
            Expr::Grouping(inner) => inner.line(),
            Expr::Literal(_) => 0,
            Expr::Logical { operator, .. } => operator.line,
            Expr::Set { name, .. } => name.line,
            Expr::Super { keyword, .. } => keyword.line,
            Expr::This { keyword, .. } => keyword.line,
            Expr::Unary { operator, .. } => operator.line,
            Expr::Variable { name, .. } => name.line,
        }
    }
}

/// A named function or method declaration. Shared via `Rc` so closures can
/// hold the declaration without cloning the body per capture.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl<'a> {
    pub name: &'a Token<'a>,

    /// Parameter name tokens (arity is capped at 255 by the parser).
    pub params: Vec<&'a Token<'a>>,

    /// Body executed when the function is called.
    pub body: Vec<Stmt<'a>>,
}

/// Statement nodes. A program is a sequence of these, returned by
/// [`crate::parser::Parser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt<'a>>),

    /// Class declaration. The superclass, when present, is always an
    /// `Expr::Variable` naming it.
    Class {
        name: &'a Token<'a>,
        superclass: Option<Expr<'a>>,
        methods: Vec<Rc<FunctionDecl<'a>>>,
    },

    /// Stand-alone expression terminated by a semicolon.
    Expression(Expr<'a>),

    /// Function declaration; becomes a first-class callable value.
    Function(Rc<FunctionDecl<'a>>),

    /// `if` / `else` conditional.
    If {
        condition: Expr<'a>,
        then_branch: Box<Stmt<'a>>,
        else_branch: Option<Box<Stmt<'a>>>,
    },

    /// `print` statement.
    Print(Expr<'a>),

    /// `return` inside a function body. An absent value means `nil`.
    Return {
        keyword: &'a Token<'a>,
        value: Option<Expr<'a>>,
    },

    /// Variable declaration: `var name (= initializer)? ;`
    Var {
        name: &'a Token<'a>,
        initializer: Option<Expr<'a>>,
    },

    /// `while` loop. `for` loops are desugared into this by the parser.
    While {
        condition: Expr<'a>,
        body: Box<Stmt<'a>>,
    },
}
