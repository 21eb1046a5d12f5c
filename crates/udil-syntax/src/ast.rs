//! Statement model for the UDIL language.
//!
//! Statements are built once by the parser and are immutable afterwards, with
//! one exception: a [`Block`]'s `exec_counter`, a progress marker that the
//! interpreter advances when a block is replayed.
//!
//! Expressions are kept as canonical text ([`Expr`]). The evaluator resolves
//! that text against the current scope at run time, choosing between several
//! grammars, so no expression tree is stored here.
//!
//! Every statement renders itself back to program text through `Display`. The
//! rendering is derived from the statement's own fields, never from the raw
//! source slice, so statements that were synthesized or moved around still
//! round-trip through the parser.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Runtime type tags stored in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int,
    Real,
    Text,
    List,
    /// A block or any single statement
    Block,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int => "int",
            TypeTag::Real => "real",
            TypeTag::Text => "text",
            TypeTag::List => "list",
            TypeTag::Block => "block",
        }
    }

    /// Parses the names used by sync channels (`"int"`, `"statement"`, ...).
    pub fn from_name(name: &str) -> Option<TypeTag> {
        TypeName::from_keyword(name).and_then(|t| t.tag())
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A type keyword exactly as written in a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Real,
    Char,
    Text,
    List,
    Obj,
    Block,
    Statement,
    Void,
    Fun,
}

impl TypeName {
    pub fn from_keyword(word: &str) -> Option<TypeName> {
        let name = match word {
            "int" => TypeName::Int,
            "real" => TypeName::Real,
            "char" => TypeName::Char,
            "text" => TypeName::Text,
            "list" => TypeName::List,
            "obj" => TypeName::Obj,
            "block" => TypeName::Block,
            "statement" => TypeName::Statement,
            "void" => TypeName::Void,
            "fun" => TypeName::Fun,
            _ => return None,
        };
        Some(name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Real => "real",
            TypeName::Char => "char",
            TypeName::Text => "text",
            TypeName::List => "list",
            TypeName::Obj => "obj",
            TypeName::Block => "block",
            TypeName::Statement => "statement",
            TypeName::Void => "void",
            TypeName::Fun => "fun",
        }
    }

    /// The storage tag for this keyword; `void` and `fun` name no storable type.
    pub fn tag(&self) -> Option<TypeTag> {
        match self {
            TypeName::Int => Some(TypeTag::Int),
            TypeName::Real => Some(TypeTag::Real),
            TypeName::Char | TypeName::Text => Some(TypeTag::Text),
            TypeName::List => Some(TypeTag::List),
            TypeName::Obj | TypeName::Block | TypeName::Statement => Some(TypeTag::Block),
            TypeName::Void | TypeName::Fun => None,
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical expression text: the expression's token lexemes joined without
/// whitespace (`a+1`, `x<20`, `[1,"two"]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expr(String);

impl Expr {
    pub fn new(text: impl Into<String>) -> Self {
        Expr(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Left-hand side of an assignment: a name plus zero or more index expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignTarget {
    pub name: String,
    pub indices: Vec<Expr>,
}

impl AssignTarget {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indices: Vec::new(),
        }
    }
}

impl fmt::Display for AssignTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for index in &self.indices {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

/// Initializer or step clause of a `for` header.
#[derive(Debug, Clone, PartialEq)]
pub enum ForClause {
    Assign { target: AssignTarget, expr: Expr },
    Declare { ty: TypeName, name: String },
}

impl fmt::Display for ForClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForClause::Assign { target, expr } => write!(f, "{} = {}", target, expr),
            ForClause::Declare { ty, name } => write!(f, "{} {}", ty, name),
        }
    }
}

/// Function parameter of a (parse-only) function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
}

/// A named or anonymous sequence of statements.
///
/// Blocks are first-class values: they can be stored in variables, indexed
/// (`block[i]` is the i-th statement) and handed to the sync subsystem.
#[derive(Debug, Clone)]
pub struct Block {
    /// Block name, empty for anonymous blocks
    pub id: String,
    pub statements: Vec<Rc<Statement>>,
    /// Index of the next statement to run when the block is replayed
    pub exec_counter: Cell<usize>,
}

impl Block {
    pub fn new(id: impl Into<String>, statements: Vec<Rc<Statement>>) -> Self {
        Self {
            id: id.into(),
            statements,
            exec_counter: Cell::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.statements == other.statements
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{\n", self.id)?;
        write_body(f, &self.statements)?;
        f.write_str("}")
    }
}

fn write_body(f: &mut fmt::Formatter<'_>, body: &[Rc<Statement>]) -> fmt::Result {
    for s in body {
        writeln!(f, "{}", s)?;
    }
    Ok(())
}

fn write_list(f: &mut fmt::Formatter<'_>, parts: &[Expr]) -> fmt::Result {
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", part)?;
    }
    Ok(())
}

/// The statement kinds the parser produces.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `int a;`
    Declaration { ty: TypeName, name: String },
    /// `int a = expr;`
    DeclAssign {
        ty: TypeName,
        name: String,
        expr: Expr,
    },
    /// `a = expr;` or `a[i][j] = expr;`
    Assignment { target: AssignTarget, expr: Expr },
    /// `name{ ... }` or `{ ... }`
    Block(Block),
    If {
        cond: Expr,
        then_block: Vec<Rc<Statement>>,
        else_block: Option<Vec<Rc<Statement>>>,
    },
    While {
        cond: Expr,
        body: Vec<Rc<Statement>>,
    },
    /// Accepted by the grammar, never executed.
    For {
        init: ForClause,
        cond: Expr,
        step: Option<ForClause>,
        body: Vec<Rc<Statement>>,
    },
    /// Accepted by the grammar, never executed.
    Return(Option<Expr>),
    /// Accepted by the grammar, never executed.
    FunctionDef {
        ret: TypeName,
        name: String,
        params: Vec<Param>,
        body: Vec<Rc<Statement>>,
    },
    /// A bare expression followed by `;`
    Expression(Expr),
    /// `sync(k1, k2) = value;`
    SyncWrite { key: Vec<Expr>, value: Expr },
    /// `[type] name = sync(k1, k2);`
    SyncRead {
        target: String,
        ty: Option<TypeName>,
        parts: Vec<Expr>,
    },
}

/// A statement together with the source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StmtKind,
    /// 1-based source line, for diagnostics
    pub position: usize,
}

impl Statement {
    pub fn new(kind: StmtKind, position: usize) -> Self {
        Self { kind, position }
    }

    pub fn block(id: impl Into<String>, statements: Vec<Rc<Statement>>, position: usize) -> Self {
        Self::new(StmtKind::Block(Block::new(id, statements)), position)
    }

    pub fn as_block(&self) -> Option<&Block> {
        match &self.kind {
            StmtKind::Block(b) => Some(b),
            _ => None,
        }
    }

    /// The expression carried by expression statements and initialized
    /// declarations, which is what indexing a block for a value reads.
    pub fn value_expr(&self) -> Option<&Expr> {
        match &self.kind {
            StmtKind::Expression(e) | StmtKind::DeclAssign { expr: e, .. } => Some(e),
            _ => None,
        }
    }

    /// Short name of the statement kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            StmtKind::Declaration { .. } => "declaration",
            StmtKind::DeclAssign { .. } => "declaration with initializer",
            StmtKind::Assignment { .. } => "assignment",
            StmtKind::Block(_) => "block",
            StmtKind::If { .. } => "if",
            StmtKind::While { .. } => "while",
            StmtKind::For { .. } => "for",
            StmtKind::Return(_) => "return",
            StmtKind::FunctionDef { .. } => "function definition",
            StmtKind::Expression(_) => "expression",
            StmtKind::SyncWrite { .. } => "sync write",
            StmtKind::SyncRead { .. } => "sync read",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            StmtKind::Declaration { ty, name } => write!(f, "{} {};", ty, name),
            StmtKind::DeclAssign { ty, name, expr } => write!(f, "{} {} = {};", ty, name, expr),
            StmtKind::Assignment { target, expr } => write!(f, "{} = {};", target, expr),
            StmtKind::Block(block) => write!(f, "{}", block),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "if ( {} ) {{\n", cond)?;
                write_body(f, then_block)?;
                if let Some(else_block) = else_block {
                    f.write_str("}else{\n")?;
                    write_body(f, else_block)?;
                }
                f.write_str("}")
            }
            StmtKind::While { cond, body } => {
                write!(f, "while ( {} ) {{\n", cond)?;
                write_body(f, body)?;
                f.write_str("}")
            }
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => {
                write!(f, "for ( {} ; {} ;", init, cond)?;
                if let Some(step) = step {
                    write!(f, " {}", step)?;
                }
                f.write_str(" ) {\n")?;
                write_body(f, body)?;
                f.write_str("}")
            }
            StmtKind::Return(Some(e)) => write!(f, "return {};", e),
            StmtKind::Return(None) => f.write_str("return;"),
            StmtKind::FunctionDef {
                ret,
                name,
                params,
                body,
            } => {
                write!(f, "{} {}(", ret, name)?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{} {}", p.ty, p.name)?;
                }
                f.write_str("){\n")?;
                write_body(f, body)?;
                f.write_str("}")
            }
            StmtKind::Expression(e) => write!(f, "{};", e),
            StmtKind::SyncWrite { key, value } => {
                f.write_str("sync(")?;
                write_list(f, key)?;
                write!(f, ") = {};", value)
            }
            StmtKind::SyncRead { target, ty, parts } => {
                if let Some(ty) = ty {
                    write!(f, "{} ", ty)?;
                }
                write!(f, "{} = sync(", target)?;
                write_list(f, parts)?;
                f.write_str(");")
            }
        }
    }
}

/// Entire program: the top-level statements in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Rc<Statement>>,
}
