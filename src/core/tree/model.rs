//! Abstract syntax tree for the Swift-like surface language.
//!
//! The parser never discards input: malformed constructs become `Error`
//! variants so that later stages (and code completion) can keep going.

use crate::core::diag::Span;
use crate::core::tree::NodeId;

// -- Attributes and modifiers --

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub args: Vec<String>,
    pub span: Span,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub is_static: bool,
    pub mutating: bool,
    pub is_override: bool,
    pub indirect: bool,
}

// -- Source file --

#[derive(Clone, Debug, Default)]
pub struct SourceFile {
    pub items: Vec<Item>,
}

impl SourceFile {
    /// Top-level statements, in source order (script-mode code).
    pub fn top_level_stmts(&self) -> impl Iterator<Item = &Stmt> {
        self.items.iter().filter_map(|item| match &item.kind {
            ItemKind::Stmt(stmt) => Some(stmt),
            _ => None,
        })
    }
}

// -- Declarations --

#[derive(Clone, Debug)]
pub struct Item {
    pub id: NodeId,
    pub attrs: Vec<Attribute>,
    pub modifiers: Modifiers,
    pub kind: ItemKind,
    pub span: Span,
}

impl Item {
    pub fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|attr| attr.name == name)
    }
}

#[derive(Clone, Debug)]
pub enum ItemKind {
    Func(FuncDecl),
    Init(InitDecl),
    Subscript(SubscriptDecl),
    Var(VarDecl),
    Struct(NominalDecl),
    Class(NominalDecl),
    Enum(NominalDecl),
    EnumCase(EnumCaseDecl),
    Protocol(NominalDecl),
    Extension(ExtensionDecl),
    TypeAlias(TypeAliasDecl),
    AssociatedType(AssocTypeDecl),
    Import(String),
    Stmt(Stmt),
    Error,
}

#[derive(Clone, Debug)]
pub struct GenericParamDecl {
    pub id: NodeId,
    pub name: String,
    pub bounds: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum WhereRequirement {
    Conformance { subject: TypeExpr, bounds: Vec<TypeExpr> },
    SameType { lhs: TypeExpr, rhs: TypeExpr },
}

#[derive(Clone, Debug)]
pub struct Param {
    pub id: NodeId,
    /// External label; `None` when elided with `_`.
    pub label: Option<String>,
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expr>,
    pub variadic: bool,
    pub inout: bool,
    pub autoclosure: bool,
    pub escaping: bool,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    pub generics: Vec<GenericParamDecl>,
    pub params: Vec<Param>,
    pub result: Option<TypeExpr>,
    pub throws: bool,
    pub where_clause: Vec<WhereRequirement>,
    pub body: Option<Block>,
}

#[derive(Clone, Debug)]
pub struct InitDecl {
    pub failable: bool,
    pub generics: Vec<GenericParamDecl>,
    pub params: Vec<Param>,
    pub throws: bool,
    pub where_clause: Vec<WhereRequirement>,
    pub body: Option<Block>,
}

#[derive(Clone, Debug)]
pub struct SubscriptDecl {
    pub params: Vec<Param>,
    pub result: TypeExpr,
    pub accessors: Accessors,
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub is_let: bool,
    pub pattern: Pattern,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub accessors: Accessors,
}

impl VarDecl {
    pub fn simple_name(&self) -> Option<&str> {
        match &self.pattern.kind {
            PatternKind::Binding { name, .. } => Some(name),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccessorBody {
    /// Explicit parameter name for `set(v)`/`willSet(v)`/`didSet(v)`.
    pub param: Option<String>,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub enum Accessors {
    /// Plain stored property.
    Stored,
    Computed {
        get: Block,
        set: Option<AccessorBody>,
    },
    Observed {
        will_set: Option<AccessorBody>,
        did_set: Option<AccessorBody>,
    },
    /// Protocol requirement `{ get }` / `{ get set }`.
    Requirement { settable: bool },
}

#[derive(Clone, Debug)]
pub struct NominalDecl {
    pub name: String,
    pub name_span: Span,
    pub generics: Vec<GenericParamDecl>,
    pub inherits: Vec<TypeExpr>,
    pub where_clause: Vec<WhereRequirement>,
    pub members: Vec<Item>,
}

#[derive(Clone, Debug)]
pub struct EnumElementDecl {
    pub id: NodeId,
    pub name: String,
    pub payload: Option<Vec<TupleTypeElem>>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct EnumCaseDecl {
    pub elements: Vec<EnumElementDecl>,
}

#[derive(Clone, Debug)]
pub struct ExtensionDecl {
    pub extended: TypeExpr,
    pub inherits: Vec<TypeExpr>,
    pub where_clause: Vec<WhereRequirement>,
    pub members: Vec<Item>,
}

#[derive(Clone, Debug)]
pub struct TypeAliasDecl {
    pub name: String,
    pub generics: Vec<GenericParamDecl>,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug)]
pub struct AssocTypeDecl {
    pub name: String,
    pub bounds: Vec<TypeExpr>,
    pub default: Option<TypeExpr>,
    pub where_clause: Vec<WhereRequirement>,
}

// -- Types --

#[derive(Clone, Debug)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct TypeSegment {
    pub name: String,
    pub args: Vec<TypeExpr>,
}

#[derive(Clone, Debug)]
pub struct TupleTypeElem {
    pub label: Option<String>,
    pub ty: TypeExpr,
}

#[derive(Clone, Debug)]
pub enum TypeExprKind {
    /// `A`, `A<B>`, `T.Assoc`, `Outer.Inner<X>`
    Path(Vec<TypeSegment>),
    SelfType,
    Tuple(Vec<TupleTypeElem>),
    Function {
        params: Vec<TypeExpr>,
        result: Box<TypeExpr>,
        throws: bool,
    },
    Optional(Box<TypeExpr>),
    Composition(Vec<TypeExpr>),
    Metatype(Box<TypeExpr>),
    InOut(Box<TypeExpr>),
    Error,
}

// -- Statements --

#[derive(Clone, Debug)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Condition {
    Expr(Expr),
    /// `let x = e` / `var x: T = e`
    OptionalBinding {
        id: NodeId,
        is_let: bool,
        name: String,
        ty: Option<TypeExpr>,
        init: Expr,
        span: Span,
    },
    /// `case pattern = e`
    Case { pattern: Pattern, init: Expr },
}

#[derive(Clone, Debug)]
pub struct SwitchCase {
    pub id: NodeId,
    /// Empty for `default:`.
    pub patterns: Vec<Pattern>,
    pub guard: Option<Expr>,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CatchClause {
    pub id: NodeId,
    pub binding: Option<String>,
    pub body: Block,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    /// Local declaration.
    Item(Box<Item>),
    Expr(Expr),
    Return(Option<Expr>),
    Break,
    Continue,
    Throw(Expr),
    Defer(Block),
    If {
        conds: Vec<Condition>,
        then_block: Block,
        else_branch: Option<Box<Stmt>>,
    },
    Guard {
        conds: Vec<Condition>,
        else_block: Block,
    },
    While {
        conds: Vec<Condition>,
        body: Block,
    },
    ForIn {
        pattern: Pattern,
        seq: Expr,
        body: Block,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
    },
    Do {
        body: Block,
        catches: Vec<CatchClause>,
    },
    Block(Block),
    Error,
}

// -- Patterns --

#[derive(Clone, Debug)]
pub struct Pattern {
    pub id: NodeId,
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum PatternKind {
    Wildcard,
    Binding { name: String, is_let: bool },
    Tuple(Vec<Pattern>),
    /// `.some(x)`, `Shape.circle(let r)`, `.none`
    EnumCase {
        parent: Option<TypeExpr>,
        name: String,
        payload: Option<Vec<Pattern>>,
    },
    /// `x?`
    OptionalSome(Box<Pattern>),
    /// Literal or expression pattern matched with `==`.
    Expr(Box<Expr>),
    /// Cursor inside a pattern.
    CodeCompletion,
    Error,
}

// -- Expressions --

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Arg {
    pub label: Option<String>,
    pub label_span: Option<Span>,
    pub expr: Expr,
    pub trailing: bool,
}

#[derive(Clone, Debug)]
pub struct TupleElemExpr {
    pub label: Option<String>,
    pub expr: Expr,
}

#[derive(Clone, Debug)]
pub struct ClosureParam {
    pub id: NodeId,
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ClosureExpr {
    pub params: Vec<ClosureParam>,
    pub result: Option<TypeExpr>,
    pub throws: bool,
    pub body: Block,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    NilCoalesce,
    HalfOpenRange,
    ClosedRange,
}

impl BinaryOp {
    /// Name of the global operator function implementing this operator.
    pub fn func_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::NilCoalesce => "??",
            BinaryOp::HalfOpenRange => "..<",
            BinaryOp::ClosedRange => "...",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryKind {
    Plain,
    Optional,
    Force,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    IntLit(u64),
    FloatLit(String),
    StringLit(String),
    BoolLit(bool),
    NilLit,
    Ident(String),
    SelfRef,
    /// `super`, only valid as the base of a member access.
    SuperRef,
    Member {
        base: Box<Expr>,
        name: String,
        name_span: Span,
    },
    /// `.name` with the base inferred from context.
    ImplicitMember(String),
    TupleIndex {
        base: Box<Expr>,
        index: usize,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Subscript {
        base: Box<Expr>,
        args: Vec<Arg>,
    },
    Closure(Box<ClosureExpr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    ForceUnwrap(Box<Expr>),
    /// `e?` inside an optional chain.
    BindOptional(Box<Expr>),
    /// Root of an optional chain containing at least one `BindOptional`.
    OptionalEval(Box<Expr>),
    Paren(Box<Expr>),
    Tuple(Vec<TupleElemExpr>),
    Try {
        kind: TryKind,
        expr: Box<Expr>,
    },
    As {
        expr: Box<Expr>,
        ty: TypeExpr,
    },
    /// `&x` for inout arguments.
    InOut(Box<Expr>),
    /// Cursor position of a completion request.
    CodeCompletion,
    /// `base.<cursor>`
    MemberCompletion(Box<Expr>),
    /// `.<cursor>` with the base inferred from context.
    ImplicitMemberCompletion,
    Error,
}

impl Expr {
    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }
}
