//! Abstract syntax for a parsed BASIC program: one [`Line`] per numbered
//! source line, each holding one or more colon-separated [`Statement`]s.

/// A fully parsed program line.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: u32,
    pub statements: Vec<Statement>,
}

/// A variable reference: a name (already truncated/upper-cased by the
/// parser per the two-significant-character rule) plus an optional type
/// suffix and subscript list for array elements.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub name: String,
    pub suffix: TypeSuffix,
    pub subscripts: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeSuffix {
    Numeric,
    StringDollar,
    IntegerPercent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Var(VarRef),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call(Builtin, Vec<Expr>),
    FnCall(String, Box<Expr>),
    Group(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Abs,
    Sgn,
    Int,
    Sqr,
    Sin,
    Cos,
    Tan,
    Atn,
    Log,
    Exp,
    Rnd,
    Len,
    Val,
    Str,
    Chr,
    Asc,
    Left,
    Right,
    Mid,
    Fre,
    Pos,
    Peek,
    Spc,
    Tab,
}

/// One statement. `Rem` carries its comment text for round-tripping; `On`
/// distinguishes `GOTO` from `GOSUB` dispatch via `is_gosub`.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Print {
        items: Vec<PrintItem>,
    },
    Input {
        prompt: Option<String>,
        vars: Vec<VarRef>,
    },
    Get {
        var: VarRef,
    },
    Let {
        target: VarRef,
        value: Expr,
    },
    If {
        cond: Expr,
        then_branch: Vec<Statement>,
        /// Bare line-number form (`IF X THEN 100`) desugars to `GOTO 100`
        /// inside `then_branch` at parse time, so this variant doesn't need
        /// a separate "then-goto" case.
        else_branch: Vec<Statement>,
    },
    For {
        var: VarRef,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
    },
    Next {
        vars: Vec<VarRef>,
    },
    Goto(u32),
    Gosub(u32),
    Return,
    On {
        selector: Expr,
        targets: Vec<u32>,
        is_gosub: bool,
    },
    Dim {
        vars: Vec<VarRef>,
    },
    Data {
        values: Vec<String>,
    },
    Read {
        vars: Vec<VarRef>,
    },
    /// `RESTORE` rewinds the DATA cursor to the start; `RESTORE n` rewinds
    /// it to the first DATA item on or after line `n`.
    Restore(Option<u32>),
    End,
    Stop,
    Rem(String),
    DefFn {
        name: String,
        param: String,
        body: Expr,
    },
    Home,
    Clear,
    Htab(Expr),
    Vtab(Expr),
    Text,
    Gr,
    Hgr,
    Hgr2,
    Color(Expr),
    Hcolor(Expr),
    Plot {
        x: Expr,
        y: Expr,
    },
    Hplot {
        points: Vec<(Expr, Expr)>,
    },
    Inverse,
    Flash,
    Normal,
    Sleep(Expr),
    Poke {
        address: Expr,
        value: Expr,
    },
    Call(Expr),
    Himem(Expr),
    Lomem(Expr),
    /// Shape-table drawing; `at` is the optional `AT x,y` origin override.
    Draw {
        shape: Expr,
        at: Option<(Expr, Expr)>,
    },
    Xdraw {
        shape: Expr,
        at: Option<(Expr, Expr)>,
    },
    /// `&` dispatches to a vendor-specific machine-language patch vector;
    /// we keep the trailing source text verbatim since its meaning is
    /// entirely up to whatever routine is patched in at runtime.
    Ampersand(String),
    /// A line that failed to parse. Kept (rather than dropped) so the
    /// interpreter can report `?SYNTAX ERROR` against the right line
    /// number only once the line is actually executed, matching
    /// Applesoft's load-time tolerance for unreachable garbage lines.
    Unparsed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrintItem {
    Expr(Expr),
    /// `,` advances to the next 16-column print zone.
    Comma,
    /// `;` suppresses the separator entirely (no space, no newline).
    Semicolon,
}
