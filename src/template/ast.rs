use serde_json::Value;

/// A compiled template body
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output {
        expr: Expr,
        escape: bool,
        offset: usize,
    },
    If {
        cond: Expr,
        then: Vec<Node>,
        otherwise: Vec<Node>,
        offset: usize,
    },
    For {
        kind: LoopKind,
        binding: String,
        index: Option<String>,
        iterable: Expr,
        body: Vec<Node>,
        offset: usize,
    },
    Let {
        name: String,
        value: Expr,
        offset: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    /// `for (x of xs)` and `xs.forEach(...)`: values
    Of,
    /// `for (k in obj)`: keys
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Undefined,
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Include(Box<Expr>, Option<Box<Expr>>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Expr {
    /// Dotted source-like name for error messages
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident(name) => name.clone(),
            Expr::Member(target, name) => format!("{}.{}", target.describe(), name),
            Expr::Index(target, index) => match index.as_ref() {
                Expr::Literal(Value::String(key)) => format!("{}['{}']", target.describe(), key),
                Expr::Literal(value) => format!("{}[{}]", target.describe(), value),
                _ => format!("{}[...]", target.describe()),
            },
            Expr::Call { target, method, .. } => format!("{}.{}()", target.describe(), method),
            Expr::Include(..) => "include()".to_string(),
            Expr::Literal(value) => value.to_string(),
            Expr::Undefined => "undefined".to_string(),
            _ => "(expression)".to_string(),
        }
    }
}
