use std::fmt;

use serde::{Deserialize, Serialize};

/// Byte range within a formula string (`end` is exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    #[must_use]
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn add_offset(self, delta: usize) -> Self {
        Self {
            start: self.start.saturating_add(delta),
            end: self.end.saturating_add(delta),
        }
    }

    /// Smallest span covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[must_use]
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A grammar violation found by the parser.
///
/// `source_text` is the formula as reconstructed from the token values the parser was given and
/// `offset` is the byte offset within it where parsing failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub message: String,
    pub source_text: String,
    pub offset: usize,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, source_text: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            source_text: source_text.into(),
            offset,
        }
    }

    /// Render the failing source with a caret under the offending position.
    #[must_use]
    pub fn pointer(&self) -> String {
        let col = self.source_text[..self.offset.min(self.source_text.len())]
            .chars()
            .count();
        format!("{}\n{}^", self.source_text, " ".repeat(col))
    }
}

/// What a [`ReferenceNode`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Range,
    Beam,
    Name,
    Table,
}

/// Discriminant of [`Node`], with the names used in serialized trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Unary,
    Binary,
    Reference,
    Literal,
    ErrorLiteral,
    Call,
    Lambda,
    Let,
    LetDeclarator,
    Array,
    Identifier,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Unary => "UnaryExpression",
            NodeKind::Binary => "BinaryExpression",
            NodeKind::Reference => "ReferenceIdentifier",
            NodeKind::Literal => "Literal",
            NodeKind::ErrorLiteral => "ErrorLiteral",
            NodeKind::Call => "CallExpression",
            NodeKind::Lambda => "LambdaExpression",
            NodeKind::Let => "LetExpression",
            NodeKind::LetDeclarator => "LetDeclarator",
            NodeKind::Array => "ArrayExpression",
            NodeKind::Identifier => "Identifier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    /// Prefix `@` (implicit intersection).
    #[serde(rename = "@")]
    ImplicitIntersection,
    #[serde(rename = "%")]
    Percent,
    /// Postfix `#` (spill range).
    #[serde(rename = "#")]
    SpillRange,
}

impl UnaryOp {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::ImplicitIntersection => "@",
            UnaryOp::Percent => "%",
            UnaryOp::SpillRange => "#",
        }
    }

    #[must_use]
    pub const fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::Percent | UnaryOp::SpillRange)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = ":")]
    Range,
    /// `.:` (trim leading blanks).
    #[serde(rename = ".:")]
    TrimHead,
    /// `:.` (trim trailing blanks).
    #[serde(rename = ":.")]
    TrimTail,
    #[serde(rename = ".:.")]
    TrimBoth,
    #[serde(rename = " ")]
    Intersect,
    #[serde(rename = ",")]
    Union,
    #[serde(rename = "^")]
    Pow,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "&")]
    Concat,
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
}

impl BinaryOp {
    pub(crate) fn from_operator(op: &str) -> Option<Self> {
        Some(match op {
            ":" => BinaryOp::Range,
            ".:" => BinaryOp::TrimHead,
            ":." => BinaryOp::TrimTail,
            ".:." => BinaryOp::TrimBoth,
            "," => BinaryOp::Union,
            "^" => BinaryOp::Pow,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "&" => BinaryOp::Concat,
            "=" => BinaryOp::Eq,
            "<>" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Range => ":",
            BinaryOp::TrimHead => ".:",
            BinaryOp::TrimTail => ":.",
            BinaryOp::TrimBoth => ".:.",
            BinaryOp::Intersect => " ",
            BinaryOp::Union => ",",
            BinaryOp::Pow => "^",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Concat => "&",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    /// Left binding power used by the parser (the comma's power is contextual, see the parser).
    #[must_use]
    pub const fn binding_power(self) -> u8 {
        match self {
            BinaryOp::Range
            | BinaryOp::TrimHead
            | BinaryOp::TrimTail
            | BinaryOp::TrimBoth
            | BinaryOp::Intersect
            | BinaryOp::Union => 80,
            BinaryOp::Pow => 50,
            BinaryOp::Mul | BinaryOp::Div => 40,
            BinaryOp::Add | BinaryOp::Sub => 30,
            BinaryOp::Concat => 20,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => 10,
        }
    }

    /// Operators whose operands must be reference-shaped.
    #[must_use]
    pub const fn is_reference_operator(self) -> bool {
        matches!(
            self,
            BinaryOp::Range
                | BinaryOp::TrimHead
                | BinaryOp::TrimTail
                | BinaryOp::TrimBoth
                | BinaryOp::Intersect
                | BinaryOp::Union
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Number(f64),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub operator: UnaryOp,
    pub argument: Box<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub operator: BinaryOp,
    pub left: Box<Node>,
    pub right: Box<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceNode {
    /// Full reference text, including any sheet/workbook prefix.
    pub value: String,
    pub kind: RefKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralNode {
    pub value: LiteralValue,
    /// The literal as written (strings keep their quotes and escapes).
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLiteralNode {
    /// Upper-cased error name, e.g. `#REF!`.
    pub value: String,
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    /// An [`Identifier`] for plain function calls, otherwise the expression being invoked
    /// (e.g. a `LAMBDA`).
    pub callee: Box<Node>,
    /// `None` marks an omitted argument, as in `IF(A1,,2)`.
    pub arguments: Vec<Option<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Vec<Identifier>,
    pub body: Option<Box<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetDeclarator {
    pub id: Identifier,
    pub init: Option<Box<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetExpr {
    pub declarations: Vec<LetDeclarator>,
    pub body: Option<Box<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayExpr {
    pub elements: Vec<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Node {
    #[serde(rename = "UnaryExpression")]
    Unary(UnaryExpr),
    #[serde(rename = "BinaryExpression")]
    Binary(BinaryExpr),
    #[serde(rename = "ReferenceIdentifier")]
    Reference(ReferenceNode),
    Literal(LiteralNode),
    ErrorLiteral(ErrorLiteralNode),
    #[serde(rename = "CallExpression")]
    Call(CallExpr),
    #[serde(rename = "LambdaExpression")]
    Lambda(LambdaExpr),
    #[serde(rename = "LetExpression")]
    Let(LetExpr),
    #[serde(rename = "ArrayExpression")]
    Array(ArrayExpr),
    Identifier(Identifier),
}

impl Node {
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Unary(_) => NodeKind::Unary,
            Node::Binary(_) => NodeKind::Binary,
            Node::Reference(_) => NodeKind::Reference,
            Node::Literal(_) => NodeKind::Literal,
            Node::ErrorLiteral(_) => NodeKind::ErrorLiteral,
            Node::Call(_) => NodeKind::Call,
            Node::Lambda(_) => NodeKind::Lambda,
            Node::Let(_) => NodeKind::Let,
            Node::Array(_) => NodeKind::Array,
            Node::Identifier(_) => NodeKind::Identifier,
        }
    }

    #[must_use]
    pub fn loc(&self) -> Option<Span> {
        match self {
            Node::Unary(n) => n.loc,
            Node::Binary(n) => n.loc,
            Node::Reference(n) => n.loc,
            Node::Literal(n) => n.loc,
            Node::ErrorLiteral(n) => n.loc,
            Node::Call(n) => n.loc,
            Node::Lambda(n) => n.loc,
            Node::Let(n) => n.loc,
            Node::Array(n) => n.loc,
            Node::Identifier(n) => n.loc,
        }
    }

    /// Callee name of a plain function call (`SUM` in `SUM(A1)`).
    #[must_use]
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Node::Call(call) => match call.callee.as_ref() {
                Node::Identifier(id) => Some(&id.name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Direct children in source order.
    #[must_use]
    pub fn children(&self) -> Vec<&Node> {
        match self {
            Node::Unary(n) => vec![n.argument.as_ref()],
            Node::Binary(n) => vec![n.left.as_ref(), n.right.as_ref()],
            Node::Call(n) => std::iter::once(n.callee.as_ref())
                .chain(n.arguments.iter().flatten())
                .collect(),
            Node::Lambda(n) => n.body.iter().map(|b| b.as_ref()).collect(),
            Node::Let(n) => n
                .declarations
                .iter()
                .filter_map(|d| d.init.as_deref())
                .chain(n.body.iter().map(|b| b.as_ref()))
                .collect(),
            Node::Array(n) => n.elements.iter().flatten().collect(),
            Node::Reference(_) | Node::Literal(_) | Node::ErrorLiteral(_) | Node::Identifier(_) => {
                Vec::new()
            }
        }
    }

    /// Drop every `loc` in the tree.
    pub(crate) fn strip_locations(&mut self) {
        match self {
            Node::Unary(n) => {
                n.loc = None;
                n.argument.strip_locations();
            }
            Node::Binary(n) => {
                n.loc = None;
                n.left.strip_locations();
                n.right.strip_locations();
            }
            Node::Reference(n) => n.loc = None,
            Node::Literal(n) => n.loc = None,
            Node::ErrorLiteral(n) => n.loc = None,
            Node::Identifier(n) => n.loc = None,
            Node::Call(n) => {
                n.loc = None;
                n.callee.strip_locations();
                for arg in n.arguments.iter_mut().flatten() {
                    arg.strip_locations();
                }
            }
            Node::Lambda(n) => {
                n.loc = None;
                for p in &mut n.params {
                    p.loc = None;
                }
                if let Some(body) = n.body.as_mut() {
                    body.strip_locations();
                }
            }
            Node::Let(n) => {
                n.loc = None;
                for decl in &mut n.declarations {
                    decl.loc = None;
                    decl.id.loc = None;
                    if let Some(init) = decl.init.as_mut() {
                        init.strip_locations();
                    }
                }
                if let Some(body) = n.body.as_mut() {
                    body.strip_locations();
                }
            }
            Node::Array(n) => {
                n.loc = None;
                for cell in n.elements.iter_mut().flatten() {
                    cell.strip_locations();
                }
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Node::Binary(b) => b.operator.binding_power(),
            Node::Unary(_) => 70,
            Node::Call(_) => 90,
            _ => 100,
        }
    }

    fn fmt_into(&self, out: &mut String, parent_prec: Option<u8>) {
        let my_prec = self.precedence();
        let needs_parens = parent_prec.is_some_and(|p| my_prec < p);
        if needs_parens {
            out.push('(');
        }
        match self {
            Node::Literal(lit) => out.push_str(&lit.raw),
            Node::ErrorLiteral(err) => out.push_str(&err.value),
            Node::Reference(r) => out.push_str(&r.value),
            Node::Identifier(id) => out.push_str(&id.name),
            Node::Unary(u) if u.operator.is_postfix() => {
                u.argument.fmt_into(out, Some(my_prec + 1));
                out.push_str(u.operator.as_str());
            }
            Node::Unary(u) => {
                out.push_str(u.operator.as_str());
                u.argument.fmt_into(out, Some(my_prec));
            }
            Node::Binary(b) => {
                b.left.fmt_into(out, Some(my_prec));
                out.push_str(b.operator.as_str());
                // Left associative: an equal-precedence right operand needs parentheses.
                b.right.fmt_into(out, Some(my_prec + 1));
            }
            Node::Call(call) => {
                call.callee.fmt_into(out, Some(my_prec));
                out.push('(');
                for (i, arg) in call.arguments.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    if let Some(arg) = arg {
                        fmt_argument(arg, out);
                    }
                }
                out.push(')');
            }
            Node::Lambda(lambda) => {
                out.push_str("LAMBDA(");
                for (i, p) in lambda.params.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&p.name);
                }
                if !lambda.params.is_empty() {
                    out.push(',');
                }
                if let Some(body) = &lambda.body {
                    fmt_argument(body, out);
                }
                out.push(')');
            }
            Node::Let(let_expr) => {
                out.push_str("LET(");
                for decl in &let_expr.declarations {
                    out.push_str(&decl.id.name);
                    out.push(',');
                    if let Some(init) = &decl.init {
                        fmt_argument(init, out);
                    }
                    out.push(',');
                }
                if let Some(body) = &let_expr.body {
                    fmt_argument(body, out);
                }
                out.push(')');
            }
            Node::Array(arr) => {
                out.push('{');
                for (r, row) in arr.elements.iter().enumerate() {
                    if r > 0 {
                        out.push(';');
                    }
                    for (c, cell) in row.iter().enumerate() {
                        if c > 0 {
                            out.push(',');
                        }
                        cell.fmt_into(out, None);
                    }
                }
                out.push('}');
            }
        }
        if needs_parens {
            out.push(')');
        }
    }

    fn contains_union(&self) -> bool {
        match self {
            Node::Binary(b) => {
                b.operator == BinaryOp::Union || b.left.contains_union() || b.right.contains_union()
            }
            Node::Unary(u) => u.argument.contains_union(),
            _ => false,
        }
    }
}

// A union inside an argument list must be parenthesized or it reads as two arguments.
fn fmt_argument(arg: &Node, out: &mut String) {
    if arg.contains_union() {
        out.push('(');
        arg.fmt_into(out, None);
        out.push(')');
    } else {
        arg.fmt_into(out, None);
    }
}

/// Renders the tree back to formula text (without a leading `=`).
///
/// Spelling of literals and references is kept; whitespace is not, and parentheses are only
/// emitted where precedence requires them.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.fmt_into(&mut out, None);
        f.write_str(&out)
    }
}
