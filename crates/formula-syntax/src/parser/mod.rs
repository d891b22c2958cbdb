//! Pratt parser producing [`Node`] trees from formula tokens.

use serde::{Deserialize, Serialize};

use crate::ast::{
    ArrayExpr, BinaryExpr, BinaryOp, CallExpr, ErrorLiteralNode, Identifier, LambdaExpr,
    LetDeclarator, LetExpr, LiteralNode, LiteralValue, Node, ParseError, RefKind, ReferenceNode,
    Span, UnaryExpr, UnaryOp,
};
use crate::lexer::{tokenize, TokenizeOptions};
use crate::token::{join_values, next_significant, Token, TokenKind};

/// Functions whose result is a reference, so they may be operands of `:`, intersection and union.
pub const DEFAULT_REFERENCE_FUNCTIONS: &[&str] = &[
    "ANCHORARRAY",
    "CHOOSE",
    "DROP",
    "IF",
    "IFS",
    "INDEX",
    "INDIRECT",
    "LAMBDA",
    "LET",
    "OFFSET",
    "REDUCE",
    "SINGLE",
    "SWITCH",
    "TAKE",
    "TRIMRANGE",
    "XLOOKUP",
];

const BP_REFERENCE: u8 = 80;
const BP_PREFIX: u8 = 70;
const BP_POSTFIX: u8 = 70;
const BP_CALL: u8 = 90;

/// Guards the recursive descent against pathological nesting.
const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    pub allow_ternary: bool,
    pub negative_numbers: bool,
    /// Allow references inside array literals (`{A1,B1}`).
    pub permit_array_ranges: bool,
    /// Allow function calls inside array literals.
    pub permit_array_calls: bool,
    /// Treat every function call as possibly returning a reference.
    pub loose_ref_calls: bool,
    pub r1c1: bool,
    pub xlsx: bool,
    pub with_location: bool,
    /// Functions treated as returning references (compared case-insensitively, `_xlfn.` ignored).
    pub reference_functions: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_ternary: false,
            negative_numbers: true,
            permit_array_ranges: false,
            permit_array_calls: false,
            loose_ref_calls: false,
            r1c1: false,
            xlsx: false,
            with_location: true,
            reference_functions: DEFAULT_REFERENCE_FUNCTIONS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
        }
    }
}

/// Tokenize (with reference merging) and parse a formula.
pub fn parse(formula: &str, options: &ParseOptions) -> Result<Node, ParseError> {
    let tokens = tokenize(
        formula,
        &TokenizeOptions {
            allow_ternary: options.allow_ternary,
            negative_numbers: options.negative_numbers,
            r1c1: options.r1c1,
            merge_refs: true,
            xlsx: options.xlsx,
            with_location: true,
        },
    );
    parse_tokens(&tokens, options)
}

/// Parse an already tokenized formula. Token locations are recomputed from the token values.
pub fn parse_tokens(tokens: &[Token], options: &ParseOptions) -> Result<Node, ParseError> {
    let mut node = Parser::new(tokens, options)
        .parse_formula()
        .inspect_err(|err| log::debug!("formula parse failed: {err}"))?;
    if !options.with_location {
        node.strip_locations();
    }
    Ok(node)
}

fn strip_xlfn(name: &str) -> &str {
    match name.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("_xlfn.") => &name[6..],
        _ => name,
    }
}

fn join(a: Option<Span>, b: Option<Span>) -> Option<Span> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.cover(b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Postfix(UnaryOp),
    Call,
    /// Whitespace between two references.
    Intersect,
}

/// A call argument and the token index where it starts.
struct Arg {
    node: Option<Node>,
    start: usize,
}

struct Parser<'a> {
    tokens: &'a [Token],
    spans: Vec<Span>,
    source: String,
    pos: usize,
    opts: &'a ParseOptions,
    /// Binding power of `,`: union inside parentheses and at the top level, a separator inside
    /// calls and arrays.
    comma_bp: u8,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], opts: &'a ParseOptions) -> Self {
        let mut spans = Vec::with_capacity(tokens.len());
        let mut offset = 0;
        for token in tokens {
            let end = offset + token.value.len();
            spans.push(Span::new(offset, end));
            offset = end;
        }
        Self {
            tokens,
            spans,
            source: join_values(tokens),
            pos: 0,
            opts,
            comma_bp: BP_REFERENCE,
            depth: 0,
        }
    }

    fn parse_formula(mut self) -> Result<Node, ParseError> {
        if self.tokens.first().is_some_and(Token::is_fx_prefix) {
            self.pos = 1;
        }
        let node = self.parse_expression(0)?;
        self.skip_trivia();
        if self.pos < self.tokens.len() {
            return Err(self.unexpected(self.pos));
        }
        Ok(node)
    }

    fn skip_trivia(&mut self) {
        while self.tokens.get(self.pos).is_some_and(Token::is_whitespace) {
            self.pos += 1;
        }
    }

    /// `idx` itself, or the first non-whitespace token after it.
    fn significant_from(&self, idx: usize) -> Option<usize> {
        match self.tokens.get(idx) {
            Some(t) if t.is_whitespace() => next_significant(self.tokens, idx),
            Some(_) => Some(idx),
            None => None,
        }
    }

    fn peek_op(&self, op: &str) -> bool {
        self.tokens.get(self.pos).is_some_and(|t| t.is_operator(op))
    }

    fn span(&self, idx: usize) -> Option<Span> {
        self.spans.get(idx).copied()
    }

    fn error_at(&self, idx: usize, message: impl Into<String>) -> ParseError {
        let offset = self.spans.get(idx).map_or(self.source.len(), |s| s.start);
        ParseError::new(message, self.source.clone(), offset)
    }

    fn unexpected(&self, idx: usize) -> ParseError {
        let message = match self.tokens.get(idx) {
            None => "Unexpected end of formula".to_string(),
            Some(t) if t.kind == TokenKind::Unknown => format!("Unrecognized input `{}`", t.value),
            Some(t) if t.unterminated => "Unterminated string literal".to_string(),
            Some(t) => format!("Unexpected `{}`", t.value),
        };
        self.error_at(idx, message)
    }

    fn is_reference_function(&self, name: &str) -> bool {
        let name = strip_xlfn(name);
        self.opts
            .reference_functions
            .iter()
            .any(|f| f.eq_ignore_ascii_case(name))
    }

    /// Nodes that can stand where a reference is required.
    fn is_reference_node(&self, node: &Node) -> bool {
        match node {
            Node::Reference(_) => true,
            Node::ErrorLiteral(e) => e.value == "#REF!",
            Node::Binary(b) => b.operator.is_reference_operator(),
            Node::Unary(u) => match u.operator {
                UnaryOp::SpillRange => true,
                UnaryOp::ImplicitIntersection => self.is_reference_node(&u.argument),
                _ => false,
            },
            Node::Call(call) => {
                self.opts.loose_ref_calls
                    || node
                        .callee_name()
                        .is_some_and(|name| self.is_reference_function(name))
                    || matches!(call.callee.as_ref(), Node::Lambda(_) | Node::Let(_))
                        && self.is_reference_function("LAMBDA")
            }
            Node::Lambda(_) | Node::Let(_) => self.opts.loose_ref_calls,
            _ => false,
        }
    }

    /// Token that can begin the right operand of a whitespace intersection.
    fn starts_reference(&self, idx: usize) -> bool {
        let t = &self.tokens[idx];
        t.is_reference()
            || (t.is_error() && t.value.eq_ignore_ascii_case("#REF!"))
            || t.is_operator("(")
            || (t.is_function() && (self.opts.loose_ref_calls || self.is_reference_function(&t.value)))
    }

    fn parse_expression(&mut self, min_bp: u8) -> Result<Node, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error_at(
                self.pos,
                format!("Expression nesting exceeds {MAX_NESTING} levels"),
            ));
        }
        self.depth += 1;
        let result = self.parse_expression_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expression_inner(&mut self, min_bp: u8) -> Result<Node, ParseError> {
        self.skip_trivia();
        let mut lhs = self.parse_prefix()?;
        while let Some((infix, idx, bp)) = self.peek_infix(&lhs) {
            if bp <= min_bp {
                break;
            }
            lhs = self.parse_infix(infix, idx, bp, lhs)?;
        }
        Ok(lhs)
    }

    /// Look past whitespace for an operator that continues `lhs`. Returns the operator, the index
    /// of its token, and its binding power.
    fn peek_infix(&self, lhs: &Node) -> Option<(Infix, usize, u8)> {
        let next = self.significant_from(self.pos)?;
        let had_space = next > self.pos;
        if had_space && self.is_reference_node(lhs) && self.starts_reference(next) {
            return Some((Infix::Intersect, self.pos, BP_REFERENCE));
        }

        let token = &self.tokens[next];
        if token.kind != TokenKind::Operator {
            return None;
        }
        let (infix, bp) = match token.value.as_str() {
            "(" if !had_space => (Infix::Call, BP_CALL),
            "%" => (Infix::Postfix(UnaryOp::Percent), BP_POSTFIX),
            "#" => (Infix::Postfix(UnaryOp::SpillRange), BP_POSTFIX),
            "," => (Infix::Binary(BinaryOp::Union), self.comma_bp),
            op => {
                let op = BinaryOp::from_operator(op)?;
                (Infix::Binary(op), op.binding_power())
            }
        };
        Some((infix, next, bp))
    }

    fn parse_infix(&mut self, infix: Infix, idx: usize, bp: u8, lhs: Node) -> Result<Node, ParseError> {
        let op = match infix {
            Infix::Postfix(op) => {
                self.pos = idx + 1;
                let loc = join(lhs.loc(), self.span(idx));
                return Ok(Node::Unary(UnaryExpr {
                    operator: op,
                    argument: Box::new(lhs),
                    loc,
                }));
            }
            Infix::Call => return self.parse_call(lhs, idx),
            Infix::Intersect => {
                // The operator is the whitespace itself; the operand parse skips it.
                self.pos = idx;
                BinaryOp::Intersect
            }
            Infix::Binary(op) => {
                self.pos = idx + 1;
                op
            }
        };

        if op.is_reference_operator() && !self.is_reference_node(&lhs) {
            return Err(self.reference_operand_error(op, idx));
        }
        let rhs_start = self.significant_from(self.pos).unwrap_or(self.tokens.len());
        let rhs = self.parse_expression(bp)?;
        if op.is_reference_operator() && !self.is_reference_node(&rhs) {
            return Err(self.reference_operand_error(op, rhs_start));
        }
        let loc = join(lhs.loc(), rhs.loc());
        Ok(Node::Binary(BinaryExpr {
            operator: op,
            left: Box::new(lhs),
            right: Box::new(rhs),
            loc,
        }))
    }

    fn reference_operand_error(&self, op: BinaryOp, idx: usize) -> ParseError {
        let what = match op {
            BinaryOp::Intersect => "intersection".to_string(),
            BinaryOp::Union => "union".to_string(),
            op => format!("`{}`", op.as_str()),
        };
        self.error_at(idx, format!("Operands of {what} must be references"))
    }

    fn parse_prefix(&mut self) -> Result<Node, ParseError> {
        let idx = self.pos;
        let tokens = self.tokens;
        let Some(token) = tokens.get(idx) else {
            return Err(self.unexpected(idx));
        };
        let loc = self.span(idx);
        let reference = |kind: RefKind| {
            Node::Reference(ReferenceNode {
                value: token.value.clone(),
                kind,
                loc,
            })
        };

        let node = match token.kind {
            TokenKind::Number => {
                let value: f64 = token
                    .value
                    .parse()
                    .map_err(|_| self.error_at(idx, format!("Invalid number `{}`", token.value)))?;
                Node::Literal(LiteralNode {
                    value: LiteralValue::Number(value),
                    raw: token.value.clone(),
                    loc,
                })
            }
            TokenKind::String if !token.unterminated => {
                let inner = token
                    .value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(&token.value);
                Node::Literal(LiteralNode {
                    value: LiteralValue::String(inner.replace("\"\"", "\"")),
                    raw: token.value.clone(),
                    loc,
                })
            }
            TokenKind::Boolean => Node::Literal(LiteralNode {
                value: LiteralValue::Bool(token.value.eq_ignore_ascii_case("TRUE")),
                raw: token.value.clone(),
                loc,
            }),
            TokenKind::Error => Node::ErrorLiteral(ErrorLiteralNode {
                value: token.value.to_ascii_uppercase(),
                raw: token.value.clone(),
                loc,
            }),
            TokenKind::Range | TokenKind::RangeTernary => reference(RefKind::Range),
            TokenKind::RangeBeam => reference(RefKind::Beam),
            TokenKind::RangeNamed => reference(RefKind::Name),
            TokenKind::Structured => reference(RefKind::Table),
            TokenKind::Function => return self.parse_function_call(idx),
            TokenKind::Operator => match token.value.as_str() {
                "(" => return self.parse_group(idx),
                "{" => return self.parse_array(idx),
                "+" => return self.parse_unary(idx, UnaryOp::Plus),
                "-" => return self.parse_unary(idx, UnaryOp::Minus),
                "@" => return self.parse_unary(idx, UnaryOp::ImplicitIntersection),
                _ => return Err(self.unexpected(idx)),
            },
            _ => return Err(self.unexpected(idx)),
        };
        self.pos = idx + 1;
        Ok(node)
    }

    fn parse_unary(&mut self, idx: usize, op: UnaryOp) -> Result<Node, ParseError> {
        self.pos = idx + 1;
        let argument = self.parse_expression(BP_PREFIX)?;
        let loc = join(self.span(idx), argument.loc());
        Ok(Node::Unary(UnaryExpr {
            operator: op,
            argument: Box::new(argument),
            loc,
        }))
    }

    /// Consume a closing bracket, returning its index.
    fn expect_close(&mut self, close: &str) -> Result<usize, ParseError> {
        self.skip_trivia();
        if self.peek_op(close) {
            self.pos += 1;
            return Ok(self.pos - 1);
        }
        if self.pos >= self.tokens.len() {
            return Err(self.error_at(self.pos, format!("Missing closing `{close}`")));
        }
        Err(self.unexpected(self.pos))
    }

    fn parse_group(&mut self, open: usize) -> Result<Node, ParseError> {
        self.pos = open + 1;
        let saved = std::mem::replace(&mut self.comma_bp, BP_REFERENCE);
        let inner = self.parse_expression(0);
        self.comma_bp = saved;
        let inner = inner?;
        self.expect_close(")")?;
        Ok(inner)
    }

    /// Parse arguments after an opening `(` at `open`. Returns them with the index of `)`.
    fn parse_arguments(&mut self, open: usize) -> Result<(Vec<Arg>, usize), ParseError> {
        self.pos = open + 1;
        let saved = std::mem::replace(&mut self.comma_bp, 0);
        let result = self.parse_argument_list();
        self.comma_bp = saved;
        result
    }

    fn parse_argument_list(&mut self) -> Result<(Vec<Arg>, usize), ParseError> {
        let mut args = Vec::new();
        self.skip_trivia();
        if self.peek_op(")") {
            self.pos += 1;
            return Ok((args, self.pos - 1));
        }
        loop {
            self.skip_trivia();
            let start = self.pos;
            let node = if self.peek_op(",") || self.peek_op(")") {
                None
            } else {
                Some(self.parse_expression(0)?)
            };
            args.push(Arg { node, start });
            self.skip_trivia();
            if self.peek_op(",") {
                self.pos += 1;
                continue;
            }
            let close = self.expect_close(")")?;
            return Ok((args, close));
        }
    }

    fn parse_function_call(&mut self, idx: usize) -> Result<Node, ParseError> {
        let tokens = self.tokens;
        let name = &tokens[idx].value;
        self.pos = idx + 1;
        if !self.peek_op("(") {
            return Err(self.unexpected(self.pos));
        }
        let (args, close) = self.parse_arguments(idx + 1)?;
        let loc = join(self.span(idx), self.span(close));

        let canonical = strip_xlfn(name);
        if canonical.eq_ignore_ascii_case("LAMBDA") {
            return self.build_lambda(args, loc);
        }
        if canonical.eq_ignore_ascii_case("LET") {
            return self.build_let(args, idx, loc);
        }
        Ok(Node::Call(CallExpr {
            callee: Box::new(Node::Identifier(Identifier {
                name: name.clone(),
                loc: self.span(idx),
            })),
            arguments: args.into_iter().map(|a| a.node).collect(),
            loc,
        }))
    }

    /// A call applied to the result of another expression, as in `LAMBDA(x,x+1)(2)`.
    fn parse_call(&mut self, callee: Node, open: usize) -> Result<Node, ParseError> {
        let callable = match &callee {
            Node::Lambda(_) | Node::Let(_) | Node::Call(_) => true,
            Node::Reference(r) => r.kind == RefKind::Name,
            _ => false,
        };
        if !callable {
            return Err(self.unexpected(open));
        }
        let (args, close) = self.parse_arguments(open)?;
        let loc = join(callee.loc(), self.span(close));
        Ok(Node::Call(CallExpr {
            callee: Box::new(callee),
            arguments: args.into_iter().map(|a| a.node).collect(),
            loc,
        }))
    }

    fn binding_name(&self, arg: Arg, what: &str) -> Result<Identifier, ParseError> {
        match arg.node {
            Some(Node::Reference(r)) if r.kind == RefKind::Name && !r.value.contains('!') => {
                Ok(Identifier {
                    name: r.value,
                    loc: r.loc,
                })
            }
            _ => Err(self.error_at(arg.start, format!("{what} names must be plain identifiers"))),
        }
    }

    fn build_lambda(&self, mut args: Vec<Arg>, loc: Option<Span>) -> Result<Node, ParseError> {
        let body = args.pop().and_then(|a| a.node).map(Box::new);
        let mut params: Vec<Identifier> = Vec::with_capacity(args.len());
        for arg in args {
            let start = arg.start;
            let id = self.binding_name(arg, "LAMBDA parameter")?;
            if params.iter().any(|p| p.name.eq_ignore_ascii_case(&id.name)) {
                return Err(self.error_at(start, format!("Duplicate LAMBDA parameter `{}`", id.name)));
            }
            params.push(id);
        }
        Ok(Node::Lambda(LambdaExpr { params, body, loc }))
    }

    fn build_let(&self, mut args: Vec<Arg>, idx: usize, loc: Option<Span>) -> Result<Node, ParseError> {
        if args.len() < 3 || args.len() % 2 == 0 {
            return Err(self.error_at(
                idx,
                "LET needs name/value pairs followed by a calculation",
            ));
        }
        let body = args.pop().and_then(|a| a.node).map(Box::new);
        let mut declarations: Vec<LetDeclarator> = Vec::with_capacity(args.len() / 2);
        let mut pairs = args.into_iter();
        while let (Some(name), Some(value)) = (pairs.next(), pairs.next()) {
            let start = name.start;
            let id = self.binding_name(name, "LET")?;
            if declarations
                .iter()
                .any(|d| d.id.name.eq_ignore_ascii_case(&id.name))
            {
                return Err(self.error_at(start, format!("Duplicate LET name `{}`", id.name)));
            }
            let Some(init) = value.node else {
                return Err(self.error_at(value.start, format!("Missing value for `{}`", id.name)));
            };
            declarations.push(LetDeclarator {
                loc: join(id.loc, init.loc()),
                id,
                init: Some(Box::new(init)),
            });
        }
        Ok(Node::Let(LetExpr {
            declarations,
            body,
            loc,
        }))
    }

    fn parse_array(&mut self, open: usize) -> Result<Node, ParseError> {
        self.pos = open + 1;
        let saved = std::mem::replace(&mut self.comma_bp, 0);
        let result = self.parse_array_rows(open);
        self.comma_bp = saved;
        result
    }

    fn parse_array_rows(&mut self, open: usize) -> Result<Node, ParseError> {
        let mut rows: Vec<Vec<Node>> = vec![Vec::new()];
        loop {
            self.skip_trivia();
            let start = self.pos;
            let cell = self.parse_expression(0)?;
            if !self.is_array_element(&cell) {
                return Err(self.error_at(start, "Unexpected array element"));
            }
            if let Some(row) = rows.last_mut() {
                row.push(cell);
            }
            self.skip_trivia();
            if self.peek_op(",") {
                self.pos += 1;
            } else if self.peek_op(";") {
                self.pos += 1;
                rows.push(Vec::new());
            } else {
                let close = self.expect_close("}")?;
                return Ok(Node::Array(ArrayExpr {
                    elements: rows,
                    loc: join(self.span(open), self.span(close)),
                }));
            }
        }
    }

    fn is_array_element(&self, node: &Node) -> bool {
        match node {
            Node::Literal(_) | Node::ErrorLiteral(_) => true,
            Node::Unary(u) => {
                matches!(u.operator, UnaryOp::Minus | UnaryOp::Plus)
                    && matches!(
                        u.argument.as_ref(),
                        Node::Literal(LiteralNode {
                            value: LiteralValue::Number(_),
                            ..
                        })
                    )
            }
            Node::Reference(_) => self.opts.permit_array_ranges,
            Node::Binary(b) => self.opts.permit_array_ranges && b.operator.is_reference_operator(),
            Node::Call(_) | Node::Lambda(_) | Node::Let(_) => self.opts.permit_array_calls,
            _ => false,
        }
    }
}
