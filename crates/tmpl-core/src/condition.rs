//! Section `condition` expressions.
//!
//! A small boolean grammar interpreted over the render context:
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := primary ( op primary )?
//! op      := "==" | "===" | "!=" | "!==" | "<" | "<=" | ">" | ">="
//! primary := string | number | true | false | null | undefined
//!          | identifier ( "." identifier )* | "(" expr ")"
//! ```
//!
//! Identifiers are dotted paths into the context; a path that does not
//! resolve is `undefined`. Truthiness follows JavaScript. Loose `==` also
//! equates `null` with `undefined` and compares a number with a numeric
//! string by value (`2 == '2'`); strict forms never coerce. Nesting of `!`
//! and parentheses is limited to [`MAX_DEPTH`] levels.

use crate::context;
use serde_json::Value;
use thiserror::Error;

pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid condition at offset {position}: {message}")]
pub struct ConditionError {
    pub message: String,
    pub position: usize,
}

impl ConditionError {
    fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq { strict: bool },
    Ne { strict: bool },
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Undefined,
    Path(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
}

/// A parsed condition, reusable across contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = lex(source)?;
        let mut parser = Parser {
            tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let expr = parser.expr()?;
        if let Some((token, at)) = parser.tokens.get(parser.pos) {
            return Err(ConditionError::new(
                format!("unexpected {}", token.describe()),
                *at,
            ));
        }
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, context: &Value) -> bool {
        truthy(eval(&self.expr, context).as_ref())
    }
}

/// Parse and evaluate in one step. A condition that does not parse is false.
pub fn evaluate(source: &str, context: &Value) -> bool {
    match Condition::parse(source) {
        Ok(condition) => condition.evaluate(context),
        Err(e) => {
            tracing::warn!(condition = source, "{e}; treating as false");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// `None` stands for `undefined`.
fn eval(expr: &Expr, ctx: &Value) -> Option<Value> {
    match expr {
        Expr::Literal(v) => Some(v.clone()),
        Expr::Undefined => None,
        Expr::Path(path) => context::lookup(ctx, path).cloned(),
        Expr::Not(inner) => Some(Value::Bool(!truthy(eval(inner, ctx).as_ref()))),
        Expr::And(l, r) => {
            let left = eval(l, ctx);
            if truthy(left.as_ref()) {
                eval(r, ctx)
            } else {
                left
            }
        }
        Expr::Or(l, r) => {
            let left = eval(l, ctx);
            if truthy(left.as_ref()) {
                left
            } else {
                eval(r, ctx)
            }
        }
        Expr::Compare(l, op, r) => {
            let left = eval(l, ctx);
            let right = eval(r, ctx);
            Some(Value::Bool(compare(left.as_ref(), *op, right.as_ref())))
        }
    }
}

pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn compare(left: Option<&Value>, op: CompareOp, right: Option<&Value>) -> bool {
    match op {
        CompareOp::Eq { strict } => equals(left, right, strict),
        CompareOp::Ne { strict } => !equals(left, right, strict),
        CompareOp::Lt => ordering(left, right).is_some_and(|o| o.is_lt()),
        CompareOp::Le => ordering(left, right).is_some_and(|o| o.is_le()),
        CompareOp::Gt => ordering(left, right).is_some_and(|o| o.is_gt()),
        CompareOp::Ge => ordering(left, right).is_some_and(|o| o.is_ge()),
    }
}

fn equals(left: Option<&Value>, right: Option<&Value>, strict: bool) -> bool {
    match (left, right) {
        (None, None) => true,
        (None, Some(Value::Null)) | (Some(Value::Null), None) => !strict,
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
        (Some(Value::Number(n)), Some(Value::String(s)))
        | (Some(Value::String(s)), Some(Value::Number(n)))
            if !strict =>
        {
            n.as_f64().is_some_and(|f| numeric_string(s) == Some(f))
        }
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// A string read as a number the way loose equality does: blank is zero.
fn numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    trimmed.parse::<f64>().ok().filter(|f| f.is_finite())
}

fn ordering(left: Option<&Value>, right: Option<&Value>) -> Option<std::cmp::Ordering> {
    match (left?, right?) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Op(CompareOp),
    Str(String),
    Num(f64),
    Ident(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Not => "'!'".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Op(_) => "comparison operator".to_string(),
            Token::Str(s) => format!("string '{s}'"),
            Token::Num(n) => format!("number {n}"),
            Token::Ident(i) => format!("identifier '{i}'"),
        }
    }
}

fn lex(source: &str) -> Result<Vec<(Token, usize)>, ConditionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let peek = |i: usize| chars.get(i).map(|(_, c)| *c);

    while let Some(&(at, c)) = chars.get(i) {
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, at));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, at));
                i += 1;
            }
            '&' if peek(i + 1) == Some('&') => {
                tokens.push((Token::And, at));
                i += 2;
            }
            '|' if peek(i + 1) == Some('|') => {
                tokens.push((Token::Or, at));
                i += 2;
            }
            '=' if peek(i + 1) == Some('=') => {
                let strict = peek(i + 2) == Some('=');
                tokens.push((Token::Op(CompareOp::Eq { strict }), at));
                i += if strict { 3 } else { 2 };
            }
            '!' if peek(i + 1) == Some('=') => {
                let strict = peek(i + 2) == Some('=');
                tokens.push((Token::Op(CompareOp::Ne { strict }), at));
                i += if strict { 3 } else { 2 };
            }
            '!' => {
                tokens.push((Token::Not, at));
                i += 1;
            }
            '<' | '>' => {
                let or_equal = peek(i + 1) == Some('=');
                let op = match (c, or_equal) {
                    ('<', false) => CompareOp::Lt,
                    ('<', true) => CompareOp::Le,
                    ('>', false) => CompareOp::Gt,
                    _ => CompareOp::Ge,
                };
                tokens.push((Token::Op(op), at));
                i += if or_equal { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match peek(i) {
                        None => return Err(ConditionError::new("unterminated string", at)),
                        Some(ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = peek(i + 1)
                                .ok_or_else(|| ConditionError::new("unterminated string", at))?;
                            value.push(match escaped {
                                'n' => '\n',
                                't' => '\t',
                                other => other,
                            });
                            i += 2;
                        }
                        Some(ch) => {
                            value.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((Token::Str(value), at));
            }
            c if c.is_ascii_digit()
                || (c == '-' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while peek(i).is_some_and(|n| n.is_ascii_digit() || n == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ConditionError::new(format!("invalid number '{text}'"), at))?;
                tokens.push((Token::Num(n), at));
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while peek(i).is_some_and(|n| n.is_alphanumeric() || matches!(n, '_' | '$' | '.'))
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                tokens.push((Token::Ident(ident), at));
            }
            other => {
                return Err(ConditionError::new(
                    format!("unexpected character '{other}'"),
                    at,
                ))
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(_, at)| *at)
    }

    fn descend(&mut self, at: usize) -> Result<(), ConditionError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ConditionError::new(
                format!("condition nested deeper than {MAX_DEPTH} levels"),
                at,
            ));
        }
        Ok(())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut left = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if self.peek() == Some(&Token::Not) {
            self.descend(self.offset())?;
            self.pos += 1;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ConditionError> {
        let left = self.primary()?;
        if let Some(Token::Op(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.primary()?;
            return Ok(Expr::Compare(Box::new(left), op, Box::new(right)));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        let at = self.offset();
        match self.advance() {
            Some(Token::LParen) => {
                self.descend(at)?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ConditionError::new("expected ')'", self.offset().min(self.end))),
                }
            }
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Num(n)) => Ok(Expr::Literal(
                serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            )),
            Some(Token::Ident(ident)) => Ok(match ident.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                "undefined" => Expr::Undefined,
                _ => Expr::Path(ident),
            }),
            Some(token) => Err(ConditionError::new(
                format!("unexpected {}", token.describe()),
                at,
            )),
            None => Err(ConditionError::new("unexpected end of condition", at)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_str(src: &str, ctx: &Value) -> bool {
        Condition::parse(src).unwrap().evaluate(ctx)
    }

    #[test]
    fn strict_equality_on_strings() {
        let done = json!({"status": "done"});
        let pending = json!({"status": "pending"});
        assert!(eval_str("status === 'done'", &done));
        assert!(!eval_str("status === 'done'", &pending));
        assert!(eval_str("status !== \"done\"", &pending));
    }

    #[test]
    fn boolean_operators_and_precedence() {
        let ctx = json!({"a": true, "b": false, "c": true});
        assert!(eval_str("a && c", &ctx));
        assert!(!eval_str("a && b", &ctx));
        assert!(eval_str("b || c", &ctx));
        assert!(eval_str("b || a && c", &ctx));
        assert!(!eval_str("(b || a) && b", &ctx));
        assert!(eval_str("!b", &ctx));
        assert!(eval_str("!!a", &ctx));
    }

    #[test]
    fn bare_identifiers_use_truthiness() {
        let ctx = json!({"has_ui": true, "empty": "", "zero": 0, "items": []});
        assert!(eval_str("has_ui", &ctx));
        assert!(!eval_str("empty", &ctx));
        assert!(!eval_str("zero", &ctx));
        assert!(eval_str("items", &ctx));
        assert!(!eval_str("not_present", &ctx));
    }

    #[test]
    fn dotted_paths_and_numbers() {
        let ctx = json!({"project": {"type": "greenfield", "stories": 4}});
        assert!(eval_str("project.type == 'greenfield'", &ctx));
        assert!(eval_str("project.stories >= 4", &ctx));
        assert!(eval_str("project.stories == 4.0", &ctx));
        assert!(!eval_str("project.stories < -1", &ctx));
    }

    #[test]
    fn loose_null_matches_undefined() {
        let ctx = json!({"owner": null});
        assert!(eval_str("owner == undefined", &ctx));
        assert!(!eval_str("owner === undefined", &ctx));
        assert!(eval_str("missing == null", &ctx));
    }

    #[test]
    fn mixed_types_never_order() {
        let ctx = json!({"n": 3});
        assert!(!eval_str("n < 'abc'", &ctx));
        assert!(!eval_str("n > 'abc'", &ctx));
    }

    #[test]
    fn parse_errors_carry_offsets() {
        let err = Condition::parse("status === ").unwrap_err();
        assert!(err.message.contains("end of condition"));
        let err = Condition::parse("a ; b").unwrap_err();
        assert_eq!(err.position, 2);
        assert!(Condition::parse("'open").is_err());
        assert!(Condition::parse("(a && b").is_err());
        assert!(Condition::parse("a b").is_err());
    }

    #[test]
    fn invalid_condition_evaluates_false() {
        assert!(!evaluate("process.exit(1)", &json!({})));
        assert!(!evaluate("a = 1", &json!({"a": 1})));
    }

    #[test]
    fn loose_equality_compares_numbers_with_numeric_strings() {
        let ctx = json!({"count": 2, "label": "2", "blank": ""});
        assert!(eval_str("count == '2'", &ctx));
        assert!(eval_str("'2.0' == count", &ctx));
        assert!(eval_str("label == 2", &ctx));
        assert!(eval_str("blank == 0", &ctx));
        assert!(!eval_str("count == 'two'", &ctx));
        assert!(eval_str("count != 'two'", &ctx));
        assert!(!eval_str("count === '2'", &ctx));
        assert!(eval_str("count !== '2'", &ctx));
    }

    #[test]
    fn nesting_is_bounded() {
        let ctx = json!({"a": true});
        let shallow = format!("{}a", "!".repeat(MAX_DEPTH));
        assert!(eval_str(&shallow, &ctx));
        let grouped = format!("{}a{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(eval_str(&grouped, &ctx));

        let deep = format!("{}a", "!".repeat(200_000));
        let err = Condition::parse(&deep).unwrap_err();
        assert!(err.message.contains("nested"), "got {err}");
        assert!(!evaluate(&deep, &ctx));
        let parens = format!("{}a{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(Condition::parse(&parens).is_err());
    }

    #[test]
    fn string_escapes() {
        let ctx = json!({"q": "it's"});
        assert!(eval_str(r"q == 'it\'s'", &ctx));
    }
}
