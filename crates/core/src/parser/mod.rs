/// Recursive-descent parser for formula programs.
/// Produces an AST whose nodes carry byte spans into the source text.
/// No evaluation happens here -- that is the evaluator's job.
use crate::ast::{Expr, Program, Span};
use crate::error::ParseError;
use crate::lexer::{lex, Spanned, Token};

mod calls;
mod expressions;

/// Parse formula text into a [`Program`].
pub fn parse(src: &str) -> Result<Program, ParseError> {
    let tokens = lex(src)?;
    let mut p = Parser::new(&tokens);
    let statements = p.parse_program()?;
    Ok(Program {
        source: src.to_owned(),
        statements,
    })
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Deepest nesting a formula may use. Each parenthesis, call argument list,
/// `SET` value, unary minus and binary operator counts one level; the
/// operators of a `+`/`-` or `*`/`/` chain nest to the left.
pub const MAX_NESTING: usize = 100;

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Spanned]) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Enter one nesting level; paired with `ascend` on success.
    fn descend(&mut self) -> Result<(), ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.err(format!(
                "formula nests deeper than {} levels",
                MAX_NESTING
            )));
        }
        self.depth += 1;
        Ok(())
    }

    fn ascend(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn cur(&self) -> &Spanned {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.cur().token
    }

    /// Token `n` positions ahead of the current one.
    fn peek_at(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].token
    }

    fn cur_span(&self) -> Span {
        self.cur().span
    }

    fn advance(&mut self) -> &Spanned {
        let t = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    /// Consume the expected token, returning its span.
    fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.peek() == &expected {
            Ok(self.advance().span)
        } else {
            Err(self.err(format!(
                "expected {}, got {}",
                expected.describe(),
                self.peek().describe()
            )))
        }
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        let cur = self.cur();
        ParseError::new(cur.line, cur.column, msg)
    }

    /// Case-insensitive keyword test.
    fn is_word(&self, w: &str) -> bool {
        matches!(self.peek(), Token::Word(x) if x.eq_ignore_ascii_case(w))
    }

    fn take_word(&mut self) -> Result<String, ParseError> {
        if let Token::Word(w) = self.peek().clone() {
            self.advance();
            Ok(w)
        } else {
            Err(self.err(format!(
                "expected identifier, got {}",
                self.peek().describe()
            )))
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == &Token::Newline {
            self.advance();
        }
    }

    // -- Program ----------------------------------------------

    fn parse_program(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.skip_newlines();
        if self.peek() == &Token::Eof {
            return Err(self.err("empty formula"));
        }
        let mut statements = Vec::new();
        loop {
            statements.push(self.parse_expr()?);
            match self.peek() {
                Token::Eof => break,
                Token::Newline => {
                    self.skip_newlines();
                    if self.peek() == &Token::Eof {
                        break;
                    }
                }
                other => {
                    return Err(self.err(format!("unexpected {}", other.describe())));
                }
            }
        }
        Ok(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Builtin, Callee, CompareOp, ExprKind, ParamName};

    fn single(src: &str) -> (Program, Expr) {
        let program = parse(src).unwrap();
        assert_eq!(program.statements.len(), 1);
        let e = program.statements[0].clone();
        (program, e)
    }

    #[test]
    fn precedence_and_associativity() {
        let (_, e) = single("1+2*3^2^2");
        let ExprKind::Binary { op, right, .. } = e.kind else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        let ExprKind::Binary { op, right, .. } = right.kind else {
            panic!("expected product");
        };
        assert_eq!(op, BinaryOp::Mul);
        // ^ is right-associative: 3^(2^2)
        let ExprKind::Binary { op, right, .. } = right.kind else {
            panic!("expected power");
        };
        assert_eq!(op, BinaryOp::Pow);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let (p, e) = single("10-4-3");
        let ExprKind::Binary { left, .. } = e.kind else {
            panic!("expected binary");
        };
        assert_eq!(p.text(left.span), "10-4");
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        let (_, e) = single("-2^2");
        let ExprKind::Neg(inner) = e.kind else {
            panic!("expected negation");
        };
        assert!(matches!(inner.kind, ExprKind::Binary { op: BinaryOp::Pow, .. }));
    }

    #[test]
    fn comparison_is_lowest() {
        let (_, e) = single(":a + 1 >= 3 * 2");
        assert!(matches!(e.kind, ExprKind::Compare { op: CompareOp::Gte, .. }));
    }

    #[test]
    fn chained_comparison_rejected() {
        assert!(parse("1 < 2 < 3").is_err());
    }

    #[test]
    fn multi_statement_program() {
        let program = parse("set :a = 10\nset :a = :a * 10\n:a").unwrap();
        assert_eq!(program.statements.len(), 3);
        assert_eq!(program.text(program.statements[0].span), "set :a = 10");
        assert_eq!(program.text(program.statements[1].span), "set :a = :a * 10");
        let ExprKind::Set { name, .. } = &program.statements[1].kind else {
            panic!("expected set");
        };
        assert_eq!(name, "a");
    }

    #[test]
    fn call_span_covers_whole_call() {
        let (p, e) = single("concat('a', :b)");
        assert_eq!(p.text(e.span), "concat('a', :b)");
        let ExprKind::Call(call) = e.kind else {
            panic!("expected call");
        };
        assert_eq!(call.callee, Callee::Builtin(Builtin::Concat));
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn named_parameters() {
        let (_, e) = single("as_timestamp(:d, 'M/d/yy', timezone='UTC', roundDownTo='month')");
        let ExprKind::Call(call) = e.kind else {
            panic!("expected call");
        };
        assert_eq!(call.args.len(), 2);
        assert!(call.named(ParamName::Timezone).is_some());
        assert!(call.named(ParamName::RoundDownTo).is_some());
        assert!(call.named(ParamName::Locale).is_none());
    }

    #[test]
    fn custom_formula_call() {
        let (_, e) = single("#vehicle_emissions(10, 'diesel', version=2)");
        let ExprKind::Call(call) = e.kind else {
            panic!("expected call");
        };
        assert_eq!(call.callee, Callee::Custom("vehicle_emissions".into()));
        assert_eq!(call.args.len(), 2);
        assert!(call.named(ParamName::Version).is_some());
    }

    #[test]
    fn arity_is_enforced() {
        let err = parse("if(1>2, 'a')").unwrap_err();
        assert!(err.message.contains("IF"), "{}", err.message);
        assert!(parse("lookup('a','b','c')").is_err());
    }

    #[test]
    fn unsupported_named_parameter_rejected() {
        let err = parse("concat('a', timezone='UTC')").unwrap_err();
        assert!(err.message.contains("timezone"), "{}", err.message);
        assert!(parse("convert(1,'m','cm',qualityKind='length')").is_ok());
    }

    #[test]
    fn positional_after_named_rejected() {
        assert!(parse("switch(:a, default='x', 'b', 'c')").is_err());
    }

    #[test]
    fn unknown_function_rejected() {
        let err = parse("camel('a')").unwrap_err();
        assert_eq!(err.to_string(), "Line 1:1 unknown function 'camel'");
    }

    #[test]
    fn trailing_garbage_rejected() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(err.column, 3);
    }

    #[test]
    fn empty_formula_rejected() {
        assert!(parse("  \n ").is_err());
    }

    #[test]
    fn keywords_case_insensitive() {
        assert!(parse("SET :x = NULL").is_ok());
        assert!(parse("If(True, 1, 2)").is_ok());
    }
}
