use super::Parser;
use crate::ast::{BinaryOp, Builtin, Call, Callee, CompareOp, Expr, ExprKind};
use crate::error::ParseError;
use crate::lexer::Token;

fn compare_op(t: &Token) -> Option<CompareOp> {
    match t {
        Token::Gt => Some(CompareOp::Gt),
        Token::Gte => Some(CompareOp::Gte),
        Token::Lt => Some(CompareOp::Lt),
        Token::Lte => Some(CompareOp::Lte),
        Token::Eq => Some(CompareOp::Eq),
        Token::Neq => Some(CompareOp::Neq),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    }
}

impl<'a> Parser<'a> {
    // -- Expression parsing --------------------------------------

    pub(super) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.descend()?;
        let expr = self.parse_comparison();
        self.ascend();
        expr
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;
        let Some(op) = compare_op(self.peek()) else {
            return Ok(left);
        };
        self.advance();
        let right = self.parse_additive()?;
        if compare_op(self.peek()).is_some() {
            return Err(self.err("comparison operators cannot be chained"));
        }
        let span = left.span.to(right.span);
        Ok(Expr {
            kind: ExprKind::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        })
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            self.descend()?;
            levels += 1;
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        let mut levels = 0;
        loop {
            let op = match self.peek() {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            self.descend()?;
            levels += 1;
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        self.depth -= levels;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.peek() == &Token::Minus {
            let start = self.advance().span;
            self.descend()?;
            let operand = self.parse_unary()?;
            self.ascend();
            let span = start.to(operand.span);
            return Ok(Expr {
                kind: ExprKind::Neg(Box::new(operand)),
                span,
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if self.peek() != &Token::Caret {
            return Ok(base);
        }
        self.advance();
        // Right-associative; the exponent may itself be negated
        self.descend()?;
        let exponent = self.parse_unary()?;
        self.ascend();
        Ok(binary(BinaryOp::Pow, base, exponent))
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let span = self.cur_span();
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Number(n),
                    span,
                })
            }
            Token::Str(s) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Str(s),
                    span,
                })
            }
            Token::Var(name) => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::Var(name),
                    span,
                })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let close = self.expect(Token::RParen)?;
                // Parentheses widen the span so audit text keeps them
                Ok(Expr {
                    kind: inner.kind,
                    span: span.to(close),
                })
            }
            Token::Hash => {
                self.advance();
                let name = self.take_word()?;
                let (args, named, close) = self.parse_call_args()?;
                self.check_custom_params(&named)?;
                Ok(Expr {
                    kind: ExprKind::Call(Call {
                        callee: Callee::Custom(name),
                        args,
                        named,
                    }),
                    span: span.to(close),
                })
            }
            Token::Word(w) => self.parse_word(&w),
            other => Err(self.err(format!("unexpected {}", other.describe()))),
        }
    }

    fn parse_word(&mut self, word: &str) -> Result<Expr, ParseError> {
        let span = self.cur_span();
        let literal = match word.to_ascii_lowercase().as_str() {
            "true" => Some(ExprKind::Bool(true)),
            "false" => Some(ExprKind::Bool(false)),
            "null" => Some(ExprKind::Null),
            _ => None,
        };
        if let Some(kind) = literal {
            self.advance();
            return Ok(Expr { kind, span });
        }
        if self.is_word("set") {
            return self.parse_set();
        }
        let Some(builtin) = Builtin::from_name(word) else {
            if self.peek_at(1) == &Token::LParen {
                return Err(self.err(format!("unknown function '{}'", word)));
            }
            return Err(self.err(format!("unexpected identifier '{}'", word)));
        };
        let (line, column) = (self.cur().line, self.cur().column);
        self.advance();
        let (args, named, close) = self.parse_call_args()?;
        if !builtin.arity().admits(args.len()) {
            let arity = builtin.arity();
            let expected = match arity.max {
                Some(max) if max == arity.min => format!("{}", max),
                Some(max) => format!("{} to {}", arity.min, max),
                None => format!("at least {}", arity.min),
            };
            return Err(ParseError::new(
                line,
                column,
                format!(
                    "{} expects {} argument(s), got {}",
                    builtin.name(),
                    expected,
                    args.len()
                ),
            ));
        }
        self.check_builtin_params(builtin, &named)?;
        Ok(Expr {
            kind: ExprKind::Call(Call {
                callee: Callee::Builtin(builtin),
                args,
                named,
            }),
            span: span.to(close),
        })
    }

    fn parse_set(&mut self) -> Result<Expr, ParseError> {
        let start = self.advance().span;
        let name = match self.peek().clone() {
            Token::Var(name) => {
                self.advance();
                name
            }
            other => {
                return Err(self.err(format!(
                    "expected a :token after SET, got {}",
                    other.describe()
                )))
            }
        };
        self.expect(Token::Assign)?;
        let value = self.parse_expr()?;
        let span = start.to(value.span);
        Ok(Expr {
            kind: ExprKind::Set {
                name,
                value: Box::new(value),
            },
            span,
        })
    }
}
