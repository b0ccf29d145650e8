use super::Parser;
use crate::ast::{Builtin, Expr, NamedArg, ParamName, Span};
use crate::error::ParseError;
use crate::lexer::Token;

type CallArgs = (Vec<Expr>, Vec<NamedArg>, Span);

impl<'a> Parser<'a> {
    // -- Argument lists ------------------------------------------

    /// Parse `( positional, ..., name=value, ... )`, returning the span of
    /// the closing parenthesis.
    pub(super) fn parse_call_args(&mut self) -> Result<CallArgs, ParseError> {
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        let mut named: Vec<NamedArg> = Vec::new();
        if self.peek() == &Token::RParen {
            let close = self.advance().span;
            return Ok((args, named, close));
        }
        loop {
            let is_named =
                matches!(self.peek(), Token::Word(_)) && self.peek_at(1) == &Token::Assign;
            if is_named {
                let start = self.cur_span();
                let word = self.take_word()?;
                let Some(name) = ParamName::from_name(&word) else {
                    return Err(self.err_at_prev(format!("unknown parameter '{}'", word)));
                };
                if named.iter().any(|n| n.name == name) {
                    return Err(self.err_at_prev(format!("duplicate parameter '{}'", word)));
                }
                self.advance();
                let value = self.parse_expr()?;
                let span = start.to(value.span);
                named.push(NamedArg { name, value, span });
            } else {
                if !named.is_empty() {
                    return Err(self.err("positional argument after named parameter"));
                }
                args.push(self.parse_expr()?);
            }
            match self.peek() {
                Token::Comma => {
                    self.advance();
                }
                Token::RParen => {
                    let close = self.advance().span;
                    return Ok((args, named, close));
                }
                other => {
                    return Err(self.err(format!(
                        "expected ',' or ')', got {}",
                        other.describe()
                    )))
                }
            }
        }
    }

    pub(super) fn check_builtin_params(
        &self,
        builtin: Builtin,
        named: &[NamedArg],
    ) -> Result<(), ParseError> {
        match named.iter().find(|n| !builtin.accepts(n.name)) {
            Some(n) => Err(self.err(format!(
                "{} does not accept parameter '{}'",
                builtin.name(),
                n.name.name()
            ))),
            None => Ok(()),
        }
    }

    pub(super) fn check_custom_params(&self, named: &[NamedArg]) -> Result<(), ParseError> {
        match named.iter().find(|n| !n.name.is_resource_scope()) {
            Some(n) => Err(self.err(format!(
                "custom formulas do not accept parameter '{}'",
                n.name.name()
            ))),
            None => Ok(()),
        }
    }

    /// Error positioned at the token just consumed.
    fn err_at_prev(&self, msg: String) -> ParseError {
        let prev = &self.tokens[self.pos.saturating_sub(1)];
        ParseError::new(prev.line, prev.column, msg)
    }
}
