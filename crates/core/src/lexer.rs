use crate::ast::Span;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifiers, keywords and builtin names -- distinguished in the parser
    Word(String),
    /// Decimal literal, kept as written to preserve exact representation
    Number(String),
    /// Single-quoted string literal (content without quotes, `\'` resolved)
    Str(String),
    /// `:name` token reference (name without the leading colon)
    Var(String),
    // Punctuation
    Hash,
    LParen,
    RParen,
    Comma,
    // Arithmetic operators
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    // Assignment and comparison
    Assign,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    /// Statement separator (newline or `;` outside parentheses)
    Newline,
    // End of input
    Eof,
}

impl Token {
    /// Human-readable form for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string '{}'", s),
            Token::Var(v) => format!("token ':{}'", v),
            Token::Hash => "'#'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Caret => "'^'".to_string(),
            Token::Assign => "'='".to_string(),
            Token::Eq => "'=='".to_string(),
            Token::Neq => "'!='".to_string(),
            Token::Lt => "'<'".to_string(),
            Token::Lte => "'<='".to_string(),
            Token::Gt => "'>'".to_string(),
            Token::Gte => "'>='".to_string(),
            Token::Newline => "end of line".to_string(),
            Token::Eof => "end of formula".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

fn is_var_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == ':'
}

pub fn lex(src: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut tokens: Vec<Spanned> = Vec::new();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let offset = |i: usize| chars.get(i).map_or(src.len(), |(b, _)| *b);
    let mut pos = 0usize;
    let mut line: u32 = 1;
    let mut line_start = 0usize;
    let mut depth = 0usize;

    while pos < chars.len() {
        let c = chars[pos].1;
        let tok_line = line;
        let tok_col = (pos - line_start) as u32 + 1;
        let start = pos;

        let push = |tokens: &mut Vec<Spanned>, token: Token, end: usize| {
            tokens.push(Spanned {
                token,
                span: Span::new(offset(start), offset(end)),
                line: tok_line,
                column: tok_col,
            });
        };

        // Statement separators only count outside parentheses
        if c == '\n' || c == ';' {
            if depth == 0
                && !matches!(tokens.last().map(|t| &t.token), None | Some(Token::Newline))
            {
                push(&mut tokens, Token::Newline, pos + 1);
            }
            pos += 1;
            if c == '\n' {
                line += 1;
                line_start = pos;
            }
            continue;
        }

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        // String literal
        if c == '\'' {
            pos += 1;
            let mut s = String::new();
            loop {
                if pos >= chars.len() {
                    return Err(ParseError::new(
                        tok_line,
                        tok_col,
                        "unterminated string literal",
                    ));
                }
                let sc = chars[pos].1;
                if sc == '\\' && pos + 1 < chars.len() && chars[pos + 1].1 == '\'' {
                    s.push('\'');
                    pos += 2;
                    continue;
                }
                if sc == '\'' {
                    pos += 1;
                    break;
                }
                if sc == '\n' {
                    line += 1;
                    line_start = pos + 1;
                }
                s.push(sc);
                pos += 1;
            }
            push(&mut tokens, Token::Str(s), pos);
            continue;
        }

        // Number: digits, optional fraction, optional exponent
        if c.is_ascii_digit()
            || (c == '.' && pos + 1 < chars.len() && chars[pos + 1].1.is_ascii_digit())
        {
            while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                pos += 1;
            }
            if pos < chars.len() && chars[pos].1 == '.' {
                pos += 1;
                while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                    pos += 1;
                }
            }
            if pos < chars.len() && matches!(chars[pos].1, 'e' | 'E') {
                let mut look = pos + 1;
                if look < chars.len() && matches!(chars[look].1, '+' | '-') {
                    look += 1;
                }
                if look < chars.len() && chars[look].1.is_ascii_digit() {
                    pos = look;
                    while pos < chars.len() && chars[pos].1.is_ascii_digit() {
                        pos += 1;
                    }
                }
            }
            let text: String = chars[start..pos].iter().map(|(_, ch)| *ch).collect();
            push(&mut tokens, Token::Number(text), pos);
            continue;
        }

        // Token reference
        if c == ':' {
            pos += 1;
            while pos < chars.len() && is_var_char(chars[pos].1) {
                pos += 1;
            }
            if pos == start + 1 {
                return Err(ParseError::new(
                    tok_line,
                    tok_col,
                    "expected a token name after ':'",
                ));
            }
            let name: String = chars[start + 1..pos].iter().map(|(_, ch)| *ch).collect();
            push(&mut tokens, Token::Var(name), pos);
            continue;
        }

        // Identifier / keyword
        if c.is_alphabetic() || c == '_' {
            while pos < chars.len() && (chars[pos].1.is_alphanumeric() || chars[pos].1 == '_') {
                pos += 1;
            }
            let word: String = chars[start..pos].iter().map(|(_, ch)| *ch).collect();
            push(&mut tokens, Token::Word(word), pos);
            continue;
        }

        let next = chars.get(pos + 1).map(|(_, ch)| *ch);
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Neq, 2),
            ('<', Some('=')) => (Token::Lte, 2),
            ('>', Some('=')) => (Token::Gte, 2),
            ('=', _) => (Token::Assign, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('^', _) => (Token::Caret, 1),
            ('#', _) => (Token::Hash, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => {
                depth += 1;
                (Token::LParen, 1)
            }
            (')', _) => {
                depth = depth.saturating_sub(1);
                (Token::RParen, 1)
            }
            _ => {
                return Err(ParseError::new(
                    tok_line,
                    tok_col,
                    format!("unexpected character '{}'", c),
                ))
            }
        };
        pos += width;
        push(&mut tokens, token, pos);
    }

    // Trailing separator carries no statement
    if matches!(tokens.last().map(|t| &t.token), Some(Token::Newline)) {
        tokens.pop();
    }
    let column = (chars.len() - line_start) as u32 + 1;
    tokens.push(Spanned {
        token: Token::Eof,
        span: Span::new(src.len(), src.len()),
        line,
        column,
    });
    Ok(tokens)
}
