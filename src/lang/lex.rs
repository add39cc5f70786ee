use super::Token;
use std::iter::Peekable;
use std::str::Chars;

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// ## Token stream
///
/// A scanner with one token of lookahead. The parser drives it with
/// [`TokenStream::next`] and inspects the lookahead with
/// [`TokenStream::current`]; the line number tracks the position of the
/// current token for diagnostics.
///
/// Word tokens are case-insensitive. Comments, `{ ... }` or `(* ... *)`,
/// are skipped as whitespace.
pub struct TokenStream<'a> {
    chars: Peekable<Chars<'a>>,
    current: Token,
    line: usize,
}

impl<'a> TokenStream<'a> {
    pub fn new(source: &'a str) -> TokenStream<'a> {
        TokenStream {
            chars: source.chars().peekable(),
            current: Token::Eof,
            line: 1,
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Scan the next token into the lookahead slot.
    pub fn next(&mut self) -> &Token {
        self.skip_blanks();
        self.current = match self.chars.peek().copied() {
            None => Token::Eof,
            Some(c) if is_ident_start(c) => self.word(),
            Some(c) if c.is_ascii_digit() => self.number(),
            Some('\'') => self.string(),
            Some(_) => self.minutia(),
        };
        &self.current
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.chars.peek().copied() {
                Some('\n') => {
                    self.line += 1;
                    self.chars.next();
                }
                Some(c) if c.is_ascii_whitespace() => {
                    self.chars.next();
                }
                Some('{') => {
                    self.chars.next();
                    self.comment('}');
                }
                Some('(') => {
                    // Only a comment when "(*" follows; a lone "(" is a token.
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() == Some(&'*') {
                        self.chars.next();
                        self.chars.next();
                        self.comment(')');
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn comment(&mut self, close: char) {
        while let Some(c) = self.chars.next() {
            if c == '\n' {
                self.line += 1;
            }
            if c == close && close == '}' {
                return;
            }
            if c == '*' && close == ')' && self.chars.peek() == Some(&')') {
                self.chars.next();
                return;
            }
        }
    }

    fn word(&mut self) -> Token {
        let mut s = String::new();
        while let Some(c) = self.chars.peek().copied() {
            if !is_ident_part(c) {
                break;
            }
            s.push(c.to_ascii_lowercase());
            self.chars.next();
        }
        match Token::keyword(&s) {
            Some(token) => token,
            None => Token::Identifier(s),
        }
    }

    fn number(&mut self) -> Token {
        let mut s = String::new();
        let mut real = false;
        while let Some(c) = self.chars.peek().copied() {
            if c.is_ascii_digit() {
                s.push(c);
                self.chars.next();
            } else if c == '.' && !real {
                // "1..3" is a sub-range; only consume the dot when a
                // digit follows it.
                let mut ahead = self.chars.clone();
                ahead.next();
                match ahead.peek() {
                    Some(d) if d.is_ascii_digit() => {
                        real = true;
                        s.push('.');
                        self.chars.next();
                    }
                    _ => break,
                }
            } else if c == 'e' || c == 'E' {
                let mut ahead = self.chars.clone();
                ahead.next();
                if let Some(&sign) = ahead.peek() {
                    if sign == '+' || sign == '-' {
                        ahead.next();
                    }
                }
                match ahead.peek() {
                    Some(d) if d.is_ascii_digit() => {
                        real = true;
                        s.push('e');
                        self.chars.next();
                        if let Some(&sign) = self.chars.peek() {
                            if sign == '+' || sign == '-' {
                                s.push(sign);
                                self.chars.next();
                            }
                        }
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        if real {
            match s.parse::<f64>() {
                Ok(n) => Token::RealNum(n),
                Err(_) => Token::Unknown('.'),
            }
        } else {
            match s.parse::<i64>() {
                Ok(n) => Token::IntegerNum(n),
                Err(_) => Token::Unknown('9'),
            }
        }
    }

    fn string(&mut self) -> Token {
        let mut s = String::new();
        self.chars.next();
        while let Some(c) = self.chars.next() {
            if c == '\'' {
                // Doubled quote is a literal quote.
                if self.chars.peek() == Some(&'\'') {
                    s.push('\'');
                    self.chars.next();
                    continue;
                }
                break;
            }
            if c == '\n' {
                self.line += 1;
            }
            s.push(c);
        }
        Token::StringLit(s)
    }

    fn minutia(&mut self) -> Token {
        use Token::*;
        let c = match self.chars.next() {
            Some(c) => c,
            None => return Eof,
        };
        match c {
            '+' => Add,
            '-' => Subtract,
            '*' => Multiply,
            '/' => Divide,
            '=' => EQU,
            '^' => Caret,
            ',' => Comma,
            ';' => SemiColon,
            '(' => OpenParen,
            ')' => CloseParen,
            '[' => OpenBrkt,
            ']' => CloseBrkt,
            '<' => match self.chars.peek() {
                Some('=') => {
                    self.chars.next();
                    LTE
                }
                Some('>') => {
                    self.chars.next();
                    NEQ
                }
                _ => LT,
            },
            '>' => match self.chars.peek() {
                Some('=') => {
                    self.chars.next();
                    GTE
                }
                _ => GT,
            },
            ':' => match self.chars.peek() {
                Some('=') => {
                    self.chars.next();
                    Assign
                }
                _ => Colon,
            },
            '.' => match self.chars.peek() {
                Some('.') => {
                    self.chars.next();
                    Ellipsis
                }
                _ => Period,
            },
            other => Unknown(other),
        }
    }
}
