use crate::frontend::token::{lookup_keyword, Token};

#[derive(Debug, Clone)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexerError {
        LexerError {
            message: message.into(),
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexerError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // '/'
        self.advance(); // '*'

        loop {
            match self.current() {
                Some('*') if self.peek() == Some('/') => {
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    return Err(LexerError {
                        message: "unterminated block comment".to_string(),
                        line: start_line,
                        col: start_col,
                    });
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start_line = self.line;
        let start_col = self.col;

        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let value: i64 = digits.parse().map_err(|_| LexerError {
            message: format!("invalid integer: {}", digits),
            line: start_line,
            col: start_col,
        })?;

        Ok(Token::Integer(value))
    }

    /// Reads a string literal. Either `"` or `'` works as delimiter; the
    /// closing quote must match the opening one.
    fn read_string(&mut self, delim: char) -> Result<Token, LexerError> {
        let start_line = self.line;
        let start_col = self.col;
        self.advance(); // opening delimiter

        let mut string = String::new();
        loop {
            match self.current() {
                Some(ch) if ch == delim => {
                    self.advance();
                    return Ok(Token::Str(string));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some(ch) if ch == delim => string.push(ch),
                        Some(ch) => {
                            return Err(self.error(format!("unknown escape sequence: \\{}", ch)));
                        }
                        None => {
                            return Err(self.error("unexpected EOF in escape sequence"));
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Err(LexerError {
                        message: "unterminated string literal".to_string(),
                        line: start_line,
                        col: start_col,
                    });
                }
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match lookup_keyword(&ident) {
            Some(keyword) => keyword,
            None => Token::Ident(ident),
        }
    }

    fn read_operator(&mut self) -> Option<Token> {
        let ch = self.current()?;
        let next = self.peek();

        let token = match (ch, next) {
            ('=', Some('=')) => {
                self.advance();
                self.advance();
                Token::Eq
            }
            ('!', Some('=')) => {
                self.advance();
                self.advance();
                Token::NotEq
            }
            ('<', Some('=')) => {
                self.advance();
                self.advance();
                Token::LtEq
            }
            ('>', Some('=')) => {
                self.advance();
                self.advance();
                Token::GtEq
            }
            ('&', Some('&')) => {
                self.advance();
                self.advance();
                Token::And
            }
            ('|', Some('|')) => {
                self.advance();
                self.advance();
                Token::Or
            }
            ('=', _) => {
                self.advance();
                Token::Assign
            }
            ('!', _) => {
                self.advance();
                Token::Bang
            }
            ('<', _) => {
                self.advance();
                Token::Lt
            }
            ('>', _) => {
                self.advance();
                Token::Gt
            }
            ('+', _) => {
                self.advance();
                Token::Plus
            }
            ('-', _) => {
                self.advance();
                Token::Minus
            }
            ('*', _) => {
                self.advance();
                Token::Asterisk
            }
            ('/', _) => {
                self.advance();
                Token::Slash
            }
            ('.', _) => {
                self.advance();
                Token::Dot
            }
            (',', _) => {
                self.advance();
                Token::Comma
            }
            (';', _) => {
                self.advance();
                Token::Semicolon
            }
            (':', _) => {
                self.advance();
                Token::Colon
            }
            ('(', _) => {
                self.advance();
                Token::LParen
            }
            (')', _) => {
                self.advance();
                Token::RParen
            }
            ('{', _) => {
                self.advance();
                Token::LBrace
            }
            ('}', _) => {
                self.advance();
                Token::RBrace
            }
            ('[', _) => {
                self.advance();
                Token::LBracket
            }
            (']', _) => {
                self.advance();
                Token::RBracket
            }
            _ => return None,
        };

        Some(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();

            if self.current() == Some('/') && self.peek() == Some('/') {
                self.skip_line_comment();
                continue;
            }
            if self.current() == Some('/') && self.peek() == Some('*') {
                self.skip_block_comment()?;
                continue;
            }

            let span = self.span();

            match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some(ch) if ch.is_ascii_digit() => {
                    let token = self.read_number()?;
                    tokens.push(Spanned { token, span });
                }
                Some(ch @ ('"' | '\'')) => {
                    let token = self.read_string(ch)?;
                    tokens.push(Spanned { token, span });
                }
                Some(ch) if ch.is_alphabetic() || ch == '_' => {
                    let token = self.read_identifier();
                    tokens.push(Spanned { token, span });
                }
                Some(ch) => match self.read_operator() {
                    Some(token) => tokens.push(Spanned { token, span }),
                    None => {
                        return Err(self.error(format!("unexpected character: '{}'", ch)));
                    }
                },
            }
        }

        Ok(tokens)
    }
}
