use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::ast::{BinOp, Block, Expr, Program, Stmt, UnOp};

/// Recursive-descent parser for Habilis.
///
/// The parser consumes a stream of lexed `Spanned` tokens and produces a
/// `Program`: a flat list of statements. Expressions are parsed with one
/// function per precedence level:
///
/// ```text
/// logic_or > logic_and > equality > comparison > term > factor
///          > unary > postfix (call / index / dot) > primary
/// ```
///
/// Statement separators (`;`) are optional and consumed when present.
/// The first error aborts the parse.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token.
    ///
    /// Used to provide stable source locations for errors that occur after
    /// advancing past the last token or at end-of-file.
    last_span: Option<Span>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    /// Returns the current token without consuming it.
    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    /// Peeks the current token kind without consuming anything.
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    /// Advances the token stream by one and returns the consumed token.
    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.pos).cloned();
        if let Some(s) = &token {
            self.last_span = Some(s.span.clone());
        }
        self.pos += 1;
        token
    }

    /// Constructs a `ParserError` at the most relevant location: the
    /// current token's span, else the last consumed token's, else (1,1).
    fn error(&self, message: &str) -> ParserError {
        if let Some(spanned) = self.current() {
            ParserError {
                message: message.to_string(),
                line: spanned.span.line,
                col: spanned.span.col,
            }
        } else if let Some(span) = &self.last_span {
            ParserError {
                message: message.to_string(),
                line: span.line,
                col: span.col,
            }
        } else {
            ParserError {
                message: message.to_string(),
                line: 1,
                col: 1,
            }
        }
    }

    /// Consumes the expected token or fails with a positioned error.
    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if self.peek() == Some(&expected) {
            self.advance();
            return Ok(());
        }
        let found = match self.peek() {
            Some(token) => token.to_string(),
            None => "EOF".to_string(),
        };
        Err(self.error(&format!("expected '{}', found '{}'", expected, found)))
    }

    /// Parses a complete program: statements until EOF.
    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let mut statements = Vec::new();

        loop {
            match self.peek() {
                None | Some(Token::Eof) => break,
                _ => statements.push(self.parse_statement()?),
            }
        }

        Ok(Program { statements })
    }

    /// statement := ( letStmt | returnStmt | expressionStmt ) ';'?
    fn parse_statement(&mut self) -> Result<Stmt, ParserError> {
        let stmt = match self.peek() {
            Some(Token::Let) => self.parse_let_statement()?,
            Some(Token::Return) => self.parse_return_statement()?,
            _ => Stmt::Expression(self.parse_expression()?),
        };

        if matches!(self.peek(), Some(Token::Semicolon)) {
            self.advance();
        }

        Ok(stmt)
    }

    /// letStmt := 'let' identifier '=' expression
    fn parse_let_statement(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // 'let'
        let name = self.parse_identifier_name()?;
        self.expect(Token::Assign)?;
        let value = self.parse_expression()?;
        Ok(Stmt::Let { name, value })
    }

    /// returnStmt := 'return' expression
    fn parse_return_statement(&mut self) -> Result<Stmt, ParserError> {
        self.advance(); // 'return'
        let value = self.parse_expression()?;
        Ok(Stmt::Return(value))
    }

    /// block := '{' statement* '}'
    fn parse_block(&mut self) -> Result<Block, ParserError> {
        self.expect(Token::LBrace)?;

        let mut statements = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.advance();
                    break;
                }
                None | Some(Token::Eof) => {
                    return Err(self.error("unexpected EOF, expected '}'"));
                }
                _ => statements.push(self.parse_statement()?),
            }
        }

        Ok(Block { statements })
    }

    fn parse_expression(&mut self) -> Result<Expr, ParserError> {
        self.parse_logic_or()
    }

    /// logic_or := logic_and ( '||' logic_and )*
    fn parse_logic_or(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_logic_and()?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_logic_and()?;
            node = binary(BinOp::Or, node, right);
        }
        Ok(node)
    }

    /// logic_and := equality ( '&&' equality )*
    fn parse_logic_and(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_equality()?;
        while matches!(self.peek(), Some(Token::And)) {
            self.advance();
            let right = self.parse_equality()?;
            node = binary(BinOp::And, node, right);
        }
        Ok(node)
    }

    /// equality := comparison ( ( '==' | '!=' ) comparison )*
    fn parse_equality(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            node = binary(op, node, right);
        }
        Ok(node)
    }

    /// comparison := term ( ( '<' | '<=' | '>' | '>=' ) term )*
    fn parse_comparison(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinOp::Lt,
                Some(Token::LtEq) => BinOp::LtEq,
                Some(Token::Gt) => BinOp::Gt,
                Some(Token::GtEq) => BinOp::GtEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            node = binary(op, node, right);
        }
        Ok(node)
    }

    /// term := factor ( ( '+' | '-' ) factor )*
    fn parse_term(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            node = binary(op, node, right);
        }
        Ok(node)
    }

    /// factor := unary ( ( '*' | '/' ) unary )*
    fn parse_factor(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Asterisk) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            node = binary(op, node, right);
        }
        Ok(node)
    }

    /// unary := ( '-' | '!' ) unary | postfix
    fn parse_unary(&mut self) -> Result<Expr, ParserError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnOp::Neg,
            Some(Token::Bang) => UnOp::Not,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// postfix := primary ( '(' args? ')' | '[' expression ']' | '.' primary )*
    fn parse_postfix(&mut self) -> Result<Expr, ParserError> {
        let mut node = self.parse_primary()?;

        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.advance();
                    let arguments = self.parse_expression_list(Token::RParen)?;
                    node = Expr::Call {
                        callee: Box::new(node),
                        arguments,
                    };
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    node = Expr::Index {
                        collection: Box::new(node),
                        index: Box::new(index),
                    };
                }
                Some(Token::Dot) => {
                    self.advance();
                    let right = self.parse_primary()?;
                    node = binary(BinOp::Dot, node, right);
                }
                _ => break,
            }
        }

        Ok(node)
    }

    /// primary := INT | STRING | IDENT | 'true' | 'false' | 'null'
    ///          | functionLiteral | arrayLiteral | hashLiteral
    ///          | ifExpression | '(' expression ')'
    fn parse_primary(&mut self) -> Result<Expr, ParserError> {
        let token = match self.current() {
            Some(spanned) => spanned.token.clone(),
            None => return Err(self.error("unexpected EOF, expected expression")),
        };

        match token {
            Token::Integer(value) => {
                self.advance();
                Ok(Expr::Integer(value))
            }
            Token::Str(value) => {
                self.advance();
                Ok(Expr::Str(value))
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident(name))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            Token::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            Token::Function => self.parse_function_literal(),
            Token::LBracket => self.parse_array_literal(),
            Token::LBrace => self.parse_hash_literal(),
            Token::If => self.parse_if_expression(),
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            other => Err(self.error(&format!("unexpected token '{}'", other))),
        }
    }

    /// ifExpression := 'if' '(' expression ')' block ( 'else' block )?
    fn parse_if_expression(&mut self) -> Result<Expr, ParserError> {
        self.advance(); // 'if'
        self.expect(Token::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(Token::RParen)?;

        let consequence = self.parse_block()?;

        let alternative = if matches!(self.peek(), Some(Token::Else)) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// functionLiteral := 'fn' '(' parameters? ')' block
    fn parse_function_literal(&mut self) -> Result<Expr, ParserError> {
        self.advance(); // 'fn'
        self.expect(Token::LParen)?;

        let mut parameters = Vec::new();
        if !matches!(self.peek(), Some(Token::RParen)) {
            parameters.push(self.parse_identifier_name()?);
            while matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
                parameters.push(self.parse_identifier_name()?);
            }
        }
        self.expect(Token::RParen)?;

        let body = self.parse_block()?;

        Ok(Expr::Function { parameters, body })
    }

    /// arrayLiteral := '[' expressions? ']'
    fn parse_array_literal(&mut self) -> Result<Expr, ParserError> {
        self.advance(); // '['
        let elements = self.parse_expression_list(Token::RBracket)?;
        Ok(Expr::Array(elements))
    }

    /// hashLiteral := '{' ( expression ':' expression )
    ///                    ( ',' expression ':' expression )* '}'
    fn parse_hash_literal(&mut self) -> Result<Expr, ParserError> {
        self.advance(); // '{'

        let mut pairs = Vec::new();
        if !matches!(self.peek(), Some(Token::RBrace)) {
            loop {
                let key = self.parse_expression()?;
                self.expect(Token::Colon)?;
                let value = self.parse_expression()?;
                pairs.push((key, value));

                if matches!(self.peek(), Some(Token::Comma)) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RBrace)?;

        Ok(Expr::Hash(pairs))
    }

    /// Comma-separated expressions terminated by `closing` (which is
    /// consumed). Accepts the empty list.
    fn parse_expression_list(&mut self, closing: Token) -> Result<Vec<Expr>, ParserError> {
        let mut list = Vec::new();

        if self.peek() == Some(&closing) {
            self.advance();
            return Ok(list);
        }

        list.push(self.parse_expression()?);
        while matches!(self.peek(), Some(Token::Comma)) {
            self.advance();
            list.push(self.parse_expression()?);
        }
        self.expect(closing)?;

        Ok(list)
    }

    fn parse_identifier_name(&mut self) -> Result<String, ParserError> {
        match self.advance() {
            Some(Spanned {
                token: Token::Ident(name),
                ..
            }) => Ok(name),
            Some(Spanned { token, .. }) => {
                Err(self.error(&format!("expected identifier, found '{}'", token)))
            }
            None => Err(self.error("expected identifier, found EOF")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
