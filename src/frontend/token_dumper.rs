use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

/// Debug listing of the token stream, one `[line:col] KIND token` row per
/// token. Used by the `--tokens` CLI mode.
pub struct TokenDumper {
    pub color: bool,
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self { color: true }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            self.print_one(s);
        }
    }

    fn print_one(&self, s: &Spanned) {
        let line = s.span.line;
        let col = s.span.col;

        let kind = self.kind(&s.token);
        let colr = if self.color { self.color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        println!(
            "[{:02}:{:02}] {}{:<8} {}{}",
            line, col, colr, kind, s.token, reset
        );
    }

    fn kind(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => "EOF",

            // literals
            Integer(_) => "INT",
            Str(_) => "STRING",

            // names
            Ident(_) => "IDENT",

            // structure
            LParen | RParen => "PAREN",
            LBrace | RBrace => "BRACE",
            LBracket | RBracket => "BRACKET",
            Comma | Semicolon | Colon => "DELIM",

            // ops / comparisons
            Assign | Plus | Minus | Bang | Asterisk | Slash | Dot => "OP",
            Lt | LtEq | Gt | GtEq | Eq | NotEq => "CMP",
            And | Or => "LOGIC",

            // everything else = keyword
            _ => "KEYWORD",
        }
    }

    fn color(&self, t: &Token) -> &'static str {
        use Token::*;
        match t {
            Eof => Self::DIM,
            Str(_) => Self::GRN,
            Integer(_) | True | False | Null => Self::CYN,
            Ident(_) => Self::YEL,
            Assign | Plus | Minus | Bang | Asterisk | Slash | Dot => Self::MAG,
            Lt | LtEq | Gt | GtEq | Eq | NotEq | And | Or => Self::MAG,
            _ => Self::RESET,
        }
    }
}
