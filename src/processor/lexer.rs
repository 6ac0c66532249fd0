//! Small hand-written lexer for the schema language.
//!
//! At this stage we *only* break the raw source string into `Token`s.
//! Keywords are not recognised here – `type`, `namespace`, `true` all come
//! out as `Ident`. The parser interprets them later.
//
//  Lexical items:
//
//      Ident    ::= [A-Za-z_][A-Za-z0-9_]*
//      Int      ::= '-'? [0-9]+              (fits in i64)
//      Float    ::= '-'? [0-9]+ '.' [0-9]+
//      Str      ::= '"' ( [^"\\\n] | '\' [nt"\\] )* '"'
//      Doc      ::= '///' .* EOL
//      Symbols  ::= '{' '}' '[' ']' ':' ',' ';' '?' '=' '.' '@'
//      Whitespace and `//` comments are discarded.
//
//  A lexical error does not stop the lexer: the offending character is
//  skipped and lexing resumes, so the parser can keep collecting errors.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Doc(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Semicolon,
    Question,
    Equals,
    Dot,
    At,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier `{name}`"),
            Token::Int(v) => write!(f, "integer `{v}`"),
            Token::Float(v) => write!(f, "float `{v:?}`"),
            Token::Str(_) => f.write_str("string literal"),
            Token::Doc(_) => f.write_str("doc comment"),
            Token::LBrace => f.write_str("`{`"),
            Token::RBrace => f.write_str("`}`"),
            Token::LBracket => f.write_str("`[`"),
            Token::RBracket => f.write_str("`]`"),
            Token::Colon => f.write_str("`:`"),
            Token::Comma => f.write_str("`,`"),
            Token::Semicolon => f.write_str("`;`"),
            Token::Question => f.write_str("`?`"),
            Token::Equals => f.write_str("`=`"),
            Token::Dot => f.write_str("`.`"),
            Token::At => f.write_str("`@`"),
            Token::Eof => f.write_str("end of file"),
        }
    }
}

/// A token together with the position of its first character.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexed {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

#[derive(Clone)]
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    /// Character after the next one.
    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next()
    }

    fn consume_while<F: Fn(char) -> bool>(&mut self, pred: F, buf: &mut String) {
        while let Some(c) = self.peek_char() {
            if pred(c) {
                buf.push(c);
                self.next_char();
            } else {
                break;
            }
        }
    }

    fn skip_line(&mut self) -> String {
        let mut rest = String::new();
        self.consume_while(|c| c != '\n', &mut rest);
        rest
    }

    fn read_identifier(&mut self, first: char) -> String {
        let mut id = String::new();
        id.push(first);
        self.consume_while(|c| c.is_ascii_alphanumeric() || c == '_', &mut id);
        id
    }

    /// `num` holds what was read so far: the first digit, maybe after a `-`.
    fn read_number(&mut self, mut num: String) -> Result<Token, String> {
        self.consume_while(|c| c.is_ascii_digit(), &mut num);

        let is_float =
            self.peek_char() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit());
        if is_float {
            num.push('.');
            self.next_char();
            self.consume_while(|c| c.is_ascii_digit(), &mut num);
            return num
                .parse::<f64>()
                .map(Token::Float)
                .map_err(|_| format!("invalid float literal `{num}`"));
        }

        num.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| format!("integer literal `{num}` does not fit in 64 bits"))
    }

    fn read_string(&mut self) -> Result<String, String> {
        let mut txt = String::new();
        while let Some(c) = self.peek_char() {
            match c {
                '"' => {
                    self.next_char();
                    return Ok(txt);
                }
                '\n' => break,
                '\\' => {
                    self.next_char();
                    let escaped = match self.next_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => return Err(format!("unknown escape `\\{other}`")),
                        None => break,
                    };
                    txt.push(escaped);
                }
                _ => {
                    txt.push(c);
                    self.next_char();
                }
            }
        }
        Err("unterminated string literal".into())
    }

    /// Skips whitespace and plain comments. Stops in front of a doc comment.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.next_char();
                }
                Some('/') if self.peek_second() == Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    ahead.next();
                    let third = ahead.next();
                    let fourth = ahead.next();
                    if third == Some('/') && fourth != Some('/') {
                        return;
                    }
                    self.skip_line();
                }
                _ => return,
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Lexed, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.skip_trivia();

        let (line, column) = (self.line, self.column);
        let ch = match self.next_char() {
            Some(c) => c,
            None => {
                self.finished = true;
                return Some(Ok(Lexed {
                    token: Token::Eof,
                    line,
                    column,
                }));
            }
        };

        let tok_res = match ch {
            '{' => Ok(Token::LBrace),
            '}' => Ok(Token::RBrace),
            '[' => Ok(Token::LBracket),
            ']' => Ok(Token::RBracket),
            ':' => Ok(Token::Colon),
            ',' => Ok(Token::Comma),
            ';' => Ok(Token::Semicolon),
            '?' => Ok(Token::Question),
            '=' => Ok(Token::Equals),
            '.' => Ok(Token::Dot),
            '@' => Ok(Token::At),
            '"' => self.read_string().map(Token::Str),
            '/' if self.peek_char() == Some('/') => {
                // skip_trivia only leaves `///` doc comments in place
                self.next_char();
                self.next_char();
                Ok(Token::Doc(self.skip_line().trim().to_string()))
            }
            '-' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number(String::from('-'))
            }
            c if c.is_ascii_digit() => self.read_number(c.to_string()),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(Token::Ident(self.read_identifier(c))),
            e => Err(format!("unexpected character `{e}`")),
        };

        Some(
            tok_res
                .map(|token| Lexed {
                    token,
                    line,
                    column,
                })
                .map_err(|message| LexError {
                    message,
                    line,
                    column,
                }),
        )
    }
}
