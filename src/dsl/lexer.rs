//! Lexer (tokenizer) for the driver definition DSL.
//!
//! Besides the default token mode, the lexer has two capture modes the
//! parser switches into explicitly: [`Lexer::capture_code`] returns an opaque
//! brace-balanced block and [`Lexer::capture_expression`] returns the raw
//! text of an attribute value up to its terminating `;`.

use crate::error::{GeneratorError, Result};

/// Comment prefix preserved into the generated output.
pub const TODO_MARKER: &str = "// TODO:";

/// A token produced by the lexer.
///
/// The text is a slice of the source; nothing is copied until the parser
/// commits a value into the AST.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text (string contents without quotes)
    pub text: &'a str,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Open brace '{'
    LBrace,
    /// Close brace '}'
    RBrace,
    /// Equals sign '='
    Equals,
    /// Semicolon ';'
    Semicolon,
    /// A C-style identifier
    Identifier,
    /// A double-quoted string
    String,
    /// A number (digits, '.', '-', 'e', 'E')
    Number,
    /// Keyword `true`
    True,
    /// Keyword `false`
    False,
    /// Opaque brace-delimited code
    Code,
    /// Opaque semicolon-terminated expression
    Expression,
    /// No token pending (end of input)
    None,
}

impl TokenKind {
    /// Human readable description used in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Equals => "'='",
            TokenKind::Semicolon => "';'",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::Code => "code block",
            TokenKind::Expression => "expression",
            TokenKind::None => "end of input",
        }
    }
}

/// Lexer for tokenizing driver definitions.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    todos: Vec<String>,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            todos: Vec::new(),
        }
    }

    /// Current line and column (both 1-indexed).
    pub fn position(&self) -> (usize, usize) {
        (self.line, self.column)
    }

    /// Take the `// TODO:` comments collected so far.
    pub fn take_todos(&mut self) -> Vec<String> {
        std::mem::take(&mut self.todos)
    }

    /// Get the next token in default mode.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace_and_comments();

        let line = self.line;
        let column = self.column;
        let start = self.pos;

        let ch = match self.peek() {
            Some(ch) => ch,
            None => return Ok(self.token(TokenKind::None, start, start, line, column)),
        };

        let token = match ch {
            '{' | '}' | '=' | ';' => {
                self.advance();
                let kind = match ch {
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    '=' => TokenKind::Equals,
                    _ => TokenKind::Semicolon,
                };
                self.token(kind, start, self.pos, line, column)
            }
            '"' => {
                self.advance();
                let begin = self.pos;
                loop {
                    match self.peek() {
                        Some('"') => break,
                        Some(_) => {
                            self.advance();
                        }
                        None => {
                            return Err(GeneratorError::lexer(line, column, "unterminated string"));
                        }
                    }
                }
                let end = self.pos;
                self.advance();
                self.token(TokenKind::String, begin, end, line, column)
            }
            '-' | '0'..='9' => {
                self.advance();
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E') {
                        self.advance();
                    } else {
                        break;
                    }
                }
                self.token(TokenKind::Number, start, self.pos, line, column)
            }
            _ if ch.is_ascii_alphabetic() || ch == '_' => {
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let kind = match &self.input[start..self.pos] {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    _ => TokenKind::Identifier,
                };
                self.token(kind, start, self.pos, line, column)
            }
            _ => {
                return Err(GeneratorError::lexer(
                    line,
                    column,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };

        Ok(token)
    }

    /// Capture an opaque code block.
    ///
    /// Must be called right after the opening `{` was consumed. Leading blank
    /// lines are skipped and the block ends before the `}` that balances the
    /// opening brace; that `}` is left for [`Lexer::next_token`]. The
    /// returned text starts at the beginning of the first non-blank line (so
    /// its indentation is kept) and has trailing whitespace trimmed.
    pub fn capture_code(&mut self) -> Result<Token<'a>> {
        let line = self.line;
        let column = self.column;
        self.skip_blank_lines();

        let begin = self.pos;
        let (first_line, first_column) = (self.line, self.column);
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(GeneratorError::lexer(line, column, "unterminated code block"));
                }
                Some('{') => {
                    depth += 1;
                    self.advance();
                }
                Some('}') => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    self.advance();
                }
                Some('"') | Some('\'') => self.skip_literal(line, column)?,
                Some('/') if self.rest().starts_with("//") => self.skip_line_comment(),
                Some('/') if self.rest().starts_with("/*") => self.skip_block_comment(line, column)?,
                Some(_) => {
                    self.advance();
                }
            }
        }

        let end = begin + self.input[begin..self.pos].trim_end().len();
        Ok(self.token(TokenKind::Code, begin, end, first_line, first_column))
    }

    /// Capture an opaque expression.
    ///
    /// Must be called right after `name =` was consumed. Leading whitespace is
    /// skipped; the expression ends before the next `;` that is not inside a
    /// string or character literal. The `;` is left for [`Lexer::next_token`].
    /// A closing bracket with no opening counterpart means the `;` is missing.
    pub fn capture_expression(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;
        let begin = self.pos;
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None => {
                    return Err(GeneratorError::lexer(
                        line,
                        column,
                        "unterminated expression, expected ';'",
                    ));
                }
                Some(';') if depth == 0 => break,
                Some('(' | '[' | '{') => {
                    depth += 1;
                    self.advance();
                }
                Some(c @ (')' | ']' | '}')) => {
                    if depth == 0 {
                        let (l, col) = self.position();
                        return Err(GeneratorError::syntax(
                            l,
                            col,
                            "expected ';'",
                            Some(&c.to_string()),
                        ));
                    }
                    depth -= 1;
                    self.advance();
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some('"') | Some('\'') => self.skip_literal(line, column)?,
                Some(_) => {
                    self.advance();
                }
            }
        }

        let end = begin + self.input[begin..self.pos].trim_end().len();
        Ok(self.token(TokenKind::Expression, begin, end, line, column))
    }

    fn token(&self, kind: TokenKind, begin: usize, end: usize, line: usize, column: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.input[begin..end],
            line,
            column,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("//") {
                let begin = self.pos;
                self.skip_line_comment();
                let comment = self.input[begin..self.pos].trim_end();
                if comment.starts_with(TODO_MARKER) {
                    self.todos.push(comment.to_string());
                }
            } else {
                break;
            }
        }
    }

    fn skip_blank_lines(&mut self) {
        loop {
            let rest = self.rest();
            match rest.find('\n') {
                Some(newline) if rest[..newline].trim().is_empty() => {
                    for _ in 0..=newline {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self, line: usize, column: usize) -> Result<()> {
        self.advance();
        self.advance();
        loop {
            if self.rest().starts_with("*/") {
                self.advance();
                self.advance();
                return Ok(());
            }
            if self.advance().is_none() {
                return Err(GeneratorError::lexer(line, column, "unterminated comment"));
            }
        }
    }

    fn skip_literal(&mut self, line: usize, column: usize) -> Result<()> {
        let quote = self.advance();
        loop {
            match self.advance() {
                None => return Err(GeneratorError::lexer(line, column, "unterminated literal")),
                Some('\\') => {
                    self.advance();
                }
                Some(ch) if Some(ch) == quote => return Ok(()),
                Some('\n') if quote == Some('\'') => return Ok(()),
                Some(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(input);
        let mut kinds = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            kinds.push(tok.kind);
            if tok.kind == TokenKind::None {
                break;
            }
        }
        kinds
    }

    #[test]
    fn test_lexer_basic() {
        let input = "driver foo { label = \"Foo\"; version = 1; }";
        let mut lexer = Lexer::new(input);

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "driver");

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "foo");
        assert_eq!((tok.line, tok.column), (1, 8));

        assert_eq!(
            kinds(input),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::LBrace,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::Semicolon,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::None,
            ]
        );
    }

    #[test]
    fn test_lexer_string_has_no_escapes() {
        let mut lexer = Lexer::new(r#""a\" rest"#);
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.text, "a\\");
    }

    #[test]
    fn test_lexer_keywords_and_numbers() {
        assert_eq!(
            kinds("true false truex -1.5e-3 42"),
            vec![
                TokenKind::True,
                TokenKind::False,
                TokenKind::Identifier,
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::None,
            ]
        );

        // Malformed numbers are bounded by character class only.
        let mut lexer = Lexer::new("1.2.3--e");
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Number);
        assert_eq!(tok.text, "1.2.3--e");
    }

    #[test]
    fn test_lexer_todo_comments() {
        let input = "// plain comment\n// TODO: test with hardware\ndriver // TODO: second\n";
        let mut lexer = Lexer::new(input);
        assert_eq!(lexer.next_token().unwrap().text, "driver");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::None);
        assert_eq!(
            lexer.take_todos(),
            vec!["// TODO: test with hardware", "// TODO: second"]
        );
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let mut lexer = Lexer::new("\"never closed");
        assert!(matches!(
            lexer.next_token(),
            Err(GeneratorError::LexerError { line: 1, column: 1, .. })
        ));
    }

    #[test]
    fn test_capture_code_balances_braces() {
        let input = "\n\n\tif (a) {\n\t\tb();\n\t}\n\t{ { } }\n\n}rest";
        let mut lexer = Lexer::new(input);
        let tok = lexer.capture_code().unwrap();
        assert_eq!(tok.kind, TokenKind::Code);
        assert_eq!(tok.text, "\tif (a) {\n\t\tb();\n\t}\n\t{ { } }");
        assert_eq!(tok.line, 3);
        assert_eq!(
            tok.text.matches('{').count(),
            tok.text.matches('}').count()
        );
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::RBrace);
        assert_eq!(lexer.next_token().unwrap().text, "rest");
    }

    #[test]
    fn test_capture_code_nested_depth() {
        for n in 1..6 {
            let body = format!("{}x{}", "{".repeat(n), "}".repeat(n));
            let input = format!(" {} }}", body);
            let mut lexer = Lexer::new(&input);
            let tok = lexer.capture_code().unwrap();
            assert_eq!(tok.text.trim(), body);
        }
    }

    #[test]
    fn test_capture_code_ignores_braces_in_literals() {
        let input = " printf(\"}\"); char c = '{'; // }\n}";
        let mut lexer = Lexer::new(input);
        let tok = lexer.capture_code().unwrap();
        assert_eq!(tok.text, " printf(\"}\"); char c = '{'; // }");
    }

    #[test]
    fn test_capture_code_empty_and_unterminated() {
        let mut lexer = Lexer::new(" }");
        assert_eq!(lexer.capture_code().unwrap().text, "");

        let mut lexer = Lexer::new("{ x();");
        assert!(matches!(
            lexer.capture_code(),
            Err(GeneratorError::LexerError { .. })
        ));
    }

    #[test]
    fn test_capture_expression() {
        let mut lexer = Lexer::new("  a ? \"x;y\" : f(1, 2)  ; next");
        let tok = lexer.capture_expression().unwrap();
        assert_eq!(tok.kind, TokenKind::Expression);
        assert_eq!(tok.text, "a ? \"x;y\" : f(1, 2)");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Semicolon);
    }

    #[test]
    fn test_capture_expression_missing_semicolon() {
        let mut lexer = Lexer::new(" 1 } }");
        match lexer.capture_expression() {
            Err(GeneratorError::SyntaxError { message, line, column, token }) => {
                assert_eq!(message, "expected ';'");
                assert_eq!((line, column), (1, 4));
                assert_eq!(token.as_deref(), Some("}"));
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let mut lexer = Lexer::new(" 1");
        assert!(matches!(
            lexer.capture_expression(),
            Err(GeneratorError::LexerError { .. })
        ));
    }
}
