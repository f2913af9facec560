//! Lexical analysis (tokenization) of console lines and call argument lists.

/// A token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Bare text, e.g. `User` or `42`.
    Word(String),
    /// Text that was enclosed in single or double quotes. The quotes are removed.
    Quoted(String),
    /// An inline object literal `{...}`, kept verbatim including the braces.
    Object(String),
}

impl Token {
    /// The token's text without any surrounding quotes.
    pub fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Quoted(s) | Token::Object(s) => s,
        }
    }
}

/// Errors that can occur during lexical analysis.
#[derive(Debug, PartialEq, Eq)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    UnfinishedQuote,
    /// A closing brace of an object literal was not found.
    UnfinishedObject,
}

/// What separates two tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Whitespace only, as in `update User 1234 name "Betty"`.
    Line,
    /// Whitespace or commas, as inside `User.update("1234", "name", "Betty")`.
    Arguments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingQuote(char),
    ReadingObject(usize),             // nesting depth
    ReadingObjectString(usize, char), // nesting depth, quote char
}

struct LexingFSM {
    input: Vec<char>,
    pos: usize,
    mode: Mode,
    state: LexingState,
    buffer: String,
}

impl LexingFSM {
    fn new(line: &str, mode: Mode) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            mode,
            state: LexingState::Start,
            buffer: String::new(),
        }
    }

    /// Runs the machine over the whole input.
    ///
    /// Quotes and braces may contain separators; everything else is split on them.
    fn make_tokens(&mut self) -> Result<Vec<Token>, LexingError> {
        let mut out = Vec::new();

        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingQuote(quote) => self.handle_quote(ch, quote, &mut out),
                LexingState::ReadingObject(depth) => self.handle_object(ch, depth, &mut out),
                LexingState::ReadingObjectString(depth, quote) => {
                    self.handle_object_string(ch, depth, quote)
                }
            }
        }

        match self.state {
            LexingState::ReadingQuote(_) => return Err(LexingError::UnfinishedQuote),
            LexingState::ReadingObject(_) | LexingState::ReadingObjectString(..) => {
                return Err(LexingError::UnfinishedObject);
            }
            LexingState::ReadingWord => out.push(Token::Word(std::mem::take(&mut self.buffer))),
            LexingState::Start => {}
        }

        Ok(out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn is_separator(&self, ch: char) -> bool {
        ch.is_whitespace() || (self.mode == Mode::Arguments && ch == ',')
    }

    fn handle_start(&mut self, ch: char) {
        match ch {
            c if self.is_separator(c) => {}
            '\'' | '"' => self.state = LexingState::ReadingQuote(ch),
            '{' => {
                self.buffer.push(ch);
                self.state = LexingState::ReadingObject(1);
            }
            c => {
                self.buffer.push(c);
                self.state = LexingState::ReadingWord;
            }
        }
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        if self.is_separator(ch) {
            out.push(Token::Word(std::mem::take(&mut self.buffer)));
            self.state = LexingState::Start;
        } else {
            self.buffer.push(ch);
        }
    }

    fn handle_quote(&mut self, ch: char, quote: char, out: &mut Vec<Token>) {
        match ch {
            '\\' => {
                // only the quote char and the backslash itself are escapable
                match self.input.get(self.pos).copied() {
                    Some(next) if next == quote || next == '\\' => {
                        self.read_char();
                        self.buffer.push(next);
                    }
                    _ => self.buffer.push(ch),
                }
            }
            c if c == quote => {
                out.push(Token::Quoted(std::mem::take(&mut self.buffer)));
                self.state = LexingState::Start;
            }
            c => self.buffer.push(c),
        }
    }

    fn handle_object(&mut self, ch: char, depth: usize, out: &mut Vec<Token>) {
        self.buffer.push(ch);
        match ch {
            '{' => self.state = LexingState::ReadingObject(depth + 1),
            '}' if depth == 1 => {
                out.push(Token::Object(std::mem::take(&mut self.buffer)));
                self.state = LexingState::Start;
            }
            '}' => self.state = LexingState::ReadingObject(depth - 1),
            '\'' | '"' => self.state = LexingState::ReadingObjectString(depth, ch),
            _ => {}
        }
    }

    fn handle_object_string(&mut self, ch: char, depth: usize, quote: char) {
        self.buffer.push(ch);
        if ch == '\\' {
            if let Some(next) = self.read_char() {
                self.buffer.push(next);
            }
        } else if ch == quote {
            self.state = LexingState::ReadingObject(depth);
        }
    }
}

/// Tokenizes a console line. Tokens are separated by whitespace.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(line, Mode::Line).make_tokens()
}

/// Tokenizes the inside of a call's parentheses. Tokens are separated by
/// commas and/or whitespace.
pub fn split_arguments(arguments: &str) -> Result<Vec<Token>, LexingError> {
    LexingFSM::new(arguments, Mode::Arguments).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    fn quoted(s: &str) -> Token {
        Token::Quoted(s.to_string())
    }

    #[test]
    fn splits_on_whitespace() {
        let tokens = split_into_tokens("  show \tUser   1234  ").unwrap();
        assert_eq!(tokens, vec![word("show"), word("User"), word("1234")]);
    }

    #[test]
    fn quotes_group_and_are_remembered() {
        let tokens = split_into_tokens(r#"update User 1 name "Betty Holberton""#).unwrap();
        assert_eq!(tokens[4], quoted("Betty Holberton"));

        let tokens = split_into_tokens("update User 1 email 'a@b.com'").unwrap();
        assert_eq!(tokens[4], quoted("a@b.com"));
    }

    #[test]
    fn escaped_quote_inside_quotes() {
        let tokens = split_into_tokens(r"x 'it\'s'").unwrap();
        assert_eq!(tokens, vec![word("x"), quoted("it's")]);
    }

    #[test]
    fn empty_quotes_make_an_empty_token() {
        let tokens = split_into_tokens(r#"a "" b"#).unwrap();
        assert_eq!(tokens, vec![word("a"), quoted(""), word("b")]);
    }

    #[test]
    fn object_literal_is_one_token() {
        let line = r#"update User 1 {"name": "A } B", "nested": {"x": 1}}"#;
        let tokens = split_into_tokens(line).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(
            tokens[3],
            Token::Object(r#"{"name": "A } B", "nested": {"x": 1}}"#.to_string())
        );
    }

    #[test]
    fn arguments_split_on_commas() {
        let tokens = split_arguments(r#""1234", "first_name", "John, Jr.""#).unwrap();
        assert_eq!(
            tokens,
            vec![quoted("1234"), quoted("first_name"), quoted("John, Jr.")]
        );

        let tokens = split_arguments(r#""1234", {"a": 1, "b": 2}"#).unwrap();
        assert_eq!(
            tokens,
            vec![quoted("1234"), Token::Object(r#"{"a": 1, "b": 2}"#.to_string())]
        );

        let tokens = split_arguments("1234,age,89").unwrap();
        assert_eq!(tokens, vec![word("1234"), word("age"), word("89")]);
    }

    #[test]
    fn commas_are_plain_text_on_a_line() {
        let tokens = split_into_tokens("update User 1 tags a,b").unwrap();
        assert_eq!(tokens[4], word("a,b"));
    }

    #[test]
    fn unfinished_structures_are_errors() {
        assert_eq!(
            split_into_tokens("show User 'abc"),
            Err(LexingError::UnfinishedQuote)
        );
        assert_eq!(
            split_into_tokens(r#"update User 1 {"a": 1"#),
            Err(LexingError::UnfinishedObject)
        );
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(split_into_tokens("").unwrap().is_empty());
        assert!(split_arguments("  ").unwrap().is_empty());
    }
}
