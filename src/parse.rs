use crate::command::{Command, DeleteCommand, GetCommand, PutCommand};
use crate::record::{Key, Payload};

pub fn parse_command(input: &str) -> Result<Command, String> {
    let tokens = Lexer::new(input).lex()?;
    parse_tokens(tokens.into_iter())
}

#[derive(Debug, PartialEq)]
enum Keyword {
    Get,
    Put,
    Delete,
    Summary,
    Exit,
}

#[derive(Debug, PartialEq)]
enum Token {
    Keyword(Keyword),
    Ident(String),
    Literal(String),
}

#[derive(Debug)]
struct Lexer {
    input: Vec<char>,
    pos: usize,
    buffer: String,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(input: &str) -> Lexer {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            buffer: String::new(),
            tokens: Vec::new(),
        }
    }

    fn lex(mut self) -> Result<Vec<Token>, String> {
        while let Some(c) = self.input.get(self.pos) {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c.is_alphanumeric() {
                self.lex_alphanumeric()?;
            } else if c == &'"' {
                self.lex_literal()?;
            } else {
                return Err(format!("Unexpected character: {}", c));
            }
        }
        Ok(self.tokens)
    }

    fn lex_alphanumeric(&mut self) -> Result<(), String> {
        while let Some(c) = self.input.get(self.pos) {
            self.pos += 1;
            if c.is_alphanumeric() {
                self.buffer.push(*c);
            } else if c.is_whitespace() {
                break;
            } else {
                return Err(format!("Unexpected character: {}", c));
            }
        }

        let token = match self.buffer.as_str() {
            "GET" | "get" => Token::Keyword(Keyword::Get),
            "PUT" | "put" => Token::Keyword(Keyword::Put),
            "DELETE" | "delete" => Token::Keyword(Keyword::Delete),
            "SUMMARY" | "summary" => Token::Keyword(Keyword::Summary),
            "EXIT" | "exit" => Token::Keyword(Keyword::Exit),
            _ => Token::Ident(self.buffer.clone()),
        };
        self.tokens.push(token);
        self.buffer.clear();
        Ok(())
    }

    fn lex_literal(&mut self) -> Result<(), String> {
        // Skip the first '"'
        self.pos += 1;

        let mut is_escaped = false;

        while let Some(c) = self.input.get(self.pos) {
            self.pos += 1;
            if is_escaped {
                match c {
                    '"' | '\\' => self.buffer.push(*c),
                    'n' => self.buffer.push('\n'),
                    't' => self.buffer.push('\t'),
                    _ => return Err(format!("Invalid escaped character: {}", c)),
                }
                is_escaped = false;
                continue;
            }
            match c {
                '"' => {
                    self.tokens.push(Token::Literal(self.buffer.clone()));
                    self.buffer.clear();
                    return Ok(());
                }
                '\\' => is_escaped = true,
                _ => self.buffer.push(*c),
            }
        }

        Err(format!("Unexpected end of input, {}", self.buffer))
    }
}

fn parse_tokens(mut tokens: impl Iterator<Item = Token>) -> Result<Command, String> {
    let Some(next) = tokens.next() else {
        return Err("Unexpected end of input".into());
    };
    let command = match next {
        Token::Keyword(keyword) => match keyword {
            Keyword::Get => process_get_keyword(&mut tokens)?,
            Keyword::Put => process_put_keyword(&mut tokens)?,
            Keyword::Delete => process_delete_keyword(&mut tokens)?,
            Keyword::Summary => Command::Summary,
            Keyword::Exit => Command::Exit,
        },
        _ => return Err("Expected keyword GET, PUT, DELETE, SUMMARY or EXIT".into()),
    };
    if tokens.next().is_some() {
        return Err("Unexpected token at end of command".to_string());
    }
    Ok(command)
}

fn parse_key(tokens: &mut impl Iterator<Item = Token>, keyword: &str) -> Result<Key, String> {
    match tokens.next() {
        Some(Token::Ident(ident)) => Key::try_from(ident.as_str()).map_err(|err| err.to_string()),
        _ => Err(format!("Expected key after {}", keyword)),
    }
}

fn process_put_keyword(tokens: &mut impl Iterator<Item = Token>) -> Result<Command, String> {
    let key = parse_key(tokens, "PUT")?;
    match tokens.next() {
        Some(Token::Literal(literal)) => {
            let payload = Payload::try_from(literal.as_str()).map_err(|err| err.to_string())?;
            Ok(Command::Put(PutCommand(key, payload)))
        }
        _ => Err("Expected quoted payload after key".to_string()),
    }
}

fn process_get_keyword(tokens: &mut impl Iterator<Item = Token>) -> Result<Command, String> {
    let key = parse_key(tokens, "GET")?;
    Ok(Command::Get(GetCommand(key)))
}

fn process_delete_keyword(tokens: &mut impl Iterator<Item = Token>) -> Result<Command, String> {
    let key = parse_key(tokens, "DELETE")?;
    Ok(Command::Delete(DeleteCommand(key)))
}
