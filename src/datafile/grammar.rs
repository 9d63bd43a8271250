//! Declarative grammar for measurement files.
//!
//! A measurement file is a list of `NAME = expression` statements. The
//! expression language covers literals, references to earlier names and
//! a handful of arithmetic operators. Nothing is executed.

use super::{Record, Value};

/// A grammar violation at a 1-indexed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    LParen,
    RParen,
}

/// Parse the statements of `lines` into a record.
///
/// Each item is a `(line_number, text)` pair so callers can drop lines
/// without disturbing the reported positions.
pub fn parse_statements<'a, I>(lines: I) -> Result<Record, GrammarError>
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    let mut record = Record::new();

    for (line, text) in lines {
        let tokens = tokenize(text).map_err(|reason| GrammarError { line, reason })?;
        if tokens.is_empty() {
            continue;
        }

        let (name, value) =
            parse_statement(&tokens, &record).map_err(|reason| GrammarError { line, reason })?;
        record.insert(name, value);
    }

    Ok(record)
}

fn parse_statement(tokens: &[Token], env: &Record) -> Result<(String, Value), String> {
    let name = match tokens.first() {
        Some(Token::Name(name)) if !is_keyword(name) => name.clone(),
        _ => return Err("statement must start with a name".to_string()),
    };

    if tokens.get(1) != Some(&Token::Assign) {
        return Err(format!("expected '=' after {}", name));
    }

    let mut parser = Parser {
        tokens: &tokens[2..],
        pos: 0,
        env,
    };
    let value = parser.expr()?;

    if parser.pos != parser.tokens.len() {
        return Err("unexpected trailing input".to_string());
    }

    Ok((name, value))
}

fn is_keyword(name: &str) -> bool {
    matches!(name, "True" | "False" | "None")
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    env: &'a Record,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<Value, String> {
        let mut left = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = add(left, right)?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    let right = self.term()?;
                    left = arith(left, right, "-")?;
                }
                _ => return Ok(left),
            }
        }
    }

    fn term(&mut self) -> Result<Value, String> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => "*",
                Some(Token::Slash) => "/",
                Some(Token::DoubleSlash) => "//",
                Some(Token::Percent) => "%",
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = arith(left, right, op)?;
        }
    }

    fn unary(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                match self.unary()? {
                    Value::Int(n) => n
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| "integer overflow".to_string()),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(format!("cannot negate {}", other)),
                }
            }
            Some(Token::Plus) => {
                self.pos += 1;
                match self.unary()? {
                    value @ (Value::Int(_) | Value::Float(_)) => Ok(value),
                    other => Err(format!("unary '+' on {}", other)),
                }
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Value, String> {
        match self.next() {
            Some(Token::Int(n)) => Ok(Value::Int(*n)),
            Some(Token::Float(f)) => Ok(Value::Float(*f)),
            Some(Token::Str(s)) => Ok(Value::Str(s.clone())),
            Some(Token::Name(name)) => match name.as_str() {
                "True" => Ok(Value::Bool(true)),
                "False" => Ok(Value::Bool(false)),
                "None" => Ok(Value::None),
                _ => self
                    .env
                    .get(name)
                    .cloned()
                    .ok_or_else(|| format!("unknown name {}", name)),
            },
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err("expected ')'".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn add(left: Value, right: Value) -> Result<Value, String> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (left, right) => arith(left, right, "+"),
    }
}

fn arith(left: Value, right: Value, op: &str) -> Result<Value, String> {
    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => int_arith(*a, *b, op),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            float_arith(as_float(&left), as_float(&right), op)
        }
        _ => Err(format!("unsupported operands for '{}': {} and {}", op, left, right)),
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(f) => *f,
        _ => f64::NAN,
    }
}

fn int_arith(a: i64, b: i64, op: &str) -> Result<Value, String> {
    if matches!(op, "/" | "//" | "%") && b == 0 {
        return Err("division by zero".to_string());
    }

    let result = match op {
        "+" => a.checked_add(b),
        "-" => a.checked_sub(b),
        "*" => a.checked_mul(b),
        "/" => return Ok(Value::Float(a as f64 / b as f64)),
        "//" => a.checked_div(b).map(|q| {
            // Round toward negative infinity.
            if a % b != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }),
        "%" => a.checked_rem(b).map(|r| {
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }),
        _ => return Err(format!("unknown operator {}", op)),
    };

    result
        .map(Value::Int)
        .ok_or_else(|| "integer overflow".to_string())
}

fn float_arith(a: f64, b: f64, op: &str) -> Result<Value, String> {
    if matches!(op, "/" | "//" | "%") && b == 0.0 {
        return Err("division by zero".to_string());
    }

    let result = match op {
        "+" => a + b,
        "-" => a - b,
        "*" => a * b,
        "/" => a / b,
        "//" => (a / b).floor(),
        "%" => a - b * (a / b).floor(),
        _ => return Err(format!("unknown operator {}", op)),
    };

    Ok(Value::Float(result))
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '#' {
            break;
        }

        if let Some(quote_at) = string_start(&chars, i) {
            let (value, end) = lex_string(&chars, quote_at)?;
            tokens.push(Token::Str(value));
            i = end;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            let (token, end) = lex_number(&chars, i)?;
            tokens.push(token);
            i = end;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Name(chars[start..i].iter().collect()));
            continue;
        }

        let token = match c {
            '=' if chars.get(i + 1) == Some(&'=') => {
                return Err("comparison is not allowed".to_string())
            }
            '=' => Token::Assign,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            other => return Err(format!("unexpected character '{}'", other)),
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

/// If a string literal (with optional `b`, `u` or `r` prefixes) starts at
/// `i`, return the index of its opening quote.
fn string_start(chars: &[char], i: usize) -> Option<usize> {
    let mut j = i;
    while j < chars.len() && j - i < 2 && matches!(chars[j], 'b' | 'B' | 'u' | 'U' | 'r' | 'R') {
        j += 1;
    }
    match chars.get(j) {
        Some('\'') | Some('"') => Some(j),
        _ => None,
    }
}

fn lex_string(chars: &[char], quote_at: usize) -> Result<(String, usize), String> {
    let raw = chars[..quote_at]
        .iter()
        .rev()
        .take_while(|c| c.is_alphabetic())
        .any(|c| matches!(c, 'r' | 'R'));
    let quote = chars[quote_at];
    let mut value = String::new();
    let mut i = quote_at + 1;

    while i < chars.len() {
        let c = chars[i];
        if c == quote {
            return Ok((value, i + 1));
        }
        if c == '\\' && i + 1 < chars.len() {
            let escaped = chars[i + 1];
            if raw {
                value.push('\\');
                value.push(escaped);
            } else {
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\\' | '\'' | '"' => value.push(escaped),
                    // Unknown escapes stay literal.
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        value.push(c);
        i += 1;
    }

    Err("unterminated string".to_string())
}

fn lex_number(chars: &[char], start: usize) -> Result<(Token, usize), String> {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let text: String = chars[start..i].iter().filter(|c| **c != '_').collect();

    if is_float {
        let value = text
            .parse::<f64>()
            .map_err(|_| format!("invalid float literal {}", text))?;
        return Ok((Token::Float(value), i));
    }

    let value = text
        .parse::<i64>()
        .map_err(|_| format!("invalid integer literal {}", text))?;

    // Long integer suffix from older runtimes.
    if i < chars.len() && matches!(chars[i], 'L' | 'l') {
        i += 1;
    }
    if i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
        return Err(format!("invalid numeric literal near {}", text));
    }

    Ok((Token::Int(value), i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Record, GrammarError> {
        parse_statements(content.lines().enumerate().map(|(i, l)| (i + 1, l)))
    }

    #[test]
    fn test_unknown_escape_kept() {
        let record = parse("P = 'C:\\dir\\d'\nQ = \"a\\qb\\n\"\n").unwrap();

        assert_eq!(record.get("P"), Some(&Value::Str("C:\\dir\\d".to_string())));
        assert_eq!(record.get("Q"), Some(&Value::Str("a\\qb\n".to_string())));
    }

    #[test]
    fn test_literals() {
        let record = parse(
            "A = 42\nB = 'abc'\nC = \"x\\ny\"\nD = 1.5\nE = True\nF = None\nG = 123L\nH = 1_000\n",
        )
        .unwrap();

        assert_eq!(record.get("A"), Some(&Value::Int(42)));
        assert_eq!(record.get("B"), Some(&Value::Str("abc".to_string())));
        assert_eq!(record.get("C"), Some(&Value::Str("x\ny".to_string())));
        assert_eq!(record.get("D"), Some(&Value::Float(1.5)));
        assert_eq!(record.get("E"), Some(&Value::Bool(true)));
        assert_eq!(record.get("F"), Some(&Value::None));
        assert_eq!(record.get("G"), Some(&Value::Int(123)));
        assert_eq!(record.get("H"), Some(&Value::Int(1000)));
        assert_eq!(record.len(), 8);
    }

    #[test]
    fn test_simple_expressions() {
        let record = parse("A = 2 * (3 + 4)\nB = A - 20\nC = -7 // 2\nD = -7 % 3\nE = 'a' + 'b'\nF = 7 / 2\n")
            .unwrap();

        assert_eq!(record.get("A"), Some(&Value::Int(14)));
        assert_eq!(record.get("B"), Some(&Value::Int(-6)));
        assert_eq!(record.get("C"), Some(&Value::Int(-4)));
        assert_eq!(record.get("D"), Some(&Value::Int(2)));
        assert_eq!(record.get("E"), Some(&Value::Str("ab".to_string())));
        assert_eq!(record.get("F"), Some(&Value::Float(3.5)));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let record = parse("# header\n\nA = 1  # trailing\nB = '#not a comment'\n").unwrap();
        assert_eq!(record.get("A"), Some(&Value::Int(1)));
        assert_eq!(record.get("B"), Some(&Value::Str("#not a comment".to_string())));
    }

    #[test]
    fn test_string_prefixes() {
        let record = parse("A = b'bytes'\nB = r'\\d'\nC = u'text'\n").unwrap();
        assert_eq!(record.get("A"), Some(&Value::Str("bytes".to_string())));
        assert_eq!(record.get("B"), Some(&Value::Str("\\d".to_string())));
        assert_eq!(record.get("C"), Some(&Value::Str("text".to_string())));
    }

    #[test]
    fn test_errors_report_line() {
        let err = parse("A = 1\nimport os\n").unwrap_err();
        assert_eq!(err.line, 2);

        let err = parse("A = open('x')\n").unwrap_err();
        assert_eq!(err.line, 1);

        assert!(parse("A = B\n").is_err());
        assert!(parse("A = 1 / 0\n").is_err());
        assert!(parse("A = 'unterminated\n").is_err());
        assert!(parse("A == 1\n").is_err());
        assert!(parse("True = 1\n").is_err());
        assert!(parse("A = 1 2\n").is_err());
        assert!(parse("A = 9223372036854775807 + 1\n").is_err());
    }
}
