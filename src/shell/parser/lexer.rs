use std::iter::Peekable;
use std::str::Chars;

/// 按引号规则把一行切成单词。引号字符本身不进入单词，
/// 单引号内反斜杠是字面字符，单引号外反斜杠转义下一个字符。
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<String>, String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_single = false;
        let mut in_double = false;

        while let Some(c) = self.read_char() {
            match c {
                '\\' if !in_single => {
                    if let Some(next) = self.read_char() {
                        current.push(next);
                    }
                }
                '\'' if !in_double => in_single = !in_single,
                '"' if !in_single => in_double = !in_double,
                ' ' | '\t' if !in_single && !in_double => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                _ => current.push(c),
            }
        }

        if in_single || in_double {
            return Err("syntax error: unterminated quote".to_string());
        }

        if !current.is_empty() {
            tokens.push(current);
        }

        Ok(tokens)
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }
}

/// 按未被引用的 `|` 切分管道段。引号里的 `|` 是字面字符，
/// 反斜杠和引号字符保留在段内，留给后面的 tokenize 处理。
pub fn split_pipeline(input: &str) -> Vec<String> {
    let mut stages = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' => {
                escaped = true;
                current.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                current.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                current.push(c);
            }
            '|' if !in_single && !in_double => {
                stages.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        stages.push(current.trim().to_string());
    }

    stages
}

/// 去掉行尾的 `&` 并返回是否后台执行。只有裸的行尾 `&` 才算，
/// 被反斜杠转义的不算；引号里的 `&` 不可能出现在去空白后的行尾。
pub fn strip_background(input: &str) -> (&str, bool) {
    let trimmed = input.trim();
    if let Some(rest) = trimmed.strip_suffix('&') {
        if !rest.ends_with('\\') {
            return (rest.trim_end(), true);
        }
    }
    (trimmed, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_command() {
        let tokens = Lexer::new("ls -l").tokenize().unwrap();
        assert_eq!(tokens, vec!["ls", "-l"]);
    }

    #[test]
    fn test_collapses_whitespace() {
        let tokens = Lexer::new("  echo \t hello   world ").tokenize().unwrap();
        assert_eq!(tokens, vec!["echo", "hello", "world"]);
    }

    #[test]
    fn test_quoted_strings() {
        let tokens = Lexer::new(r#"echo "hello world" 'foo bar'"#)
            .tokenize()
            .unwrap();
        assert_eq!(tokens, vec!["echo", "hello world", "foo bar"]);
    }

    #[test]
    fn test_quotes_join_words() {
        let tokens = Lexer::new(r#"echo a"b c"d"#).tokenize().unwrap();
        assert_eq!(tokens, vec!["echo", "ab cd"]);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        let tokens = Lexer::new(r#"echo '\ " |'"#).tokenize().unwrap();
        assert_eq!(tokens, vec!["echo", r#"\ " |"#]);
    }

    #[test]
    fn test_backslash_escapes() {
        let tokens = Lexer::new(r#"echo a\ b \"x\""#).tokenize().unwrap();
        assert_eq!(tokens, vec!["echo", "a b", "\"x\""]);
    }

    #[test]
    fn test_unterminated_quote() {
        assert!(Lexer::new("echo 'oops").tokenize().is_err());
        assert!(Lexer::new("echo \"oops").tokenize().is_err());
    }

    #[test]
    fn test_quote_idempotence() {
        let tokens = Lexer::new("'a b \"c\" d'").tokenize().unwrap();
        assert_eq!(tokens, vec!["a b \"c\" d"]);
    }

    #[test]
    fn test_split_pipeline() {
        assert_eq!(split_pipeline("ls | grep foo"), vec!["ls", "grep foo"]);
        assert_eq!(split_pipeline("echo 'a | b'"), vec!["echo 'a | b'"]);
        assert_eq!(
            split_pipeline(r#"echo "x|y" | wc"#),
            vec![r#"echo "x|y""#, "wc"]
        );
    }

    #[test]
    fn test_split_pipeline_keeps_escapes() {
        assert_eq!(split_pipeline(r"echo a\|b"), vec![r"echo a\|b"]);
    }

    #[test]
    fn test_strip_background() {
        assert_eq!(strip_background("sleep 100 &"), ("sleep 100", true));
        assert_eq!(strip_background("sleep 100"), ("sleep 100", false));
        assert_eq!(strip_background(r"echo \&"), (r"echo \&", false));
        assert_eq!(strip_background("echo 'a&'"), ("echo 'a&'", false));
    }
}
