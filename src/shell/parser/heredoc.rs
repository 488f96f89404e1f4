/// 读取 heredoc 正文：逐行提示 `"> "`，直到读到与分隔符完全相同的
/// 一行或输入结束。正文每行以 `\n` 结尾，分隔符行不包含在内。
pub fn read_body<F>(delimiter: &str, read_line: &mut F) -> String
where
    F: FnMut(&str) -> Option<String> + ?Sized,
{
    let mut body = String::new();

    while let Some(line) = read_line("> ") {
        if line == delimiter {
            break;
        }
        body.push_str(&line);
        body.push('\n');
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(lines: &[&str]) -> impl FnMut(&str) -> Option<String> {
        let mut queue: Vec<String> = lines.iter().rev().map(|l| l.to_string()).collect();
        move |_prompt: &str| queue.pop()
    }

    #[test]
    fn test_body_excludes_delimiter() {
        let mut reader = feed(&["alpha", "beta", "END", "gamma"]);
        assert_eq!(read_body("END", &mut reader), "alpha\nbeta\n");
    }

    #[test]
    fn test_eof_before_delimiter() {
        let mut reader = feed(&["only"]);
        assert_eq!(read_body("END", &mut reader), "only\n");
    }

    #[test]
    fn test_empty_body() {
        let mut reader = feed(&["END"]);
        assert_eq!(read_body("END", &mut reader), "");
    }

    #[test]
    fn test_delimiter_must_match_exactly() {
        let mut reader = feed(&["END ", " END", "END"]);
        assert_eq!(read_body("END", &mut reader), "END \n END\n");
    }
}
