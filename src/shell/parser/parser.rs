use log::debug;

use super::ast::{Command, Node, StdinSource};
use super::expand;
use super::heredoc;
use super::lexer::{self, Lexer};
use super::redirect;

/// 把一行输入解析成 AST。heredoc 正文在这里读完，fork 之前
/// 一定已经就绪；`subst` 负责执行 `$(…)` 里的命令并返回其输出。
///
/// 解析顺序：行尾 `&` → 管道切分 → 逐段命令替换 → 分词 →
/// 重定向提取 → heredoc 读取。空输入返回 `None`。
pub fn parse(
    input: &str,
    read_line: &mut dyn FnMut(&str) -> Option<String>,
    subst: &mut dyn FnMut(&str) -> String,
) -> Result<Option<Node>, String> {
    let (line, background) = lexer::strip_background(input);

    let mut stages = Vec::new();
    for part in lexer::split_pipeline(line) {
        let expanded = expand::expand_substitutions(&part, subst);
        let tokens = Lexer::new(&expanded).tokenize()?;
        let (argv, mut redir) = redirect::split(tokens)?;

        // 分隔符已出现就要读正文，即使这段命令最后是空的
        if let StdinSource::Heredoc { delimiter, body } = &mut redir.stdin {
            *body = heredoc::read_body(delimiter, read_line);
        }

        let mut words = argv.into_iter();
        let Some(program) = words.next() else {
            continue;
        };
        stages.push(Command {
            program,
            arguments: words.collect(),
            redir,
        });
    }

    if stages.is_empty() {
        return Ok(None);
    }

    let node = if stages.len() == 1 {
        Node::Command(stages.remove(0))
    } else {
        Node::Pipeline(stages)
    };

    debug!("解析结果: {:?}", node);
    Ok(Some(if background {
        Node::Background(Box::new(node))
    } else {
        node
    }))
}

#[cfg(test)]
mod tests {
    use super::super::ast::OutputSink;
    use super::*;

    fn parse_plain(input: &str) -> Result<Option<Node>, String> {
        let mut no_heredoc = |_: &str| -> Option<String> { None };
        let mut no_subst = |cmd: &str| panic!("unexpected substitution: {}", cmd);
        parse(input, &mut no_heredoc, &mut no_subst)
    }

    #[test]
    fn test_simple_command() {
        let node = parse_plain("ls -l").unwrap().unwrap();
        match node {
            Node::Command(cmd) => {
                assert_eq!(cmd.program, "ls");
                assert_eq!(cmd.arguments, vec!["-l"]);
            }
            _ => panic!("expected simple command"),
        }
    }

    #[test]
    fn test_pipeline() {
        let node = parse_plain("ls -l | grep foo | wc").unwrap().unwrap();
        match node {
            Node::Pipeline(stages) => {
                assert_eq!(stages.len(), 3);
                assert_eq!(stages[0].program, "ls");
                assert_eq!(stages[1].program, "grep");
                assert_eq!(stages[1].arguments, vec!["foo"]);
                assert_eq!(stages[2].program, "wc");
            }
            _ => panic!("expected pipeline"),
        }
    }

    #[test]
    fn test_background() {
        let node = parse_plain("sleep 10 &").unwrap().unwrap();
        match node {
            Node::Background(inner) => match *inner {
                Node::Command(cmd) => {
                    assert_eq!(cmd.program, "sleep");
                    assert_eq!(cmd.arguments, vec!["10"]);
                }
                _ => panic!("expected command under background"),
            },
            _ => panic!("expected background node"),
        }
    }

    #[test]
    fn test_redirection() {
        let node = parse_plain("echo hello > out.txt").unwrap().unwrap();
        match node {
            Node::Command(cmd) => {
                assert_eq!(cmd.arguments, vec!["hello"]);
                assert_eq!(
                    cmd.redir.stdout,
                    Some(OutputSink {
                        path: "out.txt".to_string(),
                        append: false
                    })
                );
            }
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn test_heredoc_is_read_at_parse_time() {
        let mut lines: Vec<String> = vec!["END", "beta", "alpha"]
            .into_iter()
            .map(String::from)
            .collect();
        let mut reader = move |_: &str| lines.pop();
        let mut no_subst = |_: &str| String::new();

        let node = parse("cat << END", &mut reader, &mut no_subst)
            .unwrap()
            .unwrap();
        match node {
            Node::Command(cmd) => match cmd.redir.stdin {
                StdinSource::Heredoc { body, .. } => assert_eq!(body, "alpha\nbeta\n"),
                _ => panic!("expected heredoc stdin"),
            },
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn test_substitution_result_is_resplit() {
        let mut no_heredoc = |_: &str| -> Option<String> { None };
        let mut subst = |_: &str| "one two".to_string();
        let node = parse("echo $(x)", &mut no_heredoc, &mut subst)
            .unwrap()
            .unwrap();
        match node {
            Node::Command(cmd) => assert_eq!(cmd.arguments, vec!["one", "two"]),
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_plain("").unwrap().is_none());
        assert!(parse_plain("   ").unwrap().is_none());
        assert!(parse_plain("&").unwrap().is_none());
    }

    #[test]
    fn test_empty_stage_is_skipped() {
        let node = parse_plain("ls | | wc").unwrap().unwrap();
        match node {
            Node::Pipeline(stages) => assert_eq!(stages.len(), 2),
            _ => panic!("expected pipeline"),
        }
    }

    #[test]
    fn test_unterminated_quote_is_error() {
        assert!(parse_plain("echo 'oops").is_err());
    }
}
