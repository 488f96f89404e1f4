use std::io::{self, BufRead, Write};

use log::{debug, error};
use nix::libc;
use nix::sys::wait::waitpid;
use nix::unistd::{close, dup2, fork, pipe, read, ForkResult};

use crate::shell::executor::Executor;

/// 对单引号之外的 `$(…)` 做命令替换。括号配平扫描支持嵌套，
/// 嵌套部分原样交给子 shell 递归处理；右括号配不平时 `$` 保持字面。
/// 替换结果直接拼进原文，之后由 tokenize 重新分词，但不会再次展开。
pub fn expand_substitutions(input: &str, run: &mut dyn FnMut(&str) -> String) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut result = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\'' && !in_double {
            in_single = !in_single;
            result.push(c);
        } else if c == '"' && !in_single {
            in_double = !in_double;
            result.push(c);
        } else if c == '$' && !in_single && i + 1 < chars.len() && chars[i + 1] == '(' {
            match find_closing(&chars, i + 2) {
                Some(end) => {
                    let inner: String = chars[i + 2..end].iter().collect();
                    debug!("命令替换: $({})", inner);
                    result.push_str(&run(&inner));
                    i = end;
                }
                None => result.push(c),
            }
        } else {
            result.push(c);
        }
        i += 1;
    }

    result
}

fn find_closing(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 1;
    for (offset, c) in chars[start..].iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// 在 fork 出的子 shell 里执行 `command`，stdout 接到管道，
/// 父进程读到 EOF 再收尸，最后去掉恰好一个结尾换行。
pub fn capture(command: &str, host: &Executor) -> String {
    let (read_fd, write_fd) = match pipe() {
        Ok(fds) => fds,
        Err(e) => {
            error!("命令替换创建管道失败: {}", e);
            return String::new();
        }
    };

    match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            let _ = close(read_fd);
            let _ = dup2(write_fd, libc::STDOUT_FILENO);
            let _ = close(write_fd);

            let mut read_line = stdin_line;
            let mut subshell = host.subshell();
            subshell.process(command, &mut read_line);
            let _ = io::stdout().flush();
            std::process::exit(0);
        }
        Ok(ForkResult::Parent { child }) => {
            let _ = close(write_fd);
            let mut output = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                match read(read_fd, &mut buf) {
                    Ok(0) => break,
                    Ok(n) => output.extend_from_slice(&buf[..n]),
                    Err(nix::errno::Errno::EINTR) => continue,
                    Err(_) => break,
                }
            }
            let _ = close(read_fd);
            let _ = waitpid(child, None);

            let mut output = String::from_utf8_lossy(&output).into_owned();
            if output.ends_with('\n') {
                output.pop();
            }
            output
        }
        Err(e) => {
            error!("命令替换 fork 失败: {}", e);
            String::new()
        }
    }
}

/// 子 shell 里 heredoc 改为直接从标准输入逐行读取。
fn stdin_line(prompt: &str) -> Option<String> {
    eprint!("{}", prompt);
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            if line.ends_with('\n') {
                line.pop();
            }
            Some(line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_runner(log: &mut Vec<String>) -> impl FnMut(&str) -> String + '_ {
        move |cmd: &str| {
            log.push(cmd.to_string());
            format!("<{}>", cmd)
        }
    }

    #[test]
    fn test_simple_substitution() {
        let mut seen = Vec::new();
        let out = expand_substitutions("echo $(date) x", &mut fake_runner(&mut seen));
        assert_eq!(out, "echo <date> x");
        assert_eq!(seen, vec!["date"]);
    }

    #[test]
    fn test_nested_goes_to_one_capture() {
        let mut seen = Vec::new();
        let out = expand_substitutions("echo $(a $(b c))", &mut fake_runner(&mut seen));
        assert_eq!(out, "echo <a $(b c)>");
        assert_eq!(seen, vec!["a $(b c)"]);
    }

    #[test]
    fn test_single_quotes_suppress() {
        let mut seen = Vec::new();
        let out = expand_substitutions("echo '$(date)'", &mut fake_runner(&mut seen));
        assert_eq!(out, "echo '$(date)'");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_double_quotes_allow() {
        let mut seen = Vec::new();
        let out = expand_substitutions(r#"echo "$(date)""#, &mut fake_runner(&mut seen));
        assert_eq!(out, r#"echo "<date>""#);
        assert_eq!(seen, vec!["date"]);
    }

    #[test]
    fn test_unbalanced_left_literal() {
        let mut seen = Vec::new();
        let out = expand_substitutions("echo $(oops", &mut fake_runner(&mut seen));
        assert_eq!(out, "echo $(oops");
        assert!(seen.is_empty());
    }

    #[test]
    fn test_plain_dollar_untouched() {
        let mut seen = Vec::new();
        let out = expand_substitutions("echo $HOME $", &mut fake_runner(&mut seen));
        assert_eq!(out, "echo $HOME $");
        assert!(seen.is_empty());
    }
}
