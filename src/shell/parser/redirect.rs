use super::ast::{OutputSink, RedirectionSpec, StdinSource};

/// 重定向操作符，按长度从长到短排列；
/// 前缀匹配必须先试长操作符，`2>>` 不能被 `2>` 截走。
const ATTACHED_OPS: &[&str] = &["1>>", "2>>", "<<", "1>", "2>", ">>", "<", ">"];

/// 从 token 序列中提取重定向，返回剩余 argv 和重定向配置。
/// 操作符既可以独立成词（操作数是下一个 token），也可以
/// 和操作数连写（`>file`、`<<EOF`）。同一数据流后写覆盖先写。
pub fn split(tokens: Vec<String>) -> Result<(Vec<String>, RedirectionSpec), String> {
    let mut argv = Vec::new();
    let mut redir = RedirectionSpec::default();
    let mut iter = tokens.into_iter();

    while let Some(token) = iter.next() {
        if is_operator(&token) {
            let operand = iter
                .next()
                .ok_or_else(|| format!("syntax error: expected operand after '{}'", token))?;
            apply(&mut redir, &token, operand);
            continue;
        }

        match split_attached(&token) {
            Some((op, operand)) => apply(&mut redir, op, operand.to_string()),
            None => argv.push(token),
        }
    }

    Ok((argv, redir))
}

fn is_operator(token: &str) -> bool {
    ATTACHED_OPS.contains(&token)
}

fn split_attached(token: &str) -> Option<(&'static str, &str)> {
    for op in ATTACHED_OPS {
        if let Some(rest) = token.strip_prefix(op) {
            if !rest.is_empty() {
                return Some((op, rest));
            }
        }
    }
    None
}

fn apply(redir: &mut RedirectionSpec, op: &str, operand: String) {
    match op {
        "<<" => {
            redir.stdin = StdinSource::Heredoc {
                delimiter: operand,
                body: String::new(),
            }
        }
        "<" => redir.stdin = StdinSource::File(operand),
        ">" | "1>" => {
            redir.stdout = Some(OutputSink {
                path: operand,
                append: false,
            })
        }
        ">>" | "1>>" => {
            redir.stdout = Some(OutputSink {
                path: operand,
                append: true,
            })
        }
        "2>" => {
            redir.stderr = Some(OutputSink {
                path: operand,
                append: false,
            })
        }
        "2>>" => {
            redir.stderr = Some(OutputSink {
                path: operand,
                append: true,
            })
        }
        _ => unreachable!("未注册的重定向操作符: {}", op),
    }
}
