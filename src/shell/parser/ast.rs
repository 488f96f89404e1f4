use std::fmt;

/// stdin 的来源。同一条命令里后写的重定向覆盖先写的。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StdinSource {
    #[default]
    Inherit,
    File(String),
    Heredoc { delimiter: String, body: String },
}

impl StdinSource {
    pub fn is_heredoc(&self) -> bool {
        matches!(self, StdinSource::Heredoc { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSink {
    pub path: String,
    pub append: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RedirectionSpec {
    pub stdin: StdinSource,
    pub stdout: Option<OutputSink>,
    pub stderr: Option<OutputSink>,
}

#[derive(Debug, Clone, Default)]
pub struct Command {
    pub program: String,
    pub arguments: Vec<String>,
    pub redir: RedirectionSpec,
}

/// 后台标记只出现在最外层，解析器不会生成嵌套的 Background。
#[derive(Debug)]
pub enum Node {
    Command(Command),
    Pipeline(Vec<Command>),
    Background(Box<Node>),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.arguments {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
