use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::path::PathBuf;

use log::{debug, error};
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::sys::stat::Mode;
use nix::sys::termios::{tcsetattr, SetArg};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, close, dup2, execv, fork, pipe, ForkResult, Pid};

use super::builtins;
use crate::shell::history::HistoryList;
use crate::shell::job_control::JobTable;
use crate::shell::parser::{
    self,
    ast::{Command, Node, OutputSink, StdinSource},
};
use crate::shell::signals::{self, TermState};
use crate::utils::config::Config;
use crate::utils::path;

/// 进程编排器：fork/exec、管道布线、进程组、控制终端交接、
/// 前台等待。作业表和历史列表也挂在这里，内建命令直接改。
#[derive(Clone)]
pub struct Executor {
    pub term: TermState,
    pub jobs: JobTable,
    pub history: HistoryList,
    pub history_file: PathBuf,
}

impl Executor {
    pub fn new(term: TermState, config: &Config) -> Self {
        Self {
            term,
            jobs: JobTable::new(),
            history: HistoryList::new(),
            history_file: config.history_file.clone(),
        }
    }

    /// 命令替换用的子 shell：状态照抄，但不再是交互 shell，
    /// 绝不去碰控制终端。
    pub fn subshell(&self) -> Self {
        let mut sub = self.clone();
        sub.term.interactive = false;
        sub
    }

    /// 一行输入从这里走完：解析（含命令替换与 heredoc 读取）、执行。
    /// 解析错误打印后返回提示符，shell 本身不退出。
    pub fn process(&mut self, input: &str, read_line: &mut dyn FnMut(&str) -> Option<String>) {
        let parsed = {
            let host: &Executor = self;
            let mut subst = |cmd: &str| parser::capture(cmd, host);
            parser::parse(input, read_line, &mut subst)
        };

        match parsed {
            Ok(Some(node)) => self.execute(&node, input.trim(), false),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    fn execute(&mut self, node: &Node, line: &str, background: bool) {
        match node {
            Node::Command(cmd) => self.run_single(cmd, line, background),
            Node::Pipeline(stages) if stages.len() == 1 => {
                self.run_single(&stages[0], line, background)
            }
            Node::Pipeline(stages) => self.run_pipeline(stages, line, background),
            Node::Background(inner) => {
                // 作业表里存去掉 `&` 的命令文本，jobs 显示时再补
                let text = line.trim_end_matches('&').trim_end();
                self.execute(inner, text, true)
            }
        }
    }

    /// 单条命令。内建命令在 shell 自己的进程里跑（重定向临时
    /// 生效再复原）；外部命令 fork 后自成进程组。
    fn run_single(&mut self, cmd: &Command, line: &str, background: bool) {
        if builtins::is_builtin(&cmd.program) {
            builtins::run_with_redirections(self, cmd);
            return;
        }

        let Some(executable) = self.resolve(&cmd.program) else {
            // 与原始行为保持一致：找不到命令报到 stdout
            println!("{}: command not found", cmd.program);
            return;
        };

        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                self.setup_child(None, background);
                apply_stdin(&cmd.redir.stdin, None, &cmd.program);
                apply_stdout(&cmd.redir.stdout, None, &cmd.program);
                apply_stderr(&cmd.redir.stderr, &cmd.program);
                exec_child(&executable, cmd, 1);
            }
            Ok(ForkResult::Parent { child }) => {
                if self.term.interactive {
                    // 父子都 setpgid，堵上 fork 之后的竞态
                    let _ = unistd::setpgid(child, child);
                }
                if background {
                    let id = self.jobs.add(child, line, vec![child], true, false);
                    println!("[{}] {}", id, child);
                } else {
                    self.wait_foreground(vec![child], child, line);
                }
            }
            Err(e) => {
                eprintln!("{}: fork failed: {}", cmd.program, e);
            }
        }
    }

    /// N 段管道。所有段共用一个进程组（第一个子进程的 pid），
    /// 段间管道按需创建，父进程 fork 完一段就关掉手里用完的端口，
    /// 否则下游读不到 EOF。内建命令在管道里也 fork 成子进程跑。
    fn run_pipeline(&mut self, stages: &[Command], line: &str, background: bool) {
        let mut pgid: Option<Pid> = None;
        let mut pids: Vec<Pid> = Vec::new();
        let mut prev_read: Option<RawFd> = None;

        for (i, stage) in stages.iter().enumerate() {
            let (next_read, write_end) = if i + 1 < stages.len() {
                match pipe() {
                    Ok((r, w)) => (Some(r), Some(w)),
                    Err(e) => {
                        eprintln!("{}: pipe failed: {}", stage.program, e);
                        break;
                    }
                }
            } else {
                (None, None)
            };

            match unsafe { fork() } {
                Ok(ForkResult::Child) => {
                    self.setup_child(pgid, background);
                    apply_stdin(&stage.redir.stdin, prev_read, &stage.program);
                    apply_stdout(&stage.redir.stdout, write_end, &stage.program);
                    apply_stderr(&stage.redir.stderr, &stage.program);
                    if let Some(fd) = prev_read {
                        let _ = close(fd);
                    }
                    if let Some(fd) = write_end {
                        let _ = close(fd);
                    }
                    if let Some(fd) = next_read {
                        let _ = close(fd);
                    }

                    if builtins::is_builtin(&stage.program) {
                        builtins::run(self, stage);
                        let _ = io::stdout().flush();
                        std::process::exit(0);
                    }

                    let Some(executable) = self.resolve(&stage.program) else {
                        eprintln!("{}: command not found", stage.program);
                        std::process::exit(127);
                    };
                    exec_child(&executable, stage, 127);
                }
                Ok(ForkResult::Parent { child }) => {
                    if self.term.interactive {
                        let group = pgid.unwrap_or(child);
                        let _ = unistd::setpgid(child, group);
                    }
                    if pgid.is_none() {
                        pgid = Some(child);
                    }
                    pids.push(child);
                }
                Err(e) => {
                    eprintln!("{}: fork failed: {}", stage.program, e);
                }
            }

            if let Some(fd) = prev_read.take() {
                let _ = close(fd);
            }
            if let Some(fd) = write_end {
                let _ = close(fd);
            }
            prev_read = next_read;
        }

        // pipe 创建失败提前退出循环时，别把读端漏在手里
        if let Some(fd) = prev_read.take() {
            let _ = close(fd);
        }

        let Some(pgid) = pgid else { return };

        if background {
            let id = self.jobs.add(pgid, line, pids, true, false);
            println!("[{}] {}", id, pgid);
        } else {
            self.wait_foreground(pids, pgid, line);
        }
    }

    /// 前台等待：逐个 WUNTRACED 等待。有子进程被停住就把整条
    /// 管道登记成停住的作业，然后无论如何把终端收回来。
    fn wait_foreground(&mut self, pids: Vec<Pid>, pgid: Pid, line: &str) {
        let mut remaining: Vec<Pid> = Vec::new();
        let mut stopped = false;

        for pid in pids {
            match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
                Ok(WaitStatus::Stopped(p, _)) => {
                    stopped = true;
                    remaining.push(p);
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("waitpid {} 返回错误: {}", pid, e);
                }
            }
        }

        self.reclaim_terminal(stopped);

        if stopped && !remaining.is_empty() {
            let id = self.jobs.add(pgid, line, remaining, false, true);
            eprintln!("\n[{}]+ Stopped   {}", id, line);
        }
    }

    /// 把控制终端交还给 shell；作业被停住时顺带恢复保存的终端属性。
    pub fn reclaim_terminal(&self, restore_modes: bool) {
        if !self.term.interactive {
            return;
        }
        let _ = unistd::tcsetpgrp(libc::STDIN_FILENO, self.term.shell_pgid);
        if restore_modes {
            if let Some(modes) = &self.term.tmodes {
                let _ = tcsetattr(libc::STDIN_FILENO, SetArg::TCSADRAIN, modes);
            }
        }
    }

    /// fork 之后、exec 之前的子进程侧设置：进入作业的进程组
    /// （pgid 为空表示自己当组长），前台作业接过控制终端，
    /// 然后恢复默认信号处置。
    fn setup_child(&self, pgid: Option<Pid>, background: bool) {
        if !self.term.interactive {
            return;
        }
        let me = unistd::getpid();
        let group = pgid.unwrap_or(me);
        let _ = unistd::setpgid(me, group);
        if !background {
            let _ = unistd::tcsetpgrp(libc::STDIN_FILENO, group);
        }
        signals::reset_child_signals();
    }

    /// 带 `/` 的程序名按路径直接执行，其余在 PATH 里找。
    fn resolve(&self, program: &str) -> Option<String> {
        if program.contains('/') {
            return Some(program.to_string());
        }
        path::find_executable_in_path(program)
    }
}

/// 子进程的 stdin 布线，优先级：heredoc > 文件 > 管道继承。
fn apply_stdin(source: &StdinSource, pipe_fd: Option<RawFd>, program: &str) {
    match source {
        StdinSource::Heredoc { body, .. } => {
            let Ok((read_fd, write_fd)) = pipe() else {
                eprintln!("{}: pipe failed", program);
                std::process::exit(1);
            };
            let _ = unistd::write(write_fd, body.as_bytes());
            let _ = close(write_fd);
            let _ = dup2(read_fd, libc::STDIN_FILENO);
            let _ = close(read_fd);
        }
        StdinSource::File(file) => {
            match open(file.as_str(), OFlag::O_RDONLY, Mode::empty()) {
                Ok(fd) => {
                    let _ = dup2(fd, libc::STDIN_FILENO);
                    let _ = close(fd);
                }
                Err(_) => {
                    eprintln!("{}: open failed", program);
                    std::process::exit(1);
                }
            }
        }
        StdinSource::Inherit => {
            if let Some(fd) = pipe_fd {
                let _ = dup2(fd, libc::STDIN_FILENO);
            }
        }
    }
}

/// 子进程的 stdout 布线：显式重定向优先于管道。
fn apply_stdout(sink: &Option<OutputSink>, pipe_fd: Option<RawFd>, program: &str) {
    match sink {
        Some(sink) => match open_sink(sink) {
            Ok(fd) => {
                let _ = dup2(fd, libc::STDOUT_FILENO);
                let _ = close(fd);
            }
            Err(_) => {
                eprintln!("{}: open failed", program);
                std::process::exit(1);
            }
        },
        None => {
            if let Some(fd) = pipe_fd {
                let _ = dup2(fd, libc::STDOUT_FILENO);
            }
        }
    }
}

fn apply_stderr(sink: &Option<OutputSink>, program: &str) {
    if let Some(sink) = sink {
        match open_sink(sink) {
            Ok(fd) => {
                let _ = dup2(fd, libc::STDERR_FILENO);
                let _ = close(fd);
            }
            Err(_) => {
                eprintln!("{}: open failed", program);
                std::process::exit(1);
            }
        }
    }
}

pub(super) fn open_sink(sink: &OutputSink) -> nix::Result<RawFd> {
    let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT;
    flags |= if sink.append {
        OFlag::O_APPEND
    } else {
        OFlag::O_TRUNC
    };
    open(sink.path.as_str(), flags, Mode::from_bits_truncate(0o644))
}

/// 替换进程映像；失败就报错并按指定状态码退出，绝不返回主循环。
fn exec_child(executable: &str, cmd: &Command, fail_code: i32) -> ! {
    let Ok(c_path) = CString::new(executable) else {
        eprintln!("{}: exec failed", cmd.program);
        std::process::exit(fail_code);
    };
    let mut argv = Vec::with_capacity(cmd.arguments.len() + 1);
    argv.push(CString::new(cmd.program.as_str()).unwrap_or_default());
    for arg in &cmd.arguments {
        argv.push(CString::new(arg.as_str()).unwrap_or_default());
    }

    let result = execv(&c_path, &argv);
    error!("execv 失败: {:?}", result);
    eprintln!("{}: exec failed", cmd.program);
    std::process::exit(fail_code);
}
