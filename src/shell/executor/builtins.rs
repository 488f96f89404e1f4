use std::env;
use std::path::PathBuf;

use colored::Colorize;
use log::debug;
use nix::libc;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{close, dup, dup2, tcsetpgrp};

use super::executor::{open_sink, Executor};
use crate::shell::parser::ast::Command;
use crate::utils::path;

pub const BUILTIN_NAMES: &[&str] = &[
    "exit", "echo", "type", "pwd", "cd", "history", "fg", "bg", "jobs", "help",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// 在 shell 自己的进程里跑内建命令：stdout/stderr 先按重定向
/// 换掉，跑完再复原。stdin 重定向对内建命令没有意义，忽略。
pub fn run_with_redirections(exec: &mut Executor, cmd: &Command) {
    let saved_stdout = cmd.redir.stdout.as_ref().map(|sink| {
        let saved = dup(libc::STDOUT_FILENO);
        if let Ok(fd) = open_sink(sink) {
            let _ = dup2(fd, libc::STDOUT_FILENO);
            let _ = close(fd);
        }
        saved
    });
    let saved_stderr = cmd.redir.stderr.as_ref().map(|sink| {
        let saved = dup(libc::STDERR_FILENO);
        if let Ok(fd) = open_sink(sink) {
            let _ = dup2(fd, libc::STDERR_FILENO);
            let _ = close(fd);
        }
        saved
    });

    run(exec, cmd);

    if let Some(Ok(saved)) = saved_stdout {
        let _ = dup2(saved, libc::STDOUT_FILENO);
        let _ = close(saved);
    }
    if let Some(Ok(saved)) = saved_stderr {
        let _ = dup2(saved, libc::STDERR_FILENO);
        let _ = close(saved);
    }
}

pub fn run(exec: &mut Executor, cmd: &Command) {
    debug!("执行内建命令: {}", cmd);
    let args = &cmd.arguments;
    match cmd.program.as_str() {
        "exit" => exit_command(exec, args),
        "echo" => echo_command(args),
        "type" => type_command(args),
        "pwd" => pwd_command(),
        "cd" => cd_command(args),
        "history" => history_command(exec, args),
        "fg" => fg_command(exec, args),
        "bg" => bg_command(exec, args),
        "jobs" => jobs_command(exec),
        "help" => help_command(),
        _ => {}
    }
}

fn exit_command(exec: &mut Executor, args: &[String]) -> ! {
    let code = args
        .first()
        .and_then(|s| s.parse::<i32>().ok())
        .unwrap_or(0);
    if let Err(e) = exec.history.save(&exec.history_file) {
        log::error!("保存历史记录失败: {}", e);
    }
    debug!("退出 xiaoke, 状态码 {}", code);
    std::process::exit(code);
}

fn echo_command(args: &[String]) {
    println!("{}", args.join(" "));
}

fn type_command(args: &[String]) {
    let Some(name) = args.first() else { return };

    if is_builtin(name) {
        println!("{} is a shell builtin", name);
        return;
    }

    match path::find_executable_in_path(name) {
        Some(executable) => println!("{} is {}", name, executable),
        None => println!("{}: not found", name),
    }
}

fn pwd_command() {
    println!("{}", path::current_dir());
}

fn cd_command(args: &[String]) {
    let target = match args.first().map(|s| s.as_str()) {
        None | Some("~") => env::var("HOME").unwrap_or_else(|_| ".".to_string()),
        Some("-") => env::var("OLDPWD").unwrap_or_else(|_| ".".to_string()),
        Some(dir) => shellexpand::tilde(dir).into_owned(),
    };

    let old_pwd = path::current_dir();
    if env::set_current_dir(&target).is_ok() {
        env::set_var("OLDPWD", old_pwd);
    } else {
        println!("cd: {}: No such file or directory", target);
    }
}

fn history_command(exec: &mut Executor, args: &[String]) {
    if args.len() >= 2 {
        let file = PathBuf::from(&args[1]);
        match args[0].as_str() {
            "-r" => {
                if exec.history.read_file(&file).is_err() {
                    println!("history: {}: No such file or directory", file.display());
                }
                return;
            }
            "-w" => {
                if exec.history.save(&file).is_err() {
                    println!("history: {}: Error writing file", file.display());
                }
                return;
            }
            "-a" => {
                if exec.history.append_since(&file).is_err() {
                    println!("history: {}: Error writing file", file.display());
                }
                return;
            }
            _ => {}
        }
    }

    let entries = exec.history.entries();
    let start = match args.first() {
        Some(arg) => match arg.parse::<usize>() {
            Ok(n) => entries.len().saturating_sub(n),
            Err(_) => {
                println!("history: {}: numeric argument required", arg);
                return;
            }
        },
        None => 0,
    };

    for (i, line) in entries.iter().enumerate().skip(start) {
        println!("    {}  {}", i + 1, line);
    }
}

/// 把作业调到前台：需要时先 SIGCONT 整个进程组，把控制终端
/// 交给它，然后 WUNTRACED 逐个等待；又被停住就留在表里，
/// 否则移除。最后终端交还 shell。
fn fg_command(exec: &mut Executor, args: &[String]) {
    let id = match args.first() {
        Some(arg) => match arg.parse::<i32>() {
            Ok(id) => id,
            Err(_) => {
                println!("fg: {}: no such job", arg);
                return;
            }
        },
        None => exec.jobs.latest_id().unwrap_or(-1),
    };

    let Some(job) = exec.jobs.get_mut(id) else {
        println!("fg: {}: no such job", id);
        return;
    };

    println!("{}", job.command);

    if job.stopped {
        let _ = killpg(job.pgid, Signal::SIGCONT);
        job.stopped = false;
    }
    job.background = false;

    let pgid = job.pgid;
    let pids = job.pids.clone();
    let command = job.command.clone();

    if exec.term.interactive {
        let _ = tcsetpgrp(libc::STDIN_FILENO, pgid);
    }

    let mut remaining = Vec::new();
    let mut stopped = false;
    for pid in pids {
        match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(WaitStatus::Stopped(p, _)) => {
                stopped = true;
                remaining.push(p);
            }
            Ok(_) | Err(_) => {}
        }
    }

    exec.reclaim_terminal(stopped);

    if stopped {
        if let Some(job) = exec.jobs.get_mut(id) {
            job.stopped = true;
            job.pids = remaining;
        }
        eprintln!("\n[{}]+ Stopped   {}", id, command);
    } else {
        exec.jobs.remove(id);
    }
}

/// 让停住的作业在后台继续：SIGCONT 进程组，不交终端。
fn bg_command(exec: &mut Executor, args: &[String]) {
    let id = match args.first() {
        Some(arg) => match arg.parse::<i32>() {
            Ok(id) => id,
            Err(_) => {
                println!("bg: {}: no such job", arg);
                return;
            }
        },
        None => exec.jobs.latest_stopped_id().unwrap_or(-1),
    };

    let Some(job) = exec.jobs.get_mut(id) else {
        println!("bg: {}: no such job", id);
        return;
    };

    if !job.stopped {
        println!("bg: job {} already in background", id);
        return;
    }

    println!("[{}]+ {} &", job.id, job.command);
    job.stopped = false;
    job.background = true;
    let _ = killpg(job.pgid, Signal::SIGCONT);
}

fn jobs_command(exec: &Executor) {
    for job in exec.jobs.iter() {
        println!("{}", job);
    }
}

fn help_command() {
    println!("\n{}", "Available Builtin Commands:".yellow());
    println!("{}", "-".repeat(50));
    let entries: &[(&str, &str)] = &[
        ("exit [code]", "Exit the shell"),
        ("echo <args>", "Print arguments to stdout"),
        ("type <cmd>", "Show command type"),
        ("pwd", "Print working directory"),
        ("cd [dir]", "Change directory"),
        ("history [n]", "View command history"),
        ("jobs", "List background jobs"),
        ("fg [job]", "Bring job to foreground"),
        ("bg [job]", "Resume job in background"),
        ("help", "Show this help message"),
    ];
    for (name, description) in entries {
        println!("{} - {}", format!("{:<18}", name).cyan(), description);
    }
    println!("{}\n", "-".repeat(50));
}
