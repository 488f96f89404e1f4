use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;
use nix::libc;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::termios::{self, Termios};
use nix::unistd::{self, Pid};

/// SIGCHLD 只在 handler 里置位，收割统一放到主循环的
/// 提示符边界去做，作业表因此只有主线程碰。
static SIGCHLD_PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_: libc::c_int) {
    SIGCHLD_PENDING.store(true, Ordering::SeqCst);
}

/// 取走并清掉待处理标记。内核可能合并多次 SIGCHLD，
/// 调用方必须用 WNOHANG 循环收到没有为止。
pub fn take_sigchld() -> bool {
    SIGCHLD_PENDING.swap(false, Ordering::SeqCst)
}

/// 启动时确定的终端状态：shell 自己的进程组、保存的终端属性、
/// 是否交互。命令替换的子 shell 克隆一份并关掉交互标记。
#[derive(Clone)]
pub struct TermState {
    pub interactive: bool,
    pub shell_pgid: Pid,
    pub tmodes: Option<Termios>,
}

/// 交互模式下把 shell 放进自己的进程组、接管控制终端、
/// 保存终端属性并装好信号处置。设置进程组失败是致命错误。
pub fn init_shell() -> TermState {
    let interactive = unistd::isatty(libc::STDIN_FILENO).unwrap_or(false);
    let shell_pgid = unistd::getpid();

    if !interactive {
        return TermState {
            interactive,
            shell_pgid,
            tmodes: None,
        };
    }

    if let Err(e) = unistd::setpgid(shell_pgid, shell_pgid) {
        eprintln!("xiaoke: setpgid failed: {}", e);
        std::process::exit(1);
    }
    let _ = unistd::tcsetpgrp(libc::STDIN_FILENO, shell_pgid);
    let tmodes = termios::tcgetattr(libc::STDIN_FILENO).ok();

    install_handlers();
    debug!("shell 进程组就绪: {}", shell_pgid);

    TermState {
        interactive,
        shell_pgid,
        tmodes,
    }
}

fn install_handlers() {
    let sigchld_action = SigAction::new(
        SigHandler::Handler(handle_sigchld),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );

    unsafe {
        let _ = signal::sigaction(Signal::SIGCHLD, &sigchld_action);
        // shell 自己不被 Ctrl+C / Ctrl+Z 打断，前台作业持有终端时
        // 这些信号会送到作业的进程组
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigIgn);
        let _ = signal::signal(Signal::SIGTSTP, SigHandler::SigIgn);
        let _ = signal::signal(Signal::SIGQUIT, SigHandler::SigIgn);
        let _ = signal::signal(Signal::SIGTTOU, SigHandler::SigIgn);
        let _ = signal::signal(Signal::SIGTTIN, SigHandler::SigIgn);
    }
}

/// fork 出的子进程在 exec 前恢复默认信号处置。
pub fn reset_child_signals() {
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGQUIT, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTSTP, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTTIN, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTTOU, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGCHLD, SigHandler::SigDfl);
    }
}
