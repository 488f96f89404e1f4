use std::env;
use std::error::Error;
use std::io::Write;

use log::{debug, error, warn};

use crate::shell::executor::Executor;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::path;
use crate::utils::theme::{load_theme, Theme};

pub struct Shell<'a> {
    config: &'a Config,
    theme: Theme,
    readline: ReadlineManager,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config) -> Self {
        let term = signals::init_shell();
        let mut executor = Executor::new(term, config);
        let mut readline = ReadlineManager::new(config);

        // 历史先进列表再喂给编辑器，上下键能翻到上一次会话的命令
        executor.history.load(&config.history_file);
        for entry in executor.history.entries() {
            let _ = readline.add_history(entry);
        }

        Self {
            config,
            theme: load_theme(&config.theme),
            readline,
            executor,
        }
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("初始化 xiaoke...");
        println!("{}", self.theme.welcome_message);
        println!("{}", self.theme.help_hint);
        debug!("xiaoke 准备就绪...");

        self.run_loop()?;

        if let Err(err) = self.executor.history.save(&self.config.history_file) {
            error!("保存历史记录失败: {}", err);
        } else {
            debug!("历史记录保存成功");
        }
        debug!("退出 xiaoke...");
        Ok(())
    }

    fn run_loop(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            // 提示符边界统一收割后台子进程，作业表只有主线程碰
            if signals::take_sigchld() {
                self.executor.jobs.reap();
            }

            std::io::stdout().flush()?;
            let prompt = self.render_prompt();

            match self.readline.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = self.readline.add_history(&line);
                    self.executor.history.add(&line);
                    debug!("执行命令: {}", line);
                    self.handle_input(&line);
                }
                Err(ReadlineError::Eof) => {
                    debug!("接收到 EOF 信号，退出 xiaoke...");
                    println!();
                    println!("{}", self.theme.exit_message);
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    warn!("接收到中断信号...");
                    println!();
                    continue;
                }
                Err(err) => {
                    error!("发生错误: {}", err);
                    eprintln!("xiaoke: {}", err);
                }
            }
        }
        Ok(())
    }

    fn handle_input(&mut self, line: &str) {
        let Shell {
            readline, executor, ..
        } = self;
        // heredoc 的续行从同一个行编辑器读，提示符换成 "> "
        let mut read_line = |prompt: &str| readline.readline(prompt).ok();
        executor.process(line, &mut read_line);
    }

    /// 提示符：`user:~/path$ `，用户名取 USER，取不到退回 LOGNAME。
    fn render_prompt(&self) -> String {
        let cwd = path::collapse_home(&path::current_dir());
        let path_part = (self.theme.path_style)(cwd);

        let user = env::var("USER")
            .or_else(|_| env::var("LOGNAME"))
            .unwrap_or_default();
        if user.is_empty() {
            format!("{}$ ", path_part)
        } else {
            format!("{}:{}$ ", (self.theme.user_style)(user), path_part)
        }
    }
}
