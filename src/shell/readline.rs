use crate::utils::config::Config;
use log::error;
pub use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig, EditMode};

/// 行编辑器封装。历史的落盘不走 rustyline，由 HistoryList 管，
/// 这里只负责编辑时的上下翻和编辑模式配置。
pub struct ReadlineManager {
    editor: Editor<(), FileHistory>,
}

impl ReadlineManager {
    pub fn new(config: &Config) -> Self {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(if config.editor_mode == "vi" {
                EditMode::Vi
            } else {
                EditMode::Emacs
            })
            .build();

        let editor = Editor::with_config(rl_config).unwrap_or_else(|err| {
            error!("无法初始化 readline: {}", err);
            panic!("无法初始化 readline");
        });
        Self { editor }
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    pub fn add_history(&mut self, line: &str) -> Result<bool, ReadlineError> {
        self.editor.add_history_entry(line)
    }
}
