use dotenv::dotenv;
use shellexpand;
use std::env;
use std::path::PathBuf;

pub struct Config {
    pub name: String,
    pub logger_level: String,
    pub theme: String,
    pub editor_mode: String,
    pub history_file: PathBuf,
}

impl Config {
    fn default() -> Self {
        Config {
            name: String::from("xiaoke"),
            logger_level: String::from("info"),
            theme: String::from("default"),
            editor_mode: String::from("emacs"),
            history_file: PathBuf::from(shellexpand::tilde("~/.shell_history").into_owned()),
        }
    }

    pub fn new() -> Self {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        // 默认配置
        let mut config = Config::default();

        if let Ok(logger_level) = env::var("XIAOKE_LOG") {
            config.logger_level = logger_level;
        }

        if let Ok(theme) = env::var("XIAOKE_THEME") {
            config.theme = theme;
        }

        if let Ok(editor) = env::var("XIAOKE_EDITOR_MODE") {
            config.editor_mode = editor;
        }

        if let Ok(histfile) = env::var("HISTFILE") {
            config.history_file = PathBuf::from(shellexpand::tilde(&histfile).into_owned());
        }

        config
    }
}
