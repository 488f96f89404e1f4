use colored::Colorize;

pub struct Theme {
    pub welcome_message: String,
    pub help_hint: String,
    pub exit_message: String,
    pub user_style: Box<dyn Fn(String) -> String>,
    pub path_style: Box<dyn Fn(String) -> String>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            welcome_message: "欢迎来到小壳 xiaoke ~".bright_cyan().to_string(),
            help_hint: "输入 'help' 查看内建命令，Ctrl+D 或 'exit' 退出"
                .bright_blue()
                .to_string(),
            exit_message: "再见～".bright_cyan().to_string(),
            user_style: Box::new(|s| s.green().to_string()),
            path_style: Box::new(|s| s.blue().to_string()),
        }
    }
}

pub fn load_theme(theme_name: &str) -> Theme {
    match theme_name {
        "default" => Theme::default(),
        // 无色主题，给不认识 ANSI 转义的终端用
        "plain" => Theme {
            welcome_message: "欢迎来到小壳 xiaoke ~".to_string(),
            help_hint: "输入 'help' 查看内建命令，Ctrl+D 或 'exit' 退出".to_string(),
            exit_message: "再见～".to_string(),
            user_style: Box::new(|s| s),
            path_style: Box::new(|s| s),
        },
        _ => Theme::default(),
    }
}
