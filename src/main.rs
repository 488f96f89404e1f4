use log::{debug, error};

use crate::shell::Shell;
use crate::utils::config::Config;
use crate::utils::log::init_logger;

mod shell;
mod utils;

fn main() {
    let config = Config::new();
    init_logger(&config);
    debug!("配置加载成功");

    let mut shell = Shell::new(&config);
    if let Err(err) = shell.run() {
        error!("发生错误: {}", err);
        eprintln!("xiaoke: {}", err);
        std::process::exit(1);
    }
}
