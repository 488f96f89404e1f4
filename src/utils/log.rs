use std::str::FromStr;

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

use crate::utils::config::Config;

/// 日志走 stderr，stdout 留给命令输出和管道。
/// 只有本 crate 的日志受 XIAOKE_LOG 控制，依赖一律压到 warn。
pub fn init_logger(config: &Config) {
    let level = LevelFilter::from_str(&config.logger_level).unwrap_or(LevelFilter::Info);

    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .target(Target::Stderr)
        .filter(Some(&config.name), level)
        .filter(None, LevelFilter::Warn)
        .init();

    log::debug!("日志级别设置为: {}", level);
}
