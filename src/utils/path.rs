use std::env;
use std::fs::read_dir;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;

use log::error;

/// 在 PATH 各目录里找可执行的普通文件，按目录顺序取第一个命中。
/// 可执行按属主执行位判断。
pub fn find_executable_in_path(filename: &str) -> Option<String> {
    let env_path = match env::var("PATH") {
        Ok(x) => x,
        Err(e) => {
            error!("xiaoke: 读取 PATH 失败: {:?}", e);
            return None;
        }
    };

    for dir in env_path.split(':') {
        match read_dir(dir) {
            Ok(list) => {
                for entry in list.flatten() {
                    if let Ok(name) = entry.file_name().into_string() {
                        if name != filename {
                            continue;
                        }

                        let metadata = match entry.metadata() {
                            Ok(x) => x,
                            Err(e) => {
                                error!("xiaoke: 读取文件元数据失败: {:?}", e);
                                continue;
                            }
                        };
                        if !metadata.is_file() {
                            continue;
                        }
                        if metadata.permissions().mode() & 0o100 == 0 {
                            continue;
                        }

                        return Some(entry.path().to_string_lossy().to_string());
                    }
                }
            }
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    continue;
                }
                error!("xiaoke: 读取目录失败: {}: {}", dir, e);
            }
        }
    }

    None
}

pub fn current_dir() -> String {
    let current_dir = match env::current_dir() {
        Ok(x) => x,
        Err(e) => {
            error!("xiaoke: 获取当前目录失败: {}", e);
            return String::new();
        }
    };

    current_dir.to_string_lossy().to_string()
}

/// 把 HOME 前缀折叠成 `~`，给提示符显示用。
pub fn collapse_home(path: &str) -> String {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            if let Some(rest) = path.strip_prefix(&home) {
                return format!("~{}", rest);
            }
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_home() {
        let home = env::var("HOME").unwrap_or_default();
        if home.is_empty() {
            return;
        }
        assert_eq!(collapse_home(&format!("{}/work", home)), "~/work");
        assert_eq!(collapse_home(&home), "~");
        assert_eq!(collapse_home("/tmp"), "/tmp");
    }
}
