use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// 历史记录条数上限，载入和落盘都按这个截断。
pub const HISTORY_CAPACITY: usize = 500;

/// shell 自己维护的历史列表：`history` 内建命令和
/// `-r`/`-w`/`-a` 文件操作都走这里，一行一条、新的在后。
#[derive(Clone, Default)]
pub struct HistoryList {
    entries: Vec<String>,
    // `-a` 模式按文件记录已写到的位置
    written_positions: HashMap<PathBuf, usize>,
}

impl HistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn add(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.remove(0);
            for pos in self.written_positions.values_mut() {
                *pos = pos.saturating_sub(1);
            }
        }
        self.entries.push(line.to_string());
    }

    /// 启动时从历史文件载入，文件不存在不算错。
    pub fn load(&mut self, path: &Path) {
        match fs::read_to_string(path) {
            Ok(content) => {
                for line in content.lines() {
                    self.add(line);
                }
                debug!("历史记录加载成功: {} 条", self.entries.len());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("无法加载历史记录: {} {}", path.display(), e),
        }
    }

    /// 覆盖写出全部条目，`history -w` 和退出时落盘共用。
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut file = fs::File::create(path)?;
        for line in &self.entries {
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }

    /// `history -r`：把文件内容追加进当前列表。
    pub fn read_file(&mut self, path: &Path) -> io::Result<()> {
        let content = fs::read_to_string(path)?;
        for line in content.lines() {
            self.add(line);
        }
        Ok(())
    }

    /// `history -a`：只追加上次写过之后的新条目，位置按文件分别记。
    pub fn append_since(&mut self, path: &Path) -> io::Result<()> {
        let start = self
            .written_positions
            .get(path)
            .copied()
            .unwrap_or(0)
            .min(self.entries.len());

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        for line in &self.entries[start..] {
            writeln!(file, "{}", line)?;
        }
        self.written_positions
            .insert(path.to_path_buf(), self.entries.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(tag: &str) -> PathBuf {
        env::temp_dir().join(format!("xiaoke_history_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn test_add_and_capacity() {
        let mut history = HistoryList::new();
        for i in 0..HISTORY_CAPACITY + 10 {
            history.add(&format!("cmd {}", i));
        }
        assert_eq!(history.entries().len(), HISTORY_CAPACITY);
        assert_eq!(history.entries()[0], "cmd 10");
        assert_eq!(
            history.entries().last().unwrap(),
            &format!("cmd {}", HISTORY_CAPACITY + 9)
        );
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = temp_path("round_trip");
        let mut history = HistoryList::new();
        history.add("echo one");
        history.add("echo two");
        history.save(&path).unwrap();

        let mut loaded = HistoryList::new();
        loaded.load(&path);
        assert_eq!(loaded.entries(), &["echo one", "echo two"]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_append_since_tracks_position() {
        let path = temp_path("append_since");
        let _ = fs::remove_file(&path);

        let mut history = HistoryList::new();
        history.add("first");
        history.append_since(&path).unwrap();
        history.add("second");
        history.append_since(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_silent() {
        let mut history = HistoryList::new();
        history.load(Path::new("/nonexistent/xiaoke_history"));
        assert!(history.entries().is_empty());
    }
}
