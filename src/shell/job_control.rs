use std::fmt;

use log::debug;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

/// 一条作业：一个进程组加上它还活着的 pid 集合。
/// 前台作业只有被 Ctrl+Z 停住才会进表。
#[derive(Debug, Clone)]
pub struct Job {
    pub id: i32,
    pub pgid: Pid,
    pub command: String,
    pub stopped: bool,
    pub background: bool,
    pub pids: Vec<Pid>,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.stopped { "Stopped" } else { "Running" };
        write!(f, "[{}]  {}                 {}", self.id, status, self.command)?;
        if self.background && !self.stopped {
            write!(f, " &")?;
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: i32,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// 注册作业并返回编号。编号在 shell 生命周期内严格递增，不复用。
    pub fn add(
        &mut self,
        pgid: Pid,
        command: &str,
        pids: Vec<Pid>,
        background: bool,
        stopped: bool,
    ) -> i32 {
        let id = self.next_id;
        self.next_id += 1;
        debug!("注册作业 [{}] pgid={} {}", id, pgid, command);
        self.jobs.push(Job {
            id,
            pgid,
            command: command.to_string(),
            stopped,
            background,
            pids,
        });
        id
    }

    pub fn get(&self, id: i32) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }

    pub fn get_mut(&mut self, id: i32) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|job| job.id == id)
    }

    pub fn remove(&mut self, id: i32) {
        self.jobs.retain(|job| job.id != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 最近注册的作业编号，`fg` 的默认目标。
    pub fn latest_id(&self) -> Option<i32> {
        self.jobs.last().map(|job| job.id)
    }

    /// 最近停住的作业编号，`bg` 的默认目标。
    pub fn latest_stopped_id(&self) -> Option<i32> {
        self.jobs.iter().rev().find(|job| job.stopped).map(|job| job.id)
    }

    /// 在提示符边界收割：WNOHANG 循环排干所有待报告的子进程，
    /// 容忍内核合并 SIGCHLD。完成的后台作业在这里打印 Done。
    pub fn reap(&mut self) {
        loop {
            let status = waitpid(
                Pid::from_raw(-1),
                Some(WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED),
            );
            match status {
                Ok(WaitStatus::StillAlive) | Err(_) => break,
                Ok(status) => self.apply_status(status),
            }
        }
        self.prune();
    }

    /// 把一条 wait 状态落到作业表上。
    fn apply_status(&mut self, status: WaitStatus) {
        match status {
            WaitStatus::Exited(pid, _) | WaitStatus::Signaled(pid, _, _) => {
                self.mark_exited(pid)
            }
            WaitStatus::Stopped(pid, _) => self.mark_stopped(pid),
            WaitStatus::Continued(pid) => self.mark_continued(pid),
            _ => {}
        }
    }

    fn mark_exited(&mut self, pid: Pid) {
        for job in &mut self.jobs {
            if let Some(pos) = job.pids.iter().position(|p| *p == pid) {
                job.pids.remove(pos);
                if job.pids.is_empty() && job.background {
                    eprintln!("\n[{}]+ Done       {}", job.id, job.command);
                }
                return;
            }
        }
    }

    fn mark_stopped(&mut self, pid: Pid) {
        for job in &mut self.jobs {
            if job.pids.contains(&pid) {
                if !job.stopped && !job.background {
                    eprintln!("\n[{}]+ Stopped   {}", job.id, job.command);
                }
                job.stopped = true;
                return;
            }
        }
    }

    fn mark_continued(&mut self, pid: Pid) {
        for job in &mut self.jobs {
            if job.pids.contains(&pid) {
                job.stopped = false;
                return;
            }
        }
    }

    fn prune(&mut self) {
        self.jobs.retain(|job| !job.pids.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: i32) -> Pid {
        Pid::from_raw(n)
    }

    #[test]
    fn test_job_ids_monotonic_and_never_reused() {
        let mut table = JobTable::new();
        let first = table.add(pid(100), "sleep 1", vec![pid(100)], true, false);
        let second = table.add(pid(200), "sleep 2", vec![pid(200)], true, false);
        assert!(second > first);

        table.remove(first);
        let third = table.add(pid(300), "sleep 3", vec![pid(300)], true, false);
        assert!(third > second);
    }

    #[test]
    fn test_exit_prunes_when_pids_drain() {
        let mut table = JobTable::new();
        let id = table.add(pid(10), "a | b", vec![pid(10), pid(11)], true, false);

        table.apply_status(WaitStatus::Exited(pid(10), 0));
        table.prune();
        assert_eq!(table.get(id).unwrap().pids, vec![pid(11)]);

        table.apply_status(WaitStatus::Signaled(
            pid(11),
            nix::sys::signal::Signal::SIGKILL,
            false,
        ));
        table.prune();
        assert!(table.get(id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_stop_and_continue_transitions() {
        let mut table = JobTable::new();
        let id = table.add(pid(20), "sleep 100", vec![pid(20)], true, false);

        table.apply_status(WaitStatus::Stopped(
            pid(20),
            nix::sys::signal::Signal::SIGTSTP,
        ));
        assert!(table.get(id).unwrap().stopped);

        table.apply_status(WaitStatus::Continued(pid(20)));
        assert!(!table.get(id).unwrap().stopped);
    }

    #[test]
    fn test_latest_selectors() {
        let mut table = JobTable::new();
        let a = table.add(pid(1), "a", vec![pid(1)], true, false);
        let b = table.add(pid(2), "b", vec![pid(2)], true, false);
        assert_eq!(table.latest_id(), Some(b));
        assert_eq!(table.latest_stopped_id(), None);

        table.get_mut(a).unwrap().stopped = true;
        assert_eq!(table.latest_stopped_id(), Some(a));
    }

    #[test]
    fn test_display_format() {
        let mut table = JobTable::new();
        table.add(pid(5), "sleep 100", vec![pid(5)], true, false);
        let job = table.get(1).unwrap();
        assert_eq!(
            job.to_string(),
            "[1]  Running                 sleep 100 &"
        );

        table.get_mut(1).unwrap().stopped = true;
        let job = table.get(1).unwrap();
        assert_eq!(job.to_string(), "[1]  Stopped                 sleep 100");
    }
}
