//! 外部工具调用：PATH 探测与带超时的子进程执行
//!
//! 超时语义：到点即 kill，已经读到的 stdout 仍然返回（部分结果可用）。
//! stdout 在独立线程上排空，避免子进程写满管道后与 try_wait 轮询互锁。

use std::env;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// 子进程运行结果
#[derive(Debug)]
pub struct ToolOutput {
    /// 退出码；被信号终止或超时 kill 时为 None
    pub status: Option<i32>,
    pub stdout: String,
    pub timed_out: bool,
}

impl ToolOutput {
    /// 外部搜索工具契约：0（有匹配）与 1（无匹配）都算成功
    pub fn ran_ok(&self) -> bool {
        !self.timed_out && matches!(self.status, Some(0) | Some(1))
    }
}

/// 在 PATH 中查找可执行文件
pub fn tool_in_path(name: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else { return false };
    env::split_paths(&paths).any(|dir| {
        let candidate: PathBuf = dir.join(name);
        candidate.is_file()
    })
}

/// 运行命令并限时收集 stdout
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> std::io::Result<ToolOutput> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::null());
    let mut child = cmd.spawn()?;

    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let (status, timed_out) = wait_until(&mut child, deadline)?;

    let stdout_bytes = reader.join().unwrap_or_default();
    Ok(ToolOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        timed_out,
    })
}

/// 轮询 try_wait 直到退出或超时；超时则 kill 并收尸
fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<(Option<i32>, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status.code(), false));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok((None, true));
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_tools_are_discoverable() {
        assert!(tool_in_path("sh"));
        assert!(!tool_in_path("definitely-not-a-real-binary-xyz"));
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf hello; exit 1"]);
        let out = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(out.status, Some(1));
        assert_eq!(out.stdout, "hello");
        assert!(out.ran_ok());
    }

    #[test]
    fn non_search_exit_codes_are_failures() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 2"]);
        let out = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert!(!out.ran_ok());
    }

    #[test]
    fn timeout_kills_the_child() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exec sleep 30"]);
        let started = Instant::now();
        let out = run_with_timeout(cmd, Duration::from_millis(200)).unwrap();
        assert!(out.timed_out);
        assert!(!out.ran_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
