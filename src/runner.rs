use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::error::NetError;

/// Executes shell commands on nodes of the emulated network.
pub trait NodeRunner: Send + Sync {
    /// Runs `command` inside `node` and returns its combined stdout and
    /// stderr. The exit status is not checked; callers inspect the output.
    fn cmd(&self, node: &str, command: &str) -> Result<String, NetError>;

    /// Starts `command` inside `node` without waiting for it.
    fn popen(&self, node: &str, command: &str) -> Result<(), NetError>;

    /// Runs `command` in the root namespace, failing on a non-zero exit.
    fn root_cmd(&self, command: &str) -> Result<String, NetError>;

    /// Collects detached processes that have exited.
    fn reap(&self) {}

    /// Kills and waits for every detached process still running.
    fn shutdown(&self) {}
}

/// Runs node commands through `ip netns exec`, one network namespace per node.
///
/// Processes started with [`NodeRunner::popen`] are kept until they are
/// reaped, so none are left as zombies.
#[derive(Debug, Default)]
pub struct NetnsRunner {
    children: Mutex<Vec<Child>>,
}

impl NetnsRunner {
    pub fn new() -> Self {
        NetnsRunner::default()
    }

    fn children(&self) -> MutexGuard<'_, Vec<Child>> {
        self.children.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn track(&self, child: Child) {
        let mut children = self.children();
        retain_running(&mut children);
        children.push(child);
    }

    /// Number of detached processes not yet reaped.
    pub fn tracked(&self) -> usize {
        self.children().len()
    }

    fn in_namespace(node: &str, command: &str) -> Command {
        let mut cmd = Command::new("ip");
        cmd.args(["netns", "exec", node, "sh", "-c", command]);
        cmd
    }
}

fn spawn_error(node: &str, command: &str, source: std::io::Error) -> NetError {
    NetError::Spawn {
        node: node.to_string(),
        command: command.to_string(),
        source,
    }
}

fn retain_running(children: &mut Vec<Child>) {
    children.retain_mut(|child| match child.try_wait() {
        Ok(Some(_)) => false,
        Ok(None) => true,
        Err(e) => {
            warn!(pid = child.id(), "cannot poll child: {e}");
            false
        }
    });
}

fn combined(stdout: &[u8], stderr: &[u8]) -> String {
    let mut text = String::from_utf8_lossy(stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(stderr));
    text
}

impl NodeRunner for NetnsRunner {
    fn cmd(&self, node: &str, command: &str) -> Result<String, NetError> {
        debug!(node, command, "cmd");
        let output = Self::in_namespace(node, command)
            .output()
            .map_err(|e| spawn_error(node, command, e))?;
        Ok(combined(&output.stdout, &output.stderr))
    }

    fn popen(&self, node: &str, command: &str) -> Result<(), NetError> {
        debug!(node, command, "popen");
        let child = Self::in_namespace(node, command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error(node, command, e))?;
        self.track(child);
        Ok(())
    }

    fn root_cmd(&self, command: &str) -> Result<String, NetError> {
        debug!(command, "root cmd");
        let output = Command::new("sh")
            .args(["-c", command])
            .output()
            .map_err(|e| spawn_error("root", command, e))?;

        let text = combined(&output.stdout, &output.stderr);
        if !output.status.success() {
            return Err(NetError::CommandFailed {
                node: "root".to_string(),
                command: command.to_string(),
                status: output.status,
                output: text,
            });
        }
        Ok(text)
    }

    fn reap(&self) {
        retain_running(&mut self.children());
    }

    fn shutdown(&self) {
        for mut child in self.children().drain(..) {
            if let Err(e) = child.kill() {
                debug!(pid = child.id(), "kill: {e}");
            }
            if let Err(e) = child.wait() {
                warn!(pid = child.id(), "wait: {e}");
            }
        }
    }
}
