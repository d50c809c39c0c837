//! Preview servers - spawning and health checking a target's dev server

use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::TargetConfig;
use crate::error::{HarnessError, HarnessResult};

/// Handle to a running preview server; stopped on drop
pub struct ServerHandle {
    child: Child,
    health_url: String,
}

impl ServerHandle {
    /// Spawn `target.serve` and wait until `<url><health_path>` answers
    pub async fn spawn(target: &TargetConfig) -> HarnessResult<Self> {
        let command = target
            .serve
            .as_ref()
            .filter(|argv| !argv.is_empty())
            .ok_or_else(|| HarnessError::ServerStartup(format!("no serve command for {}", target.url)))?;

        info!("Starting preview server: {}", command.join(" "));

        let child = Command::new(&command[0])
            .args(&command[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| HarnessError::ServerStartup(format!("failed to spawn {}: {}", command[0], e)))?;

        let handle = ServerHandle {
            child,
            health_url: health_url(&target.url, &target.health_path),
        };
        handle
            .wait_for_healthy(Duration::from_secs(target.startup_timeout_secs))
            .await?;

        info!("Preview server is up at {}", target.url);
        Ok(handle)
    }

    async fn wait_for_healthy(&self, timeout: Duration) -> HarnessResult<()> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(2)).build()?;

        let start = Instant::now();
        let mut attempts = 0;

        while start.elapsed() < timeout {
            attempts += 1;

            match client.get(&self.health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => warn!("Health check returned {}", resp.status()),
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for preview server...");
                    }
                    // Refused connections are expected while it boots
                    if !e.is_connect() {
                        warn!("Health check error: {}", e);
                    }
                }
            }

            sleep(Duration::from_millis(250)).await;
        }

        Err(HarnessError::ServerHealthCheck(attempts))
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// Stop the server: SIGTERM first, then kill
    pub fn stop(&mut self) -> HarnessResult<()> {
        info!("Stopping preview server (pid: {})", self.child.id());

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            if kill(pid, Signal::SIGTERM).is_ok() {
                std::thread::sleep(Duration::from_millis(500));
            }
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn health_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_url_joins_cleanly() {
        assert_eq!(health_url("http://127.0.0.1:4321/", "/"), "http://127.0.0.1:4321/");
        assert_eq!(health_url("http://127.0.0.1:3000", "healthz"), "http://127.0.0.1:3000/healthz");
        assert_eq!(health_url("http://127.0.0.1:3000/", "/api/ping"), "http://127.0.0.1:3000/api/ping");
    }

    #[tokio::test]
    async fn test_spawn_without_command_fails() {
        let target = TargetConfig::new("http://127.0.0.1:9/");
        assert!(matches!(
            ServerHandle::spawn(&target).await,
            Err(HarnessError::ServerStartup(_))
        ));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let mut target = TargetConfig::new("http://127.0.0.1:9/");
        target.serve = Some(vec!["uiparity-no-such-binary".to_string()]);
        assert!(matches!(
            ServerHandle::spawn(&target).await,
            Err(HarnessError::ServerStartup(_))
        ));
    }
}
