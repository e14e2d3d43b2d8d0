//! Supervision of a local loxilb process.

use pkg_constants::loxilb::DATAPLANE_RESTART_DELAY;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Keeps one loxilb process running, restarting it after it exits.
pub struct Supervisor {
    binary: String,
    args: Vec<String>,
}

impl Supervisor {
    pub fn new(binary: String, args: Vec<String>) -> Self {
        Self { binary, args }
    }

    pub fn start(self, mut shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("Supervising loxilb: {} {}", self.binary, self.args.join(" "));
            loop {
                let spawned = Command::new(&self.binary)
                    .args(&self.args)
                    .stdin(Stdio::null())
                    .kill_on_drop(true)
                    .spawn();

                match spawned {
                    Ok(mut child) => {
                        info!("loxilb started (pid={:?})", child.id());
                        tokio::select! {
                            status = child.wait() => match status {
                                Ok(s) => warn!("loxilb exited: {}", s),
                                Err(e) => error!("Failed to wait for loxilb: {}", e),
                            },
                            _ = shutdown.changed() => {
                                info!("Stopping loxilb");
                                if let Err(e) = child.kill().await {
                                    warn!("Failed to stop loxilb: {}", e);
                                }
                                break;
                            }
                        }
                    }
                    Err(e) => error!("Failed to start loxilb {}: {}", self.binary, e),
                }

                tokio::select! {
                    _ = tokio::time::sleep(DATAPLANE_RESTART_DELAY) => {}
                    _ = shutdown.changed() => break,
                }
            }
        })
    }
}
