//! Best-effort check for the cooperating desktop apps

use std::fmt;
use std::process::Stdio;

use sysinfo::System;
use tokio::process::Command;

/// Process-name fragments for the music client and the remote app.
pub const SPOTIFY: &[&str] = &["spotify"];
pub const VRCHAT: &[&str] = &["vrchat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    Absent,
    Unknown,
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Present => "running",
            Self::Absent => "not running",
            Self::Unknown => "unknown",
        })
    }
}

/// Case-insensitive substring match of any needle against any name.
pub fn matches_any<'a>(names: impl IntoIterator<Item = &'a str>, needles: &[&str]) -> bool {
    let needles: Vec<String> = needles.iter().map(|n| n.to_lowercase()).collect();
    names.into_iter().any(|name| {
        let name = name.to_lowercase();
        needles.iter().any(|n| name.contains(n.as_str()))
    })
}

/// Scan a raw process listing (one process per line).
pub fn scan_listing(listing: &str, needles: &[&str]) -> Presence {
    if matches_any(listing.lines(), needles) {
        Presence::Present
    } else {
        Presence::Absent
    }
}

fn listing_command() -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("tasklist");
        cmd.args(["/fo", "csv", "/nh"]);
        cmd.creation_flags(0x0800_0000);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("ps");
        cmd.args(["-A", "-o", "comm="]);
        cmd
    }
}

async fn detect_by_command(needles: &[&str]) -> Presence {
    let output = listing_command()
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await;
    match output {
        Ok(output) if output.status.success() => {
            scan_listing(&String::from_utf8_lossy(&output.stdout), needles)
        }
        Ok(output) => {
            tracing::debug!("Process listing exited with {}", output.status);
            Presence::Unknown
        }
        Err(e) => {
            tracing::debug!("Process listing unavailable: {}", e);
            Presence::Unknown
        }
    }
}

/// Whether any running process name contains one of `needles`.
///
/// Enumerates through `sysinfo`; an empty table (no permission, exotic
/// platform) falls back to the OS listing command. Never fails.
pub async fn detect_any(needles: &[&str]) -> Presence {
    let names: Vec<String> = {
        let mut sys = System::new();
        sys.refresh_processes();
        sys.processes()
            .values()
            .map(|p| p.name().to_string())
            .collect()
    };
    if names.is_empty() {
        return detect_by_command(needles).await;
    }
    if matches_any(names.iter().map(String::as_str), needles) {
        Presence::Present
    } else {
        Presence::Absent
    }
}

/// Log where the two apps stand.
pub async fn log_presence() {
    let spotify = detect_any(SPOTIFY).await;
    let vrchat = detect_any(VRCHAT).await;
    tracing::info!("Spotify: {}, VRChat: {}", spotify, vrchat);
}
