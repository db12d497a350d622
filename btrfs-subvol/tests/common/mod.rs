// SPDX-License-Identifier: GPL-3.0-only

//! Scratch filesystem fixture for privileged tests
//!
//! Tests format a sparse image with `mkfs.btrfs` and loop-mount it. They
//! only run as root with `BTRFS_SUBVOL_DESTRUCTIVE_TESTS=1`; otherwise the
//! fixture reports a skip and the test returns early.

#![allow(dead_code)]

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use nix::unistd::geteuid;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

const IMAGE_SIZE: u64 = 256 * 1024 * 1024;

pub fn destructive_enabled() -> bool {
    std::env::var("BTRFS_SUBVOL_DESTRUCTIVE_TESTS").ok().as_deref() == Some("1")
}

fn skip(label: &str, reason: &str) -> Result<Option<ScratchFs>> {
    eprintln!("skipping {label}: {reason}");
    Ok(None)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn run(command: &mut Command) -> Result<()> {
    let output = command
        .output()
        .with_context(|| format!("failed to run {command:?}"))?;
    if !output.status.success() {
        bail!(
            "{command:?} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// A freshly formatted BTRFS filesystem mounted on a temporary directory.
pub struct ScratchFs {
    dir: TempDir,
    mount_point: PathBuf,
}

impl ScratchFs {
    pub fn path(&self) -> &Path {
        &self.mount_point
    }

    pub fn join<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.mount_point.join(path)
    }
}

impl Drop for ScratchFs {
    fn drop(&mut self) {
        let _ = run(Command::new("umount").arg(&self.mount_point));
        tracing::debug!(dir = %self.dir.path().display(), "released scratch filesystem");
    }
}

/// Create and mount a scratch filesystem, or `None` when the environment
/// does not allow it.
pub fn scratch(label: &str) -> Result<Option<ScratchFs>> {
    init_tracing();

    if !destructive_enabled() {
        return skip(label, "set BTRFS_SUBVOL_DESTRUCTIVE_TESTS=1");
    }
    if !geteuid().is_root() {
        return skip(label, "must run as root");
    }
    let Ok(mkfs) = which::which("mkfs.btrfs") else {
        return skip(label, "mkfs.btrfs not found");
    };

    let dir = tempfile::tempdir().context("create scratch directory")?;
    let image = dir.path().join("btrfs.img");
    let mount_point = dir.path().join("mnt");
    std::fs::create_dir(&mount_point).context("create mount point")?;

    OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&image)
        .and_then(|file| file.set_len(IMAGE_SIZE))
        .context("create image file")?;

    run(Command::new(mkfs).arg("-q").arg("-f").arg(&image))?;
    run(Command::new("mount")
        .args(["-o", "loop"])
        .arg(&image)
        .arg(&mount_point))?;

    Ok(Some(ScratchFs { dir, mount_point }))
}
