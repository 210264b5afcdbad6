//! Liveness probing for recorded resources.
//!
//! `cleanup` only removes a state entry when its resource is proven dead;
//! anything the probe cannot judge is left alone.

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg};
use nix::unistd::Pid;
use orbit_types::{PlatformResources, ResourceState};

/// Result of probing a recorded resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// The resource still exists.
    Alive,
    /// The resource provably no longer exists.
    Dead,
    /// The probe cannot tell.
    Unknown,
}

/// Decides whether the resource behind a state entry still exists.
pub trait LivenessProbe: Send + Sync {
    fn probe(&self, state: &ResourceState) -> Liveness;
}

/// Probes posix process ids with a null signal.
///
/// Non-posix resources are reported as [`Liveness::Unknown`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PidLivenessProbe;

impl PidLivenessProbe {
    pub fn new() -> Self {
        Self
    }

    /// Probe a single pid.
    pub fn probe_pid(pid: u32) -> Liveness {
        match raw_pid(pid) {
            Some(raw) => liveness(kill(raw, None)),
            None => Liveness::Unknown,
        }
    }

    /// Probe every member of the process group led by `pgid`.
    pub fn probe_group(pgid: u32) -> Liveness {
        match raw_pid(pgid) {
            Some(raw) => liveness(killpg(raw, None)),
            None => Liveness::Unknown,
        }
    }

    /// A recorded pid counts as alive while it or anything left in its
    /// process group is alive.
    pub fn probe_service(pid: u32) -> Liveness {
        match Self::probe_group(pid) {
            Liveness::Alive => Liveness::Alive,
            _ => Self::probe_pid(pid),
        }
    }
}

impl LivenessProbe for PidLivenessProbe {
    fn probe(&self, state: &ResourceState) -> Liveness {
        match &state.resources {
            Some(PlatformResources::Posix { pid, .. }) => Self::probe_service(*pid),
            _ => Liveness::Unknown,
        }
    }
}

fn raw_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}

fn liveness(probe: nix::Result<()>) -> Liveness {
    match probe {
        Ok(()) => Liveness::Alive,
        Err(Errno::ESRCH) => Liveness::Dead,
        // Exists but owned by someone else
        Err(Errno::EPERM) => Liveness::Alive,
        Err(_) => Liveness::Unknown,
    }
}
