//! OS-level thread-priority control for Background tasks.
//!
//! Workers drop to the idle scheduling class while running Background work
//! so interactive requests elsewhere in the process are not starved of CPU.
//! Both calls are best-effort: a kernel that refuses the switch leaves the
//! thread at its current priority, which is safe.

#[cfg(target_os = "linux")]
pub(crate) fn set_background() {
    set_policy(libc::SCHED_IDLE);
}

#[cfg(target_os = "linux")]
pub(crate) fn set_default() {
    set_policy(libc::SCHED_OTHER);
}

#[cfg(target_os = "linux")]
fn set_policy(policy: libc::c_int) {
    let param = libc::sched_param { sched_priority: 0 };
    // SAFETY: pid 0 targets the calling thread; param outlives the call.
    let rc = unsafe { libc::sched_setscheduler(0, policy, &param) };
    if rc != 0 {
        tracing::trace!(
            target = "flint.indexer",
            policy,
            errno = std::io::Error::last_os_error().raw_os_error(),
            "failed to change worker scheduling policy"
        );
    }
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn set_background() {}

#[cfg(not(target_os = "linux"))]
pub(crate) fn set_default() {}
