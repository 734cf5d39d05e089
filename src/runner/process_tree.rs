//! Termination of a test process together with everything it forked.
//!
//! Test runners commonly spawn workers (browser drivers, surefire forks,
//! `dotnet testhost`), and those can leave their parent's process group, so
//! descendants are collected explicitly before the group is killed.

/// All descendants of `pid`, parents before their children.
pub fn descendants(pid: u32) -> Vec<u32> {
    let mut found = Vec::new();
    let mut pending = vec![pid];
    while let Some(parent) = pending.pop() {
        for child in child_pids(parent) {
            // A pid can be recycled mid-walk; never loop.
            if child != pid && !found.contains(&child) {
                found.push(child);
                pending.push(child);
            }
        }
    }
    found
}

/// Forcibly kill `pid`, its process group, and every descendant.
pub fn kill_process_tree(pid: u32) {
    #[cfg(unix)]
    {
        // Collect first: once the parent dies its children are reparented
        // and no longer discoverable from it.
        let tree = descendants(pid);
        tracing::debug!("Killing process tree of {} ({} descendants)", pid, tree.len());
        unsafe {
            // Spawned with setpgid(0, 0), so the group id is the pid.
            libc::killpg(pid as i32, libc::SIGKILL);
            libc::kill(pid as i32, libc::SIGKILL);
        }
        for child in tree.into_iter().rev() {
            unsafe {
                libc::kill(child as i32, libc::SIGKILL);
            }
        }
    }
    #[cfg(windows)]
    {
        let status = std::process::Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        if let Err(e) = status {
            tracing::warn!("taskkill failed for {}: {}", pid, e);
        }
    }
}

/// Direct child PIDs of a process.
fn child_pids(pid: u32) -> Vec<u32> {
    #[cfg(target_os = "macos")]
    {
        child_pids_macos(pid)
    }
    #[cfg(target_os = "linux")]
    {
        child_pids_linux(pid)
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = pid;
        vec![]
    }
}

#[cfg(target_os = "macos")]
fn child_pids_macos(pid: u32) -> Vec<u32> {
    extern "C" {
        fn proc_listchildpids(ppid: i32, buffer: *mut libc::c_void, buffersize: i32) -> i32;
    }

    unsafe {
        let count = proc_listchildpids(pid as i32, std::ptr::null_mut(), 0);
        if count <= 0 {
            return vec![];
        }

        // Room for children forked between the two calls.
        let mut pids = vec![0i32; count as usize + 16];
        let buf_size = (pids.len() * std::mem::size_of::<i32>()) as i32;
        let actual = proc_listchildpids(pid as i32, pids.as_mut_ptr() as *mut libc::c_void, buf_size);
        if actual <= 0 {
            return vec![];
        }

        pids.truncate(actual as usize);
        pids.into_iter().filter(|&p| p > 0).map(|p| p as u32).collect()
    }
}

#[cfg(target_os = "linux")]
fn child_pids_linux(pid: u32) -> Vec<u32> {
    // Every thread can fork; read each task's children list (CONFIG_PROC_CHILDREN).
    if let Ok(tasks) = std::fs::read_dir(format!("/proc/{}/task", pid)) {
        let mut children = Vec::new();
        let mut any_readable = false;
        for task in tasks.flatten() {
            if let Ok(content) = std::fs::read_to_string(task.path().join("children")) {
                any_readable = true;
                children.extend(content.split_whitespace().filter_map(|s| s.parse::<u32>().ok()));
            }
        }
        if any_readable {
            return children;
        }
    }

    // Fallback: scan /proc for processes whose ppid matches
    let Ok(entries) = std::fs::read_dir("/proc") else { return vec![] };
    entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_string_lossy().parse::<u32>().ok())
        .filter(|&candidate| {
            std::fs::read_to_string(format!("/proc/{}/stat", candidate))
                .ok()
                .and_then(|stat| parse_stat_ppid(&stat))
                == Some(pid)
        })
        .collect()
}

/// Parent pid from a `/proc/<pid>/stat` line. The command name may contain
/// spaces and parentheses, so fields are counted from the last `)`.
#[cfg(any(target_os = "linux", test))]
fn parse_stat_ppid(stat: &str) -> Option<u32> {
    let after_comm = stat.rfind(')')?;
    stat[after_comm + 1..].split_whitespace().nth(1)?.parse().ok()
}
