//! Heuristics deciding whether a process belongs to the operating system.

/// Decides whether a process is a system process from its owner and executable
pub trait SystemProcessClassifier: Send + Sync {
    fn is_system_account(&self, username: &str) -> bool;

    fn is_system_path(&self, exe_path: &str) -> bool;

    fn is_system(&self, username: &str, exe_path: &str) -> bool {
        self.is_system_account(username) || self.is_system_path(exe_path)
    }
}

pub struct LinuxClassifier;

const LINUX_ACCOUNTS: &[&str] = &[
    "root",
    "daemon",
    "bin",
    "sys",
    "nobody",
    "messagebus",
    "systemd-network",
    "systemd-resolve",
    "systemd-timesync",
    "syslog",
    "polkitd",
    "avahi",
];

const LINUX_PATHS: &[&str] = &["/usr/", "/sbin/", "/bin/", "/lib/", "/lib64/"];

impl SystemProcessClassifier for LinuxClassifier {
    fn is_system_account(&self, username: &str) -> bool {
        LINUX_ACCOUNTS.contains(&username)
    }

    fn is_system_path(&self, exe_path: &str) -> bool {
        LINUX_PATHS.iter().any(|p| exe_path.starts_with(p))
    }
}

pub struct MacClassifier;

const MAC_ACCOUNTS: &[&str] = &["root", "daemon", "nobody"];

const MAC_PATHS: &[&str] = &["/System/", "/usr/", "/sbin/", "/bin/", "/Library/Apple/"];

impl SystemProcessClassifier for MacClassifier {
    fn is_system_account(&self, username: &str) -> bool {
        // launchd service accounts are all underscore-prefixed (_windowserver, _mdnsresponder, ...)
        MAC_ACCOUNTS.contains(&username) || username.starts_with('_')
    }

    fn is_system_path(&self, exe_path: &str) -> bool {
        MAC_PATHS.iter().any(|p| exe_path.starts_with(p))
    }
}

pub struct WindowsClassifier;

const WINDOWS_ACCOUNTS: &[&str] = &["system", "local service", "network service"];

const WINDOWS_PATHS: &[&str] = &["c:\\windows\\"];

impl SystemProcessClassifier for WindowsClassifier {
    fn is_system_account(&self, username: &str) -> bool {
        let name = username.to_lowercase();
        // Accept both "SYSTEM" and "NT AUTHORITY\SYSTEM"
        let name = name.rsplit('\\').next().unwrap_or(&name);
        WINDOWS_ACCOUNTS.contains(&name)
    }

    fn is_system_path(&self, exe_path: &str) -> bool {
        let path = exe_path.to_lowercase();
        WINDOWS_PATHS.iter().any(|p| path.starts_with(p))
    }
}

/// The classifier for the platform this binary was built for
pub fn platform_classifier() -> Box<dyn SystemProcessClassifier> {
    #[cfg(target_os = "windows")]
    {
        Box::new(WindowsClassifier)
    }

    #[cfg(target_os = "macos")]
    {
        Box::new(MacClassifier)
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        Box::new(LinuxClassifier)
    }
}
