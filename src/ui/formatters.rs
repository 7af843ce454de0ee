use chrono::{DateTime, Local, TimeZone};
use colored::*;
use humansize::{format_size, BINARY};

use crate::core::process_monitor::{ProcessInfo, ProcessUpdateEvent, QueryResult, SystemInfo};

const NAME_WIDTH: usize = 24;
const USER_WIDTH: usize = 12;

/// Format a byte count in human-readable form (KiB, MiB, GiB)
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// Format a Unix timestamp in milliseconds as local time (YYYY-MM-DD HH:MM:SS)
pub fn format_timestamp_ms(millis: i64) -> String {
    if millis <= 0 {
        return "-".to_string();
    }

    match Local.timestamp_millis_opt(millis).single() {
        Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// Format an uptime in seconds as "3d 4h 12m"
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let mut out: String = value.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn colorize_cpu(cpu: f64) -> ColoredString {
    let text = format!("{:>6.1}", cpu);
    if cpu >= 50.0 {
        text.red()
    } else if cpu >= 10.0 {
        text.yellow()
    } else {
        text.normal()
    }
}

pub fn print_process_table(result: &QueryResult) {
    println!(
        "{}",
        format!(
            "{:>7}  {:<name$}  {:<user$}  {:>6}  {:>10}  {:>6}",
            "PID",
            "NAME",
            "USER",
            "CPU%",
            "MEMORY",
            "STATUS",
            name = NAME_WIDTH,
            user = USER_WIDTH
        )
        .bold()
    );

    for process in &result.items {
        let name = truncate(&process.name, NAME_WIDTH);
        let name = if process.is_system {
            name.dimmed()
        } else {
            name.normal()
        };

        let status = if process.is_zombie() {
            process.status.red()
        } else {
            process.status.normal()
        };

        println!(
            "{:>7}  {:<name_w$}  {:<user_w$}  {}  {:>10}  {:>6}{}",
            process.pid,
            name,
            truncate(&process.username, USER_WIDTH),
            colorize_cpu(process.cpu_percent),
            format_bytes(process.memory_bytes),
            status,
            if process.partial_data { " *" } else { "" },
            name_w = NAME_WIDTH,
            user_w = USER_WIDTH
        );
    }

    println!();
    println!(
        "{}",
        format!("Showing {} of {} processes", result.items.len(), result.total).dimmed()
    );
}

fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<14} {}", format!("{}:", label).cyan(), value);
}

pub fn print_process_detail(info: &ProcessInfo) {
    println!("\n{}", format!("PROCESS {}", info.pid).bold().bright_cyan());
    println!("{}", "=".repeat(60));

    print_field("Name", &info.name);
    print_field("Status", &info.status);
    print_field("User", &info.username);
    print_field("Executable", &info.exe_path);
    print_field("Command", &info.cmdline);
    print_field("CPU", format!("{:.1}%", info.cpu_percent));
    print_field(
        "Memory",
        format!("{} ({:.1}%)", format_bytes(info.memory_bytes), info.memory_percent),
    );
    print_field("Threads", info.num_threads);
    print_field("Open files", info.num_fds);
    print_field("Started", format_timestamp_ms(info.create_time));
    print_field("System", if info.is_system { "yes" } else { "no" });

    if info.partial_data {
        println!();
        println!(
            "  {} {}",
            "Partial data:".yellow().bold(),
            info.error_reason.yellow()
        );
    }
}

pub fn print_system_info(info: &SystemInfo) {
    println!("\n{}", "HOST".bold().bright_cyan());
    println!("{}", "=".repeat(60));

    let boot: Option<DateTime<Local>> = Local.timestamp_opt(info.boot_time as i64, 0).single();

    print_field("Hostname", &info.hostname);
    print_field("OS", format!("{} ({})", info.os, info.arch));
    print_field("Uptime", format_uptime(info.uptime));
    print_field(
        "Booted",
        boot.map(|b| b.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    print_field("Processes", info.proc_count);
}

/// One-line human summary of an update event
pub fn summarize_update(event: &ProcessUpdateEvent) -> String {
    match event {
        ProcessUpdateEvent::Full { full_list } => {
            format!("full refresh: {} processes", full_list.len())
        }
        ProcessUpdateEvent::Incremental {
            added,
            updated,
            removed,
        } => format!(
            "+{} added, ~{} updated, -{} removed",
            added.len(),
            updated.len(),
            removed.len()
        ),
    }
}
