//! Human-readable output formatting

use crate::output::formatter::{ContainerReport, ContainerSummary, Report};

pub fn format_human(report: &Report) -> String {
    match report {
        Report::List(containers) => format_list(containers),
        Report::Container(report) => format_container(report),
        Report::Message(message) => message.clone(),
    }
}

fn format_list(containers: &[ContainerSummary]) -> String {
    if containers.is_empty() {
        return "No containers defined".to_string();
    }
    let mut output = format!(
        "  {:<16} {:<20} {:<8} {:<10} {:<10}\n",
        "ID", "NAME", "TYPE", "DISTRO", "STATUS"
    );
    output.push_str(&"-".repeat(70));
    for c in containers {
        output.push_str(&format!(
            "\n{} {:<16} {:<20} {:<8} {:<10} {:<10}",
            if c.is_default { '*' } else { ' ' },
            truncate(&c.id, 16),
            truncate(&c.name, 20),
            c.backend,
            c.distro,
            c.install_status
        ));
    }
    output
}

fn format_container(report: &ContainerReport) -> String {
    let s = &report.summary;
    let mut output = format!(
        "Container {}{}\n\
         ---------\n\
         Name:      {}\n\
         Type:      {}\n\
         Distro:    {}\n\
         Status:    {}\n\
         Multiarch: {}",
        s.id,
        if s.is_default { " (default)" } else { "" },
        s.name,
        s.backend,
        s.distro,
        s.install_status,
        report.multiarch
    );
    if let Some(state) = report.state {
        output.push_str(&format!("\nState:     {}", state));
    }
    if !report.archives.is_empty() {
        output.push_str("\n\nArchives");
        for archive in &report.archives {
            output.push_str(&format!(
                "\n  {} ({})",
                archive.archive_name, archive.archive_status
            ));
        }
    }
    if !report.packages.is_empty() {
        output.push_str("\n\nPackages");
        for package in &report.packages {
            output.push_str(&format!(
                "\n  {} ({})",
                package.package_name, package.app_status
            ));
        }
    }
    output
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
