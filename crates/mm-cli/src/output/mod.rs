//! Output formatting utilities for the CLI

use tabled::{settings::Style, Table, Tabled};

use mm_core::MemberInfo;

/// Format the member directory as an ASCII table.
///
/// When `caller` matches a member name, that row is marked with `*`.
pub fn format_members(members: &[MemberInfo], caller: Option<&str>) -> String {
    if members.is_empty() {
        return "No members in the mesh".to_string();
    }

    #[derive(Tabled)]
    struct MemberRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "PEER")]
        peer: String,
        #[tabled(rename = "COMMAND")]
        command: String,
        #[tabled(rename = "CWD")]
        cwd: String,
        #[tabled(rename = "FOREGROUND")]
        foreground: String,
    }

    let rows: Vec<MemberRow> = members
        .iter()
        .map(|m| MemberRow {
            name: if caller == Some(m.name.as_str()) {
                format!("{} *", m.name)
            } else {
                m.name.clone()
            },
            peer: m.peer_id.to_string(),
            command: m.command.clone().unwrap_or_else(|| "-".to_string()),
            cwd: m.cwd.clone().unwrap_or_else(|| "-".to_string()),
            foreground: m
                .foreground_process
                .clone()
                .unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print a success message with a green checkmark
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message with a red cross
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message with a yellow marker
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use mm_protocol::{ActorId, PeerId};

    fn member(name: &str) -> MemberInfo {
        let peer = PeerId::new("host", "127.0.0.1", 50051);
        MemberInfo::bare(name, ActorId::new("u-1", peer), "tcp")
    }

    #[test]
    fn test_empty_members() {
        assert_eq!(format_members(&[], None), "No members in the mesh");
    }

    #[test]
    fn test_caller_is_marked() {
        let members = vec![member("alice"), member("bob")];
        let table = format_members(&members, Some("alice"));
        assert!(table.contains("alice *"));
        assert!(!table.contains("bob *"));
    }
}
