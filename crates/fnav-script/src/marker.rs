//! Module completion markers

/// Name prefix of every completion marker
pub const MARKER_PREFIX: &str = "__fnav_done_";

const ASSIGN_OPEN: &str = "window[\"";
const ASSIGN_CLOSE: &str = "\"] = true;";

/// Statement appended to module code to flag its completion
pub fn marker_assignment(marker: &str) -> String {
    format!("{}{}{}", ASSIGN_OPEN, marker, ASSIGN_CLOSE)
}

/// Find the marker assigned by the last marker statement in `code`
pub fn parse_marker(code: &str) -> Option<&str> {
    let open = format!("{}{}", ASSIGN_OPEN, MARKER_PREFIX);
    let start = code.rfind(&open)? + ASSIGN_OPEN.len();
    let len = code[start..].find("\"]")?;
    Some(&code[start..start + len])
}
