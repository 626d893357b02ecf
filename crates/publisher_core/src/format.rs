/// Title used when the caller leaves it blank.
pub const DEFAULT_TITLE: &str = "Untitled";

/// Returns the title unchanged unless it is empty or whitespace only.
pub fn filtered_title(title: &str) -> &str {
    if title.trim().is_empty() {
        DEFAULT_TITLE
    } else {
        title
    }
}

/// Human readable size using binary multiples, e.g. `15.00 MB`.
///
/// A unit rolls over to the next one at 1000 of it.
pub fn format_bytes(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;
    if mb >= 1000.0 {
        format!("{gb:.2} GB")
    } else if kb >= 1000.0 {
        format!("{mb:.2} MB")
    } else if kb >= 1.0 {
        format!("{kb:.2} KB")
    } else {
        format!("{bytes} B")
    }
}
