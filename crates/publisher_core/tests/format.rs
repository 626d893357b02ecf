use publisher_core::{filtered_title, format_bytes, Stage, DEFAULT_TITLE};

const KB: u64 = 1024;

#[test]
fn title_filter_replaces_blank_titles() {
    assert_eq!(filtered_title("A Game With Spaces"), "A Game With Spaces");
    assert_eq!(filtered_title("My Game"), "My Game");
    assert_eq!(filtered_title("           "), DEFAULT_TITLE);
    assert_eq!(filtered_title("  "), "Untitled");
    assert_eq!(filtered_title(""), DEFAULT_TITLE);
    assert_eq!(filtered_title("\t\n"), DEFAULT_TITLE);
}

#[test]
fn title_filter_keeps_surrounding_whitespace_of_real_titles() {
    assert_eq!(filtered_title("  Space Game "), "  Space Game ");
}

#[test]
fn bytes_are_formatted_in_the_largest_fitting_unit() {
    assert_eq!(format_bytes(5), "5 B");
    assert_eq!(format_bytes(5 * KB), "5.00 KB");
    assert_eq!(format_bytes(5120), "5.00 KB");
    assert_eq!(format_bytes(15 * KB * KB), "15.00 MB");
    assert_eq!(format_bytes(999 * KB * KB * KB), "999.00 GB");
    assert_eq!(format_bytes(200 * KB * KB), "200.00 MB");
}

#[test]
fn units_roll_over_at_one_thousand() {
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(999 * KB), "999.00 KB");
    assert_eq!(format_bytes(1000 * KB), "0.98 MB");
    assert_eq!(format_bytes(1000 * KB * KB), "0.98 GB");
}

#[test]
fn stage_names_round_trip() {
    for stage in [
        Stage::Idle,
        Stage::Login,
        Stage::Archiving,
        Stage::Uploading,
        Stage::Processing,
    ] {
        assert_eq!(Stage::parse(stage.as_str()), Some(stage));
    }
    assert_eq!(Stage::parse("zip"), None);
}
