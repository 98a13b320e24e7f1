use docx_fidelity::css::{get_property, length_to_px, parse_declarations, remove_property, set_property};

#[test]
fn declarations_survive_data_uris() {
    let style = "background: url(\"data:image/png;base64,AAAA\"); color:red !important;";
    let declarations = parse_declarations(style);

    assert_eq!(declarations.len(), 2);
    assert_eq!(declarations[0].value, "url(\"data:image/png;base64,AAAA\")");
    assert_eq!(declarations[1].property, "color");
    assert_eq!(declarations[1].value, "red");
    assert!(declarations[1].important);
}

#[test]
fn set_property_replaces_every_duplicate() {
    let updated = set_property("margin-left:10px; color: red; margin-left: 4px", "margin-left", "0", true);
    assert_eq!(updated, "margin-left: 0 !important; color: red");
    assert_eq!(get_property(&updated, "MARGIN-LEFT").as_deref(), Some("0"));

    let appended = set_property("", "width", "12.00px", false);
    assert_eq!(appended, "width: 12.00px");
}

#[test]
fn remove_property_leaves_the_rest() {
    assert_eq!(remove_property("a: 1; b: 2; a: 3", "a"), "b: 2");
    assert_eq!(remove_property("a: 1", "a"), "");
}

#[test]
fn absolute_lengths_convert_to_px() {
    assert_eq!(length_to_px("12"), Some(12.0));
    assert_eq!(length_to_px(" 900px "), Some(900.0));
    assert!((length_to_px("18pt").unwrap() - 24.0).abs() < 1e-4);
    assert_eq!(length_to_px("1in"), Some(96.0));
    assert!((length_to_px("2.54cm").unwrap() - 96.0).abs() < 1e-3);
    assert_eq!(length_to_px("50%"), None);
    assert_eq!(length_to_px("2em"), None);
    assert_eq!(length_to_px("auto"), None);
}
