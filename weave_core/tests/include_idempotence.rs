//! Testable property 1 and end-to-end scenario 6: including the same file
//! twice is a no-op, and running the resolver twice over one entry point
//! yields the same merged form list both times.

use weave_core::include::load_and_resolve;

#[test]
fn including_the_same_file_twice_merges_it_once() {
    let helper = test_utils::TempSource::new("idem-helper", "(fn h (params) (body 0))");
    let name = helper.path().file_name().unwrap().to_string_lossy();
    let entry = test_utils::TempSource::new(
        "idem-entry",
        &format!("(include \"./{name}\")\n(include \"./{name}\")\n(fn main (params) (body 0))"),
    );

    let merged = load_and_resolve(entry.path(), &[]).unwrap();
    let forms = merged.as_list().unwrap();
    assert_eq!(forms.len(), 2);
}

#[test]
fn resolving_the_same_entry_twice_yields_the_same_form_list() {
    let helper = test_utils::TempSource::new("idem-helper2", "(fn h (params) (body 0))");
    let name = helper.path().file_name().unwrap().to_string_lossy();
    let entry = test_utils::TempSource::new(
        "idem-entry2",
        &format!("(include \"./{name}\")\n(fn main (params) (body 0))"),
    );

    let first = load_and_resolve(entry.path(), &[]).unwrap();
    let second = load_and_resolve(entry.path(), &[]).unwrap();
    assert_eq!(format!("{:?}", first.as_list()), format!("{:?}", second.as_list()));
}
