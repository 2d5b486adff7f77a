//! Run event scripts through the demo's event loop and check the model.

use std::fs::File;
use std::io::{BufReader, Write};
use std::sync::{Arc, Mutex};

use databind_core::TextTrigger;
use databind_demo::app::{Gender, Person, PersonView};
use databind_demo::runner::{RunStats, run};
use tracing::Level;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
}

fn run_script(script: &str, trigger: TextTrigger) -> (Person, RunStats, Vec<String>) {
    init_tracing();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(script.as_bytes()).unwrap();
    let input = BufReader::new(File::open(file.path()).unwrap());

    let model = Arc::new(Mutex::new(Person::new("Pat", Gender::Unknown)));
    let view = PersonView::open(&model, trigger).unwrap();
    let mut output = Vec::new();
    let stats = run(view.form(), input, |line| output.push(line.to_string())).unwrap();
    view.close();

    let person = model.lock().unwrap().clone();
    (person, stats, output)
}

#[test]
fn name_then_gender_script() {
    let (person, stats, output) = run_script(
        "# edit the form\nname Sam\nshow\ngender Male\nquit\n",
        TextTrigger::Modify,
    );
    assert_eq!(person, Person::new("Sam", Gender::Male));
    assert_eq!(stats.applied, 4);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.script_errors, 0);
    assert_eq!(output.len(), 1);
    assert!(output[0].contains("model: name=\"Sam\" gender=Unknown"));
}

#[test]
fn end_of_script_closes_form() {
    let (person, stats, _) = run_script("type Ann\nbackspace\n", TextTrigger::Modify);
    assert_eq!(person.name, "An");
    assert_eq!(stats.applied, 2);
}

#[test]
fn events_after_quit_are_ignored() {
    let (person, _, _) = run_script("name First\nquit\nname Second\n", TextTrigger::Modify);
    assert_eq!(person.name, "First");
}

#[test]
fn bad_lines_are_reported_and_skipped() {
    let (person, stats, output) =
        run_script("gender Robot\nname Kai\nfly away\n", TextTrigger::Modify);
    assert_eq!(person.name, "Kai");
    assert_eq!(person.gender, Gender::Unknown);
    assert_eq!(stats.script_errors, 2);
    assert!(output.iter().any(|l| l.starts_with("script error: line 1")));
    assert!(output.iter().any(|l| l.starts_with("script error: line 3")));
}

#[test]
fn focus_out_trigger_needs_blur() {
    let (person, _, _) = run_script("type Lou\n", TextTrigger::FocusOut);
    assert_eq!(person.name, "");

    let (person, _, _) = run_script("type Lou\nblur\n", TextTrigger::FocusOut);
    assert_eq!(person.name, "Lou");
}

#[test]
fn reports_follow_script_order() {
    for _ in 0..20 {
        let (_, stats, output) = run_script("show\nbogus\nshow\n", TextTrigger::Modify);
        assert_eq!(stats.script_errors, 1);
        assert_eq!(output.len(), 3);
        assert!(output[0].starts_with("form:"));
        assert!(output[1].starts_with("script error: line 2"));
        assert!(output[2].starts_with("form:"));
    }
}

#[test]
fn quitting_without_edits_leaves_empty_name() {
    let (person, stats, _) = run_script("quit\n", TextTrigger::Modify);
    assert_eq!(person, Person::new("", Gender::Unknown));
    assert_eq!(stats.applied, 1);
}
