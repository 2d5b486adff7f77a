#![forbid(unsafe_code)]

//! databind demo binary entry point.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

use databind_demo::app::{Gender, Person, PersonView};
use databind_demo::{cli, runner};
use tracing_subscriber::EnvFilter;

fn init_logging(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn open_input(script: Option<&str>) -> io::Result<Box<dyn BufRead + Send>> {
    match script {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn main() {
    let opts = cli::Opts::parse();
    init_logging(&opts.log_filter);

    let input = match open_input(opts.script.as_deref()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("Failed to open script: {e}");
            process::exit(1);
        }
    };

    let model = Arc::new(Mutex::new(Person::new("Pat", Gender::Unknown)));
    let view = match PersonView::open(&model, opts.trigger) {
        Ok(view) => view,
        Err(e) => {
            eprintln!("Failed to open form: {e}");
            process::exit(1);
        }
    };

    let result = runner::run(view.form(), input, |line| println!("{line}"));
    view.close();
    if let Err(e) = result {
        eprintln!("Runtime error: {e}");
        process::exit(1);
    }

    // Print the results
    let person = model.lock().unwrap_or_else(PoisonError::into_inner);
    println!("person.name = {}", person.name);
    println!("person.gender = {}", person.gender);
}
