#![forbid(unsafe_code)]

//! The person form: a name field and a gender dropdown pushed into a plain
//! `Person` value.
//!
//! The model does not announce its own changes, so the form only pushes
//! UI → model. Edits made to the `Person` directly are not shown in the form.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use databind_core::{
    BindingContext, BindingMode, BindingResult, ObservableValue, Property, SelectionList,
    TextField, TextTrigger,
};
use tracing::{debug, info};

use crate::script::UiEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Every choice, in dropdown order.
    pub const ALL: [Gender; 3] = [Gender::Male, Gender::Female, Gender::Unknown];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|g| g.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown gender '{s}' (expected Male, Female or Unknown)"))
    }
}

/// The data model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub gender: Gender,
}

impl Person {
    #[must_use]
    pub fn new(name: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            gender,
        }
    }
}

fn person_name(p: &Person) -> String {
    p.name.clone()
}

fn set_person_name(p: &mut Person, name: String) {
    p.name = name;
}

fn person_gender(p: &Person) -> Gender {
    p.gender
}

fn set_person_gender(p: &mut Person, gender: Gender) {
    p.gender = gender;
}

pub const NAME: Property<Person, String> = Property::new("name", person_name, set_person_name);
pub const GENDER: Property<Person, Gender> =
    Property::new("gender", person_gender, set_person_gender);

/// What the event loop should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Report(String),
    Quit,
}

/// The form's widgets plus the model they edit.
///
/// Cheap to clone and `Send`, so queued UI jobs can carry it.
#[derive(Debug, Clone)]
pub struct Form {
    pub name: TextField,
    pub gender: SelectionList<Gender>,
    model: Arc<Mutex<Person>>,
}

impl Form {
    /// Apply one simulated interaction.
    ///
    /// # Errors
    ///
    /// Failures from the widgets or the bindings behind them.
    pub fn apply(&self, event: &UiEvent) -> BindingResult<Flow> {
        debug!(?event, "ui event");
        match event {
            UiEvent::SetName(text) => self.name.set_text(text.as_str())?,
            UiEvent::TypeName(text) => self.name.type_text(text)?,
            UiEvent::Backspace => self.name.backspace()?,
            UiEvent::Blur => self.name.focus_out()?,
            UiEvent::SelectGender(gender) => self.gender.select(gender)?,
            UiEvent::Show => return Ok(Flow::Report(self.describe())),
            UiEvent::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Snapshot of the model as it stands.
    #[must_use]
    pub fn person(&self) -> Person {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Human-readable state of widgets and model.
    #[must_use]
    pub fn describe(&self) -> String {
        let person = self.person();
        let selected = self
            .gender
            .selection()
            .map_or_else(|| "-".to_string(), |g| g.to_string());
        format!(
            "form: name=\"{}\" gender={selected} | model: name=\"{}\" gender={}",
            self.name.text(),
            person.name,
            person.gender
        )
    }
}

/// An open person form: widgets, model-side observables, and the bindings
/// between them.
#[derive(Debug)]
pub struct PersonView {
    form: Form,
    // Links hold both sides weakly; the view owns the model side.
    _model_values: (ObservableValue<String>, ObservableValue<Gender>),
    ctx: BindingContext,
}

impl PersonView {
    /// Build the widgets and bind them to `model`.
    ///
    /// The name field updates the model on `trigger`; the dropdown on every
    /// selection change. Both bindings push UI → model only.
    ///
    /// # Errors
    ///
    /// Any binding setup failure. Nothing stays bound in that case.
    pub fn open(model: &Arc<Mutex<Person>>, trigger: TextTrigger) -> BindingResult<Self> {
        let name = TextField::new();
        let gender = SelectionList::new(Gender::ALL.to_vec(), Gender::Unknown)?;

        let model_name = NAME.observe(model);
        let model_gender = GENDER.observe(model);

        let mut ctx = BindingContext::new();
        ctx.bind(
            &name.observe_text(trigger),
            &model_name,
            BindingMode::SourceToTarget,
        )?;
        ctx.bind(
            &gender.observe_selection(),
            &model_gender,
            BindingMode::SourceToTarget,
        )?;
        info!(?trigger, bindings = ctx.len(), "person form opened");

        Ok(Self {
            form: Form {
                name,
                gender,
                model: Arc::clone(model),
            },
            _model_values: (model_name, model_gender),
            ctx,
        })
    }

    #[must_use]
    pub const fn form(&self) -> &Form {
        &self.form
    }

    /// Tear down the bindings. The model keeps its last values.
    pub fn close(mut self) {
        self.ctx.dispose();
    }
}
