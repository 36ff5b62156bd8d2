use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::classifier::{Prediction, Predictor};

pub const EMPTY_INPUT_WARNING: &str = "Please fill in at least the subject or the body.";
pub const SUBJECT_PLACEHOLDER: &str = "e.g. Request for a meeting on pricing";
pub const BODY_PLACEHOLDER: &str = "e.g. Hello, I suggest we meet tomorrow...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Subject,
    Body,
    Classify,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Self::Subject => Self::Body,
            Self::Body => Self::Classify,
            Self::Classify => Self::Subject,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Subject => Self::Classify,
            Self::Body => Self::Subject,
            Self::Classify => Self::Body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Warning(String),
    Classified {
        prediction: Prediction,
        /// Top classes with their probabilities, most likely first.
        ranked: Vec<(String, f32)>,
    },
    Failed(String),
}

/// What the event loop should do after a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Classify,
    Quit,
}

/// State of the classification form.
#[derive(Debug)]
pub struct App {
    pub subject: String,
    pub body: String,
    pub focus: Focus,
    pub outcome: Option<Outcome>,
    /// Device the model runs on, shown in the load banner.
    pub device: String,
    /// Set when the label mapping fell back from the dataset.
    pub label_notice: Option<String>,
}

impl App {
    pub fn new(device: impl Into<String>, label_notice: Option<String>) -> Self {
        Self {
            subject: String::new(),
            body: String::new(),
            focus: Focus::Subject,
            outcome: None,
            device: device.into(),
            label_notice,
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Action {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return Action::Quit,
            KeyCode::Char('c') if ctrl => return Action::Quit,
            KeyCode::Char('r') if ctrl => return Action::Classify,
            KeyCode::Char('l') if ctrl => self.clear(),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Enter => match self.focus {
                Focus::Subject => self.focus = Focus::Body,
                Focus::Body => self.body.push('\n'),
                Focus::Classify => return Action::Classify,
            },
            KeyCode::Backspace => {
                if let Some(field) = self.focused_field() {
                    field.pop();
                }
            }
            KeyCode::Char(c) if !ctrl => {
                if let Some(field) = self.focused_field() {
                    field.push(c);
                }
            }
            _ => {}
        }
        Action::None
    }

    fn focused_field(&mut self) -> Option<&mut String> {
        match self.focus {
            Focus::Subject => Some(&mut self.subject),
            Focus::Body => Some(&mut self.body),
            Focus::Classify => None,
        }
    }

    pub fn clear(&mut self) {
        self.subject.clear();
        self.body.clear();
        self.outcome = None;
        self.focus = Focus::Subject;
    }

    /// Validates the fields and runs one prediction, recording the outcome.
    pub fn submit<P: Predictor + ?Sized>(&mut self, predictor: &P) {
        if self.subject.trim().is_empty() && self.body.trim().is_empty() {
            self.outcome = Some(Outcome::Warning(EMPTY_INPUT_WARNING.to_string()));
            return;
        }
        self.outcome = Some(match predictor.predict(&self.subject, &self.body) {
            Ok(prediction) => {
                let ranked = prediction
                    .ranked(predictor.labels())
                    .into_iter()
                    .take(3)
                    .map(|(label, p)| (label.to_string(), p))
                    .collect();
                Outcome::Classified { prediction, ranked }
            }
            Err(e) => {
                tracing::debug!(error = %e, "prediction failed");
                Outcome::Failed(format!("Prediction failed: {e}"))
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::labels::LabelMap;
    use assert_matches::assert_matches;
    use std::cell::Cell;

    struct Fixed {
        calls: Cell<usize>,
        labels: LabelMap,
    }

    impl Predictor for Fixed {
        fn labels(&self) -> &LabelMap {
            &self.labels
        }

        fn predict(&self, _subject: &str, _body: &str) -> Result<Prediction> {
            self.calls.set(self.calls.get() + 1);
            let mut logits = vec![0.0; 9];
            logits[3] = 0.8;
            logits[8] = 0.2;
            Prediction::from_logits(logits, &self.labels)
        }
    }

    struct Broken(LabelMap);

    impl Predictor for Broken {
        fn labels(&self) -> &LabelMap {
            &self.0
        }

        fn predict(&self, _subject: &str, _body: &str) -> Result<Prediction> {
            Err(Error::EmptyLogits)
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(app: &mut App, s: &str) {
        for c in s.chars() {
            app.on_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_goes_to_focused_field() {
        let mut app = App::new("cpu", None);
        type_str(&mut app, "Pricing");
        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "line one");
        app.on_key(key(KeyCode::Enter));
        type_str(&mut app, "two!");
        app.on_key(key(KeyCode::Backspace));

        assert_eq!(app.subject, "Pricing");
        assert_eq!(app.body, "line one\ntwo");
        assert_eq!(app.focus, Focus::Body);
    }

    #[test]
    fn focus_cycles_both_ways() {
        let mut app = App::new("cpu", None);
        app.on_key(key(KeyCode::Tab));
        app.on_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Classify);
        app.on_key(key(KeyCode::Tab));
        assert_eq!(app.focus, Focus::Subject);
        app.on_key(key(KeyCode::BackTab));
        assert_eq!(app.focus, Focus::Classify);
        assert_eq!(app.on_key(key(KeyCode::Enter)), Action::Classify);
    }

    #[test]
    fn control_keys_map_to_actions() {
        let mut app = App::new("cpu", None);
        let ctrl = |c| KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL);
        assert_eq!(app.on_key(ctrl('r')), Action::Classify);
        assert_eq!(app.on_key(ctrl('c')), Action::Quit);
        assert_eq!(app.on_key(key(KeyCode::Esc)), Action::Quit);
        assert!(app.subject.is_empty());
    }

    #[test]
    fn blank_fields_warn_without_predicting() {
        let predictor = Fixed {
            calls: Cell::new(0),
            labels: LabelMap::builtin(),
        };
        let mut app = App::new("cpu", None);
        type_str(&mut app, "   ");
        app.submit(&predictor);

        assert_eq!(predictor.calls.get(), 0);
        assert_eq!(
            app.outcome,
            Some(Outcome::Warning(EMPTY_INPUT_WARNING.to_string()))
        );
    }

    #[test]
    fn body_alone_is_enough() {
        let predictor = Fixed {
            calls: Cell::new(0),
            labels: LabelMap::builtin(),
        };
        let mut app = App::new("cpu", None);
        app.body = "We should split the northern region.".into();
        app.submit(&predictor);

        assert_eq!(predictor.calls.get(), 1);
        assert_matches!(
            &app.outcome,
            Some(Outcome::Classified { prediction, ranked })
                if prediction.label == "clean" && ranked.len() == 3 && ranked[1].0 == "price_fixing"
        );
    }

    #[test]
    fn errors_are_kept_on_the_form() {
        let mut app = App::new("cpu", None);
        app.subject = "hello".into();
        app.submit(&Broken(LabelMap::builtin()));
        assert_matches!(&app.outcome, Some(Outcome::Failed(msg)) if msg.contains("no class scores"));

        app.on_key(KeyEvent::new(KeyCode::Char('l'), KeyModifiers::CONTROL));
        assert!(app.outcome.is_none());
        assert!(app.subject.is_empty());
    }
}
