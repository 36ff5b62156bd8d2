use std::sync::mpsc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use email_compliance_classifier::{
    form::{App, Outcome, EMPTY_INPUT_WARNING},
    labels::LabelMap,
    runtime::{run_form, FormEvent, TestEventSource},
    Prediction, Predictor, Result,
};
use ratatui::{backend::TestBackend, Terminal};

// Scores every email as bid rigging unless the text mentions lunch.
struct KeywordPredictor {
    labels: LabelMap,
}

impl Predictor for KeywordPredictor {
    fn labels(&self) -> &LabelMap {
        &self.labels
    }

    fn predict(&self, subject: &str, body: &str) -> Result<Prediction> {
        let text = email_compliance_classifier::classifier::compose_text(subject, body);
        let mut logits = vec![0.0; self.labels.len()];
        if text.contains("lunch") {
            logits[3] = 6.0;
        } else {
            logits[2] = 6.0;
        }
        Prediction::from_logits(logits, &self.labels)
    }
}

fn key(code: KeyCode) -> FormEvent {
    FormEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn send_text(tx: &mpsc::Sender<FormEvent>, text: &str) {
    for c in text.chars() {
        tx.send(key(KeyCode::Char(c))).unwrap();
    }
}

fn screen(terminal: &Terminal<TestBackend>) -> String {
    let buffer = terminal.backend().buffer();
    let width = buffer.area.width as usize;
    buffer
        .content
        .chunks(width)
        .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn headless_classification_flow() {
    let predictor = KeywordPredictor {
        labels: LabelMap::builtin(),
    };
    let mut app = App::new("cpu", None);
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

    let (tx, rx) = mpsc::channel();
    send_text(&tx, "Tender");
    tx.send(key(KeyCode::Enter)).unwrap();
    send_text(&tx, "You bid high this time, we bid low next time.");
    tx.send(key(KeyCode::Tab)).unwrap();
    tx.send(key(KeyCode::Enter)).unwrap();
    drop(tx);

    run_form(&mut terminal, &mut app, &TestEventSource::new(rx), &predictor).unwrap();

    match &app.outcome {
        Some(Outcome::Classified { prediction, .. }) => {
            assert_eq!(prediction.label, "bid_rigging");
        }
        other => panic!("expected a classification, got {other:?}"),
    }

    let text = screen(&terminal);
    assert!(text.contains("Email Compliance Classification"));
    assert!(text.contains("Model loaded (cpu)"));
    assert!(text.contains("Classification: bid_rigging"));
    assert!(text.contains("Confidence: 0.9"));
}

#[test]
fn headless_empty_form_warns() {
    let predictor = KeywordPredictor {
        labels: LabelMap::builtin(),
    };
    let mut app = App::new("cpu", Some("dataset missing".to_string()));
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

    let (tx, rx) = mpsc::channel();
    send_text(&tx, "  ");
    tx.send(FormEvent::Key(KeyEvent::new(
        KeyCode::Char('r'),
        KeyModifiers::CONTROL,
    )))
    .unwrap();
    drop(tx);

    run_form(&mut terminal, &mut app, &TestEventSource::new(rx), &predictor).unwrap();

    assert_eq!(
        app.outcome,
        Some(Outcome::Warning(EMPTY_INPUT_WARNING.to_string()))
    );
    let text = screen(&terminal);
    assert!(text.contains(EMPTY_INPUT_WARNING));
    assert!(text.contains("Label mapping fallback: dataset missing"));
}

#[test]
fn headless_escape_quits_before_later_events() {
    let predictor = KeywordPredictor {
        labels: LabelMap::builtin(),
    };
    let mut app = App::new("cpu", None);
    let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

    let (tx, rx) = mpsc::channel();
    send_text(&tx, "lunch");
    tx.send(key(KeyCode::Esc)).unwrap();
    send_text(&tx, " ignored");

    run_form(&mut terminal, &mut app, &TestEventSource::new(rx), &predictor).unwrap();

    assert_eq!(app.subject, "lunch");
    assert!(app.outcome.is_none());
}
