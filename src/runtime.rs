use std::io;
use std::sync::mpsc::{self, Receiver, RecvError};

use crossterm::event::{self, Event as CtEvent, KeyEventKind};
pub use crossterm::event::KeyEvent;
use ratatui::{backend::Backend, Terminal};

use crate::classifier::Predictor;
use crate::form::{Action, App};

/// Events consumed by the form loop
#[derive(Clone, Debug)]
pub enum FormEvent {
    Key(KeyEvent),
    Resize,
}

/// Source of terminal events (keyboard, resize)
pub trait FormEventSource {
    /// Blocks for the next event; an error means the source is exhausted.
    fn recv(&self) -> Result<FormEvent, RecvError>;
}

/// Production event source reading crossterm events on a background thread
pub struct CrosstermEventSource {
    rx: Receiver<FormEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let sent = match event::read() {
                // Windows reports both press and release.
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => {
                    tx.send(FormEvent::Key(key))
                }
                Ok(CtEvent::Resize(_, _)) => tx.send(FormEvent::Resize),
                Ok(_) => Ok(()),
                Err(_) => break,
            };
            if sent.is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FormEventSource for CrosstermEventSource {
    fn recv(&self) -> Result<FormEvent, RecvError> {
        self.rx.recv()
    }
}

/// Event source fed from a channel, for driving the form without a TTY
pub struct TestEventSource {
    rx: Receiver<FormEvent>,
}

impl TestEventSource {
    pub fn new(rx: Receiver<FormEvent>) -> Self {
        Self { rx }
    }
}

impl FormEventSource for TestEventSource {
    fn recv(&self) -> Result<FormEvent, RecvError> {
        self.rx.recv()
    }
}

/// Runs the form until the user quits or the event source closes.
pub fn run_form<B, E, P>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &E,
    predictor: &P,
) -> io::Result<()>
where
    B: Backend,
    E: FormEventSource,
    P: Predictor + ?Sized,
{
    terminal.draw(|f| f.render_widget(&*app, f.area()))?;

    while let Ok(event) = events.recv() {
        if let FormEvent::Key(key) = event {
            match app.on_key(key) {
                Action::Quit => break,
                Action::Classify => app.submit(predictor),
                Action::None => {}
            }
        }
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_passes_events_through_then_closes() {
        let (tx, rx) = mpsc::channel();
        tx.send(FormEvent::Resize).unwrap();
        drop(tx);
        let es = TestEventSource::new(rx);

        match es.recv() {
            Ok(FormEvent::Resize) => {}
            other => panic!("expected Resize event, got {other:?}"),
        }
        assert!(es.recv().is_err());
    }
}
