use crate::output::Caption;
use anyhow::Result;
use cogex_core::{FrameAction, TrialState};
use cogex_experiment::{Trial, TrialControl};
use cogex_input::KeyFeed;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

const TITLE: &str = "Cogex";

/// Hosts one trial in a window. The event loop polls the trial whenever it
/// wakes and sleeps until the trial's next deadline.
pub struct App {
    window: Option<Arc<Window>>,
    trial: Trial<FrameAction>,
    control: TrialControl,
    keys: Option<KeyFeed>,
    caption: Caption,
    shown: String,
    answers_questions: bool,
    should_exit: bool,
}

impl App {
    pub fn new(
        trial: Trial<FrameAction>,
        keys: Option<KeyFeed>,
        caption: Caption,
        answers_questions: bool,
    ) -> Self {
        let control = trial.control();
        Self {
            window: None,
            trial,
            control,
            keys,
            caption,
            shown: String::new(),
            answers_questions,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        log::info!("press Y or SPACE to start, ESC to stop");
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(TITLE)
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attributes)?);
        log::debug!("window created: {:?}", window.inner_size());
        self.window = Some(window);
        Ok(())
    }

    fn handle_key(&mut self, key: &Key) {
        match key {
            Key::Named(NamedKey::Escape) => {
                self.control.request_stop();
                return;
            }
            Key::Named(NamedKey::Space) if self.trial.state() == TrialState::Armed => {
                self.control.signal_start();
                return;
            }
            Key::Character(c) if self.trial.state() == TrialState::Armed => {
                if c.eq_ignore_ascii_case("y") {
                    self.control.signal_start();
                }
                return;
            }
            _ => {}
        }

        let Some(name) = key_name(key) else {
            return;
        };
        if let Some(keys) = &self.keys {
            keys.press(&name);
        }
        if self.answers_questions && matches!(key, Key::Character(_)) {
            self.control.submit_response(name);
        }
    }

    fn refresh_title(&mut self) {
        let text = self.caption.text();
        if text == self.shown {
            return;
        }
        if let Some(window) = &self.window {
            if text.is_empty() {
                window.set_title(TITLE);
            } else {
                window.set_title(&format!("{TITLE}: {text}"));
            }
        }
        self.shown = text;
    }

    fn next_wake(&self) -> Instant {
        let max_wait = self.trial.config().poll_interval();
        let wait = match (self.trial.next_deadline(), self.trial.now()) {
            (Some(deadline), Some(now)) => deadline.saturating_duration_since(now).min(max_wait),
            _ => max_wait,
        };
        Instant::now() + wait
    }
}

/// Lower-case name for a key press, as recorded in captured input.
pub fn key_name(key: &Key) -> Option<String> {
    match key {
        Key::Character(c) => Some(c.to_lowercase()),
        Key::Named(NamedKey::Space) => Some("space".to_string()),
        Key::Named(NamedKey::Enter) => Some("enter".to_string()),
        Key::Named(named) => Some(format!("{named:?}").to_lowercase()),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window(event_loop) {
                log::error!("failed to create window: {e:#}");
                self.control.request_stop();
                self.trial.poll();
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                self.control.request_stop();
                self.should_exit = true;
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state.is_pressed() && !event.repeat =>
            {
                self.handle_key(&event.logical_key);
            }
            _ => {}
        }
        if self.should_exit {
            self.trial.poll();
            event_loop.exit();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let state = self.trial.poll();
        self.refresh_title();
        if state == TrialState::Done || self.should_exit {
            event_loop.exit();
            return;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_wake()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_are_lower_case() {
        assert_eq!(key_name(&Key::Character("J".into())).as_deref(), Some("j"));
        assert_eq!(key_name(&Key::Named(NamedKey::Space)).as_deref(), Some("space"));
        assert_eq!(key_name(&Key::Named(NamedKey::ArrowLeft)).as_deref(), Some("arrowleft"));
    }
}
