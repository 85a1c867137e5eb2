//! Operator keyboard surface.
//!
//! space = pause/resume, `q`/ctrl-C = stop, `+`/`=` and `-`/`_` = retune
//! concurrency by 10% (rounded up, at least 1), `r` = reset stats while
//! running or repeat once completed.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tokio::task::JoinHandle;

use super::controller::DashboardController;
use super::state::RunStatus;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 10% of the current concurrency, rounded up, never less than 1.
#[must_use]
pub fn concurrency_step(concurrency: usize) -> i64 {
    ((concurrency as f64 * 0.1).ceil() as i64).max(1)
}

#[must_use]
pub fn spawn_input_task(controller: &Arc<DashboardController>) -> JoinHandle<()> {
    let controller = Arc::clone(controller);
    let shutdown_rx = controller.subscribe_shutdown();
    tokio::task::spawn_blocking(move || {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }
            match event::poll(POLL_INTERVAL) {
                Ok(true) => {
                    if let Ok(Event::Key(key)) = event::read() {
                        handle_key(&controller, &key);
                    }
                }
                Ok(false) => {}
                Err(_) => break,
            }
        }
    })
}

fn handle_key(controller: &Arc<DashboardController>, key: &KeyEvent) {
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            controller.stop();
        }
        KeyCode::Char('q') | KeyCode::Char('Q') => controller.stop(),
        KeyCode::Char(' ') => match controller.status() {
            RunStatus::Running => controller.pause(),
            RunStatus::Paused => controller.resume(),
            RunStatus::Completed | RunStatus::Stopped => {}
        },
        KeyCode::Char('+') | KeyCode::Char('=') => {
            controller.adjust_concurrency(concurrency_step(controller.concurrency()));
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            controller.adjust_concurrency(-concurrency_step(controller.concurrency()));
        }
        KeyCode::Char('r') | KeyCode::Char('R') => match controller.status() {
            RunStatus::Completed => controller.repeat(),
            RunStatus::Running | RunStatus::Paused | RunStatus::Stopped => {
                controller.reset_stats();
            }
        },
        KeyCode::Backspace
        | KeyCode::Enter
        | KeyCode::Left
        | KeyCode::Right
        | KeyCode::Up
        | KeyCode::Down
        | KeyCode::Home
        | KeyCode::End
        | KeyCode::PageUp
        | KeyCode::PageDown
        | KeyCode::Tab
        | KeyCode::BackTab
        | KeyCode::Delete
        | KeyCode::Insert
        | KeyCode::F(_)
        | KeyCode::Char(_)
        | KeyCode::Null
        | KeyCode::Esc
        | KeyCode::CapsLock
        | KeyCode::ScrollLock
        | KeyCode::NumLock
        | KeyCode::PrintScreen
        | KeyCode::Pause
        | KeyCode::Menu
        | KeyCode::KeypadBegin
        | KeyCode::Media(_)
        | KeyCode::Modifier(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_ten_percent_rounded_up_with_a_floor() {
        assert_eq!(concurrency_step(1), 1);
        assert_eq!(concurrency_step(5), 1);
        assert_eq!(concurrency_step(10), 1);
        assert_eq!(concurrency_step(11), 2);
        assert_eq!(concurrency_step(50), 5);
        assert_eq!(concurrency_step(95), 10);
    }

    #[tokio::test]
    async fn space_toggles_and_r_resets_or_repeats() {
        let controller = DashboardController::new("http://localhost".to_owned(), 10, 50);
        let space = KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE);
        let repeat = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE);

        handle_key(&controller, &space);
        assert_eq!(controller.status(), RunStatus::Paused);
        handle_key(&controller, &space);
        assert_eq!(controller.status(), RunStatus::Running);

        controller.complete();
        handle_key(&controller, &repeat);
        assert_eq!(controller.status(), RunStatus::Running);
    }

    #[tokio::test]
    async fn plus_and_minus_retune_concurrency() {
        let controller = DashboardController::new("http://localhost".to_owned(), 10, 50);
        handle_key(
            &controller,
            &KeyEvent::new(KeyCode::Char('+'), KeyModifiers::NONE),
        );
        assert_eq!(controller.concurrency(), 55);
        handle_key(
            &controller,
            &KeyEvent::new(KeyCode::Char('-'), KeyModifiers::NONE),
        );
        assert_eq!(controller.concurrency(), 49);
    }

    #[tokio::test]
    async fn ctrl_c_stops_the_run() {
        let controller = DashboardController::new("http://localhost".to_owned(), 10, 2);
        handle_key(
            &controller,
            &KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert_eq!(controller.status(), RunStatus::Stopped);
    }
}
