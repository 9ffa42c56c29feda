//! Key event handling

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::model::{ActiveSection, SidebarItem};
use super::AppController;

fn rating_key(code: KeyCode) -> Option<u8> {
    match code {
        KeyCode::Char(c @ '0'..='5') => c.to_digit(10).map(|d| d as u8),
        _ => None,
    }
}

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let model = self.model.lock().await;

        // Handle error message first (blocks all other interactions)
        if model.has_error().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.clear_error().await;
            }
            return Ok(());
        }

        if model.is_help_popup_open().await {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H')) {
                model.hide_help_popup().await;
            }
            return Ok(());
        }

        let ui_state = model.get_ui_state().await;

        // The seed bar takes all printable keys
        if ui_state.active_section == ActiveSection::Seed {
            match key.code {
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        model.cycle_section_backward().await;
                    } else {
                        model.cycle_section_forward().await;
                    }
                    return Ok(());
                }
                KeyCode::BackTab => {
                    model.cycle_section_backward().await;
                    return Ok(());
                }
                KeyCode::Enter => {
                    drop(model);
                    let controller = self.clone();
                    tokio::spawn(async move { controller.submit_seed().await });
                    return Ok(());
                }
                KeyCode::Esc => {
                    model.ui_state.lock().await.seed_input.clear();
                    return Ok(());
                }
                KeyCode::Backspace => {
                    model.backspace_seed().await;
                    return Ok(());
                }
                KeyCode::Char(c) => {
                    if (c == 'q' || c == 'Q') && key.modifiers.contains(KeyModifiers::CONTROL) {
                        model.set_should_quit(true).await;
                        return Ok(());
                    }
                    model.append_to_seed(c).await;
                    return Ok(());
                }
                _ => {}
            }
        }

        if ui_state.active_section == ActiveSection::MainContent {
            let view = model.get_content_state().await.view;

            if let Some(rating) = rating_key(key.code) {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move {
                    match view {
                        SidebarItem::Recommendations => controller.rate_selected(rating).await,
                        SidebarItem::Bucket(_) => controller.move_selected_to_bucket(rating).await,
                    }
                });
                return Ok(());
            }

            match key.code {
                KeyCode::Enter => {
                    drop(model);
                    self.play_selected().await;
                    return Ok(());
                }
                KeyCode::Char('d') | KeyCode::Char('D') => {
                    drop(model);
                    let controller = self.clone();
                    tokio::spawn(async move { controller.remove_selected_from_bucket().await });
                    return Ok(());
                }
                _ => {}
            }
        }

        // Global keybindings
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.set_should_quit(true).await;
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    model.cycle_section_backward().await;
                } else {
                    model.cycle_section_forward().await;
                }
            }
            KeyCode::BackTab => {
                model.cycle_section_backward().await;
            }
            KeyCode::Up => {
                model.move_selection_up().await;
            }
            KeyCode::Down => {
                model.move_selection_down().await;
            }
            KeyCode::Enter => {
                if ui_state.active_section == ActiveSection::Sidebar {
                    drop(model);
                    self.open_sidebar_item().await;
                }
            }
            // Play/Pause toggle
            KeyCode::Char(' ') => {
                drop(model);
                self.toggle_playback().await;
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                drop(model);
                self.next_track().await;
            }
            KeyCode::Char('p') | KeyCode::Char('P') => {
                drop(model);
                self.previous_track().await;
            }
            KeyCode::Left => {
                drop(model);
                self.seek_backward().await;
            }
            KeyCode::Right => {
                drop(model);
                self.seek_forward().await;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                drop(model);
                self.toggle_shuffle().await;
            }
            KeyCode::Char('r') => {
                drop(model);
                self.cycle_repeat().await;
            }
            KeyCode::Char('R') => {
                drop(model);
                let controller = self.clone();
                tokio::spawn(async move { controller.reset_bandit().await });
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                drop(model);
                self.volume_up().await;
            }
            KeyCode::Char('-') => {
                drop(model);
                self.volume_down().await;
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                drop(model);
                self.close_player().await;
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                model.show_help_popup().await;
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_to_five_are_ratings() {
        assert_eq!(rating_key(KeyCode::Char('0')), Some(0));
        assert_eq!(rating_key(KeyCode::Char('5')), Some(5));
        assert_eq!(rating_key(KeyCode::Char('6')), None);
        assert_eq!(rating_key(KeyCode::Enter), None);
    }
}
