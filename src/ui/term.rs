use std::fs::{File, OpenOptions};

use crossterm::cursor::Show;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph};
use ratatui::{Frame, Terminal};

use super::{parse_label, ButtonRow, DialogBody, DialogFields, PromptUi, UiError, UserAction};
use crate::secret::{SecretInput, SecretString};
use crate::text::{display_width, sanitize_display, wrap_line};

const MIN_DIALOG_WIDTH: u16 = 44;
const WRAP_CAP: usize = 64;

/// Modal prompt dialog on the controlling terminal. The protocol rides
/// stdin/stdout, so the human side gets its own tty handle; raw mode and the
/// alternate screen are entered per dialog and restored by a drop guard, so
/// the terminal comes back even on an error path.
pub struct TermUi {
    tty: File,
    fields: Option<DialogFields>,
    input: SecretInput,
}

impl TermUi {
    pub fn open(path: &str) -> Result<TermUi, UiError> {
        let tty = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(TermUi {
            tty,
            fields: None,
            input: SecretInput::default(),
        })
    }
}

impl PromptUi for TermUi {
    fn set_fields(&mut self, fields: DialogFields) {
        self.fields = Some(fields);
    }

    fn run(&mut self) -> Result<UserAction, UiError> {
        let fields = self.fields.take().ok_or(UiError::NoDialog)?;
        let mut view = build_view(&fields);
        self.input.wipe();
        let _guard = TerminalModeGuard::enter(&self.tty)?;
        let backend = CrosstermBackend::new(self.tty.try_clone()?);
        let mut terminal = Terminal::new(backend)?;
        let action = loop {
            terminal.draw(|frame| draw_dialog(frame, &view, &self.input))?;
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let action = if view.prompt.is_some() {
                        handle_entry_key(&key, &mut self.input)
                    } else {
                        handle_message_key(&key, &mut view)
                    };
                    if let Some(action) = action {
                        break action;
                    }
                }
                // A resize just triggers the next draw.
                _ => {}
            }
        };
        if action != UserAction::Ok {
            self.input.wipe();
        }
        Ok(action)
    }

    fn take_secret(&mut self) -> SecretString {
        self.input.take()
    }
}

struct TerminalModeGuard {
    tty: File,
}

impl TerminalModeGuard {
    fn enter(tty: &File) -> Result<TerminalModeGuard, UiError> {
        // The guard exists before any mode change, so a partial setup is
        // still undone on drop.
        let mut guard = TerminalModeGuard {
            tty: tty.try_clone()?,
        };
        enable_raw_mode()?;
        guard.tty.execute(EnterAlternateScreen)?;
        Ok(guard)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = self.tty.execute(LeaveAlternateScreen);
        let _ = self.tty.execute(Show);
    }
}

/// Display-ready dialog state. Built once per `run`; the focus index is the
/// only part that changes while the dialog is up.
struct DialogView {
    title: String,
    description: String,
    error: String,
    prompt: Option<String>,
    quality: Option<QualityView>,
    buttons: Vec<Button>,
    focus: usize,
}

struct QualityView {
    label: String,
    tooltip: String,
}

struct Button {
    caption: String,
    accel: Option<char>,
    accel_index: Option<usize>,
    action: UserAction,
}

fn build_view(fields: &DialogFields) -> DialogView {
    let title = {
        let title = sanitize_display(fields.title.trim());
        if title.is_empty() {
            env!("CARGO_PKG_NAME").to_string()
        } else {
            title
        }
    };
    let description = sanitize_display(&fields.description);
    let error = sanitize_display(&fields.error);
    match &fields.body {
        DialogBody::SecretEntry {
            prompt,
            quality_bar,
            ok,
            cancel,
        } => {
            let buttons = vec![
                make_button(ok, "OK", UserAction::Ok),
                make_button(cancel, "Cancel", UserAction::Cancel),
            ];
            DialogView {
                title,
                description,
                error,
                prompt: Some(sanitize_display(prompt)),
                quality: quality_bar.as_ref().map(|bar| QualityView {
                    label: sanitize_display(&bar.label),
                    tooltip: sanitize_display(&bar.tooltip),
                }),
                buttons,
                // Enter accepts, so the affirmative button reads as active.
                focus: 0,
            }
        }
        DialogBody::Message { buttons } => {
            let buttons = match buttons {
                ButtonRow::One { ok } => vec![make_button(ok, "OK", UserAction::Ok)],
                ButtonRow::Two { ok, cancel } => vec![
                    make_button(ok, "OK", UserAction::Ok),
                    make_button(cancel, "Cancel", UserAction::Cancel),
                ],
                ButtonRow::Three { ok, not_ok, cancel } => vec![
                    make_button(ok, "OK", UserAction::Ok),
                    make_button(not_ok, "No", UserAction::NotOk),
                    make_button(cancel, "Cancel", UserAction::Cancel),
                ],
            };
            // Cancel sits last in the row and takes the default focus when
            // there is more than one button.
            let focus = buttons.len() - 1;
            DialogView {
                title,
                description,
                error,
                prompt: None,
                quality: None,
                buttons,
                focus,
            }
        }
    }
}

fn make_button(label: &str, fallback: &str, action: UserAction) -> Button {
    let (caption, accel_index) = parse_label(&sanitize_display(label));
    if caption.trim().is_empty() {
        return Button {
            caption: fallback.to_string(),
            accel: None,
            accel_index: None,
            action,
        };
    }
    let accel = accel_index
        .and_then(|index| caption.chars().nth(index))
        .and_then(|ch| ch.to_lowercase().next());
    Button {
        caption,
        accel,
        accel_index,
        action,
    }
}

fn handle_entry_key(key: &KeyEvent, input: &mut SecretInput) -> Option<UserAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(UserAction::Cancel),
            KeyCode::Char('u') | KeyCode::Char('U') => {
                input.wipe();
                None
            }
            _ => None,
        };
    }
    match key.code {
        KeyCode::Enter => Some(UserAction::Ok),
        KeyCode::Esc => Some(UserAction::Cancel),
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::ALT) => {
            input.insert_char(ch);
            None
        }
        KeyCode::Backspace => {
            input.backspace();
            None
        }
        KeyCode::Delete => {
            input.delete();
            None
        }
        KeyCode::Left => {
            input.move_left();
            None
        }
        KeyCode::Right => {
            input.move_right();
            None
        }
        KeyCode::Home => {
            input.move_home();
            None
        }
        KeyCode::End => {
            input.move_end();
            None
        }
        _ => None,
    }
}

fn handle_message_key(key: &KeyEvent, view: &mut DialogView) -> Option<UserAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return matches!(key.code, KeyCode::Char('c') | KeyCode::Char('C'))
            .then_some(UserAction::Cancel);
    }
    let count = view.buttons.len();
    match key.code {
        KeyCode::Esc => Some(UserAction::Cancel),
        KeyCode::Enter => Some(view.buttons[view.focus].action),
        KeyCode::Left | KeyCode::BackTab => {
            view.focus = (view.focus + count - 1) % count;
            None
        }
        KeyCode::Right | KeyCode::Tab => {
            view.focus = (view.focus + 1) % count;
            None
        }
        KeyCode::Char(ch) => {
            let wanted = ch.to_lowercase().next().unwrap_or(ch);
            view.buttons
                .iter()
                .find(|button| button.accel == Some(wanted))
                .map(|button| button.action)
        }
        _ => None,
    }
}

/// Length-plus-variety score for the gauge, 0..=100. Scoring stays local;
/// the synchronous model leaves no room to ask the agent mid-dialog.
fn quality_estimate(chars: &[char]) -> u16 {
    if chars.is_empty() {
        return 0;
    }
    let lower = chars.iter().any(|ch| ch.is_lowercase());
    let upper = chars.iter().any(|ch| ch.is_uppercase());
    let digit = chars.iter().any(|ch| ch.is_ascii_digit());
    let other = chars.iter().any(|ch| !ch.is_alphanumeric());
    let classes =
        u16::from(lower) + u16::from(upper) + u16::from(digit) + u16::from(other);
    let length = chars.len().min(16) as u16;
    (length * 5 + classes.saturating_sub(1) * 10).min(100)
}

struct DialogLayout {
    lines: Vec<Line<'static>>,
    cursor: Option<(u16, u16)>,
    gauge_row: Option<u16>,
}

fn build_layout(view: &DialogView, input: &SecretInput, width: u16) -> DialogLayout {
    let wrap_width = usize::from(width.max(1));
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut cursor = None;
    let mut gauge_row = None;

    if !view.description.is_empty() {
        for chunk in view.description.split('\n') {
            for wrapped in wrap_line(chunk, wrap_width) {
                lines.push(Line::raw(wrapped));
            }
        }
        lines.push(Line::raw(""));
    }
    if !view.error.is_empty() {
        let style = Style::default().fg(Color::Red).add_modifier(Modifier::BOLD);
        for wrapped in wrap_line(&view.error, wrap_width) {
            lines.push(Line::styled(wrapped, style));
        }
        lines.push(Line::raw(""));
    }
    if let Some(prompt) = &view.prompt {
        let offset = display_width(prompt) + 1;
        cursor = Some((lines.len() as u16, (offset + input.cursor()) as u16));
        lines.push(Line::from(vec![
            Span::raw(prompt.clone()),
            Span::raw(" "),
            Span::styled(
                "*".repeat(input.char_count()),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]));
        if let Some(quality) = &view.quality {
            gauge_row = Some(lines.len() as u16);
            lines.push(Line::raw(""));
            if !quality.tooltip.is_empty() {
                lines.push(Line::styled(
                    quality.tooltip.clone(),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
        }
        lines.push(Line::raw(""));
    }
    lines.push(button_row_line(view, wrap_width));
    DialogLayout {
        lines,
        cursor,
        gauge_row,
    }
}

fn button_row_line(view: &DialogView, width: usize) -> Line<'static> {
    let pad = width.saturating_sub(buttons_width(&view.buttons)) / 2;
    let mut spans: Vec<Span<'static>> = vec![Span::raw(" ".repeat(pad))];
    for (index, button) in view.buttons.iter().enumerate() {
        if index > 0 {
            spans.push(Span::raw("  "));
        }
        let base = if index == view.focus {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        spans.push(Span::styled("[ ".to_string(), base));
        match button.accel_index {
            Some(accel_index) => {
                let chars: Vec<char> = button.caption.chars().collect();
                let pre: String = chars[..accel_index].iter().collect();
                let marked: String = chars[accel_index..=accel_index].iter().collect();
                let post: String = chars[accel_index + 1..].iter().collect();
                spans.push(Span::styled(pre, base));
                spans.push(Span::styled(marked, base.add_modifier(Modifier::UNDERLINED)));
                spans.push(Span::styled(post, base));
            }
            None => spans.push(Span::styled(button.caption.clone(), base)),
        }
        spans.push(Span::styled(" ]".to_string(), base));
    }
    Line::from(spans)
}

fn buttons_width(buttons: &[Button]) -> usize {
    let mut width = 0;
    for (index, button) in buttons.iter().enumerate() {
        if index > 0 {
            width += 2;
        }
        width += display_width(&button.caption) + 4;
    }
    width
}

fn dialog_width(view: &DialogView, screen: u16) -> u16 {
    let mut want = display_width(&view.title) + 6;
    for chunk in view.description.split('\n') {
        want = want.max(display_width(chunk).min(WRAP_CAP) + 6);
    }
    want = want.max(display_width(&view.error).min(WRAP_CAP) + 6);
    if let Some(prompt) = &view.prompt {
        want = want.max(display_width(prompt) + 24);
    }
    want = want.max(buttons_width(&view.buttons) + 6);
    u16::try_from(want)
        .unwrap_or(u16::MAX)
        .max(MIN_DIALOG_WIDTH)
        .min(screen.saturating_sub(2))
}

fn centered(screen: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(screen.width);
    let height = height.min(screen.height);
    Rect::new(
        screen.x + (screen.width - width) / 2,
        screen.y + (screen.height - height) / 2,
        width,
        height,
    )
}

fn draw_dialog(frame: &mut Frame, view: &DialogView, input: &SecretInput) {
    let screen = frame.area();
    if screen.width < 6 || screen.height < 4 {
        return;
    }
    let width = dialog_width(view, screen.width);
    let layout = build_layout(view, input, width.saturating_sub(4));
    let height = (layout.lines.len() as u16 + 2).min(screen.height);
    let area = centered(screen, width, height);
    frame.render_widget(Clear, area);
    let block = Block::default().borders(Borders::ALL).title(Span::styled(
        format!(" {} ", view.title),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let content = Rect {
        x: inner.x + 1,
        y: inner.y,
        width: inner.width.saturating_sub(2),
        height: inner.height,
    };
    frame.render_widget(Paragraph::new(layout.lines), content);
    if let (Some(row), Some(quality)) = (layout.gauge_row, view.quality.as_ref()) {
        if row < content.height {
            let percent = quality_estimate(input.chars());
            let label = if quality.label.is_empty() {
                format!("{percent}%")
            } else {
                format!("{} {percent}%", quality.label)
            };
            let gauge = Gauge::default()
                .ratio(f64::from(percent) / 100.0)
                .label(label)
                .gauge_style(Style::default().fg(Color::Green).bg(Color::DarkGray));
            frame.render_widget(gauge, Rect::new(content.x, content.y + row, content.width, 1));
        }
    }
    if let Some((row, col)) = layout.cursor {
        if row < content.height {
            frame.set_cursor_position(Position::new(
                (content.x + col).min(content.right().saturating_sub(1)),
                content.y + row,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        build_view, handle_entry_key, handle_message_key, quality_estimate, DialogView,
    };
    use crate::secret::SecretInput;
    use crate::ui::{ButtonRow, DialogBody, DialogFields, QualityBar, UserAction};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn message_fields(buttons: ButtonRow) -> DialogFields {
        DialogFields {
            title: "Question".to_string(),
            description: "Really delete the key?".to_string(),
            error: String::new(),
            body: DialogBody::Message { buttons },
        }
    }

    fn secret_fields() -> DialogFields {
        DialogFields {
            title: String::new(),
            description: "Unlock the token".to_string(),
            error: String::new(),
            body: DialogBody::SecretEntry {
                prompt: "PIN:".to_string(),
                quality_bar: Some(QualityBar {
                    label: "Quality".to_string(),
                    tooltip: String::new(),
                }),
                ok: "&OK".to_string(),
                cancel: "&Cancel".to_string(),
            },
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn three_button_view() -> DialogView {
        build_view(&message_fields(ButtonRow::Three {
            ok: "&Yes".to_string(),
            not_ok: "&No".to_string(),
            cancel: "&Cancel".to_string(),
        }))
    }

    #[test]
    fn default_focus_is_the_cancel_button() {
        let view = three_button_view();
        assert_eq!(view.buttons.len(), 3);
        assert_eq!(view.focus, 2);
        assert_eq!(view.buttons[2].action, UserAction::Cancel);
    }

    #[test]
    fn empty_label_falls_back_to_builtin_caption() {
        let view = build_view(&message_fields(ButtonRow::Two {
            ok: String::new(),
            cancel: "&Cancel".to_string(),
        }));
        assert_eq!(view.buttons[0].caption, "OK");
        assert_eq!(view.buttons[0].accel, None);
    }

    #[test]
    fn empty_title_falls_back_to_program_name() {
        let view = build_view(&secret_fields());
        assert_eq!(view.title, env!("CARGO_PKG_NAME"));
        assert_eq!(view.prompt.as_deref(), Some("PIN:"));
    }

    #[test]
    fn accelerator_key_activates_its_button() {
        let mut view = three_button_view();
        assert_eq!(
            handle_message_key(&press(KeyCode::Char('N')), &mut view),
            Some(UserAction::NotOk)
        );
        assert_eq!(
            handle_message_key(&press(KeyCode::Char('y')), &mut view),
            Some(UserAction::Ok)
        );
        assert_eq!(handle_message_key(&press(KeyCode::Char('q')), &mut view), None);
    }

    #[test]
    fn tab_cycles_focus_and_enter_activates() {
        let mut view = three_button_view();
        assert_eq!(handle_message_key(&press(KeyCode::Tab), &mut view), None);
        assert_eq!(view.focus, 0);
        assert_eq!(handle_message_key(&press(KeyCode::Left), &mut view), None);
        assert_eq!(view.focus, 2);
        assert_eq!(
            handle_message_key(&press(KeyCode::Enter), &mut view),
            Some(UserAction::Cancel)
        );
    }

    #[test]
    fn escape_and_ctrl_c_cancel() {
        let mut view = three_button_view();
        assert_eq!(
            handle_message_key(&press(KeyCode::Esc), &mut view),
            Some(UserAction::Cancel)
        );
        assert_eq!(
            handle_message_key(&ctrl('c'), &mut view),
            Some(UserAction::Cancel)
        );
        let mut input = SecretInput::default();
        assert_eq!(
            handle_entry_key(&press(KeyCode::Esc), &mut input),
            Some(UserAction::Cancel)
        );
    }

    #[test]
    fn entry_keys_edit_and_accept() {
        let mut input = SecretInput::default();
        for ch in "1234".chars() {
            assert_eq!(handle_entry_key(&press(KeyCode::Char(ch)), &mut input), None);
        }
        handle_entry_key(&press(KeyCode::Backspace), &mut input);
        handle_entry_key(&press(KeyCode::Home), &mut input);
        handle_entry_key(&press(KeyCode::Delete), &mut input);
        assert_eq!(
            handle_entry_key(&press(KeyCode::Enter), &mut input),
            Some(UserAction::Ok)
        );
        assert_eq!(input.take().as_bytes(), b"23");
    }

    #[test]
    fn ctrl_u_wipes_the_entry() {
        let mut input = SecretInput::default();
        for ch in "secret".chars() {
            handle_entry_key(&press(KeyCode::Char(ch)), &mut input);
        }
        assert_eq!(handle_entry_key(&ctrl('u'), &mut input), None);
        assert!(input.is_empty());
    }

    #[test]
    fn quality_estimate_rewards_length_and_variety() {
        assert_eq!(quality_estimate(&[]), 0);
        let plain: Vec<char> = "aaaa".chars().collect();
        let mixed: Vec<char> = "aA1!".chars().collect();
        assert!(quality_estimate(&plain) < quality_estimate(&mixed));
        // Length saturates at 16 chars; lowercase plus spaces is two classes.
        let long: Vec<char> = "correct horse battery staple".chars().collect();
        assert_eq!(quality_estimate(&long), 90);
        let varied: Vec<char> = "Correct Horse 42 Staple!".chars().collect();
        assert_eq!(quality_estimate(&varied), 100);
    }

    /// `Write` handle over a shared buffer, so the test keeps access to the
    /// ANSI stream after the backend takes ownership of the writer.
    #[derive(Clone, Default)]
    struct CapturedAnsi(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

    impl std::io::Write for CapturedAnsi {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn renders_secret_dialog_frame() {
        use ratatui::backend::CrosstermBackend;
        use ratatui::layout::Rect;
        use ratatui::{Terminal, TerminalOptions, Viewport};

        let view = build_view(&secret_fields());
        let mut input = SecretInput::default();
        for ch in "1234".chars() {
            input.insert_char(ch);
        }
        let captured = CapturedAnsi::default();
        let backend = CrosstermBackend::new(captured.clone());
        let mut terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Fixed(Rect::new(0, 0, 80, 24)),
            },
        )
        .expect("terminal");
        terminal
            .draw(|frame| super::draw_dialog(frame, &view, &input))
            .expect("draw");
        let mut parser = vt100::Parser::new(24, 80, 0);
        parser.process(&captured.0.borrow());
        let contents = parser.screen().contents();
        assert!(contents.contains("Unlock the token"), "{contents}");
        assert!(contents.contains("PIN: ****"), "{contents}");
        assert!(contents.contains("OK"), "{contents}");
        assert!(contents.contains("Cancel"), "{contents}");
    }
}
