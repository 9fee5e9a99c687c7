use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use hangar_installer::{ProgressEvent, ProgressSink, UpdateStage};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, no_color: bool) -> OutputStyle {
    if stdout_is_tty && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        match self.style {
            OutputStyle::Plain => println!("{}", render_status_line(self.style, status, message)),
            OutputStyle::Rich => println!(
                "{} {message}",
                colorize(badge_style(status), &status_badge(status))
            ),
        }
    }

    pub(crate) fn print_section(self, title: &str) {
        if self.style == OutputStyle::Rich {
            println!();
            println!("{}", colorize(section_style(), &format!("== {title} ==")));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_stages(self) -> StageProgress {
        let spinner = if self.style == OutputStyle::Rich {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}")
            {
                spinner.set_style(style.tick_chars(".:;* "));
            }
            spinner.enable_steady_tick(Duration::from_millis(80));
            Some(spinner)
        } else {
            None
        };
        StageProgress {
            style: self.style,
            spinner,
        }
    }
}

pub(crate) struct StageProgress {
    style: OutputStyle,
    spinner: Option<ProgressBar>,
}

impl StageProgress {
    pub(crate) fn finish(mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl ProgressSink for StageProgress {
    fn notify(&self, event: &ProgressEvent) {
        let line = render_stage_line(self.style, event);
        let Some(spinner) = &self.spinner else {
            println!("{line}");
            return;
        };
        if event.stage.is_terminal() || event.stage == UpdateStage::Failed {
            spinner.println(line);
        } else {
            spinner.set_message(line);
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

pub(crate) fn render_stage_line(style: OutputStyle, event: &ProgressEvent) -> String {
    match style {
        OutputStyle::Plain => format!("{}: {}", event.stage, event.message),
        OutputStyle::Rich => format!(
            "{} {}",
            colorize(stage_style(event.stage), &format!("{:<15}", event.stage.as_str())),
            event.message
        ),
    }
}

fn status_badge(status: &str) -> String {
    format!("[{}]", status.to_ascii_uppercase())
}

fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new()
        .fg_color(Some(color.into()))
        .effects(Effects::BOLD)
}

fn stage_style(stage: UpdateStage) -> Style {
    let color = match stage {
        UpdateStage::Done => AnsiColor::BrightGreen,
        UpdateStage::Failed | UpdateStage::RollbackFailed => AnsiColor::BrightRed,
        UpdateStage::RollingBack | UpdateStage::RolledBack => AnsiColor::BrightYellow,
        _ => AnsiColor::BrightCyan,
    };
    Style::new().fg_color(Some(color.into()))
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
