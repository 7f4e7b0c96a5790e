//! Append-only text sink the guard reports its diagnostics to.
//!
//! The sink is purely observational: nothing written here feeds back into
//! the single-instance decision.

use std::io::{self, Write};

use anstyle::{AnsiColor, Color, Style};

/// How a line should stand out when the sink supports styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Success,
    Warning,
    Failure,
}

impl Tone {
    fn style(self) -> Style {
        let color = match self {
            Tone::Plain => return Style::new(),
            Tone::Success => AnsiColor::Green,
            Tone::Warning => AnsiColor::Yellow,
            Tone::Failure => AnsiColor::Red,
        };
        Style::new().fg_color(Some(Color::Ansi(color)))
    }
}

pub trait ReportSink {
    fn append_line(&mut self, line: &str);

    /// Styled variant; sinks without styling just append the text.
    fn append_styled(&mut self, _tone: Tone, line: &str) {
        self.append_line(line);
    }
}

impl ReportSink for Vec<String> {
    fn append_line(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

impl<S: ReportSink + ?Sized> ReportSink for &mut S {
    fn append_line(&mut self, line: &str) {
        (**self).append_line(line);
    }

    fn append_styled(&mut self, tone: Tone, line: &str) {
        (**self).append_styled(tone, line);
    }
}

/// Streams each line straight to a writer, flushing after every line so a
/// reader on the other end of a pipe sees the report as it is produced.
pub struct WriterSink<W: Write> {
    writer: W,
    color: bool,
    error: Option<io::Error>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W, color: bool) -> Self {
        Self {
            writer,
            color,
            error: None,
        }
    }

    /// Return the first write error encountered, if any.
    pub fn finish(mut self) -> io::Result<()> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush()
    }

    fn write_line(&mut self, style: Style, line: &str) {
        if self.error.is_some() {
            return;
        }
        let res = if self.color && style != Style::new() {
            writeln!(self.writer, "{style}{line}{style:#}")
        } else {
            writeln!(self.writer, "{line}")
        };
        if let Err(err) = res.and_then(|_| self.writer.flush()) {
            self.error = Some(err);
        }
    }
}

impl<W: Write> ReportSink for WriterSink<W> {
    fn append_line(&mut self, line: &str) {
        self.write_line(Style::new(), line);
    }

    fn append_styled(&mut self, tone: Tone, line: &str) {
        self.write_line(tone.style(), line);
    }
}

/// Decide at runtime whether color escapes should be emitted.  Honors the
/// de-facto standard `NO_COLOR` environment variable so users can globally
/// disable ANSI sequences.
pub fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}
