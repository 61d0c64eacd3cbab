use colored::{Color, Colorize};
use overture_core::{LogLevel, LogLine, ServiceUrl};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io::{self, Stdout, Write};
use std::time::Duration;

pub struct Logger<W: Write = Stdout> {
    output: W,
}

impl<W: Write> Logger<W> {
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    fn string_to_color(s: &str) -> Color {
        let colors = [
            Color::Green,
            Color::Blue,
            Color::Magenta,
            Color::Cyan,
            Color::BrightGreen,
            Color::BrightBlue,
            Color::BrightMagenta,
            Color::BrightCyan,
        ];

        let mut hasher = DefaultHasher::new();
        s.hash(&mut hasher);
        let hash = hasher.finish();

        let idx = usize::try_from(hash % colors.len() as u64).unwrap_or_default();
        colors[idx]
    }

    pub fn log(&mut self, line: &LogLine) {
        let prefix = format!("[{}]", line.service).color(Self::string_to_color(&line.service));
        let timestamp = line.timestamp.format("%H:%M:%S").to_string().dimmed();
        let text = match line.level {
            LogLevel::Info => line.text.normal(),
            LogLevel::Warn => line.text.yellow(),
        };
        let _ = writeln!(self.output, "{prefix} {timestamp} {text}");
    }

    pub fn system(&mut self, message: &str) {
        let prefix = "[overture]".bold();
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {line}");
        }
    }

    pub fn error(&mut self, message: &str) {
        let prefix = "[overture]".color(Color::Red).bold();
        for line in message.lines() {
            let _ = writeln!(self.output, "{prefix} {}", line.red());
        }
    }

    pub fn summary(&mut self, elapsed: Duration, services: &[ServiceUrl]) {
        self.system(&format!(
            "All services ready in {:.1}s",
            elapsed.as_secs_f64()
        ));
        for service in services {
            let name = service
                .name
                .color(Self::string_to_color(&service.name));
            let _ = writeln!(self.output, "    {name:<16} {}", service.url);
        }
        self.system("Press Ctrl+C to stop");
    }
}

impl Logger {
    pub fn default() -> Self {
        Self::new(io::stdout())
    }
}
