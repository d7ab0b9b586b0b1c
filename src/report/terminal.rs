//! Terminal rendering of the live status line and the final report.
//!
//! Everything goes to stderr so the wrapped command's stdout stays
//! byte-identical.

use console::Term;
use owo_colors::{OwoColorize, Style};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{StatusReporter, SupervisorEvent};
use crate::budget::{format_tokens, Ceiling, GuardOptions, UsageSnapshot, UsageStats};

const BOX_WIDTH: usize = 47;
const BAR_WIDTH: usize = 20;

/// Applies styles only when color output is enabled.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Palette matching the color support of stderr.
    pub fn for_stderr() -> Self {
        Self::new(console::colors_enabled_stderr())
    }

    /// Palette that never emits escape codes.
    pub fn plain() -> Self {
        Self::new(false)
    }

    fn paint(&self, text: impl Display, style: Style) -> String {
        if self.enabled {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Format a USD amount the way every report shows it.
pub fn format_cost(cost: f64) -> String {
    format!("${cost:.4}")
}

/// A `width`-cell progress bar, green below 80%, yellow below 90%, red above.
pub fn progress_bar(current: u64, max: u64, width: usize, palette: Palette) -> String {
    let fraction = if max == 0 {
        1.0
    } else {
        (current as f64 / max as f64).min(1.0)
    };
    let filled = (width as f64 * fraction).round() as usize;
    let empty = width - filled;

    let color = if fraction >= 0.9 {
        Style::new().red()
    } else if fraction >= 0.8 {
        Style::new().yellow()
    } else {
        Style::new().green()
    };

    format!(
        "{}{}",
        palette.paint("█".repeat(filled), color),
        palette.paint("░".repeat(empty), Style::new().dimmed())
    )
}

/// One-line live status.
pub fn render_status(snapshot: &UsageSnapshot, options: &GuardOptions, palette: Palette) -> String {
    if options.quiet {
        return String::new();
    }

    let mut status = format!(
        "{} {} tokens {} {} ",
        palette.paint("◆", Style::new().cyan()),
        palette.paint(format_tokens(snapshot.total_tokens), Style::new().bold()),
        palette.paint(
            format!(
                "(in:{} out:{})",
                format_tokens(snapshot.input_tokens),
                format_tokens(snapshot.output_tokens)
            ),
            Style::new().dimmed()
        ),
        palette.paint(format_cost(snapshot.estimated_cost), Style::new().green()),
    );

    if let Some(budget) = options.effective_budget() {
        let percent = snapshot.total_tokens as f64 * 100.0 / budget as f64;
        status.push_str(&threshold_badge(
            percent,
            options.warn_percent,
            "BUDGET EXCEEDED",
            "of budget",
            palette,
        ));
    }

    if let Some(limit) = options.effective_cost_limit() {
        let percent = snapshot.estimated_cost * 100.0 / limit;
        status.push_str(&threshold_badge(
            percent,
            options.warn_percent,
            "COST LIMIT EXCEEDED",
            "of cost limit",
            palette,
        ));
    }

    status
}

fn threshold_badge(
    percent: f64,
    warn_percent: f64,
    exceeded: &str,
    of_what: &str,
    palette: Palette,
) -> String {
    if percent >= 100.0 {
        palette.paint(format!(" {exceeded} "), Style::new().white().on_red())
    } else if percent >= warn_percent {
        palette.paint(format!("⚠ {percent:.0}% {of_what}"), Style::new().yellow())
    } else {
        String::new()
    }
}

/// Boxed summary with a budget progress bar.
pub fn render_box(snapshot: &UsageSnapshot, options: &GuardOptions, palette: Palette) -> String {
    let border = "─".repeat(BOX_WIDTH - 2);
    let dim = Style::new().dimmed();
    let edge = palette.paint("│", dim);
    let row = |content: String, visible: usize| {
        format!(
            "{edge}{content}{}{edge}",
            " ".repeat((BOX_WIDTH - 2).saturating_sub(visible))
        )
    };

    let mut lines = vec![palette.paint(format!("┌{border}┐"), dim)];

    let title = format!("token-guard v{}", env!("CARGO_PKG_VERSION"));
    lines.push(row(
        format!("  {}", palette.paint(&title, Style::new().bold().cyan())),
        title.chars().count() + 2,
    ));

    if let Some(budget) = options.effective_budget() {
        let text = format!(
            "  Budget: {} tokens | Warn: {}%",
            format_tokens(budget),
            options.warn_percent
        );
        let visible = text.chars().count();
        lines.push(row(text, visible));
    }

    lines.push(palette.paint(format!("├{border}┤"), dim));

    if let Some(budget) = options.effective_budget() {
        let counts = format!(
            "{} / {}",
            format_tokens(snapshot.total_tokens),
            format_tokens(budget)
        );
        let visible = 2 + BAR_WIDTH + 2 + counts.chars().count();
        lines.push(row(
            format!(
                "  {}  {counts}",
                progress_bar(snapshot.total_tokens, budget, BAR_WIDTH, palette)
            ),
            visible,
        ));
    }

    let breakdown = format!(
        "  Input: {} | Output: {}",
        format_tokens(snapshot.input_tokens),
        format_tokens(snapshot.output_tokens)
    );
    let visible = breakdown.chars().count();
    lines.push(row(breakdown, visible));

    let cost = format!(
        "  Est. Cost: {} ({})",
        format_cost(snapshot.estimated_cost),
        snapshot.model
    );
    let visible = cost.chars().count();
    lines.push(row(cost, visible));

    lines.push(palette.paint(format!("└{border}┘"), dim));
    lines.join("\n")
}

/// End-of-run report.
pub fn render_final_report(stats: &UsageStats, palette: Palette) -> String {
    let bold = Style::new().bold();
    let banner = Style::new().white().on_red();
    let duration = stats
        .duration()
        .map(|d| format!("{:.1}", d.num_milliseconds() as f64 / 1000.0))
        .unwrap_or_else(|| "?".to_string());

    let mut lines = vec![
        String::new(),
        palette.paint("═══ token-guard Report ═══", Style::new().bold().cyan()),
        String::new(),
        format!("{} {}", palette.paint("Command:", bold), stats.command),
        format!("{}   {}", palette.paint("Model:", bold), stats.model),
        format!("{} {duration}s", palette.paint("Duration:", bold)),
        String::new(),
        palette.paint("Tokens:", bold),
        format!("  Input:  {:>10}", format_tokens(stats.input_tokens)),
        format!("  Output: {:>10}", format_tokens(stats.output_tokens)),
        format!("  Total:  {:>10}", format_tokens(stats.total_tokens)),
        String::new(),
        format!(
            "{} {}",
            palette.paint("Estimated Cost:", bold),
            palette.paint(format_cost(stats.estimated_cost), Style::new().green())
        ),
    ];

    if stats.budget_exceeded {
        lines.push(String::new());
        lines.push(palette.paint(" BUDGET EXCEEDED - Process terminated ", banner));
    }

    if stats.cost_exceeded {
        lines.push(String::new());
        lines.push(palette.paint(" COST LIMIT EXCEEDED - Process terminated ", banner));
    }

    lines.push(String::new());
    lines.join("\n")
}

/// Print a warning-class message.
pub fn warn(message: &str, palette: Palette) {
    eprintln!(
        "{} {message}",
        palette.paint("⚠ token-guard:", Style::new().yellow())
    );
}

/// Print an error-class message.
pub fn error(message: &str, palette: Palette) {
    eprintln!(
        "{} {message}",
        palette.paint("✖ token-guard:", Style::new().red())
    );
}

/// Reporter that draws on the terminal's stderr.
pub struct TerminalReporter {
    options: GuardOptions,
    palette: Palette,
    term: Term,
    /// A status line is on screen and must be cleared before other output
    status_visible: AtomicBool,
}

impl TerminalReporter {
    pub fn new(options: &GuardOptions) -> Self {
        Self {
            options: options.clone(),
            palette: Palette::for_stderr(),
            term: Term::stderr(),
            status_visible: AtomicBool::new(false),
        }
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Remove the live status line, if one is showing.
    pub fn clear_status(&self) {
        if self.status_visible.swap(false, Ordering::SeqCst) {
            let _ = self.term.clear_line();
        }
    }

    /// Print the end-of-run report unless quiet.
    pub fn final_report(&self, stats: &UsageStats) {
        if self.options.quiet {
            return;
        }
        self.clear_status();
        eprintln!("{}", render_final_report(stats, self.palette));
    }

    pub fn warn(&self, message: &str) {
        self.clear_status();
        warn(message, self.palette);
    }

    pub fn error(&self, message: &str) {
        self.clear_status();
        error(message, self.palette);
    }
}

impl StatusReporter for TerminalReporter {
    fn status(&self, snapshot: &UsageSnapshot, options: &GuardOptions) {
        let line = render_status(snapshot, options, self.palette);
        if line.is_empty() {
            return;
        }
        let _ = self.term.clear_line();
        if self.term.write_str(&line).is_ok() {
            self.status_visible.store(true, Ordering::SeqCst);
        }
    }

    fn event(&self, event: &SupervisorEvent) {
        match event {
            SupervisorEvent::Started { model, .. } => {
                if !self.options.quiet && self.options.effective_budget().is_some() {
                    let empty = UsageSnapshot {
                        input_tokens: 0,
                        output_tokens: 0,
                        total_tokens: 0,
                        estimated_cost: 0.0,
                        model: model.clone(),
                    };
                    eprintln!("{}", render_box(&empty, &self.options, self.palette));
                }
            }
            SupervisorEvent::Warning { ceiling, percent } => {
                self.warn(&format!("{percent:.0}% of {ceiling} used"));
            }
            SupervisorEvent::CeilingReached { ceiling, .. } => {
                let reason = match ceiling {
                    Ceiling::Budget => "Token budget exceeded",
                    Ceiling::Cost => "Cost limit exceeded",
                };
                self.error(reason);
            }
            SupervisorEvent::LaunchFailed { message } => {
                self.error(message);
            }
            SupervisorEvent::Exited { .. } => self.clear_status(),
        }
    }
}
