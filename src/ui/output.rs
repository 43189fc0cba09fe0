//! Status lines for the CLI commands
//!
//! Interactive terminals get cliclack's log gutter. Everything else gets
//! one line per event, led by a fixed-width mark so CI logs can be grepped
//! for `fail` or `warn`.

use super::context::UiContext;
use console::{style, StyledObject};

/// Leading mark of a plain-output line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mark {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Mark {
    pub(crate) fn styled(self) -> StyledObject<&'static str> {
        match self {
            Self::Ok => style("ok  ").green(),
            Self::Warn => style("warn").yellow(),
            Self::Fail => style("fail").red().bold(),
            Self::Info => style("info").cyan(),
        }
    }
}

fn plain(mark: Mark, message: &str) {
    println!("  {} {}", mark.styled(), message);
}

/// Command banner
pub fn intro(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::intro(style(title).cyan().bold()).ok();
    } else {
        println!("{}\n", style(title).cyan().bold());
    }
}

/// Closing line of a command that finished cleanly
pub fn outro_success(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).green().bold()).ok();
    } else {
        println!();
        println!("{} {}", Mark::Ok.styled(), message);
    }
}

/// Closing line of a command that finished with something to look at
pub fn outro_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::outro(style(message).yellow().bold()).ok();
    } else {
        println!();
        println!("{} {}", Mark::Warn.styled(), message);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        plain(Mark::Ok, message);
    }
}

/// Successful step followed by a dimmed detail such as a version or count
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} {}", message, style(detail).dim())).ok();
    } else {
        plain(Mark::Ok, &format!("{} [{}]", message, detail));
    }
}

/// Warning with the command the user should run next
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{}\n{}", message, style(hint).dim())).ok();
    } else {
        plain(Mark::Warn, &format!("{} (hint: {})", message, hint));
    }
}

pub fn step_error(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(message).ok();
    } else {
        plain(Mark::Fail, message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(message).ok();
    } else {
        plain(Mark::Info, message);
    }
}

/// Dimmed aside under the previous step
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("       {}", style(message).dim());
    }
}

/// One field of a state listing such as `status`
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    let key = format!("{}:", key);
    if ctx.use_fancy_output() {
        println!("  {:<18} {}", style(key).dim(), value);
    } else {
        println!("  {:<18} {}", key, value);
    }
}

/// Field whose value is either healthy or not, e.g. the brick flag
pub fn key_value_status(ctx: &UiContext, key: &str, value: &str, healthy: bool) {
    let mark = if healthy { Mark::Ok } else { Mark::Fail };
    if ctx.use_fancy_output() {
        let value = if healthy {
            style(value).green()
        } else {
            style(value).red().bold()
        };
        println!("  {:<18} {}", style(format!("{}:", key)).dim(), value);
    } else {
        plain(mark, &format!("{}: {}", key, value));
    }
}
