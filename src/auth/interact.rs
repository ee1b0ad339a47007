//! Capabilities used to direct the user: opening a URL and printing a prompt.

use std::io::{BufRead, Write};
use std::sync::Arc;

/// Sends the user to a URL. Fire-and-forget: failures are logged, not returned.
pub trait UrlOpener: Send + Sync {
    fn open(&self, url: &str);
}

/// Shows a message to the user, optionally blocking until they acknowledge it.
pub trait Prompter: Send + Sync {
    fn prompt(&self, message: &str, require_confirm: bool);
}

impl<F> UrlOpener for F
where
    F: Fn(&str) + Send + Sync,
{
    fn open(&self, url: &str) {
        self(url)
    }
}

impl<F> Prompter for F
where
    F: Fn(&str, bool) + Send + Sync,
{
    fn prompt(&self, message: &str, require_confirm: bool) {
        self(message, require_confirm)
    }
}

/// Opens URLs in the system browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserOpener;

impl UrlOpener for BrowserOpener {
    fn open(&self, url: &str) {
        if let Err(err) = webbrowser::open(url) {
            tracing::warn!(error = %err, url, "could not open browser");
        }
    }
}

/// Prints to stdout and reads a line from stdin when confirmation is needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPrompter;

impl Prompter for StdoutPrompter {
    fn prompt(&self, message: &str, require_confirm: bool) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{message}");
        if require_confirm {
            let _ = writeln!(stdout, "Press [Enter] to confirm");
            let _ = stdout.flush();
            drop(stdout);
            let mut line = String::new();
            let _ = std::io::stdin().lock().read_line(&mut line);
        }
    }
}

/// Asks the user to open the URL themselves instead of launching a browser.
#[derive(Clone)]
pub struct PromptOpener {
    prompter: Arc<dyn Prompter>,
}

impl PromptOpener {
    pub fn new(prompter: Arc<dyn Prompter>) -> Self {
        Self { prompter }
    }
}

impl UrlOpener for PromptOpener {
    fn open(&self, url: &str) {
        self.prompter.prompt(&format!("Please open URL: {url}"), false);
    }
}

pub(crate) fn default_opener() -> Arc<dyn UrlOpener> {
    Arc::new(BrowserOpener)
}

pub(crate) fn default_prompter() -> Arc<dyn Prompter> {
    Arc::new(StdoutPrompter)
}
