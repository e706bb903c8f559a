//! In-memory browser for tests and the built-in demo application.
//!
//! A `MockApp` is a set of pages made of flat `MockElement`s. `MockBrowser`
//! renders one page at a time with a real history stack, and understands a
//! small CSS subset: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=v]`,
//! `[attr^=v]` and comma-separated alternatives. Combinators are not supported
//! and match nothing.
//!
//! Misbehaviour can be scripted per element or page:
//! - `ClickEffect::Crash` white-screens the page until the next navigation
//! - `ClickEffect::Hang` makes the click time out
//! - `ClickEffect::Dialog` raises an alert
//! - `data-reflect` inputs echo script payloads back as an alert
//! - `MockPage::crash_on_reload` breaks the page when reloaded

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::backend::{BrowserDriver, BrowserFactory};
use super::types::{
    BrowserError, BrowserResult, ClickOptions, Dialog, DialogAction, DialogHandler, DialogKind,
    Locator, WaitUntil,
};

/// Origin used when a page is opened by bare path
const DEFAULT_ORIGIN: &str = "http://mock.local";

/// What happens when an element is clicked
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClickEffect {
    #[default]
    None,
    /// Follow a link to a path or absolute URL
    Navigate(String),
    /// Raise an alert with the given message
    Dialog(String),
    /// Tear down the page (root disappears)
    Crash,
    /// Never finish the click
    Hang,
}

/// A single element on a mock page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub visible: bool,
    pub value: String,
    pub on_click: ClickEffect,
}

impl MockElement {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            visible: true,
            value: String::new(),
            on_click: ClickEffect::None,
        }
    }

    /// `<a href=...>` that navigates when clicked
    pub fn link(href: &str) -> Self {
        Self::new("a")
            .attr("href", href)
            .on_click(ClickEffect::Navigate(href.to_string()))
    }

    /// `<button id=...>`
    pub fn button(id: &str) -> Self {
        Self::new("button").attr("id", id)
    }

    /// `<input type=...>`
    pub fn input(input_type: &str) -> Self {
        Self::new("input").attr("type", input_type)
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click = effect;
        self
    }

    fn is_editable(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
    }
}

/// A page of the mock application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockPage {
    pub path: String,
    pub elements: Vec<MockElement>,
    pub crash_on_reload: bool,
}

impl MockPage {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            elements: Vec::new(),
            crash_on_reload: false,
        }
    }

    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    pub fn crash_on_reload(mut self) -> Self {
        self.crash_on_reload = true;
        self
    }
}

/// The application under test, as seen by `MockBrowser`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockApp {
    pages: Vec<MockPage>,
}

impl MockApp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: MockPage) -> Self {
        self.pages.push(page);
        self
    }

    fn find(&self, path: &str) -> Option<&MockPage> {
        self.pages.iter().find(|p| p.path == path)
    }

    /// Small application with a landing page, a signup form and an about page.
    /// It survives every scenario of the standard suite.
    pub fn demo() -> Self {
        Self::new()
            .page(
                MockPage::new("/")
                    .element(MockElement::link("/about"))
                    .element(MockElement::link("/signup"))
                    .element(MockElement::link("https://example.com/docs"))
                    .element(MockElement::button("increment"))
                    .element(
                        MockElement::button("welcome")
                            .on_click(ClickEffect::Dialog("Welcome back!".into())),
                    )
                    .element(MockElement::button("slow").on_click(ClickEffect::Hang))
                    .element(MockElement::button("drawer-close").hidden()),
            )
            .page(
                MockPage::new("/about")
                    .element(MockElement::link("/"))
                    .element(MockElement::button("contact")),
            )
            .page(
                MockPage::new("/signup")
                    .element(MockElement::input("number").attr("name", "age"))
                    .element(MockElement::input("email").attr("data-reflect", "true"))
                    .element(MockElement::input("number").attr("name", "price"))
                    .element(MockElement::input("submit").value("Sign up"))
                    .element(MockElement::link("/")),
            )
    }
}

/// Counters shared between a factory and every browser it opened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockStats {
    pub sessions_opened: usize,
    pub sessions_closed: usize,
    pub navigations: Vec<String>,
    pub clicks: usize,
    pub fills: Vec<(String, String)>,
    pub dialogs: Vec<Dialog>,
    pub dialogs_dismissed: usize,
    pub dialogs_accepted: usize,
}

/// In-memory `BrowserDriver`
pub struct MockBrowser {
    app: MockApp,
    origin: String,
    history: Vec<String>,
    cursor: usize,
    dom: Vec<MockElement>,
    crashed: bool,
    pending_dialog: Option<Dialog>,
    dialog_handler: Option<DialogHandler>,
    stats: Arc<Mutex<MockStats>>,
    closed: bool,
}

impl MockBrowser {
    pub fn new(app: MockApp) -> Self {
        Self::with_stats(app, Arc::new(Mutex::new(MockStats::default())))
    }

    pub fn with_stats(app: MockApp, stats: Arc<Mutex<MockStats>>) -> Self {
        Self {
            app,
            origin: DEFAULT_ORIGIN.to_string(),
            history: Vec::new(),
            cursor: 0,
            dom: Vec::new(),
            crashed: false,
            pending_dialog: None,
            dialog_handler: None,
            stats,
            closed: false,
        }
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> MockStats {
        self.stats.lock().clone()
    }

    /// Whether the page is currently white-screened
    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    fn current_path(&self) -> Option<&str> {
        self.history.get(self.cursor).map(String::as_str)
    }

    fn guard(&self) -> BrowserResult<()> {
        if self.closed {
            return Err(BrowserError::Session("browser already closed".into()));
        }
        if let Some(dialog) = &self.pending_dialog {
            return Err(BrowserError::DialogBlocked(dialog.message.clone()));
        }
        Ok(())
    }

    /// Render the page at the history cursor from scratch
    fn load_current(&mut self) {
        let page = self.current_path().and_then(|path| self.app.find(path)).cloned();
        self.dom = page.map(|p| p.elements).unwrap_or_default();
        self.crashed = false;
        if let Some(path) = self.current_path() {
            let path = path.to_string();
            self.stats.lock().navigations.push(path);
        }
    }

    fn push_history(&mut self, target: &str) {
        let path = self.to_path(target);
        if !self.history.is_empty() {
            self.history.truncate(self.cursor + 1);
        }
        self.history.push(path);
        self.cursor = self.history.len() - 1;
        self.load_current();
    }

    /// Same-origin URLs become paths; anything else stays as-is
    fn to_path(&mut self, target: &str) -> String {
        match url::Url::parse(target) {
            Ok(parsed) => {
                let origin = parsed.origin().ascii_serialization();
                if self.history.is_empty() {
                    self.origin = origin.clone();
                }
                if origin == self.origin {
                    parsed.path().to_string()
                } else {
                    target.to_string()
                }
            }
            Err(_) => target.to_string(),
        }
    }

    fn raise_dialog(&mut self, dialog: Dialog) {
        self.stats.lock().dialogs.push(dialog.clone());
        match self.dialog_handler.as_mut() {
            Some(handler) => match (*handler)(&dialog) {
                DialogAction::Dismiss => self.stats.lock().dialogs_dismissed += 1,
                DialogAction::Accept => self.stats.lock().dialogs_accepted += 1,
            },
            None => self.pending_dialog = Some(dialog),
        }
    }

    /// Indices of matching elements; 0 is `<body>`, n is `dom[n - 1]`
    fn matches(&self, locator: &Locator) -> Vec<usize> {
        if self.crashed || self.history.is_empty() {
            return Vec::new();
        }
        let selectors = parse_selector_list(&locator.selector);
        let body = MockElement::new("body");
        std::iter::once(&body)
            .chain(self.dom.iter())
            .enumerate()
            .filter(|(_, el)| selectors.iter().any(|s| s.matches(el)))
            .map(|(i, _)| i)
            .collect()
    }

    fn resolve(&self, locator: &Locator) -> BrowserResult<usize> {
        self.matches(locator)
            .get(locator.index.unwrap_or(0))
            .copied()
            .ok_or_else(|| BrowserError::NotFound(locator.to_string()))
    }

    fn editable(&mut self, locator: &Locator) -> BrowserResult<&mut MockElement> {
        let index = self.resolve(locator)?;
        let element = index
            .checked_sub(1)
            .and_then(|i| self.dom.get_mut(i))
            .filter(|el| el.is_editable())
            .ok_or_else(|| BrowserError::Protocol(format!("{} is not an input", locator)))?;
        if !element.visible {
            return Err(BrowserError::Protocol(format!("{} is not visible", locator)));
        }
        Ok(element)
    }
}

impl BrowserDriver for MockBrowser {
    fn goto(&mut self, url: &str, _wait: WaitUntil, _timeout: Duration) -> BrowserResult<()> {
        self.guard()?;
        self.push_history(url);
        Ok(())
    }

    fn wait_for_load_state(&mut self, _wait: WaitUntil, _timeout: Duration) -> BrowserResult<()> {
        self.guard()
    }

    fn current_url(&mut self) -> BrowserResult<String> {
        self.guard()?;
        Ok(match self.current_path() {
            Some(path) if path.starts_with('/') => format!("{}{}", self.origin, path),
            Some(other) => other.to_string(),
            None => "about:blank".to_string(),
        })
    }

    fn count(&mut self, locator: &Locator) -> BrowserResult<usize> {
        self.guard()?;
        Ok(self.matches(locator).len())
    }

    fn is_visible(&mut self, locator: &Locator) -> BrowserResult<bool> {
        self.guard()?;
        Ok(match self.resolve(locator) {
            Ok(0) => true,
            Ok(i) => self.dom[i - 1].visible,
            Err(_) => false,
        })
    }

    fn fill(&mut self, locator: &Locator, text: &str) -> BrowserResult<()> {
        self.guard()?;
        let element = self.editable(locator)?;

        let numeric = element.attrs.get("type").is_some_and(|t| t == "number");
        let mut value = if numeric && text.trim().parse::<f64>().is_err() {
            String::new()
        } else {
            text.to_string()
        };
        if let Some(max) = element.attrs.get("maxlength").and_then(|m| m.parse::<usize>().ok()) {
            value = value.chars().take(max).collect();
        }
        element.value = value.clone();
        let reflects = element.attrs.contains_key("data-reflect");

        self.stats.lock().fills.push((locator.to_string(), value.clone()));
        if reflects {
            if let Some(message) = extract_alert(&value) {
                self.raise_dialog(Dialog {
                    kind: DialogKind::Alert,
                    message,
                });
            }
        }
        Ok(())
    }

    fn clear(&mut self, locator: &Locator) -> BrowserResult<()> {
        self.guard()?;
        self.editable(locator)?.value.clear();
        Ok(())
    }

    fn blur(&mut self, locator: &Locator) -> BrowserResult<()> {
        self.guard()?;
        self.resolve(locator).map(|_| ())
    }

    fn input_value(&mut self, locator: &Locator) -> BrowserResult<String> {
        self.guard()?;
        Ok(self.editable(locator)?.value.clone())
    }

    fn click(&mut self, locator: &Locator, options: ClickOptions) -> BrowserResult<()> {
        self.guard()?;
        let index = self.resolve(locator)?;
        let Some(element) = index.checked_sub(1).map(|i| self.dom[i].clone()) else {
            self.stats.lock().clicks += 1;
            return Ok(());
        };
        if !element.visible {
            return Err(BrowserError::Timeout(options.timeout));
        }
        self.stats.lock().clicks += 1;

        match element.on_click {
            ClickEffect::None => {}
            ClickEffect::Navigate(href) => self.push_history(&href),
            ClickEffect::Dialog(message) => self.raise_dialog(Dialog {
                kind: DialogKind::Alert,
                message,
            }),
            ClickEffect::Crash => self.crashed = true,
            ClickEffect::Hang => return Err(BrowserError::Timeout(options.timeout)),
        }
        Ok(())
    }

    fn go_back(&mut self) -> BrowserResult<()> {
        self.guard()?;
        if self.cursor > 0 {
            self.cursor -= 1;
            self.load_current();
        }
        Ok(())
    }

    fn go_forward(&mut self) -> BrowserResult<()> {
        self.guard()?;
        if self.cursor + 1 < self.history.len() {
            self.cursor += 1;
            self.load_current();
        }
        Ok(())
    }

    fn reload(&mut self) -> BrowserResult<()> {
        self.guard()?;
        if self.history.is_empty() {
            return Ok(());
        }
        self.load_current();
        let fragile = self
            .current_path()
            .and_then(|path| self.app.find(path))
            .is_some_and(|page| page.crash_on_reload);
        if fragile {
            self.crashed = true;
        }
        Ok(())
    }

    fn on_dialog(&mut self, handler: DialogHandler) {
        self.dialog_handler = Some(handler);
    }

    fn screenshot(&mut self) -> BrowserResult<Vec<u8>> {
        self.guard()?;
        // PNG signature only; enough for artifact plumbing
        Ok(vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'])
    }

    fn close(&mut self) -> BrowserResult<()> {
        if !self.closed {
            self.closed = true;
            self.stats.lock().sessions_closed += 1;
        }
        Ok(())
    }

    fn source_type(&self) -> &str {
        "mock"
    }
}

/// Hands out fresh `MockBrowser`s that share one set of counters
#[derive(Debug, Clone)]
pub struct MockBrowserFactory {
    app: MockApp,
    stats: Arc<Mutex<MockStats>>,
}

impl MockBrowserFactory {
    pub fn new(app: MockApp) -> Self {
        Self {
            app,
            stats: Arc::new(Mutex::new(MockStats::default())),
        }
    }

    pub fn stats(&self) -> MockStats {
        self.stats.lock().clone()
    }
}

impl BrowserFactory for MockBrowserFactory {
    fn open(&self) -> BrowserResult<Box<dyn BrowserDriver>> {
        self.stats.lock().sessions_opened += 1;
        Ok(Box::new(MockBrowser::with_stats(
            self.app.clone(),
            Arc::clone(&self.stats),
        )))
    }
}

/// Message of the first `alert(...)` inside a `<script>` payload
fn extract_alert(value: &str) -> Option<String> {
    let script = &value[value.find("<script>")?..];
    let start = script.find("alert(")? + "alert(".len();
    let end = start + script[start..].find(')')?;
    Some(
        script[start..end]
            .trim()
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string(),
    )
}

// ============================================================================
// Selector subset
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Prefix(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCond {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    conds: Vec<AttrCond>,
}

impl Compound {
    fn matches(&self, el: &MockElement) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&el.tag) {
                return false;
            }
        }
        self.conds.iter().all(|cond| {
            let actual = el.attrs.get(&cond.name);
            match &cond.op {
                AttrOp::Exists => actual.is_some(),
                AttrOp::Equals(v) => actual == Some(v),
                AttrOp::Prefix(v) => actual.is_some_and(|a| a.starts_with(v.as_str())),
                AttrOp::Word(v) => actual.is_some_and(|a| a.split_whitespace().any(|w| w == v)),
            }
        })
    }
}

fn parse_selector_list(selector: &str) -> Vec<Compound> {
    selector
        .split(',')
        .filter_map(|part| parse_compound(part.trim()))
        .collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn parse_compound(input: &str) -> Option<Compound> {
    if input.is_empty() {
        return None;
    }
    let mut compound = Compound::default();
    let mut rest = input;

    let tag_len = rest
        .find(|c: char| !(is_ident_char(c) || c == '*'))
        .unwrap_or(rest.len());
    if tag_len > 0 {
        compound.tag = Some(rest[..tag_len].to_ascii_lowercase());
        rest = &rest[tag_len..];
    }

    while let Some(c) = rest.chars().next() {
        match c {
            '#' | '.' => {
                let body = &rest[1..];
                let len = body.find(|c: char| !is_ident_char(c)).unwrap_or(body.len());
                if len == 0 {
                    return None;
                }
                let value = body[..len].to_string();
                compound.conds.push(if c == '#' {
                    AttrCond {
                        name: "id".into(),
                        op: AttrOp::Equals(value),
                    }
                } else {
                    AttrCond {
                        name: "class".into(),
                        op: AttrOp::Word(value),
                    }
                });
                rest = &body[len..];
            }
            '[' => {
                let close = rest.find(']')?;
                compound.conds.push(parse_attr(&rest[1..close])?);
                rest = &rest[close + 1..];
            }
            _ => return None,
        }
    }
    Some(compound)
}

fn parse_attr(inner: &str) -> Option<AttrCond> {
    let unquote = |v: &str| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
    if let Some((name, value)) = inner.split_once("^=") {
        return Some(AttrCond {
            name: name.trim().to_string(),
            op: AttrOp::Prefix(unquote(value)),
        });
    }
    if let Some((name, value)) = inner.split_once('=') {
        return Some(AttrCond {
            name: name.trim().to_string(),
            op: AttrOp::Equals(unquote(value)),
        });
    }
    let name = inner.trim();
    if name.is_empty() {
        return None;
    }
    Some(AttrCond {
        name: name.to_string(),
        op: AttrOp::Exists,
    })
}
