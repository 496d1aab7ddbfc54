//! In-process messaging surface.
//!
//! Renders a small DOM from an inbox model on every query and applies
//! clicks and keystrokes back to the model. Queries serialize the rendered
//! tree to HTML and run the selector through `scraper`, so candidate lists
//! are matched by a real CSS engine.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::browser::selectors::{FEED_URL, HOME_URL, LOGIN_URL, MESSAGING_URL};
use crate::browser::{CookieRecord, Surface};
use crate::error::BrowserError;

/// Name of the cookie that carries an authenticated session.
pub const SESSION_COOKIE: &str = "li_at";

/// One conversation in the fake inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeConversation {
    /// Title as the platform renders it, suffix included.
    pub title: String,
    pub messages: Vec<String>,
    pub unread: bool,
    /// Unread state shown with a badge; otherwise only with a bold title.
    pub badge: bool,
    /// Native clicks on the list entry fail.
    pub click_fails: bool,
}

impl FakeConversation {
    pub fn unread(title: &str, messages: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            messages: messages.iter().map(|m| m.to_string()).collect(),
            unread: true,
            badge: true,
            click_fails: false,
        }
    }

    pub fn read(title: &str, messages: &[&str]) -> Self {
        Self {
            unread: false,
            ..Self::unread(title, messages)
        }
    }

    /// Unread, but signalled only by a bold title.
    pub fn bold_only(title: &str, messages: &[&str]) -> Self {
        Self {
            badge: false,
            ..Self::unread(title, messages)
        }
    }

    pub fn with_failing_click(mut self) -> Self {
        self.click_fails = true;
        self
    }
}

/// Account the fake login form accepts.
#[derive(Debug, Clone)]
pub struct FakeAccount {
    pub email: String,
    pub password: String,
    pub pin: Option<String>,
    pub token: String,
}

/// Which optional controls the conversation view renders, and how they behave.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub input: bool,
    pub send_button: bool,
    pub back_button: bool,
    /// The conversation list reappears after the back control. When false
    /// it stays hidden until the next navigation.
    pub list_after_back: bool,
    /// Keystrokes into the message input are rejected.
    pub typing_fails: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            input: true,
            send_button: true,
            back_button: true,
            list_after_back: true,
            typing_fails: false,
        }
    }
}

/// Attribute carrying each rendered element's pre-order index.
const NODE_INDEX_ATTR: &str = "data-node";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKey {
    Static,
    Conversation(usize),
    Input,
    SendButton,
    BackButton,
    SignIn,
    Username,
    Password,
    Pin,
    Submit,
}

/// Snapshot of one rendered element.
#[derive(Debug, Clone)]
pub struct MemoryNode {
    key: NodeKey,
    tag: &'static str,
    id: Option<&'static str>,
    classes: Vec<&'static str>,
    attrs: Vec<(&'static str, String)>,
    own_text: String,
    font_weight: u32,
    children: Vec<MemoryNode>,
}

impl MemoryNode {
    fn new(tag: &'static str, classes: &[&'static str]) -> Self {
        Self {
            key: NodeKey::Static,
            tag,
            id: None,
            classes: classes.to_vec(),
            attrs: Vec::new(),
            own_text: String::new(),
            font_weight: 400,
            children: Vec::new(),
        }
    }

    fn key(mut self, key: NodeKey) -> Self {
        self.key = key;
        self
    }

    fn id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    fn attr(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.attrs.push((name, value.into()));
        self
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.own_text = text.into();
        self
    }

    fn weight(mut self, weight: u32) -> Self {
        self.font_weight = weight;
        self
    }

    fn child(mut self, child: MemoryNode) -> Self {
        self.children.push(child);
        self
    }

    fn children(mut self, children: impl IntoIterator<Item = MemoryNode>) -> Self {
        self.children.extend(children);
        self
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        if name == "id" {
            return self.id;
        }
        if name == "class" {
            return None;
        }
        self.attrs.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    /// Pre-order walk, matching the indices written by [`Self::write_html`].
    fn flatten<'a>(&'a self, out: &mut Vec<&'a MemoryNode>) {
        out.push(self);
        for child in &self.children {
            child.flatten(out);
        }
    }

    fn inner_text(&self) -> String {
        let mut parts = Vec::new();
        if !self.own_text.is_empty() {
            parts.push(self.own_text.clone());
        }
        for child in &self.children {
            let text = child.inner_text();
            if !text.is_empty() {
                parts.push(text);
            }
        }
        parts.join("\n")
    }

    /// Serialize as HTML. With `index`, every element is stamped with its
    /// pre-order position so query results can be mapped back.
    fn write_html(&self, out: &mut String, mut index: Option<&mut usize>) {
        out.push('<');
        out.push_str(self.tag);
        if let Some(next) = index.as_deref_mut() {
            out.push_str(&format!(" {NODE_INDEX_ATTR}=\"{next}\""));
            *next += 1;
        }
        if let Some(id) = self.id {
            out.push_str(&format!(" id=\"{}\"", escape(id)));
        }
        if !self.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", self.classes.join(" ")));
        }
        for (name, value) in &self.attrs {
            out.push_str(&format!(" {name}=\"{}\"", escape(value)));
        }
        out.push('>');
        out.push_str(&escape(&self.own_text));
        for child in &self.children {
            child.write_html(out, index.as_deref_mut());
        }
        out.push_str(&format!("</{}>", self.tag));
    }
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Default)]
struct LoginState {
    account: Option<FakeAccount>,
    typed_email: String,
    typed_password: String,
    typed_pin: String,
    awaiting_pin: bool,
}

#[derive(Debug)]
struct State {
    url: String,
    inbox: Vec<FakeConversation>,
    open: Option<usize>,
    draft: String,
    /// (conversation title, body) per sent reply.
    sent: Vec<(String, String)>,
    enter_presses: usize,
    layout: Layout,
    authenticated: bool,
    login: LoginState,
    cookies: Vec<CookieRecord>,
    pending_nav_failures: usize,
    navigation_timeouts: Vec<Duration>,
    fail_screenshots: bool,
    list_hidden: bool,
}

/// In-memory [`Surface`].
#[derive(Debug)]
pub struct MemorySurface {
    state: Mutex<State>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySurface {
    /// Authenticated surface with an empty inbox, on `about:blank`.
    pub fn new() -> Self {
        Self::with_inbox(Vec::new())
    }

    pub fn with_inbox(inbox: Vec<FakeConversation>) -> Self {
        Self {
            state: Mutex::new(State {
                url: "about:blank".to_string(),
                inbox,
                open: None,
                draft: String::new(),
                sent: Vec::new(),
                enter_presses: 0,
                layout: Layout::default(),
                authenticated: true,
                login: LoginState::default(),
                cookies: Vec::new(),
                pending_nav_failures: 0,
                navigation_timeouts: Vec::new(),
                fail_screenshots: false,
                list_hidden: false,
            }),
        }
    }

    /// Unauthenticated surface that accepts `account` at the login form or
    /// a session cookie carrying `account.token`.
    pub fn requiring_login(account: FakeAccount) -> Self {
        let surface = Self::new();
        {
            let mut state = surface.state();
            state.authenticated = false;
            state.login.account = Some(account);
        }
        surface
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_layout(&self, layout: Layout) {
        self.state().layout = layout;
    }

    /// The next `count` navigations time out.
    pub fn fail_next_navigations(&self, count: usize) {
        self.state().pending_nav_failures = count;
    }

    pub fn fail_screenshots(&self) {
        self.state().fail_screenshots = true;
    }

    /// Timeout passed to every `goto`, in call order.
    pub fn navigation_timeouts(&self) -> Vec<Duration> {
        self.state().navigation_timeouts.clone()
    }

    /// Sent replies as (conversation title, body).
    pub fn sent(&self) -> Vec<(String, String)> {
        self.state().sent.clone()
    }

    pub fn enter_presses(&self) -> usize {
        self.state().enter_presses
    }

    pub fn unread_count(&self) -> usize {
        self.state().inbox.iter().filter(|c| c.unread).count()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().authenticated
    }

    /// Drop the authenticated session, as when the platform revokes it.
    /// The saved cookie stops being accepted too.
    pub fn expire_session(&self) {
        let mut state = self.state();
        state.authenticated = false;
        state.cookies.clear();
        state.open = None;
        if let Some(account) = state.login.account.as_mut() {
            account.token = format!("{}-revoked", account.token);
        }
    }

    /// Index of the open conversation, if any.
    pub fn open_conversation(&self) -> Option<usize> {
        self.state().open
    }

    /// Add a conversation to the inbox, as if it had just arrived.
    pub fn deliver(&self, conversation: FakeConversation) {
        self.state().inbox.insert(0, conversation);
    }

    fn render(state: &State) -> Vec<MemoryNode> {
        if !state.authenticated {
            return Self::render_logged_out(state);
        }

        let mut roots = vec![MemoryNode::new("div", &["global-nav"])];
        if !state.url.starts_with(MESSAGING_URL) {
            return roots;
        }

        let items = state.inbox.iter().enumerate().map(|(i, conv)| {
            let bold = conv.unread && !conv.badge;
            let mut item = MemoryNode::new("li", &["msg-conversation-listitem"])
                .key(NodeKey::Conversation(i))
                .child(
                    MemoryNode::new("a", &["msg-conversation-listitem__link"])
                        .attr("href", conversation_href(i)),
                )
                .child(
                    MemoryNode::new("h3", &["msg-conversation-listitem__participant-names"])
                        .text(conv.title.clone())
                        .weight(if bold { 700 } else { 400 }),
                )
                .child(
                    MemoryNode::new("p", &["msg-conversation-card__message-snippet"])
                        .text(conv.messages.last().cloned().unwrap_or_default()),
                );
            if conv.unread && conv.badge {
                item = item.child(MemoryNode::new("span", &["msg-conversation-card__unread-count"]).text("1"));
            }
            item
        });
        if !state.list_hidden {
            roots.push(
                MemoryNode::new("div", &["msg-conversations-container"]).child(
                    MemoryNode::new("ul", &["msg-conversations-container__conversations-list"]).children(items),
                ),
            );
        }

        if let Some(open) = state.open {
            let conv = &state.inbox[open];
            roots.push(
                MemoryNode::new("div", &["msg-s-message-list-container"])
                    .child(MemoryNode::new("h2", &["msg-entity-lockup__entity-title"]).text(conv.title.clone()))
                    .child(MemoryNode::new("ul", &["msg-s-message-list"]).children(
                        conv.messages
                            .iter()
                            .map(|m| MemoryNode::new("p", &["msg-s-event-listitem__body"]).text(m.clone())),
                    )),
            );
            let mut form = MemoryNode::new("form", &["msg-form"]);
            if state.layout.input {
                form = form.child(
                    MemoryNode::new("div", &["msg-form__contenteditable"])
                        .key(NodeKey::Input)
                        .attr("contenteditable", "true")
                        .attr("role", "textbox")
                        .attr("aria-label", "Write a message…")
                        .text(state.draft.clone()),
                );
            }
            if state.layout.send_button {
                form = form.child(
                    MemoryNode::new("button", &["msg-form__send-button"])
                        .key(NodeKey::SendButton)
                        .attr("type", "submit")
                        .text("Send"),
                );
            }
            roots.push(form);
            if state.layout.back_button {
                roots.push(
                    MemoryNode::new("button", &["msg-overlay-bubble-header__back-button"])
                        .key(NodeKey::BackButton)
                        .text("Back"),
                );
            }
        }
        roots
    }

    fn render_logged_out(state: &State) -> Vec<MemoryNode> {
        if state.url == HOME_URL {
            return vec![
                MemoryNode::new("a", &["nav__button-secondary"])
                    .key(NodeKey::SignIn)
                    .text("Sign in"),
            ];
        }
        if state.url != LOGIN_URL {
            return Vec::new();
        }

        let mut form = MemoryNode::new("form", &["login__form"]);
        if state.login.awaiting_pin {
            form = form.child(
                MemoryNode::new("input", &[])
                    .key(NodeKey::Pin)
                    .id("input__email_verification_pin")
                    .text(state.login.typed_pin.clone()),
            );
        } else {
            form = form
                .child(
                    MemoryNode::new("input", &[])
                        .key(NodeKey::Username)
                        .id("username")
                        .text(state.login.typed_email.clone()),
                )
                .child(
                    MemoryNode::new("input", &[])
                        .key(NodeKey::Password)
                        .id("password")
                        .attr("type", "password"),
                );
        }
        form = form.child(
            MemoryNode::new("button", &[])
                .key(NodeKey::Submit)
                .attr("type", "submit")
                .text("Sign in"),
        );
        vec![form]
    }

    fn activate(&self, node: &MemoryNode, native: bool) -> Result<(), BrowserError> {
        let mut state = self.state();
        match node.key {
            NodeKey::Conversation(i) => {
                if native && state.inbox.get(i).is_some_and(|c| c.click_fails) {
                    return Err(BrowserError::Protocol("element is not clickable at point".into()));
                }
                if let Some(conv) = state.inbox.get_mut(i) {
                    conv.unread = false;
                    state.open = Some(i);
                    state.draft.clear();
                }
            }
            NodeKey::SendButton => Self::send_draft(&mut state),
            NodeKey::BackButton => {
                state.open = None;
                state.list_hidden = !state.layout.list_after_back;
            }
            NodeKey::SignIn => state.url = LOGIN_URL.to_string(),
            NodeKey::Submit => Self::submit_login(&mut state),
            NodeKey::Static | NodeKey::Input | NodeKey::Username | NodeKey::Password | NodeKey::Pin => {}
        }
        Ok(())
    }

    fn send_draft(state: &mut State) {
        if let Some(title) = state.open.and_then(|i| state.inbox.get(i)).map(|c| c.title.clone())
            && !state.draft.is_empty()
        {
            let body = std::mem::take(&mut state.draft);
            state.sent.push((title, body));
        }
    }

    fn submit_login(state: &mut State) {
        let Some(account) = state.login.account.clone() else {
            return;
        };
        if state.login.awaiting_pin {
            if Some(&state.login.typed_pin) == account.pin.as_ref() {
                Self::authenticate(state, &account);
            }
            return;
        }
        if state.login.typed_email == account.email && state.login.typed_password == account.password {
            if account.pin.is_some() {
                state.login.awaiting_pin = true;
            } else {
                Self::authenticate(state, &account);
            }
        }
    }

    fn authenticate(state: &mut State, account: &FakeAccount) {
        state.authenticated = true;
        state.login.awaiting_pin = false;
        state.url = FEED_URL.to_string();
        state.cookies = vec![CookieRecord {
            name: SESSION_COOKIE.to_string(),
            value: account.token.clone(),
            domain: ".linkedin.com".to_string(),
            path: "/".to_string(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: Some("None".to_string()),
        }];
    }
}

#[async_trait]
impl Surface for MemorySurface {
    type Node = MemoryNode;

    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state();
        state.navigation_timeouts.push(timeout);
        if state.pending_nav_failures > 0 {
            state.pending_nav_failures -= 1;
            return Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            });
        }
        state.url = url.to_string();
        state.open = None;
        state.list_hidden = false;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.state().url.clone())
    }

    async fn query_all(
        &self,
        scope: Option<&MemoryNode>,
        selector: &str,
    ) -> Result<Vec<MemoryNode>, BrowserError> {
        let parsed = Selector::parse(selector)
            .map_err(|e| BrowserError::Protocol(format!("invalid selector {selector:?}: {e}")))?;
        let roots = match scope {
            Some(node) => vec![node.clone()],
            None => Self::render(&self.state()),
        };

        let mut html = String::new();
        let mut next = 0;
        let mut nodes = Vec::new();
        for root in &roots {
            root.write_html(&mut html, Some(&mut next));
            root.flatten(&mut nodes);
        }

        // A scoped query only sees descendants of the scope element.
        let skip = scope.map(|_| 0);
        let document = Html::parse_fragment(&html);
        let found = document
            .select(&parsed)
            .filter_map(|element| element.value().attr(NODE_INDEX_ATTR)?.parse::<usize>().ok())
            .filter(|index| Some(*index) != skip)
            .filter_map(|index| nodes.get(index).map(|node| (*node).clone()))
            .collect();
        Ok(found)
    }

    async fn text(&self, node: &MemoryNode) -> Result<String, BrowserError> {
        Ok(node.inner_text())
    }

    async fn attribute(&self, node: &MemoryNode, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(node.attribute(name).map(str::to_string))
    }

    async fn font_weight(&self, node: &MemoryNode) -> Result<u32, BrowserError> {
        Ok(node.font_weight)
    }

    async fn scroll_into_view(&self, _node: &MemoryNode) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click(&self, node: &MemoryNode) -> Result<(), BrowserError> {
        self.activate(node, true)
    }

    async fn script_click(&self, node: &MemoryNode) -> Result<(), BrowserError> {
        self.activate(node, false)
    }

    async fn clear(&self, node: &MemoryNode) -> Result<(), BrowserError> {
        let mut state = self.state();
        match node.key {
            NodeKey::Input => state.draft.clear(),
            NodeKey::Username => state.login.typed_email.clear(),
            NodeKey::Password => state.login.typed_password.clear(),
            NodeKey::Pin => state.login.typed_pin.clear(),
            _ => {}
        }
        Ok(())
    }

    async fn type_text(&self, node: &MemoryNode, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state();
        match node.key {
            NodeKey::Input if state.layout.typing_fails => {
                return Err(BrowserError::Protocol("keystrokes were not delivered".into()));
            }
            NodeKey::Input => state.draft.push_str(text),
            NodeKey::Username => state.login.typed_email.push_str(text),
            NodeKey::Password => state.login.typed_password.push_str(text),
            NodeKey::Pin => state.login.typed_pin.push_str(text),
            _ => {
                return Err(BrowserError::Protocol("element is not editable".into()));
            }
        }
        Ok(())
    }

    async fn set_text_content(&self, node: &MemoryNode, text: &str) -> Result<(), BrowserError> {
        let mut state = self.state();
        match node.key {
            NodeKey::Input => state.draft = text.to_string(),
            _ => {
                return Err(BrowserError::Protocol("element is not editable".into()));
            }
        }
        Ok(())
    }

    async fn press_enter(&self, node: &MemoryNode) -> Result<(), BrowserError> {
        let mut state = self.state();
        state.enter_presses += 1;
        match node.key {
            NodeKey::Input => Self::send_draft(&mut state),
            NodeKey::Username | NodeKey::Password | NodeKey::Pin => Self::submit_login(&mut state),
            _ => {}
        }
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        if self.state().fail_screenshots {
            return Err(BrowserError::Protocol("capture failed".into()));
        }
        tokio::fs::write(path, b"\x89PNG\r\n").await?;
        Ok(())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        let state = self.state();
        let mut html = String::from("<html><body>");
        for root in Self::render(&state) {
            root.write_html(&mut html, None);
        }
        html.push_str("</body></html>");
        Ok(html)
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>, BrowserError> {
        Ok(self.state().cookies.clone())
    }

    async fn set_cookies(&self, cookies: &[CookieRecord]) -> Result<(), BrowserError> {
        let mut state = self.state();
        let valid = state.login.account.as_ref().is_some_and(|account| {
            cookies
                .iter()
                .any(|c| c.name == SESSION_COOKIE && c.value == account.token)
        });
        if valid {
            state.authenticated = true;
        }
        state.cookies = cookies.to_vec();
        Ok(())
    }
}

fn conversation_href(index: usize) -> String {
    format!("/messaging/thread/2-fake{index}/")
}

/// Ready-made inboxes.
pub mod fixtures {
    use super::FakeConversation;

    pub use crate::browser::selectors::MESSAGING_URL;

    /// Unread (badge), read, unread (bold title only).
    pub fn inbox() -> Vec<FakeConversation> {
        vec![
            FakeConversation::unread(
                "Jane Recruiter (2nd)",
                &["We have an exciting DevOps Engineer opportunity with Kubernetes and AWS, salary negotiable"],
            ),
            FakeConversation::read("Old Friend (1st)", &["Thanks for the coffee last week!"]),
            FakeConversation::bold_only(
                "Klaus Personal",
                &["Hallo, wir suchen einen Entwickler für unser Team, Gehalt verhandelbar"],
            ),
        ]
    }
}
