//! Live browser pages.
//!
//! Each request snapshots the page into a [`Document`], runs the router on
//! the snapshot, then replays the recorded mutations onto the real DOM.

use async_trait::async_trait;
use eoka::{Browser, Page};
use formpilot_page::{Document, MessageRouter, Mutation, PageRequest, PageResponse};
use formpilot_runner::{BrowserConfig, Error, PageHost, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Serializes `document.body` into the snapshot format. Every element is
/// stamped with `data-formpilot-node` so mutations can find it again.
const SNAPSHOT_JS: &str = r#"
(() => {
    const STAMP = 'data-formpilot-node';
    const SKIP = new Set(['SCRIPT', 'STYLE', 'NOSCRIPT', 'TEMPLATE', 'svg']);
    if (typeof window.__formpilotNext !== 'number') window.__formpilotNext = 1;

    function stamp(el) {
        let id = el.getAttribute(STAMP);
        if (!id) {
            id = String(window.__formpilotNext++);
            el.setAttribute(STAMP, id);
        }
        return Number(id);
    }

    function walk(el) {
        const attrs = {};
        for (const a of el.attributes) {
            if (a.name !== STAMP) attrs[a.name] = a.value;
        }
        const style = getComputedStyle(el);
        const node = {
            tag: el.tagName.toLowerCase(),
            node: stamp(el),
            attrs,
            children: [],
            style: {
                display: style.display,
                visibility: style.visibility,
                opacity: parseFloat(style.opacity),
                position: style.position,
                layout: el.getClientRects().length > 0,
            },
        };
        const tag = node.tag;
        if (tag === 'input' || tag === 'select' || tag === 'textarea') {
            node.value = el.value;
            node.checked = !!el.checked;
        }
        if (tag === 'option') {
            node.value = el.value;
            node.selected = el.selected;
        }
        for (const child of el.childNodes) {
            if (child.nodeType === Node.TEXT_NODE) {
                if (child.textContent.trim()) node.children.push({ text: child.textContent });
            } else if (child.nodeType === Node.ELEMENT_NODE && !SKIP.has(child.tagName)) {
                node.children.push(walk(child));
            }
        }
        return node;
    }

    return JSON.stringify(walk(document.body));
})()
"#;

/// Applies a list of [`ReplayOp`]s. Values go through the prototype's native
/// setter so framework-controlled inputs notice them.
const REPLAY_JS: &str = r#"
((ops) => {
    const find = (n) => document.querySelector('[data-formpilot-node="' + n + '"]');
    const nativeSetter = (el) => {
        const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype
            : el instanceof HTMLSelectElement ? HTMLSelectElement.prototype
            : HTMLInputElement.prototype;
        const desc = Object.getOwnPropertyDescriptor(proto, 'value');
        return desc && desc.set;
    };
    let applied = 0;
    for (const op of ops) {
        const el = find(op.node);
        if (!el) continue;
        switch (op.op) {
            case 'attribute':
                if (op.value === null) el.removeAttribute(op.name);
                else el.setAttribute(op.name, op.value);
                break;
            case 'value':
                el.value = op.value;
                break;
            case 'native_value': {
                const set = nativeSetter(el);
                if (set) set.call(el, op.value); else el.value = op.value;
                break;
            }
            case 'checked':
                el.checked = op.checked;
                break;
            case 'selected':
                el.selectedIndex = op.index;
                break;
            case 'event':
                if (op.event === 'click') el.click();
                else if (op.event === 'keydown' || op.event === 'keyup')
                    el.dispatchEvent(new KeyboardEvent(op.event, { bubbles: true }));
                else if (op.event === 'blur') {
                    el.dispatchEvent(new FocusEvent('blur'));
                    el.dispatchEvent(new FocusEvent('focusout', { bubbles: true }));
                } else el.dispatchEvent(new Event(op.event, { bubbles: true }));
                break;
        }
        applied++;
    }
    return applied;
})
"#;

/// One journal entry addressed by live node stamp.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
enum ReplayOp {
    Attribute {
        node: u64,
        name: String,
        value: Option<String>,
    },
    Value {
        node: u64,
        value: String,
    },
    NativeValue {
        node: u64,
        value: String,
    },
    Checked {
        node: u64,
        checked: bool,
    },
    Selected {
        node: u64,
        index: usize,
    },
    Event {
        node: u64,
        event: &'static str,
    },
}

/// Translate the journal. Mutations on nodes without a stamp are dropped.
fn replay_ops(doc: &Document, journal: Vec<Mutation>) -> Vec<ReplayOp> {
    journal
        .into_iter()
        .filter_map(|m| {
            let node = doc.live_id(m.node())?;
            Some(match m {
                Mutation::Attribute { name, value, .. } => ReplayOp::Attribute { node, name, value },
                Mutation::Value { value, .. } => ReplayOp::Value { node, value },
                Mutation::NativeValue { value, .. } => ReplayOp::NativeValue { node, value },
                Mutation::Checked { checked, .. } => ReplayOp::Checked { node, checked },
                Mutation::Selected { index, .. } => ReplayOp::Selected { node, index },
                Mutation::Event { kind, .. } => ReplayOp::Event {
                    node,
                    event: kind.as_str(),
                },
            })
        })
        .collect()
}

fn browser_error(e: eoka::Error) -> Error {
    Error::Communication(format!("browser: {}", e))
}

/// A Chromium tab answering page requests.
pub struct LivePage {
    browser: Browser,
    page: Page,
    router: MessageRouter,
}

impl LivePage {
    /// Launch a browser with `config` and open a blank tab.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth)
            .await
            .map_err(browser_error)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(browser_error)?;

        Ok(Self {
            browser,
            page,
            router: MessageRouter,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to: {}", url);
        self.page.goto(url).await.map_err(browser_error)
    }

    /// Replace the body markup. Used for local pages and tests.
    pub async fn set_body(&self, html: &str) -> Result<()> {
        let js = format!("document.body.innerHTML = {}", serde_json::to_string(html)?);
        self.page.execute(&js).await.map_err(browser_error)
    }

    /// Snapshot the current page into the DOM model.
    pub async fn snapshot(&self) -> Result<Document> {
        let json: String = self
            .page
            .evaluate(SNAPSHOT_JS)
            .await
            .map_err(browser_error)?;
        Ok(Document::from_snapshot_json(&json)?)
    }

    pub async fn close(self) -> Result<()> {
        self.browser.close().await.map_err(browser_error)
    }

    /// Close the browser, then hand back `result`. An earlier error wins over
    /// a failure to close.
    pub async fn close_with<T>(self, result: Result<T>) -> Result<T> {
        let closed = self.close().await;
        match result {
            Ok(value) => closed.map(|()| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!("Closing the browser failed too: {}", close_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl PageHost for LivePage {
    async fn handle(&mut self, request: PageRequest) -> Result<PageResponse> {
        let mut doc = self.snapshot().await?;
        let response = self.router.handle(&mut doc, request);

        let journal = doc.take_journal();
        let ops = replay_ops(&doc, journal);
        if !ops.is_empty() {
            let js = format!("{}({})", REPLAY_JS.trim(), serde_json::to_string(&ops)?);
            let applied: u64 = self.page.evaluate(&js).await.map_err(browser_error)?;
            debug!("live: replayed {}/{} mutations", applied, ops.len());
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formpilot_page::{EventKind, FieldMapping};

    const SNAPSHOT: &str = r#"{
        "tag": "body", "node": 1, "children": [
            {"tag": "label", "node": 2, "attrs": {"for": "email"}, "children": [{"text": "Email"}]},
            {"tag": "input", "node": 3, "attrs": {"id": "email", "type": "email"}, "value": ""},
            {"tag": "input", "attrs": {"id": "unstamped"}, "value": ""}
        ]
    }"#;

    #[test]
    fn test_replay_ops_use_live_ids() {
        let mut doc = Document::from_snapshot_json(SNAPSHOT).unwrap();
        let request = PageRequest::Fill {
            mappings: vec![
                FieldMapping::fill("email", "email").with_value("jane@x.com"),
                FieldMapping::fill("unstamped", "city").with_value("Lyon"),
            ],
        };
        MessageRouter.handle(&mut doc, request);

        let journal = doc.take_journal();
        let ops = replay_ops(&doc, journal);
        // The unstamped input was filled in the model but cannot be replayed.
        for op in &ops {
            assert_eq!(serde_json::to_value(op).unwrap()["node"], 3, "{:?}", op);
        }
        assert!(ops.contains(&ReplayOp::NativeValue {
            node: 3,
            value: "jane@x.com".into()
        }));
        assert!(ops.contains(&ReplayOp::Event {
            node: 3,
            event: EventKind::Blur.as_str()
        }));
    }

    #[test]
    fn test_replay_op_wire_shape() {
        let json = serde_json::to_value(ReplayOp::Attribute {
            node: 7,
            name: "data-formpilot-id".into(),
            value: None,
        })
        .unwrap();
        assert_eq!(json["op"], "attribute");
        assert_eq!(json["node"], 7);
        assert!(json["value"].is_null());

        let json = serde_json::to_value(ReplayOp::NativeValue {
            node: 1,
            value: "x".into(),
        })
        .unwrap();
        assert_eq!(json["op"], "native_value");
    }
}
