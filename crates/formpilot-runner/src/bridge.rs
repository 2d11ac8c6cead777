//! The channel between the control side and whatever owns the page.
//!
//! A host runs on its own task and handles one request at a time. Every
//! request carries a oneshot sender, so each gets at most one reply; a host
//! that goes away surfaces as [`Error::Communication`].

use async_trait::async_trait;
use formpilot_page::{
    AnalyzeResponse, Document, FieldMapping, FillResponse, MessageRouter, NavigationResult,
    PageRequest, PageResponse,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::{Error, Result};

/// Requests queued before the sender waits.
const CHANNEL_CAPACITY: usize = 8;

/// Anything that answers page requests.
#[async_trait]
pub trait PageHost: Send + 'static {
    async fn handle(&mut self, request: PageRequest) -> Result<PageResponse>;
}

struct Envelope {
    request: PageRequest,
    reply: oneshot::Sender<Result<PageResponse>>,
}

/// Control-side handle. Cheap to clone; the host task stops once every
/// clone is dropped.
#[derive(Clone)]
pub struct PageClient {
    tx: mpsc::Sender<Envelope>,
}

impl PageClient {
    /// Send one request and wait for its reply.
    pub async fn send(&self, request: PageRequest) -> Result<PageResponse> {
        let name = request.name();
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| Error::Communication(format!("page host is gone ({})", name)))?;

        match rx.await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(Error::Communication(msg))) => Err(Error::Communication(msg)),
            Ok(Err(e)) => Err(Error::Communication(format!("{} failed: {}", name, e))),
            Err(_) => Err(Error::Communication(format!(
                "page host dropped the {} reply",
                name
            ))),
        }
    }

    pub async fn analyze(&self) -> Result<AnalyzeResponse> {
        match self.send(PageRequest::Analyze).await? {
            PageResponse::Analyze(res) => Ok(res),
            other => Err(mismatch("analyze", &other)),
        }
    }

    pub async fn fill(&self, mappings: Vec<FieldMapping>) -> Result<FillResponse> {
        match self.send(PageRequest::Fill { mappings }).await? {
            PageResponse::Fill(res) => Ok(res),
            other => Err(mismatch("fill", &other)),
        }
    }

    pub async fn advance(&self) -> Result<NavigationResult> {
        match self.send(PageRequest::Advance).await? {
            PageResponse::Advance(res) => Ok(res),
            other => Err(mismatch("advance", &other)),
        }
    }
}

fn mismatch(expected: &str, got: &PageResponse) -> Error {
    Error::Communication(format!(
        "expected {} response, got {}",
        expected,
        got.name()
    ))
}

/// Run `host` on its own task. The task returns the host once the last
/// client is dropped.
pub fn spawn<H: PageHost>(mut host: H) -> (PageClient, JoinHandle<H>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(Envelope { request, reply }) = rx.recv().await {
            let result = host.handle(request).await;
            if reply.send(result).is_err() {
                debug!("bridge: requester went away before the reply");
            }
        }
        host
    });
    (PageClient { tx }, handle)
}

/// A single document answered through the [`MessageRouter`].
#[derive(Debug, Default)]
pub struct StaticPage {
    doc: Document,
    router: MessageRouter,
}

impl StaticPage {
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            router: MessageRouter,
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn into_document(self) -> Document {
        self.doc
    }
}

#[async_trait]
impl PageHost for StaticPage {
    async fn handle(&mut self, request: PageRequest) -> Result<PageResponse> {
        Ok(self.router.handle(&mut self.doc, request))
    }
}

/// A fixed sequence of pages. A successful advance moves to the next page;
/// on the last page the flow stays put.
#[derive(Debug)]
pub struct ScriptedFlow {
    pages: Vec<Document>,
    current: usize,
    router: MessageRouter,
}

impl ScriptedFlow {
    pub fn new(pages: Vec<Document>) -> Self {
        Self {
            pages,
            current: 0,
            router: MessageRouter,
        }
    }

    /// Parse each HTML string into a page.
    pub fn from_html<I, S>(pages: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pages = pages
            .into_iter()
            .map(|html| Document::parse_html(html.as_ref()))
            .collect::<formpilot_page::Result<Vec<_>>>()?;
        Ok(Self::new(pages))
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn pages(&self) -> &[Document] {
        &self.pages
    }
}

#[async_trait]
impl PageHost for ScriptedFlow {
    async fn handle(&mut self, request: PageRequest) -> Result<PageResponse> {
        let doc = self
            .pages
            .get_mut(self.current)
            .ok_or_else(|| Error::Communication("flow has no pages".into()))?;
        let advancing = matches!(request, PageRequest::Advance);
        let response = self.router.handle(doc, request);

        if advancing {
            if let PageResponse::Advance(ref nav) = response {
                if nav.success && self.current + 1 < self.pages.len() {
                    self.current += 1;
                    debug!("flow: now on page {}", self.current + 1);
                }
            }
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: &str = r#"<label for="email">Email</label><input id="email"><button>Next</button>"#;
    const LAST: &str = r#"<label for="why">Why?</label><textarea id="why"></textarea>"#;

    #[tokio::test]
    async fn test_static_page_round_trip() {
        let (client, handle) = spawn(StaticPage::new(Document::parse_html(STEP).unwrap()));

        let analyzed = client.analyze().await.unwrap();
        assert_eq!(analyzed.fields.len(), 1);

        let mapping = FieldMapping::fill("email", "email").with_value("jane@example.com");
        let filled = client.fill(vec![mapping]).await.unwrap();
        assert_eq!((filled.filled, filled.requested), (1, 1));

        drop(client);
        let page = handle.await.unwrap().into_document();
        let email = page.by_id("email").unwrap();
        assert_eq!(page.value(email), Some("jane@example.com"));
    }

    #[tokio::test]
    async fn test_scripted_flow_advances_until_last_page() {
        let flow = ScriptedFlow::from_html([STEP, LAST]).unwrap();
        let (client, handle) = spawn(flow);

        assert!(client.advance().await.unwrap().success);
        let analyzed = client.analyze().await.unwrap();
        assert_eq!(analyzed.fields[0].id, "why");
        assert!(!client.advance().await.unwrap().success);

        drop(client);
        assert_eq!(handle.await.unwrap().current(), 1);
    }

    struct Broken;

    #[async_trait]
    impl PageHost for Broken {
        async fn handle(&mut self, _request: PageRequest) -> Result<PageResponse> {
            Err(Error::Configuration("tab crashed".into()))
        }
    }

    #[tokio::test]
    async fn test_host_errors_become_communication_errors() {
        let (client, _handle) = spawn(Broken);
        match client.analyze().await {
            Err(Error::Communication(msg)) => assert!(msg.contains("tab crashed"), "{}", msg),
            other => panic!("unexpected result: {:?}", other.map(|r| r.fields.len())),
        }
    }

    struct WrongKind;

    #[async_trait]
    impl PageHost for WrongKind {
        async fn handle(&mut self, _request: PageRequest) -> Result<PageResponse> {
            Ok(PageResponse::Advance(NavigationResult {
                success: true,
                message: String::new(),
            }))
        }
    }

    #[tokio::test]
    async fn test_mismatched_reply_kind() {
        let (client, _handle) = spawn(WrongKind);
        assert!(matches!(client.analyze().await, Err(Error::Communication(_))));
    }

    #[tokio::test]
    async fn test_stopped_host() {
        let (client, handle) = spawn(StaticPage::default());
        handle.abort();
        let _ = handle.await;
        assert!(matches!(client.advance().await, Err(Error::Communication(_))));
    }
}
