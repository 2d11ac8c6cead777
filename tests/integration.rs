//! Integration tests for the live page host
//!
//! These tests require Chrome to be installed and available.
//! Run with: cargo test --test integration -- --ignored

use formpilot::LivePage;
use formpilot_page::FieldMapping;
use formpilot_runner::{bridge, BrowserConfig, Error};

/// Check if Chrome is available
fn chrome_available() -> bool {
    eoka::stealth::patcher::find_chrome().is_ok()
}

fn headless() -> BrowserConfig {
    BrowserConfig {
        headless: true,
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_analyze_scopes_to_open_dialog() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let live = LivePage::launch(&headless()).await.expect("Failed to launch browser");
    live.goto(
        r#"data:text/html,
        <form><label for="q">Search</label><input id="q"></form>
        <div role="dialog" style="position: fixed; top: 0">
          <label for="first_name">First Name</label><input id="first_name">
          <button>Next</button>
        </div>
        <div class="modal" style="display: none"><input id="stale"></div>
    "#,
    )
    .await
    .expect("Failed to navigate");

    let (client, host) = bridge::spawn(live);
    let res = client.analyze().await.expect("Failed to analyze");
    let ids: Vec<_> = res.fields.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["first_name"]);
    assert_eq!(res.fields[0].label.as_deref(), Some("First Name"));

    drop(client);
    host.await.unwrap().close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_fill_replays_onto_live_page() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let live = LivePage::launch(&headless()).await.expect("Failed to launch browser");
    live.goto(
        r#"data:text/html,
        <input id="email" oninput="document.title = 'input:' + this.value">
        <select id="country"><option value="">--</option><option value="fr">France</option></select>
        <input type="checkbox" id="terms">
    "#,
    )
    .await
    .expect("Failed to navigate");

    let (client, host) = bridge::spawn(live);
    client.analyze().await.expect("Failed to analyze");
    let res = client
        .fill(vec![
            FieldMapping::fill("email", "email").with_value("jane@example.com"),
            FieldMapping::fill("country", "country").with_value("France"),
            FieldMapping::fill("terms", "consent").with_value("yes"),
        ])
        .await
        .expect("Failed to fill");
    assert_eq!((res.filled, res.requested), (3, 3));

    drop(client);
    let live = host.await.unwrap();
    let state: String = live
        .page()
        .evaluate(
            "JSON.stringify([document.getElementById('email').value, \
             document.getElementById('country').value, \
             document.getElementById('terms').checked, document.title])",
        )
        .await
        .expect("Failed to read state");
    assert_eq!(state, r#"["jane@example.com","fr",true,"input:jane@example.com"]"#);

    live.close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_advance_clicks_next() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let live = LivePage::launch(&headless()).await.expect("Failed to launch browser");
    live.set_body(r#"<button type="button" onclick="this.textContent = 'Done'">Continue</button>"#)
        .await
        .expect("Failed to set content");

    let (client, host) = bridge::spawn(live);
    let nav = client.advance().await.expect("Failed to advance");
    assert!(nav.success, "{}", nav.message);

    // The clicked button no longer says Continue.
    let nav = client.advance().await.expect("Failed to advance");
    assert!(!nav.success);

    drop(client);
    host.await.unwrap().close().await.expect("Failed to close browser");
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_close_with_keeps_the_run_error() {
    if !chrome_available() {
        eprintln!("Chrome not found, skipping test");
        return;
    }

    let live = LivePage::launch(&headless()).await.expect("Failed to launch browser");
    let (client, host) = bridge::spawn(live);
    drop(client);
    let live = host.await.unwrap();

    let result = live
        .close_with::<()>(Err(Error::Communication("page went away".into())))
        .await;
    match result {
        Err(Error::Communication(msg)) => assert_eq!(msg, "page went away"),
        other => panic!("unexpected result: {:?}", other),
    }

    let live = LivePage::launch(&headless()).await.expect("Failed to launch browser");
    let value = live.close_with(Ok(7)).await.expect("Failed to close browser");
    assert_eq!(value, 7);
}
