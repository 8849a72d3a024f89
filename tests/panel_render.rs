// tests/panel_render.rs
//
// End-to-end: keyword → orchestrator → panel view → HTML, plus the search
// session's stale-result guard.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fs_store, orchestrator, StubSource};
use icon_market::adapters::IconSource;
use icon_market::cache::ManualClock;
use icon_market::error::MarketError;
use icon_market::orchestrator::{SearchSession, SessionOutcome};
use icon_market::render::{HtmlPanel, PanelView, RenderTarget, SectionBody};
use icon_market::sources::{CAINIAO, ICONFONT};

#[tokio::test]
async fn cat_search_renders_both_sections() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        vec![
            Arc::new(StubSource::with_items(&ICONFONT, 5)) as Arc<dyn IconSource>,
            Arc::new(StubSource::with_items(&CAINIAO, 0)),
        ],
        fs_store(tmp.path()),
        Arc::new(ManualClock::new(0)),
    );

    let results = orch.search_enabled("cat").await;
    let i18n = orch.i18n();
    let view = PanelView::from_results(
        "cat",
        &results,
        &orch.enabled_sources(),
        &orch.settings(),
        &i18n,
    );

    assert_eq!(view.sections.len(), 2);
    assert_eq!(view.sections[0].source_id, "iconfont");
    match &view.sections[0].body {
        SectionBody::Items(items) => {
            assert_eq!(items.len(), 5);
            assert!(items.iter().all(|i| i.preview_svg.starts_with("<svg")));
        }
        other => panic!("expected items, got {other:?}"),
    }
    assert_eq!(view.sections[1].source_id, "cainiao");
    assert_eq!(
        view.sections[1].body,
        SectionBody::Empty("No results for \"cat\"".into())
    );

    let html = HtmlPanel.render(&view);
    assert_eq!(html.matches(r#"class="icon-market__item""#).count(), 5);
    assert_eq!(html.matches(r#"class="icon-market__source""#).count(), 2);
    assert!(html.contains(r#"data-source="cainiao""#));
    assert!(html.contains("icon-market__empty"));
}

#[tokio::test]
async fn failed_section_renders_localized_message() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        vec![
            Arc::new(StubSource::failing(
                &ICONFONT,
                MarketError::upstream("iconfont", "busy"),
            )) as Arc<dyn IconSource>,
            Arc::new(StubSource::with_items(&CAINIAO, 2)),
        ],
        fs_store(tmp.path()),
        Arc::new(ManualClock::new(0)),
    );
    let results = orch.search_enabled("cat").await;
    let view = PanelView::from_results(
        "cat",
        &results,
        &orch.enabled_sources(),
        &orch.settings(),
        &orch.i18n(),
    );
    assert_eq!(
        view.sections[0].body,
        SectionBody::Failed(format!("{} search failed: busy", ICONFONT.name))
    );
    assert_eq!(view.item_count(), 2);
}

#[tokio::test]
async fn newer_search_supersedes_older_one() {
    let tmp = tempfile::tempdir().unwrap();
    let source = Arc::new(StubSource::with_items(&ICONFONT, 1));
    let orch = Arc::new(orchestrator(
        vec![source.clone() as Arc<dyn IconSource>],
        fs_store(tmp.path()),
        Arc::new(ManualClock::new(0)),
    ));
    let session = Arc::new(SearchSession::new(Duration::from_millis(50)));

    let older = {
        let (orch, session) = (orch.clone(), session.clone());
        tokio::spawn(async move { session.search(&orch, "ca").await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let newer = session.search(&orch, "cat").await;

    assert!(matches!(older.await.unwrap(), SessionOutcome::Superseded));
    match newer {
        SessionOutcome::Ready(results) => assert_eq!(results["iconfont"].items.len(), 1),
        other => panic!("expected results, got {other:?}"),
    }
    assert_eq!(source.searches(), 1, "debounce coalesced the keystrokes");
    assert_eq!(session.current(), 2);
}

#[tokio::test]
async fn empty_keyword_clears_and_bumps_sequence() {
    let tmp = tempfile::tempdir().unwrap();
    let orch = orchestrator(
        vec![Arc::new(StubSource::with_items(&ICONFONT, 1)) as Arc<dyn IconSource>],
        fs_store(tmp.path()),
        Arc::new(ManualClock::new(0)),
    );
    let session = SearchSession::new(Duration::ZERO);
    assert!(matches!(session.search(&orch, "  ").await, SessionOutcome::Cleared));
    assert_eq!(session.current(), 1);
    assert!(matches!(session.search(&orch, "cat").await, SessionOutcome::Ready(_)));
}
