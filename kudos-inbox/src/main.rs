use std::sync::Arc;

use kudos_inbox::feed::FeedQuery;
use kudos_inbox::poller::PreviewFeed;
use kudos_inbox::timestamp;
use kudos_inbox::{HttpNotificationApi, InboxConfig, InboxView};
use kudos_shared::types::pagination::PageSpec;

fn print_previews(feed: &PreviewFeed) {
    if let Some(error) = &feed.error {
        println!("! {error}");
    }
    for row in &feed.rows {
        let marker = if row.unread_count > 0 { "*" } else { " " };
        println!("{marker} {:<24} {:>8}  {}", row.name, row.time_label, row.last_message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kudos_shared::telemetry::init_tracing("kudos-inbox");

    let config = InboxConfig::load()?;
    tracing::info!(api = %config.api_base_url, "starting inbox session");

    let api = Arc::new(HttpNotificationApi::new(&config)?);
    let mut view = InboxView::new(api, &config);
    view.activate().await;

    // optional search term from the command line
    let mut query = FeedQuery::default().page(PageSpec::new(0, config.page_size));
    if let Some(term) = std::env::args().nth(1) {
        query = query.search(term);
    }

    let page = view.feed(&query);
    println!("{} notification(s), page {}/{}", page.total, page.page, page.total_pages.max(1));
    for n in &page.items {
        let flag = if n.notification_is_read { " " } else { "*" };
        println!(
            "{flag} [{}] {}  {}",
            n.kind.code(),
            timestamp::describe(n.timestamp.as_ref()),
            n.content
        );
    }

    let Some(mut previews) = view.previews() else {
        view.deactivate().await;
        return Ok(());
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = previews.changed() => {
                if changed.is_err() {
                    break;
                }
                print_previews(&previews.borrow_and_update());
            }
        }
    }

    view.deactivate().await;
    Ok(())
}
