mod args;

use std::io;
use std::rc::Rc;

use log::info;
use serde_json::json;
use timeonsite::{Platform, RequestConfig, TimeOnSiteTracker, TrackerConfig};
use timeonsite_http::HttpTransport;
use timeonsite_platform::memory::{MemoryCookieJar, MemoryStore, ScriptedTransport, SimClock};
use timeonsite_platform::{PageEvent, PageInfo, Transport, Visibility};

/// Replays a scripted page visit against the tracking engine.
///
/// Without `--endpoint` the records print to stdout through the callback
/// path; with it, they queue durably and a simulated reload posts them to
/// the collector.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    let clock = Rc::new(SimClock::default_epoch());
    let transport: Rc<dyn Transport> = match &args.endpoint {
        Some(_) => Rc::new(HttpTransport::new()?),
        None => Rc::new(ScriptedTransport::always("success")),
    };
    let platform = Platform {
        volatile: Some(Rc::new(MemoryStore::new())),
        durable: Some(Rc::new(MemoryStore::new())),
        cookies: Rc::new(MemoryCookieJar::new(clock.clone())),
        clock: clock.clone(),
        transport,
    };

    let config = match &args.endpoint {
        Some(url) => TrackerConfig {
            track_by: args.track_by,
            request: Some(RequestConfig::new(url.clone())),
            ..TrackerConfig::default()
        },
        None => TrackerConfig {
            track_by: args.track_by,
            callback: Some(Box::new(|record| match serde_json::to_string_pretty(&record) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => eprintln!("could not render record: {err}"),
            })),
            ..TrackerConfig::default()
        },
    };

    let mut tracker = TimeOnSiteTracker::new(
        config,
        platform.clone(),
        PageInfo::new("https://example.com/home", "Home"),
    );
    info!("session key: {}", tracker.session_key());
    tracker.set_custom_data([("demo", json!(true))].into_iter().collect());

    // Five seconds reading, two in a background tab, three more back.
    clock.advance_ms(5000);
    tracker.handle_event(PageEvent::VisibilityChanged(Visibility::Hidden));
    clock.advance_ms(2000);
    tracker.handle_event(PageEvent::VisibilityChanged(Visibility::Visible));
    clock.advance_ms(3000);

    tracker.start_activity([("action", json!("watch-video"))].into_iter().collect());
    clock.advance_ms(4000);
    tracker.end_activity([("result", json!("finished"))].into_iter().collect(), false);

    tracker.handle_event(PageEvent::UrlChanged(PageInfo::new(
        "https://example.com/player",
        "Player",
    )));
    clock.advance_ms(2500);
    tracker.handle_event(PageEvent::BeforeUnload);

    if let Some(url) = &args.endpoint {
        // The next page load drains what the visit queued.
        let reloaded = TimeOnSiteTracker::new(
            TrackerConfig {
                track_by: args.track_by,
                request: Some(RequestConfig::new(url.clone())),
                ..TrackerConfig::default()
            },
            platform,
            PageInfo::new("https://example.com/home", "Home"),
        );
        if let Some(queue) = reloaded.queue() {
            println!("records still queued: {}", queue.pending_total()?);
        }
    }

    Ok(())
}
