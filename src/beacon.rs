use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

// Visit counting against an oxitraffic style endpoint: register the visit,
// wait out the dwell time, then confirm so the visit is counted. Runs on a
// fire and forget thread; failures are logged and never surface.
pub fn spawn(base_url: String, page: String, dwell: Duration) {
    thread::spawn(move || {
        if let Err(e) = track_visit(&base_url, &page, dwell) {
            debug!("Visit tracking failed: {e}");
        }
    });
}

fn track_visit(base_url: &str, page: &str, dwell: Duration) -> Result<(), reqwest::Error> {
    let base = normalized(base_url);
    let client = reqwest::blocking::Client::new();

    let registration_id: u64 = client
        .get(format!("{base}/register"))
        .query(&[("path", page)])
        .send()?
        .json()?;
    trace!("Registered visit {registration_id} for {page}");

    thread::sleep(dwell);

    client
        .get(format!("{base}/post-sleep/{registration_id}"))
        .send()?;
    trace!("Visit {registration_id} counted");
    Ok(())
}

fn normalized(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}
