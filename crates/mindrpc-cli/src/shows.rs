//! Recording listing helpers.

use serde_json::{Value, json};

/// Search for active recordings on the device, flattened, up to 1000 items.
pub fn my_shows_request() -> Value {
    json!({
        "type": "myShowsItemSearch",
        "bodyId": "-",
        "count": 1000,
        "offset": 0,
        "flatten": true,
        "deviceType": "webPlayer",
        "filter": {
            "type": "recordingFilter",
            "filterType": "recordings",
            "active": true,
        },
    })
}

/// Request for the device's own configuration, which carries its TSN.
pub fn body_config_request() -> Value {
    json!({ "type": "bodyConfigSearch" })
}

/// `title (episodeTitle)` for every item in a `myShowsItemSearch` response,
/// sorted by title. Items without a title are skipped.
pub fn show_titles(response: &Value) -> Vec<String> {
    let Some(items) = response.get("myShowsItem").and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut titles: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let title = item.get("title").and_then(Value::as_str)?;
            let episode = item
                .get("episodeTitle")
                .and_then(Value::as_str)
                .filter(|e| !e.is_empty());
            Some(match episode {
                Some(episode) => format!("{title} ({episode})"),
                None => title.to_owned(),
            })
        })
        .collect();
    titles.sort();
    titles
}

/// Device TSN from a `bodyConfigSearch` response, without the `tsn:` prefix.
pub fn tsn(response: &Value) -> Option<String> {
    let body_id = response
        .get("bodyConfig")?
        .get(0)?
        .get("bodyId")?
        .as_str()?;
    let stripped = match body_id.get(..4) {
        Some(prefix) if prefix.eq_ignore_ascii_case("tsn:") => &body_id[4..],
        _ => body_id,
    };
    Some(stripped.to_owned())
}
