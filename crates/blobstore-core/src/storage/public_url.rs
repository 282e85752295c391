//! Public URL construction shared by the backends.

/// Substitute `{placeholder}` markers in a configured base-URL template.
///
/// Values are inserted verbatim, without percent-encoding, and are never
/// scanned for further placeholders. Unknown placeholders are kept as written.
pub(crate) fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut url = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        url.push_str(&rest[..open]);
        let tail = &rest[open..];
        let value = tail.find('}').and_then(|close| {
            let name = &tail[1..close];
            values
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                url.push_str(value);
                rest = &tail[close + 1..];
            }
            None => {
                url.push('{');
                rest = &tail[1..];
            }
        }
    }

    url.push_str(rest);
    url
}

pub(crate) fn scheme(use_ssl: bool) -> &'static str {
    if use_ssl {
        "https"
    } else {
        "http"
    }
}

/// Strip any scheme and trailing slash from a configured endpoint.
pub(crate) fn endpoint_host(endpoint: &str) -> &str {
    let host = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .unwrap_or(endpoint);
    host.trim_end_matches('/')
}
