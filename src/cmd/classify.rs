use streamsift::embed::{classify, clean, player_token};

/// Print the host kind of each embed reference. Offline: redirector pages
/// are not followed.
pub fn cmd_classify(urls: &[String]) {
    for raw in urls {
        let url = clean(player_token(raw));
        println!("{}\t{url}", classify(&url));
    }
}
