use siteflow_core::rewrite_uri;

pub fn handle(uris: &[String]) {
    for uri in uris {
        println!("{uri} -> {}", rewrite_uri(uri));
    }
}
