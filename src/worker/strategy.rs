use reqwest::{Method, Url};

use super::{config::CacheConfig, http::Request};

const AUDIO_EXTENSIONS: [&str; 5] = [".mp3", ".ogg", ".wav", ".m4a", ".flac"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not ours to handle: cross-origin or non-GET.
    Passthrough,
    CacheFirst,
    StaleWhileRevalidate,
    NetworkFirst,
}

pub fn is_audio_path(path: &str, config: &CacheConfig) -> bool {
    let lower = path.to_ascii_lowercase();
    config.audio_assets.iter().any(|p| p == path)
        || lower.starts_with("/sounds/")
        || AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

pub fn is_shell_path(path: &str, config: &CacheConfig) -> bool {
    config.shell_assets.iter().any(|p| p == path)
}

pub fn classify(request: &Request, origin: &Url, config: &CacheConfig) -> Strategy {
    if request.method != Method::GET || request.url.origin() != origin.origin() {
        return Strategy::Passthrough;
    }

    let path = request.url.path();
    if is_audio_path(path, config) {
        Strategy::CacheFirst
    } else if request.is_navigation() || is_shell_path(path, config) {
        Strategy::StaleWhileRevalidate
    } else {
        Strategy::NetworkFirst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://focus.example").unwrap()
    }

    fn get(path: &str) -> Request {
        Request::get(origin().join(path).unwrap())
    }

    #[test]
    fn routes_by_resource_class() {
        let config = CacheConfig::default();
        let origin = origin();

        assert_eq!(classify(&get("/sounds/rain.mp3"), &origin, &config), Strategy::CacheFirst);
        assert_eq!(classify(&get("/extra/bell.OGG"), &origin, &config), Strategy::CacheFirst);
        assert_eq!(
            classify(&get("/styles.css"), &origin, &config),
            Strategy::StaleWhileRevalidate
        );
        assert_eq!(
            classify(&get("/icons/icon-192.png"), &origin, &config),
            Strategy::NetworkFirst
        );

        let nav = Request::navigate(origin.join("/settings").unwrap());
        assert_eq!(classify(&nav, &origin, &config), Strategy::StaleWhileRevalidate);
    }

    #[test]
    fn foreign_and_non_get_pass_through() {
        let config = CacheConfig::default();
        let origin = origin();

        let foreign = Request::get(Url::parse("https://cdn.example/app.js").unwrap());
        assert_eq!(classify(&foreign, &origin, &config), Strategy::Passthrough);

        let post = get("/app.js").with_method(Method::POST);
        assert_eq!(classify(&post, &origin, &config), Strategy::Passthrough);
    }
}
