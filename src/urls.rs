use url::Url;

/// Joins an absolute `path` onto `base`, keeping the path prefix and query `base` already has.
pub fn absolute_url(path: &str, base: &Url) -> Url {
    let mut url = base.clone();
    url.set_path(&format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    ));
    url
}

/// Login endpoint of another auth plugin, told to send the caller back to `return_url`.
pub fn plugin_login_url(external_url: &Url, plugin_key: &str, return_url: &Url) -> Url {
    let mut url = absolute_url(&format!("/auth/login/plugin/{plugin_key}/"), external_url);
    url.query_pairs_mut()
        .append_pair("redirect", return_url.as_str());
    url
}

/// `<forum>/session/sso_login?<forum query>&<signed login>`
pub fn forum_login_url(discourse_base_url: &Url, signed_login: &str) -> Url {
    let mut url = discourse_base_url.clone();
    let segments = discourse_base_url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .chain(["session", "sso_login"])
        .collect::<Vec<_>>();
    url.set_path(&format!("/{}", segments.join("/")));
    let query = match discourse_base_url.query() {
        Some(query) if !query.is_empty() => format!("{query}&{signed_login}"),
        _ => signed_login.to_string(),
    };
    url.set_query(Some(&query));
    url
}
