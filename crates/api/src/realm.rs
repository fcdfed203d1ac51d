//! Realm resolution from request metadata.

use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{HeaderMap, Uri};

use realmgate_core::RealmName;

pub const REALM_HEADER: &str = "realm";
pub const REALM_QUERY_PARAM: &str = "realm";

/// Header `realm` first, then the `realm` query parameter.
///
/// Blank values count as absent. The name is not checked against the
/// registry here.
pub fn resolve(headers: &HeaderMap, uri: &Uri) -> Option<RealmName> {
    from_header(headers).or_else(|| from_query(uri))
}

fn from_header(headers: &HeaderMap) -> Option<RealmName> {
    headers
        .get(REALM_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(RealmName::parse)
}

fn from_query(uri: &Uri) -> Option<RealmName> {
    // An unparseable query string is treated as carrying no realm.
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params.get(REALM_QUERY_PARAM).and_then(|v| RealmName::parse(v))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn header_wins_over_query() {
        let mut headers = HeaderMap::new();
        headers.insert(REALM_HEADER, HeaderValue::from_static("tenantA"));
        let realm = resolve(&headers, &uri("/config?realm=tenantB")).unwrap();
        assert_eq!(realm.as_str(), "tenantA");
    }

    #[test]
    fn falls_back_to_query_parameter() {
        let realm = resolve(&HeaderMap::new(), &uri("/config?x=1&realm=tenant%20B")).unwrap();
        assert_eq!(realm.as_str(), "tenant B");
    }

    #[test]
    fn blank_header_falls_through_to_query() {
        let mut headers = HeaderMap::new();
        headers.insert(REALM_HEADER, HeaderValue::from_static("  "));
        let realm = resolve(&headers, &uri("/?realm=tenantB")).unwrap();
        assert_eq!(realm.as_str(), "tenantB");
    }

    #[test]
    fn absent_or_blank_is_none() {
        assert!(resolve(&HeaderMap::new(), &uri("/config")).is_none());
        assert!(resolve(&HeaderMap::new(), &uri("/config?realm=")).is_none());
        assert!(resolve(&HeaderMap::new(), &uri("/config?realm")).is_none());
    }

    proptest! {
        #[test]
        fn any_plain_realm_name_resolves_from_either_source(name in "[A-Za-z0-9_-]{1,32}") {
            let mut headers = HeaderMap::new();
            headers.insert(REALM_HEADER, HeaderValue::from_str(&name).unwrap());
            let via_header = resolve(&headers, &uri("/")).unwrap();
            prop_assert_eq!(via_header.as_str(), name.as_str());

            let via_query = resolve(&HeaderMap::new(), &uri(&format!("/?realm={name}"))).unwrap();
            prop_assert_eq!(via_query.as_str(), name.as_str());
        }
    }
}
