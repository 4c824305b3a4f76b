use geocode_core::{
    GeocodeError, GeocodeQuery, GeocodingProvider, PeliasProvider, ReqwestHttpClient,
    ReverseQuery,
};
use mockito::Matcher;

const LANCASTER: &str = r#"{
    "geocoding": { "version": "0.2" },
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-2.798955, 54.048412] },
            "properties": {
                "housenumber": "11",
                "street": "Ffrances Passage",
                "postalcode": "LA1 1UG",
                "locality": "Lancaster",
                "county": "Lancashire",
                "macroregion": "England",
                "country": "United Kingdom",
                "country_a": "GBR"
            }
        },
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [-2.79899, 54.04845] },
            "properties": { "street": "Church Street", "locality": "Lancaster" }
        }
    ]
}"#;

fn provider(root: &str) -> PeliasProvider {
    PeliasProvider::new(ReqwestHttpClient::new(), root, "test_key".to_string())
        .expect("mock server URL is valid")
}

#[tokio::test]
async fn reverse_against_http_server() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/reverse")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("point.lat".into(), "54.0484068".into()),
            Matcher::UrlEncoded("point.lon".into(), "-2.7990345".into()),
            Matcher::UrlEncoded("api_key".into(), "test_key".into()),
            Matcher::UrlEncoded("size".into(), "5".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(LANCASTER)
        .create_async()
        .await;

    let provider = provider(&format!("{}/v1", server.url()));
    let query = ReverseQuery::from_coordinates(54.0484068, -2.7990345).unwrap();

    let results = provider.reverse(&query).await.expect("reverse must succeed");
    mock.assert_async().await;

    assert_eq!(results.len(), 2);
    let first = results.first().unwrap();
    assert_eq!(first.provided_by, "pelias");
    assert_eq!(first.street_number.as_deref(), Some("11"));
    assert_eq!(first.street_name.as_deref(), Some("Ffrances Passage"));
    assert_eq!(first.postal_code.as_deref(), Some("LA1 1UG"));
    assert_eq!(first.locality.as_deref(), Some("Lancaster"));
    assert_eq!(first.admin_levels.get(1).map(|l| l.name()), Some("England"));
    assert_eq!(first.admin_levels.get(3).map(|l| l.name()), Some("Lancashire"));
    assert_eq!(first.country.as_ref().and_then(|c| c.code.as_deref()), Some("GBR"));

    let second = results.get(1).unwrap();
    assert_eq!(second.street_name.as_deref(), Some("Church Street"));
    assert!(second.country.is_none());
}

#[tokio::test]
async fn search_sends_text_and_limit() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/search")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("text".into(), "Bray-et-Lû".into()),
            Matcher::UrlEncoded("size".into(), "1".into()),
            Matcher::UrlEncoded("lang".into(), "fr".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"type":"FeatureCollection","features":[]}"#)
        .create_async()
        .await;

    let provider = provider(&format!("{}/v1", server.url()));
    let query = GeocodeQuery::new("Bray-et-Lû").with_limit(1).with_locale("fr");

    let results = provider.geocode(&query).await.expect("search must succeed");
    mock.assert_async().await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn http_403_without_envelope_is_invalid_credentials() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/v1/search")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"error":"Access to this API has been disallowed"}"#)
        .create_async()
        .await;

    let provider = provider(&format!("{}/v1", server.url()));

    let err = provider.geocode(&GeocodeQuery::new("New York")).await.unwrap_err();
    assert!(matches!(err, GeocodeError::InvalidCredentials(_)));
}

#[tokio::test]
async fn connection_failure_is_a_transport_error() {
    // Nothing listens on the discard port.
    let provider = provider("http://127.0.0.1:9/v1");

    let err = provider.geocode(&GeocodeQuery::new("New York")).await.unwrap_err();
    assert!(matches!(err, GeocodeError::Transport(_)));
    assert!(!err.to_string().contains("test_key"));
}
