use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Resolves item names to icon image URLs for chat embeds.
pub struct IconClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IconSearchHit {
    id: u64,
}

impl IconClient {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// First search hit's raw icon URL. Any failure simply means no icon.
    pub async fn icon_url(&self, item_name: &str) -> Option<String> {
        let url = format!("{}/item", self.base_url);

        let response = match self.client.get(&url).query(&[("searchFor", item_name)]).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!("Icon search for {} returned {}", item_name, response.status());
                return None;
            }
            Err(e) => {
                debug!("Icon search for {} failed: {}", item_name, e);
                return None;
            }
        };

        let hits: Vec<IconSearchHit> = response.json().await.ok()?;
        hits.first()
            .map(|hit| format!("{}/item/{}/iconRaw", self.base_url, hit.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn first_hit_becomes_icon_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .and(query_param("searchFor", "Death's Scythe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1302106, "name": "Death's Scythe"},
                {"id": 1302107, "name": "Death's Scythe II"}
            ])))
            .mount(&server)
            .await;

        let icons = IconClient::new(server.uri());
        assert_eq!(
            icons.icon_url("Death's Scythe").await,
            Some(format!("{}/item/1302106/iconRaw", server.uri()))
        );
    }

    #[tokio::test]
    async fn no_hits_or_errors_mean_no_icon() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .and(query_param("searchFor", "Nothing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .and(query_param("searchFor", "Broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let icons = IconClient::new(server.uri());
        assert!(icons.icon_url("Nothing").await.is_none());
        assert!(icons.icon_url("Broken").await.is_none());
    }
}
