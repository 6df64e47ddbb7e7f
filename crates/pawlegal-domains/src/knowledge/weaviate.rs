use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

/// Collections in the knowledge base, each with the text property returned
/// to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeCollection {
    /// Laws, articles and other written content.
    Content,
    /// Protests and other events.
    Event,
    /// Animal welfare organizations, agribusinesses, etc.
    Entities,
}

impl KnowledgeCollection {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Content => "Content",
            Self::Event => "Event",
            Self::Entities => "Entities",
        }
    }

    pub fn text_property(&self) -> &'static str {
        match self {
            Self::Content => "main_text",
            Self::Event | Self::Entities => "description",
        }
    }
}

/// Read-only client for the Weaviate-hosted knowledge base.
/// Queries go through the GraphQL endpoint; vectorization happens server-side
/// with the forwarded OpenAI key.
pub struct KnowledgeBaseClient {
    endpoint: String,
    api_key: String,
    openai_key: String,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl KnowledgeBaseClient {
    pub fn new(endpoint: &str, api_key: &str, openai_key: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            openai_key: openai_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.endpoint.is_empty()
    }

    fn graphql_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            format!("{}/v1/graphql", self.endpoint)
        } else {
            format!("https://{}/v1/graphql", self.endpoint)
        }
    }

    /// Semantic search: the `limit` objects nearest to `query`, as the
    /// collection's text property.
    pub async fn near_text(
        &self,
        collection: KnowledgeCollection,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        if !self.is_configured() {
            bail!("knowledge base endpoint is not configured");
        }

        let name = collection.name();
        let property = collection.text_property();
        let gql = format!(
            "{{ Get {{ {name}(nearText: {{concepts: [{concept}]}}, limit: {limit}) {{ {property} }} }} }}",
            concept = serde_json::to_string(query)?,
        );

        let mut req = self
            .http
            .post(self.graphql_url())
            .json(&serde_json::json!({ "query": gql }));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        if !self.openai_key.is_empty() {
            req = req.header("X-OpenAI-Api-Key", &self.openai_key);
        }

        let resp: GraphQlResponse = req
            .send()
            .await
            .context("knowledge base request failed")?
            .error_for_status()?
            .json()
            .await
            .context("knowledge base returned malformed JSON")?;

        if !resp.errors.is_empty() {
            let messages: Vec<String> = resp.errors.into_iter().map(|e| e.message).collect();
            bail!("knowledge base query failed: {}", messages.join("; "));
        }

        let texts: Vec<String> = resp
            .data
            .as_ref()
            .and_then(|d| d.get("Get"))
            .and_then(|g| g.get(name))
            .and_then(|objs| objs.as_array())
            .map(|objs| {
                objs.iter()
                    .filter_map(|o| o.get(property).and_then(|v| v.as_str()))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        info!(collection = name, results = texts.len(), "knowledge base search");
        Ok(texts)
    }
}
