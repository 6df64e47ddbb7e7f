use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use pawlegal_core::{
    agent::ToolSet,
    sources::SourceLog,
    types::{MaterialType, ToolDefinition},
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    knowledge::{KnowledgeBaseClient, KnowledgeCollection},
    legal::LegalDatabaseClient,
};

/// Objects returned per knowledge base lookup.
const KNOWLEDGE_LIMIT: usize = 3;

pub const SEARCH_LEGAL_DATABASE: &str = "search_legal_database";
pub const GET_FROM_LEGAL_DATABASE: &str = "get_from_legal_database";
pub const SEARCH_ANIMAL_CONTENT: &str = "search_animal_content";
pub const SEARCH_ANIMAL_EVENTS: &str = "search_animal_events";
pub const SEARCH_ANIMAL_ENTITIES: &str = "search_animal_entities";

#[derive(Deserialize)]
struct SearchLegalArgs {
    #[serde(default)]
    query_string: String,
    #[serde(default)]
    material_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetLegalArgs {
    href: String,
}

#[derive(Deserialize)]
struct KnowledgeArgs {
    query: String,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T> {
    let arguments = match arguments.trim() {
        "" | "null" => "{}",
        other => other,
    };
    serde_json::from_str(arguments).with_context(|| format!("invalid arguments for {tool}"))
}

/// The lookup tools available to the legal assistant for one script run.
/// Clients are shared across runs; the source log is per run.
pub struct AssistantTools {
    legal: Arc<LegalDatabaseClient>,
    knowledge: Arc<KnowledgeBaseClient>,
    sources: SourceLog,
}

impl AssistantTools {
    pub fn new(
        legal: Arc<LegalDatabaseClient>,
        knowledge: Arc<KnowledgeBaseClient>,
        sources: SourceLog,
    ) -> Self {
        Self {
            legal,
            knowledge,
            sources,
        }
    }

    async fn search_knowledge(
        &self,
        collection: KnowledgeCollection,
        arguments: &str,
        tool: &str,
    ) -> Result<String> {
        let args: KnowledgeArgs = parse_args(tool, arguments)?;
        let texts = self
            .knowledge
            .near_text(collection, &args.query, KNOWLEDGE_LIMIT)
            .await?;
        Ok(texts.join("\n"))
    }
}

fn query_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "query": { "type": "string", "description": "What to look up." }
        },
        "required": ["query"]
    })
}

#[async_trait]
impl ToolSet for AssistantTools {
    fn definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: SEARCH_LEGAL_DATABASE.into(),
                description: "Search for legal data from the animal law database. \
                    Returns a list of entries in the database with their summaries and an href \
                    for get_from_legal_database."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "query_string": {
                            "type": "string",
                            "description": "Text to search for. It will just try to match each word."
                        },
                        "material_type": {
                            "type": "string",
                            "enum": MaterialType::ALL
                                .iter()
                                .map(|m| m.as_str())
                                .collect::<Vec<_>>(),
                            "description": "The kind of result to get. Defaults to 'All'."
                        }
                    }
                }),
            },
            ToolDefinition {
                name: GET_FROM_LEGAL_DATABASE.into(),
                description: "Retrieve detailed information from the animal law database. \
                    Returns the full text of the article. Example: search_legal_database(\"bear captivity\") \
                    returns [{\"href\": \"/case/bear_rescue\", \"summary\": \"...\"}], then \
                    get_from_legal_database(\"/case/bear_rescue\")."
                    .into(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "href": {
                            "type": "string",
                            "description": "A reference to the database article, as returned by search_legal_database."
                        }
                    },
                    "required": ["href"]
                }),
            },
            ToolDefinition {
                name: SEARCH_ANIMAL_CONTENT.into(),
                description: "Look up content related to animal welfare, such as laws and articles."
                    .into(),
                parameters: query_schema(),
            },
            ToolDefinition {
                name: SEARCH_ANIMAL_EVENTS.into(),
                description: "Look up events related to animal welfare, such as protests.".into(),
                parameters: query_schema(),
            },
            ToolDefinition {
                name: SEARCH_ANIMAL_ENTITIES.into(),
                description: "Look up entities related to animal welfare, such as animal welfare \
                    organizations or agribusinesses."
                    .into(),
                parameters: query_schema(),
            },
        ]
    }

    async fn call(&self, name: &str, arguments: &str) -> Result<String> {
        match name {
            SEARCH_LEGAL_DATABASE => {
                let args: SearchLegalArgs = parse_args(name, arguments)?;
                let material_type = match args.material_type.as_deref() {
                    None | Some("") => MaterialType::All,
                    Some(s) => s.parse()?,
                };
                let entries = self.legal.search(&args.query_string, material_type).await?;
                Ok(serde_json::to_string(&entries)?)
            }
            GET_FROM_LEGAL_DATABASE => {
                let args: GetLegalArgs = parse_args(name, arguments)?;
                if !args.href.starts_with('/') {
                    bail!("href must be a site-relative path such as /case/bear_rescue");
                }
                self.legal.fetch_article(&args.href, &self.sources).await
            }
            SEARCH_ANIMAL_CONTENT => {
                self.search_knowledge(KnowledgeCollection::Content, arguments, name).await
            }
            SEARCH_ANIMAL_EVENTS => {
                self.search_knowledge(KnowledgeCollection::Event, arguments, name).await
            }
            SEARCH_ANIMAL_ENTITIES => {
                self.search_knowledge(KnowledgeCollection::Entities, arguments, name).await
            }
            other => bail!("unknown tool: {other}"),
        }
    }
}
