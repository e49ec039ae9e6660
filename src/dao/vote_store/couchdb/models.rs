use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dao::models::{VoteHistoryEntity, VoteModuleEntity};

pub const MODULE_PREFIX: &str = "module::";
pub const RESULT_PREFIX: &str = "result::";
pub const FIXTURE_PREFIX: &str = "fixture::";
pub const SQUAD_PREFIX: &str = "squad::";
pub const POST_PREFIX: &str = "post::";
pub const POINTS_PREFIX: &str = "points::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Minimal projection used to read the current revision of a document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// Generic envelope adding the CouchDB bookkeeping fields to an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, rev: Option<String>, body: T) -> Self {
        Self { id, rev, body }
    }
}

/// Vote module document. History markers live inside the module so that a
/// vote is a single revision-checked write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchModuleDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub module: VoteModuleEntity,
    /// Keyed by user id.
    #[serde(default)]
    pub voters: BTreeMap<String, CouchVoterRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchVoterRecord {
    pub candidate_id: String,
    pub voted_at: SystemTime,
}

impl CouchModuleDocument {
    pub fn new(module: VoteModuleEntity) -> Self {
        Self {
            id: module_doc_id(&module.id),
            rev: None,
            module,
            voters: BTreeMap::new(),
        }
    }

    pub fn history_of(&self, user_id: &str) -> Option<VoteHistoryEntity> {
        self.voters.get(user_id).map(|record| VoteHistoryEntity {
            module_id: self.module.id.clone(),
            user_id: user_id.to_owned(),
            candidate_id: record.candidate_id.clone(),
            voted_at: record.voted_at,
        })
    }

    pub fn history(&self) -> Vec<VoteHistoryEntity> {
        self.voters
            .keys()
            .filter_map(|user_id| self.history_of(user_id))
            .collect()
    }
}

pub fn module_doc_id(id: &str) -> String {
    format!("{MODULE_PREFIX}{id}")
}

pub fn result_doc_id(module_id: &str) -> String {
    format!("{RESULT_PREFIX}{module_id}")
}

pub fn fixture_doc_id(id: &str) -> String {
    format!("{FIXTURE_PREFIX}{id}")
}

pub fn squad_doc_id(id: &str) -> String {
    format!("{SQUAD_PREFIX}{id}")
}

pub fn post_doc_id(id: &str) -> String {
    format!("{POST_PREFIX}{id}")
}

pub fn points_prefix(user_id: &str) -> String {
    format!("{POINTS_PREFIX}{user_id}::")
}
