//! Query results and partial-collection paging state

use crate::api::models::Entity;

/// What a query returned
#[derive(Debug, Clone)]
pub enum Payload {
    Entity(Entity),
    Entities(Vec<Entity>),
    /// URIs from a `$links` query
    Links(Vec<String>),
    /// Result of a `$count` query
    Count(u64),
}

impl Payload {
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Payload::Entity(entity) => Some(entity),
            Payload::Entities(entities) if entities.len() == 1 => entities.first(),
            _ => None,
        }
    }

    /// Entities in the payload; a single entity becomes a one-element list
    pub fn into_entities(self) -> Vec<Entity> {
        match self {
            Payload::Entity(entity) => vec![entity],
            Payload::Entities(entities) => entities,
            Payload::Links(_) | Payload::Count(_) => Vec::new(),
        }
    }

    pub fn links(&self) -> Option<&[String]> {
        match self {
            Payload::Links(links) => Some(links),
            _ => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self {
            Payload::Count(count) => Some(*count),
            _ => None,
        }
    }

    /// Number of entities or links
    pub fn len(&self) -> usize {
        match self {
            Payload::Entity(_) => 1,
            Payload::Entities(entities) => entities.len(),
            Payload::Links(links) => links.len(),
            Payload::Count(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How the next page of a partial collection is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// `$skiptoken` value as it appeared in the next link, quotes included
    SkipToken(String),
    /// A next link without a skip token, followed verbatim
    NextLink(String),
}

impl Continuation {
    pub fn from_next_link(next_link: &str) -> Self {
        match skip_token(next_link) {
            Some(token) => Continuation::SkipToken(token),
            None => Continuation::NextLink(next_link.to_string()),
        }
    }
}

fn skip_token(link: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        let key = urlencoding::decode(key).ok()?;
        (key == "$skiptoken").then(|| value.to_string())
    })
}

/// Paging state after a query that returned a partial collection
#[derive(Debug, Clone, Default)]
pub struct PartialCursor {
    /// Full URL of the query that started the paging
    pub root_query_url: String,
    pub continuation: Option<Continuation>,
}

impl PartialCursor {
    pub fn new(root_query_url: impl Into<String>, next_link: Option<&str>) -> Self {
        Self {
            root_query_url: root_query_url.into(),
            continuation: next_link.map(Continuation::from_next_link),
        }
    }

    pub fn has_more(&self) -> bool {
        self.continuation.is_some()
    }

    pub fn advance(&mut self, next_link: Option<&str>) {
        self.continuation = next_link.map(Continuation::from_next_link);
    }

    /// URL of the next page, if any
    pub fn next_url(&self) -> Option<String> {
        match self.continuation.as_ref()? {
            Continuation::SkipToken(token) => {
                let separator = if self.root_query_url.contains('?') { '&' } else { '?' };
                Some(format!("{}{}$skiptoken={}", self.root_query_url, separator, token))
            }
            Continuation::NextLink(link) => Some(link.clone()),
        }
    }
}
