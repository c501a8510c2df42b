//! Node entry validation.
//!
//! Turns raw [`NodeConfig`] entries into an immutable set of [`Node`]s. Every entry is checked
//! in input order and the first violation aborts the whole parse, so a pool is never built
//! from a partially valid node list.
//!
//! Per entry, presence and scheme checks run before the uniqueness checks. A malformed URL is
//! therefore reported as a scheme error even when it also collides with an earlier entry.

use std::collections::HashSet;

use tracing::debug;
use url::Url;

use super::errors::ConfigError;
use crate::types::{EndpointUrl, Node, NodeConfig, MAX_NODE_ORDER, MIN_NODE_ORDER};

const WS_SCHEMES: &[&str] = &["ws", "wss"];
const HTTP_SCHEMES: &[&str] = &["http", "https"];

/// Which of the two endpoint fields is being checked.
#[derive(Clone, Copy)]
enum UrlField {
    Ws,
    Http,
}

impl UrlField {
    fn allowed_schemes(self) -> &'static [&'static str] {
        match self {
            Self::Ws => WS_SCHEMES,
            Self::Http => HTTP_SCHEMES,
        }
    }

    fn error(self, index: usize, name: &str, reason: String) -> ConfigError {
        let name = name.to_string();
        match self {
            Self::Ws => ConfigError::InvalidWsUrl { index, name, reason },
            Self::Http => ConfigError::InvalidHttpUrl { index, name, reason },
        }
    }
}

fn parse_endpoint(
    raw: Option<&str>,
    field: UrlField,
    index: usize,
    name: &str,
) -> Result<EndpointUrl, ConfigError> {
    let Some(raw) = raw else {
        return Err(field.error(index, name, "missing".to_string()));
    };

    let parsed = Url::parse(raw).map_err(|e| field.error(index, name, format!("{raw:?}: {e}")))?;

    if !field.allowed_schemes().contains(&parsed.scheme()) {
        return Err(field.error(
            index,
            name,
            format!(
                "{raw:?}: scheme {:?} not one of {:?}",
                parsed.scheme(),
                field.allowed_schemes()
            ),
        ));
    }

    Ok(EndpointUrl::new(raw, parsed))
}

/// Validates node entries and returns the node set in input order.
///
/// Entries without an explicit order are numbered `0, 1, 2, ...` counting only such entries.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found, identifying the entry index and the violated rule:
/// missing name, invalid ws url, invalid http url, order out of range, or a duplicate name,
/// ws url or http url.
pub fn parse_node_configs(configs: &[NodeConfig]) -> Result<Vec<Node>, ConfigError> {
    let mut nodes = Vec::with_capacity(configs.len());
    let mut names: HashSet<&str> = HashSet::with_capacity(configs.len());
    let mut ws_urls: HashSet<EndpointUrl> = HashSet::with_capacity(configs.len());
    let mut http_urls: HashSet<EndpointUrl> = HashSet::with_capacity(configs.len());
    let mut next_implicit_order = 0;

    for (index, config) in configs.iter().enumerate() {
        let Some(name) = config.name.as_deref() else {
            return Err(ConfigError::MissingName { index });
        };

        let ws_url = parse_endpoint(config.ws_url.as_deref(), UrlField::Ws, index, name)?;
        let http_url = parse_endpoint(config.http_url.as_deref(), UrlField::Http, index, name)?;

        let order = match config.order {
            Some(order) if (MIN_NODE_ORDER..=MAX_NODE_ORDER).contains(&order) => order,
            Some(order) => {
                return Err(ConfigError::OrderOutOfRange {
                    index,
                    name: name.to_string(),
                    order,
                })
            }
            None => {
                let order = next_implicit_order;
                next_implicit_order += 1;
                order
            }
        };

        if !names.insert(name) {
            return Err(ConfigError::DuplicateName { index, name: name.to_string() });
        }
        if ws_urls.contains(&ws_url) {
            return Err(ConfigError::DuplicateWsUrl {
                index,
                name: name.to_string(),
                url: ws_url.to_string(),
            });
        }
        if http_urls.contains(&http_url) {
            return Err(ConfigError::DuplicateHttpUrl {
                index,
                name: name.to_string(),
                url: http_url.to_string(),
            });
        }

        ws_urls.insert(ws_url.clone());
        http_urls.insert(http_url.clone());

        debug!(node = %name, order, "node entry validated");
        nodes.push(Node::new(name, ws_url, http_url, order));
    }

    Ok(nodes)
}
