use async_trait::async_trait;
use ao_api_types::{OwnedTokensResponse, OwnerAddress, Token};
use ao_collection_client::{CollectionTransport, FetchError, SORT_ACQUIRED_DESC, validate_request};
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_GRAPHQL_URL: &str = "https://graphql.mainnet.stargaze-apis.com/graphql";
pub const OPERATION_NAME: &str = "OwnedTokens";

const OWNED_TOKENS_QUERY: &str = r#"
query OwnedTokens($owner: String, $seller: String, $limit: Int, $offset: Int, $filterByCollectionAddrs: [String!], $filterForSale: SaleType, $sortBy: TokenSort) {
  tokens(
    ownerAddrOrName: $owner
    sellerAddrOrName: $seller
    limit: $limit
    offset: $offset
    filterForSale: $filterForSale
    filterByCollectionAddrs: $filterByCollectionAddrs
    sortBy: $sortBy
  ) {
    tokens {
      id
      tokenId
      name
      rarityOrder
      rarityScore
      mintedAt
      saleType
      media {
        url
        type
      }
      collection {
        name
        contractAddress
      }
    }
    pageInfo {
      total
      limit
      offset
    }
  }
}
"#;

/// GraphQL transport for the Stargaze indexer.
///
/// Reads `STARGAZE_GRAPHQL_URL` from environment at construction time
/// (default: [`DEFAULT_GRAPHQL_URL`]).
pub struct StargazeTransport {
    endpoint: String,
    http: reqwest::Client,
}

impl Default for StargazeTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl StargazeTransport {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("STARGAZE_GRAPHQL_URL").ok())
            .unwrap_or_else(|| DEFAULT_GRAPHQL_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }
}

// ── GraphQL request types ────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnedTokensRequest<'a> {
    operation_name: &'static str,
    variables: OwnedTokensVariables<'a>,
    query: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OwnedTokensVariables<'a> {
    owner: &'a str,
    filter_for_sale: Option<String>,
    sort_by: &'static str,
    filter_by_collection_addrs: Option<Vec<String>>,
    limit: u32,
}

fn request_body(owner: &OwnerAddress, limit: u32) -> OwnedTokensRequest<'_> {
    OwnedTokensRequest {
        operation_name: OPERATION_NAME,
        variables: OwnedTokensVariables {
            owner: &owner.0,
            filter_for_sale: None,
            sort_by: SORT_ACQUIRED_DESC,
            filter_by_collection_addrs: None,
            limit,
        },
        query: OWNED_TOKENS_QUERY,
    }
}

/// Decodes a response body. Anything that is not the expected
/// `{data:{tokens:{tokens,pageInfo}}}` shape is a protocol error.
pub fn parse_owned_tokens(body: &str) -> Result<Vec<Token>, FetchError> {
    let response: OwnedTokensResponse = serde_json::from_str(body)
        .map_err(|err| FetchError::Protocol(format!("unexpected OwnedTokens response: {err}")))?;
    Ok(response.data.tokens.tokens)
}

#[async_trait]
impl CollectionTransport for StargazeTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch_owned_tokens(&self, owner: &OwnerAddress, limit: u32) -> Result<Vec<Token>, FetchError> {
        validate_request(owner, limit)?;

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-apollo-operation-name", OPERATION_NAME)
            .json(&request_body(owner, limit))
            .send()
            .await
            .map_err(|err| FetchError::Network(format!("stargaze transport: {err}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| FetchError::Network(format!("stargaze body read: {err}")))?;

        if !status.is_success() {
            return Err(FetchError::Network(format!("HTTP {status}: {text}")));
        }

        let tokens = parse_owned_tokens(&text)?;
        debug!("stargaze returned {} tokens for {}", tokens.len(), owner.0);
        Ok(tokens)
    }
}
