use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerAddress(pub String);

// ── Collection items ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub id: String,
    pub token_id: String,
    pub name: String,
    pub rarity_order: Option<i64>,
    pub rarity_score: Option<f64>,
    pub minted_at: String,
    pub sale_type: Option<String>,
    pub media: TokenMedia,
    pub collection: TokenCollection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMedia {
    pub url: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenCollection {
    pub name: String,
    pub contract_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedTokensResponse {
    pub data: OwnedTokensData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnedTokensData {
    pub tokens: OwnedTokensPage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTokensPage {
    pub tokens: Vec<Token>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    AnimatedImage,
    Html,
    Video,
    Other(String),
}

impl MediaKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "image" => Self::Image,
            "animated_image" => Self::AnimatedImage,
            "html" => Self::Html,
            "video" => Self::Video,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn is_displayable(&self) -> bool {
        matches!(self, Self::Image | Self::AnimatedImage)
    }
}

impl Token {
    pub fn media_kind(&self) -> MediaKind {
        MediaKind::parse(&self.media.media_type)
    }
}

// ── Wallet connection ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
    Rejected,
    NotExist,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub status: WalletStatus,
    #[serde(default)]
    pub chain: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub wallet_name: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl ConnectionStatus {
    pub fn disconnected(chain: &str) -> Self {
        Self {
            chain: Some(chain.to_owned()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectAction {
    Connect,
    OpenDetailView,
    None,
}

/// Requests the core issues to the wallet collaborator. A browser bridge
/// drains these and performs them against the real wallet extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WalletRequest {
    SwitchChain { chain: String },
    Connect { chain: String },
    OpenDetailView { chain: String },
}

// ── Service DTOs ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub chain: String,
    pub known_chains: Vec<String>,
    pub status: ConnectionStatus,
    pub short_address: Option<String>,
    pub connect_action: ConnectAction,
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectChainRequest {
    pub chain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub action: ConnectAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRequestsResponse {
    pub requests: Vec<WalletRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ViewOwnerRequest {
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRequest {
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveItemRequest {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundRequest {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_uses_graphql_field_names() {
        let raw = r#"{
            "id": "stars1abc-7",
            "tokenId": "7",
            "name": "Observer #7",
            "rarityOrder": 12,
            "rarityScore": null,
            "mintedAt": "2023-04-01T10:00:00Z",
            "saleType": null,
            "media": { "url": "ipfs://img/7.png", "type": "image" },
            "collection": { "name": "Observers", "contractAddress": "stars1abc" }
        }"#;

        let token: Token = serde_json::from_str(raw).expect("token should parse");
        assert_eq!(token.token_id, "7");
        assert_eq!(token.rarity_order, Some(12));
        assert_eq!(token.rarity_score, None);
        assert_eq!(token.collection.contract_address, "stars1abc");
        assert_eq!(token.media_kind(), MediaKind::Image);
    }

    #[test]
    fn only_still_and_animated_images_are_displayable() {
        assert!(MediaKind::parse("image").is_displayable());
        assert!(MediaKind::parse("animated_image").is_displayable());
        assert!(!MediaKind::parse("html").is_displayable());
        assert!(!MediaKind::parse("video").is_displayable());
        assert_eq!(MediaKind::parse("audio"), MediaKind::Other("audio".to_owned()));
    }

    #[test]
    fn status_push_tolerates_missing_optional_fields() {
        let status: ConnectionStatus =
            serde_json::from_str(r#"{"status":"not_exist"}"#).expect("status should parse");
        assert_eq!(status.status, WalletStatus::NotExist);
        assert!(status.address.is_none());
    }
}
