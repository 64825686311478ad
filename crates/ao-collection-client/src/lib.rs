use async_trait::async_trait;
use ao_api_types::{OwnerAddress, Token};
use thiserror::Error;

pub const SORT_ACQUIRED_DESC: &str = "ACQUIRED_DESC";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Remote source of the tokens an owner holds, newest acquisitions first.
#[async_trait]
pub trait CollectionTransport: Send + Sync {
    fn endpoint(&self) -> &str;
    async fn fetch_owned_tokens(&self, owner: &OwnerAddress, limit: u32) -> Result<Vec<Token>, FetchError>;
}

pub fn validate_request(owner: &OwnerAddress, limit: u32) -> Result<(), FetchError> {
    if owner.0.trim().is_empty() {
        return Err(FetchError::InvalidArgument("owner is required".to_owned()));
    }
    if limit == 0 {
        return Err(FetchError::InvalidArgument("limit must be positive".to_owned()));
    }
    Ok(())
}

/// Drops anything that is not a still or animated image. Arrival order of
/// the remaining tokens is preserved.
pub fn retain_displayable(mut tokens: Vec<Token>) -> Vec<Token> {
    tokens.retain(|token| token.media_kind().is_displayable());
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_api_types::{TokenCollection, TokenMedia};

    fn token(id: &str, media_type: &str) -> Token {
        Token {
            id: id.to_owned(),
            token_id: id.to_owned(),
            name: format!("Token {id}"),
            rarity_order: None,
            rarity_score: None,
            minted_at: "2024-01-01T00:00:00Z".to_owned(),
            sale_type: None,
            media: TokenMedia {
                url: format!("https://img.example/{id}"),
                media_type: media_type.to_owned(),
            },
            collection: TokenCollection {
                name: "Test".to_owned(),
                contract_address: "stars1test".to_owned(),
            },
        }
    }

    #[test]
    fn filter_keeps_images_in_arrival_order() {
        let kept = retain_displayable(vec![
            token("1", "html"),
            token("2", "animated_image"),
            token("3", "video"),
            token("4", "image"),
        ]);
        let ids: Vec<&str> = kept.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "4"]);
    }

    #[test]
    fn blank_owner_and_zero_limit_are_rejected() {
        assert!(matches!(
            validate_request(&OwnerAddress("  ".to_owned()), 10),
            Err(FetchError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_request(&OwnerAddress("stars1a".to_owned()), 0),
            Err(FetchError::InvalidArgument(_))
        ));
        assert!(validate_request(&OwnerAddress("stars1a".to_owned()), 1).is_ok());
    }
}
