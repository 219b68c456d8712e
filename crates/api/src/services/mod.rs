//! External service integrations and page rendering.

pub mod marketplace;
pub mod pages;

pub use marketplace::{
    AwsMarketplaceClient, CustomerResolver, EntitlementSource, MarketplaceError,
};
