pub mod client;
pub mod error;
pub mod types;

pub use client::TagPlusClient;
pub use error::ClientError;
pub use types::{
    Authorization, ProductImage, TokenResponse, VendorCategory, VendorOption, VendorProduct,
};
