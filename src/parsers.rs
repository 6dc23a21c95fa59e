//! Format transformers from raw catalog payloads into normalized `Video`s.

pub mod cms;
pub mod playlist;

pub use cms::{decode_cms_response, parse_episodes, transform_cms, CmsRecord, CmsResponse};
pub use playlist::{looks_like_markup, parse_playlist};
