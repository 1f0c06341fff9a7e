//! Testing infrastructure shared by unit and integration tests.

pub mod mock_feed;

pub use mock_feed::{
    feed_item, feed_page, image_url_for, sample_post, MemoryImageStore, MockFeedClient,
    StaticImageFetcher,
};
