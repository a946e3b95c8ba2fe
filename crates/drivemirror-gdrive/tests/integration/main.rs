//! Integration tests for drivemirror-gdrive
//!
//! Uses wiremock to simulate the Drive v3 API and verifies folder lookup,
//! paged listing, media download and status handling end to end.

mod common;

mod test_download;
mod test_listing;
