//! Integration tests for nimbus-onedrive
//!
//! Uses wiremock to simulate the Microsoft Graph API and verifies
//! end-to-end behavior of root resolution, filesystem operations,
//! chunked uploads, and retry handling.


mod test_operations;
mod test_retry;
mod test_root;
