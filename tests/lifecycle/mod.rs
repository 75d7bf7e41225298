mod quota_tests;
mod retention_tests;
mod upload_tests;
