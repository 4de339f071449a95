pub mod bucket_service;
pub mod naming;
pub mod presign_service;
pub mod staging;
pub mod stream_service;
pub mod transfer_service;
