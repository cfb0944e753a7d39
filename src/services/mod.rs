pub mod status;

pub use status::{router, StatusResponse, StatusServer, StatusState};
