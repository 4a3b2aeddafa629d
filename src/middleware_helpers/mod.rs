pub mod maintenance_gate;
pub mod request_id;

pub use maintenance_gate::{is_exempt, maintenance_gate};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
