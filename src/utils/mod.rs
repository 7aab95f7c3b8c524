pub mod code;
pub mod de;
pub mod retry;
