pub mod excuse;
pub mod reply;
