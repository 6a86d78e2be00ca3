pub mod greeting;
pub mod launch;
