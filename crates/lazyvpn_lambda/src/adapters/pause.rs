use std::time::Duration;

pub trait Pause {
    fn pause(&self, duration: Duration);
}
