#[cfg(unix)]
pub mod fake_pip;
pub mod socket_guard;
